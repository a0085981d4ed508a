//! Envelope DTOs around the PrivX JSON payloads.
//!
//! Object bodies decode straight into the domain records; these types only
//! cover the wrappers the API puts around them.

use serde::{Deserialize, Serialize};

use crate::domain::ports::PrincipalKey;

/// `{"count": n, "items": [...]}` list responses.
#[derive(Debug, Deserialize)]
pub(super) struct ListResponseDto<T> {
    #[serde(default)]
    pub(super) count: Option<usize>,
    #[serde(default = "Vec::new")]
    pub(super) items: Vec<T>,
}

/// Create responses. Id-addressed collections answer with `id`, the vault
/// answers with `name`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CreatedDto {
    pub(super) id: String,
    pub(super) name: String,
}

impl CreatedDto {
    pub(super) fn into_identifier(self) -> Option<String> {
        if !self.id.is_empty() {
            Some(self.id)
        } else if !self.name.is_empty() {
            Some(self.name)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PrincipalKeyDto {
    pub(super) id: String,
    pub(super) public_key: String,
}

impl From<PrincipalKeyDto> for PrincipalKey {
    fn from(dto: PrincipalKeyDto) -> Self {
        Self {
            id: dto.id,
            public_key: dto.public_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct DownloadSessionDto {
    pub(super) session_id: String,
}

/// Query string of collection listings.
#[derive(Debug, Clone, Copy, Serialize)]
pub(super) struct ListQueryDto {
    pub(super) offset: usize,
    pub(super) limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) sortkey: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) sortdir: Option<&'static str>,
}

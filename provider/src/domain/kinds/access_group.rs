//! Authorizer access groups.

use serde::{Deserialize, Serialize};

use super::{IdSyntax, KindSchema, ObjectKind};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder,
};

/// PrivX access group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub comment: String,
    /// Whether this is the platform's default group. Server-owned.
    #[serde(skip_serializing)]
    pub default: bool,
}

/// Marker for the access group kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGroupKind;

impl ObjectKind for AccessGroupKind {
    type Record = AccessGroup;

    const SCHEMA: KindSchema = KindSchema {
        name: "access_group",
        id_syntax: IdSyntax::Uuid,
        computed: &["id", "default"],
        immutable: &[],
        sensitive: &[],
        refresh_after_write: false,
    };

    fn decode(record: &Record) -> Result<AccessGroup, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        Ok(AccessGroup {
            id: d.string("id")?.known(),
            name: d.required_string("name")?,
            comment: d.string_or("comment", "")?,
            default: d.bool_or("default", false)?,
        })
    }

    fn encode(group: &AccessGroup, _prior: Option<&Record>) -> Result<Record, EncodeError> {
        Ok(RecordBuilder::new()
            .optional_string("id", group.id.as_deref())
            .string("name", group.name.as_str())
            .string("comment", group.comment.as_str())
            .bool("default", group.default)
            .build())
    }

    fn remote_id(group: &AccessGroup) -> Option<String> {
        group.id.clone()
    }
}

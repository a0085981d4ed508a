//! Driven port for read-only directory queries that are not plain CRUD.

use async_trait::async_trait;

use super::RemoteError;
use crate::domain::kinds::RoleRef;

/// Which trusted-client configuration bundle to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTarget {
    /// Extender `extender-config.toml`.
    Extender,
    /// Carrier `carrier-config.toml`.
    Carrier,
    /// Web proxy `web-proxy-config.toml`.
    WebProxy,
}

impl ConfigTarget {
    /// Authorizer path segment for this bundle.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Extender => "extender",
            Self::Carrier => "carrier",
            Self::WebProxy => "icap",
        }
    }
}

/// Name resolution and configuration downloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve role names to references. Unknown names are omitted.
    async fn resolve_roles(&self, names: &[String]) -> Result<Vec<RoleRef>, RemoteError>;

    /// Download the configuration bundle for a trusted client.
    async fn trusted_client_config(
        &self,
        target: ConfigTarget,
        trusted_client_id: &str,
    ) -> Result<String, RemoteError>;
}

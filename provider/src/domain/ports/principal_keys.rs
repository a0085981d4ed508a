//! Driven port for role principal key generation.

use async_trait::async_trait;

use super::RemoteError;

/// A principal key pair as reported by the role store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrincipalKey {
    /// Key identifier.
    pub id: String,
    /// Public half in OpenSSH format; empty until generation finishes.
    pub public_key: String,
}

/// Server-side key-pair generation for roles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalKeys: Send + Sync {
    /// Start generating a key pair for a role, returning the key id.
    async fn generate(&self, role_id: &str) -> Result<String, RemoteError>;

    /// Fetch the current state of a generated key.
    async fn get(&self, role_id: &str, key_id: &str) -> Result<PrincipalKey, RemoteError>;
}

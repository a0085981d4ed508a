//! Driving-side view of an authenticated PrivX session.
//!
//! A [`ConnectorFactory`] turns a resolved credential into a set of
//! [`ResourceClients`] sharing one authenticated connection. Construction
//! performs one token acquisition so bad credentials fail before any
//! resource call is issued.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::{Directory, PrincipalKeys, ResourceClient};
use crate::domain::credentials::Credential;
use crate::domain::kinds::{AccessGroup, ApiClient, Host, Role, Secret, Source, TrustedClient};

/// Token acquisition failed; nothing else may run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("client authentication failed: {message}")]
pub struct AuthFailure {
    /// Underlying transport or server message.
    pub message: String,
}

impl AuthFailure {
    /// Build a failure from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resource clients sharing one authenticated connection.
pub trait ResourceClients: Send + Sync {
    /// Host store hosts.
    fn hosts(&self) -> Arc<dyn ResourceClient<Host>>;
    /// Role store roles.
    fn roles(&self) -> Arc<dyn ResourceClient<Role>>;
    /// Role principal key generation.
    fn principal_keys(&self) -> Arc<dyn PrincipalKeys>;
    /// Role store identity sources.
    fn sources(&self) -> Arc<dyn ResourceClient<Source>>;
    /// Local user store trusted clients.
    fn trusted_clients(&self) -> Arc<dyn ResourceClient<TrustedClient>>;
    /// Vault secrets.
    fn secrets(&self) -> Arc<dyn ResourceClient<Secret>>;
    /// Local user store API clients.
    fn api_clients(&self) -> Arc<dyn ResourceClient<ApiClient>>;
    /// Authorizer access groups.
    fn access_groups(&self) -> Arc<dyn ResourceClient<AccessGroup>>;
    /// Name resolution and configuration downloads.
    fn directory(&self) -> Arc<dyn Directory>;
}

/// Builds authenticated connections.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Authenticate against `base_url` and return the session's clients.
    async fn connect(
        &self,
        base_url: &Url,
        credential: &Credential,
    ) -> Result<Arc<dyn ResourceClients>, AuthFailure>;
}

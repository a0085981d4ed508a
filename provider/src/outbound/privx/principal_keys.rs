//! Role principal key generation through the role store.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;

use super::dto::{CreatedDto, PrincipalKeyDto};
use super::transport::PrivxTransport;
use crate::domain::ports::{PrincipalKey, PrincipalKeys, RemoteError};

const ROLES: &str = "role-store/api/v1/roles";

/// [`PrincipalKeys`] over the PrivX role store.
pub struct PrivxPrincipalKeys {
    transport: Arc<PrivxTransport>,
}

impl PrivxPrincipalKeys {
    /// Key client sharing `transport`.
    pub fn new(transport: Arc<PrivxTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl PrincipalKeys for PrivxPrincipalKeys {
    async fn generate(&self, role_id: &str) -> Result<String, RemoteError> {
        let url = self
            .transport
            .url(ROLES, &[role_id, "principalkeys", "generate"])?;
        let created: CreatedDto = self
            .transport
            .send_json(Method::POST, url, |request| request)
            .await?;
        created
            .into_identifier()
            .ok_or_else(|| RemoteError::decode("key generation response carried no key id"))
    }

    async fn get(&self, role_id: &str, key_id: &str) -> Result<PrincipalKey, RemoteError> {
        let url = self
            .transport
            .url(ROLES, &[role_id, "principalkeys", key_id])?;
        let key: PrincipalKeyDto = self
            .transport
            .send_json(Method::GET, url, |request| request)
            .await?;
        Ok(key.into())
    }
}

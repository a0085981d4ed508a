//! Role name resolution and trusted-client configuration downloads.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;

use super::dto::{DownloadSessionDto, ListResponseDto};
use super::transport::PrivxTransport;
use crate::domain::kinds::RoleRef;
use crate::domain::ports::{ConfigTarget, Directory, RemoteError};

const RESOLVE_ROLES: &str = "role-store/api/v1/roles/resolve";
const AUTHORIZER: &str = "authorizer/api/v1";

/// [`Directory`] over the role store and the authorizer.
pub struct PrivxDirectory {
    transport: Arc<PrivxTransport>,
}

impl PrivxDirectory {
    /// Directory client sharing `transport`.
    pub fn new(transport: Arc<PrivxTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Directory for PrivxDirectory {
    async fn resolve_roles(&self, names: &[String]) -> Result<Vec<RoleRef>, RemoteError> {
        let url = self.transport.url(RESOLVE_ROLES, &[])?;
        let resolved: ListResponseDto<RoleRef> = self
            .transport
            .send_json(Method::POST, url, |request| request.json(names))
            .await?;
        Ok(resolved
            .items
            .into_iter()
            .filter(|role| !role.id.is_empty())
            .collect())
    }

    async fn trusted_client_config(
        &self,
        target: ConfigTarget,
        trusted_client_id: &str,
    ) -> Result<String, RemoteError> {
        let conf = [target.path_segment(), "conf", trusted_client_id];
        let session_url = self.transport.url(AUTHORIZER, &conf)?;
        let session: DownloadSessionDto = self
            .transport
            .send_json(Method::POST, session_url, |request| request)
            .await?;

        let download = [
            target.path_segment(),
            "conf",
            trusted_client_id,
            session.session_id.as_str(),
        ];
        let download_url = self.transport.url(AUTHORIZER, &download)?;
        let body = self
            .transport
            .send(Method::GET, download_url, |request| request)
            .await?;
        String::from_utf8(body)
            .map_err(|error| RemoteError::decode(format!("configuration is not UTF-8: {error}")))
    }
}

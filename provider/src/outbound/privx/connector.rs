//! Connector factory producing authenticated PrivX sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use super::session::PrivxSession;
use super::transport::PrivxTransport;
use crate::domain::credentials::Credential;
use crate::domain::ports::{AuthFailure, ConnectorFactory, ResourceClients};

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`PrivxSession`]s over reqwest.
#[derive(Debug, Clone, Copy)]
pub struct PrivxConnector {
    request_timeout: Duration,
}

impl Default for PrivxConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl PrivxConnector {
    /// Connector whose requests give up after `request_timeout`.
    pub const fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl ConnectorFactory for PrivxConnector {
    async fn connect(
        &self,
        base_url: &Url,
        credential: &Credential,
    ) -> Result<Arc<dyn ResourceClients>, AuthFailure> {
        let transport = PrivxTransport::new(base_url.clone(), credential, self.request_timeout)
            .map_err(|error| AuthFailure::new(format!("HTTP client setup failed: {error}")))?;
        if let Err(error) = transport.bearer().await {
            warn!(%base_url, %error, "PrivX authentication failed");
            return Err(AuthFailure::new(error.to_string()));
        }
        info!(%base_url, "connected to PrivX");
        Ok(Arc::new(PrivxSession::new(&Arc::new(transport))))
    }
}

//! Runtime settings loaded via OrthoConfig.
//!
//! These tune the process itself. PrivX credentials arrive through the
//! `configure` request and are resolved by [`crate::domain::credentials`].

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::PollPolicy;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_KEY_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_KEY_POLL_TIMEOUT_SECS: u64 = 12;

/// Process-level knobs for the reconciliation binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PRIVX_RECONCILE")]
pub struct RuntimeSettings {
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Delay between role key polls in milliseconds.
    pub key_poll_interval_ms: Option<u64>,
    /// Upper bound on the role key wait in seconds.
    pub key_poll_timeout_secs: Option<u64>,
    /// Emit JSON log lines instead of human-readable ones.
    #[ortho_config(default = true)]
    pub json_logs: bool,
}

impl RuntimeSettings {
    /// HTTP timeout, falling back to the default.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Role key poll schedule, falling back to the defaults.
    pub fn key_poll(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(
                self.key_poll_interval_ms
                    .unwrap_or(DEFAULT_KEY_POLL_INTERVAL_MS),
            ),
            timeout: Duration::from_secs(
                self.key_poll_timeout_secs
                    .unwrap_or(DEFAULT_KEY_POLL_TIMEOUT_SECS),
            ),
        }
    }
}

//! Role principal key generation with a bounded wait.
//!
//! PrivX generates the key pair asynchronously after the role exists. The
//! poll accepts the first public key that looks generated and otherwise
//! leaves the role with no key; the role itself is already created, so a
//! slow or failing key service is never a create failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::CreateHook;
use crate::domain::kinds::Role;
use crate::domain::ports::PrincipalKeys;

/// Marker a finished RSA public key contains.
pub const GENERATED_KEY_MARKER: &str = "ssh-rsa ";

/// Interval and total wait for the key poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between fetches.
    pub interval: Duration,
    /// Give up once this much time has passed since the first fetch.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(12),
        }
    }
}

/// Create hook generating and awaiting a role's principal key.
pub struct RoleKeyPoll {
    keys: Arc<dyn PrincipalKeys>,
    policy: PollPolicy,
}

impl RoleKeyPoll {
    /// Poll `keys` according to `policy`.
    pub fn new(keys: Arc<dyn PrincipalKeys>, policy: PollPolicy) -> Self {
        Self { keys, policy }
    }

    /// Generate a key for `role_id` and wait for its public half.
    ///
    /// Returns `None` on timeout, cancellation or any remote failure.
    pub async fn await_public_key(
        &self,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let key_id = match self.keys.generate(role_id).await {
            Ok(key_id) => key_id,
            Err(error) => {
                warn!(role_id, error = %error, "principal key generation failed");
                return None;
            }
        };

        let started = Instant::now();
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            match self.keys.get(role_id, &key_id).await {
                Ok(key) if key.public_key.contains(GENERATED_KEY_MARKER) => {
                    debug!(role_id, attempts, "principal key ready");
                    return Some(key.public_key);
                }
                Ok(_) => debug!(role_id, attempts, "principal key not ready yet"),
                Err(error) => {
                    warn!(role_id, error = %error, "principal key fetch failed");
                    return None;
                }
            }

            if started.elapsed() >= self.policy.timeout {
                warn!(
                    role_id,
                    attempts,
                    timeout_secs = self.policy.timeout.as_secs(),
                    "principal key not ready before timeout; continuing without it"
                );
                return None;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    warn!(role_id, attempts, "principal key poll cancelled");
                    return None;
                }
                () = sleep(self.policy.interval) => {}
            }
        }
    }
}

#[async_trait]
impl CreateHook<Role> for RoleKeyPoll {
    async fn after_create(&self, id: &str, role: &mut Role, cancel: &CancellationToken) {
        role.public_keys = self.await_public_key(id, cancel).await.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    //! Timing behaviour of the key poll under a paused clock.

    use super::*;
    use crate::domain::ports::{FixturePrincipalKeys, MockPrincipalKeys, RemoteError};
    use rstest::rstest;

    fn poll(keys: Arc<dyn PrincipalKeys>) -> RoleKeyPoll {
        RoleKeyPoll::new(keys, PollPolicy::default())
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn key_ready_after_three_seconds_is_accepted() {
        let keys = Arc::new(FixturePrincipalKeys::ready_after(4, "ssh-rsa AAAAB3Nza"));
        let started = Instant::now();

        let key = poll(keys.clone())
            .await_public_key("r1", &CancellationToken::new())
            .await;

        assert_eq!(key.as_deref(), Some("ssh-rsa AAAAB3Nza"));
        assert_eq!(keys.polls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_timeout() {
        let keys = Arc::new(FixturePrincipalKeys::never_ready());
        let started = Instant::now();

        let key = poll(keys.clone())
            .await_public_key("r1", &CancellationToken::new())
            .await;

        assert_eq!(key, None);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
        assert_eq!(keys.polls(), 13);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let keys = Arc::new(FixturePrincipalKeys::never_ready());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });
        let started = Instant::now();

        let key = poll(keys).await_public_key("r1", &cancel).await;

        assert_eq!(key, None);
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
    }

    #[rstest]
    #[tokio::test]
    async fn generation_failure_leaves_the_placeholder() {
        let mut keys = MockPrincipalKeys::new();
        keys.expect_generate()
            .times(1)
            .returning(|_| Err(RemoteError::rejected(403_u16, "forbidden")));
        keys.expect_get().times(0);

        let mut role = Role::default();
        poll(Arc::new(keys))
            .after_create("r1", &mut role, &CancellationToken::new())
            .await;

        assert!(role.public_keys.is_empty());
    }
}

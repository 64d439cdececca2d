//! Fixed-interval retry for opening coordination sessions.

use crate::tree::{CoordinationTree, TreeConnector};
use senderpool_core::{config::DiscoverySettings, config::DEFAULT_RETRY_INTERVAL, Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how many times to try connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts
    pub interval: Duration,
    /// Give up after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with the given pause.
    #[must_use]
    pub const fn forever(interval: Duration) -> Self {
        Self { interval, max_attempts: None }
    }

    /// Retry at most `attempts` times with the given pause.
    #[must_use]
    pub const fn bounded(interval: Duration, attempts: u32) -> Self {
        Self { interval, max_attempts: Some(attempts) }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(DEFAULT_RETRY_INTERVAL)
    }
}

impl From<&DiscoverySettings> for RetryPolicy {
    fn from(settings: &DiscoverySettings) -> Self {
        Self { interval: settings.retry_interval, max_attempts: settings.max_connect_attempts }
    }
}

/// Open a session, retrying connection failures according to `policy`.
///
/// # Errors
/// Returns [`Error::Discovery`] once the policy gives up.
pub async fn connect_with_retry(
    connector: &dyn TreeConnector,
    connection_string: &str,
    policy: RetryPolicy,
) -> Result<Box<dyn CoordinationTree>> {
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        match connector.connect(connection_string).await {
            Ok(tree) => {
                debug!(attempt, "Connected to coordination service at {connection_string}");
                return Ok(tree);
            },
            Err(e) if policy.exhausted(attempt) => {
                return Err(Error::discovery(format!(
                    "can't connect to coordination service at {connection_string} after {attempt} attempts: {e}"
                )));
            },
            Err(e) => {
                warn!(attempt, "Coordination service connection failed, retrying: {e}");
                tokio::time::sleep(policy.interval).await;
            },
        }
    }
}

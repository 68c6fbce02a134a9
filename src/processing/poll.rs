//! Bounded retry-with-sleep primitive used by the indexing loop.

use crate::config::Config;
use crate::remote::RemoteError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Timing and size limits applied to every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingPolicy {
    /// Fixed delay between status polls and between transient retries.
    pub poll_interval: Duration,
    /// Polling budget measured from submission.
    pub timeout: Duration,
    /// Retries allowed for a single status poll that fails transiently.
    pub max_transient_retries: u32,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
}

impl Default for IndexingPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15 * 60),
            max_transient_retries: 3,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl From<&Config> for IndexingPolicy {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            timeout: Duration::from_secs(config.poll_timeout_secs),
            max_transient_retries: config.poll_max_retries,
            max_upload_bytes: config.upload_max_bytes,
        }
    }
}

/// Run `call`, retrying transient failures up to `policy.max_transient_retries` times with
/// `policy.poll_interval` between attempts. Permanent failures return immediately.
///
/// A transient failure seen at or after `deadline` is not retried; `Ok(None)` reports that the
/// budget ran out while the call was still failing.
pub(crate) async fn retry_transient<T, F, Fut>(
    policy: &IndexingPolicy,
    deadline: Instant,
    operation: &'static str,
    mut call: F,
) -> Result<Option<T>, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut retries = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(Some(value)),
            Err(error) if error.is_transient() && Instant::now() >= deadline => {
                tracing::warn!(
                    operation,
                    retries,
                    error = %error,
                    "Transient remote failure after the polling budget ran out"
                );
                return Ok(None);
            }
            Err(error) if error.is_transient() && retries < policy.max_transient_retries => {
                retries += 1;
                tracing::warn!(
                    operation,
                    retry = retries,
                    max_retries = policy.max_transient_retries,
                    error = %error,
                    "Transient remote failure; retrying"
                );
                tokio::time::sleep(policy.poll_interval).await;
            }
            Err(error) => {
                tracing::error!(operation, retries, error = %error, "Remote call failed");
                return Err(error);
            }
        }
    }
}

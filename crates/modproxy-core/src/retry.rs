//! Bounded retries for transient store faults.

use modproxy_store::StoreError;
use tracing::warn;

use crate::config::RetryConfig;

/// A store operation that failed on its final attempt.
#[derive(Debug)]
pub struct Exhausted {
    /// The last error seen.
    pub error: StoreError,
    /// Attempts made, including the first.
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors reporting [`StoreError::is_transient`] are retried.
pub fn with_retry<T>(
    policy: &RetryConfig,
    action: &str,
    mut op: impl FnMut() -> modproxy_store::Result<T>,
) -> Result<T, Exhausted> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < attempts => {
                warn!(
                    action,
                    key = error.key(),
                    attempt,
                    attempts,
                    %error,
                    "transient store fault, retrying"
                );
                std::thread::sleep(policy.backoff(attempt));
                attempt += 1;
            }
            Err(error) => {
                return Err(Exhausted {
                    error,
                    attempts: attempt,
                })
            }
        }
    }
}

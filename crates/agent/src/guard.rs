//! Deadline and retry policy for a single external call.

use roadclaim_config::AgentConfig;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Wraps each tool or model call in a deadline, with bounded retries for
/// transient failures. A call that hits the deadline is not retried.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl CallGuard {
    pub fn new(timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.call_timeout(), config.max_retries, config.retry_backoff())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` until it succeeds, fails permanently, or times out.
    ///
    /// `is_transient` decides whether an error earns another attempt;
    /// `on_timeout` builds the error returned when the deadline passes.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
        is_transient: impl Fn(&E) -> bool,
        on_timeout: impl FnOnce(u64) -> E,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        let mut delay = self.backoff;

        loop {
            match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(operation, timeout_secs = self.timeout.as_secs(), "Call timed out");
                    return Err(on_timeout(self.timeout.as_secs()));
                }
            }
        }
    }
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

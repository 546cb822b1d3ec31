use crate::config::ProvidersConfig;
use crate::error::{AuditError, AuditResult};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Bounded timeout + exponential backoff around a provider call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run `call` until it succeeds, fails permanently, or retries run out.
    /// Each attempt gets its own deadline.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut call: F) -> AuditResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AuditResult<T>>,
    {
        let mut attempts = 0;
        let mut delay = self.initial_delay;

        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AuditError::UpstreamTimeout {
                    provider: provider.to_string(),
                    timeout: self.timeout,
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempts > self.max_retries => {
                    error!("{} failed after {} attempts: {}", provider, attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        provider,
                        attempts,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

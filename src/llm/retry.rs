//! Capped exponential-backoff retry around any [`LlmProvider`].
//!
//! Only transient failures (see [`LlmError::is_transient`]) are retried.
//! Malformed replies are not a transport concern and pass straight through.
//! An optional timeout bounds each attempt, so a timed-out attempt is retried
//! like any other transient failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::litellm::{GenerationRequest, GenerationResponse, LlmProvider};
use crate::config::RetryConfig;
use crate::error::LlmError;

/// Provider wrapper that retries transient transport failures.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    config: RetryConfig,
    attempt_timeout: Option<Duration>,
}

impl RetryingProvider {
    /// Wrap `inner` with the given retry policy.
    pub fn new(inner: Arc<dyn LlmProvider>, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            attempt_timeout: None,
        }
    }

    /// Bounds every attempt by `timeout`.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    async fn attempt(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.generate(request))
                .await
                .unwrap_or_else(|_| {
                    Err(LlmError::Timeout {
                        seconds: limit.as_secs(),
                    })
                }),
            None => self.inner.generate(request).await,
        }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let mut retries = 0u32;

        loop {
            match self.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.config.delay_for(retries);
                    tracing::warn!(
                        attempt = retries,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient LLM failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Choice, Message, Usage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that fails with scripted errors before succeeding.
    struct FlakyProvider {
        failures: Mutex<Vec<LlmError>>,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(failures: Vec<LlmError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().expect("lock poisoned");
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            Ok(GenerationResponse {
                id: "ok".to_string(),
                model: "test-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant("done"),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    /// Hangs on the first call, then answers immediately.
    struct SlowFirstProvider {
        calls: AtomicUsize,
        stall: Duration,
    }

    #[async_trait]
    impl LlmProvider for SlowFirstProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(self.stall).await;
            }
            Ok(GenerationResponse {
                id: "ok".to_string(),
                model: "test-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant("late"),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("m", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let inner = Arc::new(FlakyProvider::new(vec![
            LlmError::RateLimited("slow".to_string()),
            LlmError::ApiError {
                code: 502,
                message: "bad gateway".to_string(),
            },
        ]));
        let provider = RetryingProvider::new(inner.clone(), fast_retry(2));

        let response = provider.generate(request()).await.expect("should succeed");
        assert_eq!(response.first_content(), Some("done"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(FlakyProvider::new(vec![
            LlmError::Timeout { seconds: 1 },
            LlmError::Timeout { seconds: 1 },
            LlmError::Timeout { seconds: 1 },
        ]));
        let provider = RetryingProvider::new(inner.clone(), fast_retry(2));

        let err = provider.generate(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fails_immediately() {
        let inner = Arc::new(FlakyProvider::new(vec![LlmError::ApiError {
            code: 401,
            message: "unauthorized".to_string(),
        }]));
        let provider = RetryingProvider::new(inner.clone(), fast_retry(2));

        let err = provider.generate(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { code: 401, .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timed_out_attempt_is_retried() {
        let inner = Arc::new(SlowFirstProvider {
            calls: AtomicUsize::new(0),
            stall: Duration::from_secs(5),
        });
        let provider = RetryingProvider::new(inner.clone(), fast_retry(2))
            .with_attempt_timeout(Duration::from_millis(50));

        let response = provider.generate(request()).await.expect("second attempt");
        assert_eq!(response.first_content(), Some("late"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout_without_retries() {
        let inner = Arc::new(SlowFirstProvider {
            calls: AtomicUsize::new(0),
            stall: Duration::from_secs(5),
        });
        let provider = RetryingProvider::new(inner.clone(), RetryConfig::disabled())
            .with_attempt_timeout(Duration::from_millis(50));

        let err = provider.generate(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}

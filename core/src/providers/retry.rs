use crate::error::TransportError;
use crate::providers::StreamAccumulator;
use crate::traits::{AgentEvent, ChatMessage, ChatRequest, Provider, Transport};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1500);

/// Exponential backoff: attempt `n` (0-based) waits `base × 2^n` before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn attempts(&self) -> usize {
        self.max_retries.max(1)
    }
}

/// Runs each chat request through a fresh [`StreamAccumulator`], retrying
/// failed attempts with backoff. Exhausted retries become an assistant
/// message describing the failure.
pub struct RetryingProvider<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingProvider<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn attempt(
        &self,
        request: ChatRequest<'_>,
        acc: &mut StreamAccumulator,
    ) -> Result<(), TransportError> {
        let mut lines = self.transport.open(request).await?;
        let mut received = 0usize;

        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    received += 1;
                    if let Some(token) = acc.push_line(&line) {
                        request.events.emit(AgentEvent::Token(token));
                    }
                    if acc.is_done() {
                        break;
                    }
                }
                Err(e) if received == 0 => return Err(e),
                Err(e) => {
                    warn!(error = %e, lines = received, "Stream interrupted, keeping partial response");
                    break;
                }
            }
        }

        if received == 0 {
            return Err(TransportError::EmptyBody);
        }

        Ok(())
    }
}

#[async_trait]
impl<T: Transport> Provider for RetryingProvider<T> {
    async fn chat(&self, request: ChatRequest<'_>) -> ChatMessage {
        let attempts = self.policy.attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            let mut acc = StreamAccumulator::new();

            match self.attempt(request, &mut acc).await {
                Ok(()) => {
                    debug!(attempt, "Chat request completed");
                    return acc.finish();
                }
                Err(e) => {
                    warn!(attempt, max_retries = attempts, error = %e, "Chat request failed");
                    last_error = Some(e);
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        request.events.emit(AgentEvent::ConnectionError(reason.clone()));
        ChatMessage::assistant(format!("[Connection error: {}]", reason))
    }
}

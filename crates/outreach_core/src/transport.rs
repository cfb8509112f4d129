//! Message transport to and from the counterparty.
//!
//! `receive_reply` is the workflow's only suspension point. A production
//! transport may wait an arbitrary amount of time there; the executor
//! checkpoints before every step so a restarted process resumes at the
//! await step rather than re-sending.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::stage::StageId;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver an outgoing message.
    async fn send(&self, thread_id: &str, stage: StageId, text: &str) -> CoreResult<()>;

    /// Suspend until the counterparty replies, then return the reply text.
    async fn receive_reply(&self, thread_id: &str, stage: StageId) -> CoreResult<String>;
}

/// Offline transport: swallows sends and synthesizes a placeholder reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedTransport;

impl SimulatedTransport {
    pub fn reply_for(stage: StageId) -> String {
        format!("[Simulated KOL response for {} stage]", stage)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(&self, thread_id: &str, stage: StageId, text: &str) -> CoreResult<()> {
        debug!(thread = thread_id, %stage, chars = text.chars().count(), "Simulated send");
        Ok(())
    }

    async fn receive_reply(&self, _thread_id: &str, stage: StageId) -> CoreResult<String> {
        Ok(Self::reply_for(stage))
    }
}

/// Retries a failing transport up to a fixed budget.
pub struct RetryingTransport<T> {
    inner: T,
    max_retries: u32,
    backoff: Duration,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            backoff: Duration::from_millis(200),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn pause(&self, attempt: u32) {
        if !self.backoff.is_zero() {
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, thread_id: &str, stage: StageId, text: &str) -> CoreResult<()> {
        let mut attempt = 0;
        loop {
            match self.inner.send(thread_id, stage, text).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(thread = thread_id, %stage, attempt, "Send failed, retrying: {}", e);
                    self.pause(attempt).await;
                }
                Err(e) => {
                    return Err(CoreError::Transport(format!(
                        "send failed after {} attempts: {}",
                        attempt + 1,
                        e
                    )))
                }
            }
        }
    }

    async fn receive_reply(&self, thread_id: &str, stage: StageId) -> CoreResult<String> {
        let mut attempt = 0;
        loop {
            match self.inner.receive_reply(thread_id, stage).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(thread = thread_id, %stage, attempt, "Receive failed, retrying: {}", e);
                    self.pause(attempt).await;
                }
                Err(e) => {
                    return Err(CoreError::Transport(format!(
                        "receive failed after {} attempts: {}",
                        attempt + 1,
                        e
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTransport {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, _thread_id: &str, _stage: StageId, _text: &str) -> CoreResult<()> {
            Ok(())
        }

        async fn receive_reply(&self, _thread_id: &str, _stage: StageId) -> CoreResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(CoreError::Transport("connection reset".to_string()));
            }
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn test_simulated_reply() {
        let reply = SimulatedTransport.receive_reply("t", StageId::Brief).await.unwrap();
        assert_eq!(reply, "[Simulated KOL response for brief stage]");
    }

    #[tokio::test]
    async fn test_retry_recovers_within_budget() {
        let transport = RetryingTransport::new(FlakyTransport::new(2), 3).with_backoff(Duration::ZERO);
        let reply = transport.receive_reply("t", StageId::Greet).await.unwrap();

        assert_eq!(reply, "ok");
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let transport = RetryingTransport::new(FlakyTransport::new(5), 1).with_backoff(Duration::ZERO);
        let err = transport.receive_reply("t", StageId::Greet).await.unwrap_err();

        assert!(matches!(err, CoreError::Transport(_)));
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 2);
    }
}

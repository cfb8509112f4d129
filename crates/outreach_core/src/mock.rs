//! Scripted collaborators for testing and offline runs.
//!
//! [`ScriptedTransport`] plays back a queue of counterparty replies and
//! records every outgoing message; [`MemoryEscalationSink`] keeps the
//! escalations it receives. Both are cheap to clone and share their state,
//! so a test can hand one copy to the executor and inspect the other.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::resolution::{EscalationEvent, EscalationSink};
use crate::stage::StageId;
use crate::transport::{SimulatedTransport, Transport};

/// An outgoing message captured by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSend {
    pub thread_id: String,
    pub stage: StageId,
    pub text: String,
}

/// Transport that replays scripted replies.
///
/// Stage-specific replies take precedence over the shared queue. When both
/// are exhausted the simulated placeholder reply is returned.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<RwLock<VecDeque<String>>>,
    stage_replies: Arc<RwLock<HashMap<StageId, VecDeque<String>>>>,
    sent: Arc<RwLock<Vec<CapturedSend>>>,
    receives: Arc<RwLock<Vec<StageId>>>,
    fail_next_receive: Arc<RwLock<Option<String>>>,
    fail_send: Arc<RwLock<Option<(StageId, usize, String)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that answers with `replies` in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::new();
        for reply in replies {
            transport.push_reply(reply);
        }
        transport
    }

    /// Queue a reply for whichever stage asks next.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.write().push_back(reply.into());
    }

    /// Queue a reply for a specific stage.
    pub fn reply_at(self, stage: StageId, reply: impl Into<String>) -> Self {
        self.stage_replies
            .write()
            .entry(stage)
            .or_default()
            .push_back(reply.into());
        self
    }

    /// Make the next `receive_reply` fail once.
    pub fn fail_next_receive(&self, message: impl Into<String>) {
        *self.fail_next_receive.write() = Some(message.into());
    }

    /// Fail the `nth` send (zero-based) to `stage` once.
    pub fn fail_send(&self, stage: StageId, nth: usize, message: impl Into<String>) {
        *self.fail_send.write() = Some((stage, nth, message.into()));
    }

    pub fn sent(&self) -> Vec<CapturedSend> {
        self.sent.read().clone()
    }

    pub fn sent_for(&self, stage: StageId) -> Vec<CapturedSend> {
        self.sent
            .read()
            .iter()
            .filter(|s| s.stage == stage)
            .cloned()
            .collect()
    }

    /// Stages in the order replies were requested.
    pub fn receives(&self) -> Vec<StageId> {
        self.receives.read().clone()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.read().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, thread_id: &str, stage: StageId, text: &str) -> CoreResult<()> {
        let already_sent = self.sent.read().iter().filter(|s| s.stage == stage).count();
        {
            let mut failure = self.fail_send.write();
            if failure.as_ref().map_or(false, |(s, nth, _)| *s == stage && *nth == already_sent) {
                if let Some((_, _, message)) = failure.take() {
                    return Err(CoreError::Transport(message));
                }
            }
        }
        self.sent.write().push(CapturedSend {
            thread_id: thread_id.to_string(),
            stage,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn receive_reply(&self, _thread_id: &str, stage: StageId) -> CoreResult<String> {
        if let Some(message) = self.fail_next_receive.write().take() {
            return Err(CoreError::Transport(message));
        }
        self.receives.write().push(stage);

        let staged = self
            .stage_replies
            .write()
            .get_mut(&stage)
            .and_then(|queue| queue.pop_front());
        if let Some(reply) = staged {
            return Ok(reply);
        }

        Ok(self
            .replies
            .write()
            .pop_front()
            .unwrap_or_else(|| SimulatedTransport::reply_for(stage)))
    }
}

/// Sink that keeps every escalation in memory.
#[derive(Clone, Default)]
pub struct MemoryEscalationSink {
    events: Arc<RwLock<Vec<EscalationEvent>>>,
    fail_next: Arc<RwLock<Option<String>>>,
}

impl MemoryEscalationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `notify` fail once.
    pub fn fail_next_notify(&self, message: impl Into<String>) {
        *self.fail_next.write() = Some(message.into());
    }

    pub fn events(&self) -> Vec<EscalationEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EscalationSink for MemoryEscalationSink {
    async fn notify(&self, event: EscalationEvent) -> CoreResult<()> {
        if let Some(message) = self.fail_next.write().take() {
            return Err(CoreError::Escalation(message));
        }
        self.events.write().push(event);
        Ok(())
    }
}

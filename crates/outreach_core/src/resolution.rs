//! Question resolution and human escalation.
//!
//! Questions are answered automatically when a [`QuestionResolver`] can do
//! so; otherwise the conversation continues with a holding reply and a human
//! is notified. Declines and negotiations always go to a human through an
//! [`EscalationSink`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::classifier::{DecodedReply, Intent};
use crate::error::CoreResult;
use crate::stage::StageId;
use crate::state::WorkflowState;

/// Attempts to answer an influencer's question.
#[async_trait]
pub trait QuestionResolver: Send + Sync {
    /// Return an answer, or `None` when a human has to step in.
    async fn resolve(
        &self,
        stage: StageId,
        question: &DecodedReply,
        state: &WorkflowState,
    ) -> CoreResult<Option<String>>;
}

/// Answers every question.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoResolver;

impl AutoResolver {
    pub fn answer_for(stage: StageId) -> String {
        format!(
            "Good question! For the {} step, everything we know is in the brief, \
             and we're happy to clarify anything else you need.",
            stage.label().to_lowercase()
        )
    }
}

#[async_trait]
impl QuestionResolver for AutoResolver {
    async fn resolve(
        &self,
        stage: StageId,
        _question: &DecodedReply,
        _state: &WorkflowState,
    ) -> CoreResult<Option<String>> {
        Ok(Some(Self::answer_for(stage)))
    }
}

/// Answers only the questions a predicate accepts.
pub struct PredicateResolver<F> {
    predicate: F,
}

impl<F> PredicateResolver<F>
where
    F: Fn(StageId, &DecodedReply) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> QuestionResolver for PredicateResolver<F>
where
    F: Fn(StageId, &DecodedReply) -> bool + Send + Sync,
{
    async fn resolve(
        &self,
        stage: StageId,
        question: &DecodedReply,
        _state: &WorkflowState,
    ) -> CoreResult<Option<String>> {
        if (self.predicate)(stage, question) {
            Ok(Some(AutoResolver::answer_for(stage)))
        } else {
            Ok(None)
        }
    }
}

/// Holding reply sent while a human looks at an unresolved question.
pub fn holding_reply(stage: StageId) -> String {
    format!(
        "Thanks for the question about the {} step. Let me check with the team and get back to you shortly.",
        stage.label().to_lowercase()
    )
}

/// Continuation message sent after handing a conversation to a human.
pub fn escalation_reply(stage: StageId) -> String {
    format!(
        "Thanks for letting us know. A member of our team will follow up with you personally about the {} step.",
        stage.label().to_lowercase()
    )
}

/// Notification raised for a human operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub id: Uuid,
    pub thread_id: String,
    pub stage: StageId,
    pub intent: Intent,
    pub reason: String,
    pub raised_at: DateTime<Utc>,
}

impl EscalationEvent {
    pub fn new(
        thread_id: impl Into<String>,
        stage: StageId,
        intent: Intent,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            stage,
            intent,
            reason: reason.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Receives escalation notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn notify(&self, event: EscalationEvent) -> CoreResult<()>;
}

/// Writes escalations to the tracing output.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEscalationSink;

#[async_trait]
impl EscalationSink for LogEscalationSink {
    async fn notify(&self, event: EscalationEvent) -> CoreResult<()> {
        warn!(
            thread = %event.thread_id,
            stage = %event.stage,
            intent = %event.intent,
            "Human operator notified: {}",
            event.reason
        );
        Ok(())
    }
}

/// Appends escalations to an append-only JSONL file.
#[derive(Debug, Clone)]
pub struct JsonlEscalationSink {
    path: PathBuf,
}

impl JsonlEscalationSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every escalation recorded so far.
    pub fn load(&self) -> CoreResult<Vec<EscalationEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }
}

#[async_trait]
impl EscalationSink for JsonlEscalationSink {
    async fn notify(&self, event: EscalationEvent) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&event)?)?;
        warn!(thread = %event.thread_id, stage = %event.stage, "Escalation recorded: {}", event.reason);
        Ok(())
    }
}

//! Stage identifiers, stage patches and the handler contract.
//!
//! A stage is one phase of the outreach conversation. Every stage sends
//! exactly one outgoing message, produced by its [`StageHandler`], and the
//! executor then waits for and classifies the counterparty's reply.
//!
//! # Stage Order
//!
//! The order is fixed by [`STAGE_ORDER`]. Index arithmetic over that array is
//! the only source of "next stage" truth; handlers never reorder stages.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use outreach_core::{CoreResult, StageHandler, StageId, StagePatch, WorkflowState};
//!
//! struct QuietGreeting;
//!
//! #[async_trait]
//! impl StageHandler for QuietGreeting {
//!     fn stage(&self) -> StageId { StageId::Greet }
//!     fn description(&self) -> &str { "Says hello" }
//!
//!     async fn produce(&self, _state: &WorkflowState) -> CoreResult<StagePatch> {
//!         Ok(StagePatch::message("Hello!").with_log("[greet] Greeting sent"))
//!     }
//! }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::state::WorkflowState;

/// Outreach stage identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Greet,
    Type,
    Brief,
    Schedule,
    Product,
    Address,
    Reminder,
    ScriptReminder,
    Final,
}

/// The fixed, ordered sequence of stages.
pub const STAGE_ORDER: [StageId; 9] = [
    StageId::Greet,
    StageId::Type,
    StageId::Brief,
    StageId::Schedule,
    StageId::Product,
    StageId::Address,
    StageId::Reminder,
    StageId::ScriptReminder,
    StageId::Final,
];

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Greet => "greet",
            StageId::Type => "type",
            StageId::Brief => "brief",
            StageId::Schedule => "schedule",
            StageId::Product => "product",
            StageId::Address => "address",
            StageId::Reminder => "reminder",
            StageId::ScriptReminder => "script_reminder",
            StageId::Final => "final",
        }
    }

    /// Human-readable summary of what the stage asks for.
    pub fn label(&self) -> &'static str {
        match self {
            StageId::Greet => "Greeting and platform links request",
            StageId::Type => "Collaboration terms confirmation",
            StageId::Brief => "Campaign brief review",
            StageId::Schedule => "Availability and schedule",
            StageId::Product => "Product selection",
            StageId::Address => "Shipping address collection",
            StageId::Reminder => "Package receipt reminder",
            StageId::ScriptReminder => "Content script reminder",
            StageId::Final => "Completion message",
        }
    }

    /// Position of this stage in [`STAGE_ORDER`].
    pub fn index(&self) -> usize {
        match self {
            StageId::Greet => 0,
            StageId::Type => 1,
            StageId::Brief => 2,
            StageId::Schedule => 3,
            StageId::Product => 4,
            StageId::Address => 5,
            StageId::Reminder => 6,
            StageId::ScriptReminder => 7,
            StageId::Final => 8,
        }
    }

    /// Stage at `index`, if the index is in range.
    pub fn at(index: usize) -> Option<StageId> {
        STAGE_ORDER.get(index).copied()
    }

    /// The stage after this one, or `None` for the last stage.
    pub fn next(&self) -> Option<StageId> {
        Self::at(self.index() + 1)
    }

    pub fn first() -> StageId {
        STAGE_ORDER[0]
    }

    pub fn is_last(&self) -> bool {
        self.index() + 1 == STAGE_ORDER.len()
    }

    pub fn count() -> usize {
        STAGE_ORDER.len()
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StageId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STAGE_ORDER
            .iter()
            .find(|stage| stage.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| CoreError::StageNotFound(s.to_string()))
    }
}

/// The fields a stage handler is allowed to touch.
///
/// Confirmation flags are only ever raised, never lowered: a `None` leaves the
/// current value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePatch {
    pub outgoing_message: Option<String>,
    pub stage_completed: bool,
    /// A new outbound message invalidates any stale reply.
    pub clear_pending_reply: bool,
    pub schedule_confirmed: Option<bool>,
    pub product_selected: Option<bool>,
    pub address_collected: Option<bool>,
    /// The handler's claim that this is the terminal stage. Checked against
    /// [`StageId::is_last`]; `advance_stage` is the sole writer of
    /// `WorkflowState::workflow_complete`.
    pub completes_workflow: bool,
    pub log_entry: Option<String>,
}

impl StagePatch {
    /// A completed-stage patch carrying an outgoing message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            outgoing_message: Some(text.into()),
            stage_completed: true,
            clear_pending_reply: true,
            ..Self::default()
        }
    }

    /// Patch for a stage with no handler: completed, nothing to send.
    pub fn skipped(log_entry: impl Into<String>) -> Self {
        Self {
            stage_completed: true,
            log_entry: Some(log_entry.into()),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, entry: impl Into<String>) -> Self {
        self.log_entry = Some(entry.into());
        self
    }

    pub fn schedule_confirmed(mut self) -> Self {
        self.schedule_confirmed = Some(true);
        self
    }

    pub fn product_selected(mut self) -> Self {
        self.product_selected = Some(true);
        self
    }

    pub fn address_collected(mut self) -> Self {
        self.address_collected = Some(true);
        self
    }

    pub fn completes_workflow(mut self) -> Self {
        self.completes_workflow = true;
        self
    }
}

/// Trait for stage content handlers.
///
/// A handler produces the outgoing message for its stage and re-affirms any
/// confirmation its predecessor established. Handlers read the state but
/// never mutate it; the executor applies the returned [`StagePatch`].
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// The stage this handler serves.
    fn stage(&self) -> StageId;

    fn description(&self) -> &str;

    /// Produce the stage's outgoing message and side-state updates.
    ///
    /// The returned patch must carry a non-empty `outgoing_message` and
    /// `stage_completed = true`.
    async fn produce(&self, state: &WorkflowState) -> CoreResult<StagePatch>;
}

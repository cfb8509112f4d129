//! Message polishing ("decorator").
//!
//! Polishers refine the outgoing text before it is sent. They may return the
//! input unchanged but must never turn a non-empty message into an empty
//! one; [`polish_guarded`] enforces that for any implementation.

use async_trait::async_trait;

use crate::stage::StageId;
use crate::state::WorkflowState;

#[async_trait]
pub trait MessagePolisher: Send + Sync {
    async fn polish(&self, stage: StageId, message: &str, state: &WorkflowState) -> String;
}

/// Returns the message unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPolisher;

#[async_trait]
impl MessagePolisher for PassthroughPolisher {
    async fn polish(&self, _stage: StageId, message: &str, _state: &WorkflowState) -> String {
        message.to_string()
    }
}

/// Addresses the influencer by nickname at the top of the message.
///
/// Applying it twice leaves the text unchanged after the first pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SalutationPolisher;

impl SalutationPolisher {
    fn salutation(name: &str) -> String {
        format!("Hi {},", name)
    }
}

#[async_trait]
impl MessagePolisher for SalutationPolisher {
    async fn polish(&self, _stage: StageId, message: &str, state: &WorkflowState) -> String {
        let trimmed = message.trim();
        match state.nickname() {
            Some(name) if !trimmed.is_empty() => {
                let salutation = Self::salutation(name);
                if trimmed.starts_with(&salutation) {
                    trimmed.to_string()
                } else {
                    format!("{}\n{}", salutation, trimmed)
                }
            }
            _ => trimmed.to_string(),
        }
    }
}

/// Run `polisher`, falling back to the raw message if it returns blank text.
pub async fn polish_guarded(
    polisher: &dyn MessagePolisher,
    stage: StageId,
    message: &str,
    state: &WorkflowState,
) -> String {
    let polished = polisher.polish(stage, message, state).await;
    if polished.trim().is_empty() && !message.trim().is_empty() {
        message.to_string()
    } else {
        polished
    }
}

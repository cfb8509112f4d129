//! Built-in stage handlers.
//!
//! Every stage shares one handler shape: ask the content provider for the
//! message, then re-affirm whatever the previous stage established.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::content::ContentProvider;
use crate::error::{CoreError, CoreResult};
use crate::stage::{StageHandler, StageId, StagePatch};
use crate::state::WorkflowState;

/// Standard handler for one outreach stage.
pub struct OutreachStage {
    stage: StageId,
    content: Arc<dyn ContentProvider>,
}

impl OutreachStage {
    pub fn new(stage: StageId, content: Arc<dyn ContentProvider>) -> Self {
        Self { stage, content }
    }

    fn sent_log(&self) -> &'static str {
        match self.stage {
            StageId::Greet => "[greet] Greeting sent, awaiting platform links",
            StageId::Type => "[type] Collaboration terms sent for confirmation",
            StageId::Brief => "[brief] Campaign brief sent, awaiting review",
            StageId::Schedule => "[schedule] Schedule request sent",
            StageId::Product => "[product] Product selection options sent",
            StageId::Address => "[address] Address request sent",
            StageId::Reminder => "[reminder] Receipt reminder sent",
            StageId::ScriptReminder => "[script_reminder] Script reminder sent",
            StageId::Final => "[final] Workflow completed successfully",
        }
    }

    /// Carry forward the confirmation established by the previous stage.
    fn reaffirm(&self, patch: StagePatch) -> StagePatch {
        match self.stage {
            StageId::Product => patch.schedule_confirmed(),
            StageId::Address => patch.product_selected(),
            StageId::Reminder => patch.address_collected(),
            StageId::Final => patch.completes_workflow(),
            StageId::Greet
            | StageId::Type
            | StageId::Brief
            | StageId::Schedule
            | StageId::ScriptReminder => patch,
        }
    }
}

#[async_trait]
impl StageHandler for OutreachStage {
    fn stage(&self) -> StageId {
        self.stage
    }

    fn description(&self) -> &str {
        self.stage.label()
    }

    async fn produce(&self, state: &WorkflowState) -> CoreResult<StagePatch> {
        let message = self.content.produce_message(self.stage, state).await?;
        if message.trim().is_empty() {
            return Err(CoreError::InvalidState(format!(
                "empty message for stage '{}'",
                self.stage
            )));
        }
        debug!(stage = %self.stage, chars = message.chars().count(), "Stage message produced");

        Ok(self.reaffirm(StagePatch::message(message).with_log(self.sent_log())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::TemplateContentProvider;
    use crate::stage::STAGE_ORDER;

    fn handler(stage: StageId) -> OutreachStage {
        OutreachStage::new(stage, Arc::new(TemplateContentProvider::seeded(11)))
    }

    struct EmptyContent;

    #[async_trait]
    impl ContentProvider for EmptyContent {
        async fn produce_message(&self, _stage: StageId, _state: &WorkflowState) -> CoreResult<String> {
            Ok("   ".to_string())
        }
    }

    #[tokio::test]
    async fn test_every_stage_produces_a_message() {
        let state = WorkflowState::new();
        for stage in STAGE_ORDER {
            let patch = handler(stage).produce(&state).await.unwrap();
            assert!(patch.stage_completed);
            assert!(patch.clear_pending_reply);
            assert!(!patch.outgoing_message.unwrap().trim().is_empty());
            assert!(patch.log_entry.unwrap().starts_with(&format!("[{}]", stage)));
        }
    }

    #[tokio::test]
    async fn test_reaffirmations() {
        let state = WorkflowState::new();

        let product = handler(StageId::Product).produce(&state).await.unwrap();
        assert_eq!(product.schedule_confirmed, Some(true));

        let address = handler(StageId::Address).produce(&state).await.unwrap();
        assert_eq!(address.product_selected, Some(true));

        let reminder = handler(StageId::Reminder).produce(&state).await.unwrap();
        assert_eq!(reminder.address_collected, Some(true));

        let brief = handler(StageId::Brief).produce(&state).await.unwrap();
        assert_eq!(brief.schedule_confirmed, None);
        assert!(!brief.completes_workflow);
    }

    #[tokio::test]
    async fn test_only_final_completes_workflow() {
        let state = WorkflowState::new();
        for stage in STAGE_ORDER {
            let patch = handler(stage).produce(&state).await.unwrap();
            assert_eq!(patch.completes_workflow, stage == StageId::Final, "{}", stage);
        }
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let stage = OutreachStage::new(StageId::Greet, Arc::new(EmptyContent));
        let err = stage.produce(&WorkflowState::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }
}

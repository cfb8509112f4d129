//! Workflow state threaded through every step of the conversation.

use serde::{Deserialize, Serialize};

use crate::classifier::{DecodedReply, Intent};
use crate::error::{CoreError, CoreResult};
use crate::routing::RouteDecision;
use crate::stage::{StageId, StagePatch, STAGE_ORDER};

/// Profile of the influencer being negotiated with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluencerInfo {
    pub profile_url: String,
    pub nickname: String,
    pub bio: String,
    pub followers: u64,
    pub content_type: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

impl InfluencerInfo {
    pub fn new(nickname: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            platform: platform.into(),
            ..Self::default()
        }
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = url.into();
        self
    }

    pub fn with_followers(mut self, followers: u64) -> Self {
        self.followers = followers;
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Nickname, if one is known.
    pub fn display_name(&self) -> Option<&str> {
        let name = self.nickname.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// The single mutable record of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influencer_info: Option<InfluencerInfo>,

    pub current_stage: StageId,
    pub current_stage_index: usize,
    pub stage_completed: bool,

    pub pending_reply: Option<String>,
    pub outgoing_message: Option<String>,
    /// Whether `outgoing_message` has already been handed to the transport.
    #[serde(default)]
    pub message_sent: bool,
    /// Whether this stage's escalation already reached the sink.
    #[serde(default)]
    pub escalation_notified: bool,
    /// Whether this stage's answer, holding or escalation reply was sent.
    #[serde(default)]
    pub follow_up_sent: bool,
    pub decoded: Option<DecodedReply>,
    pub intent: Option<Intent>,
    pub route_decision: Option<RouteDecision>,

    pub has_questions: bool,
    pub needs_human_review: bool,
    pub is_confirmed: bool,

    pub schedule_confirmed: bool,
    pub address_collected: bool,
    pub product_selected: bool,

    // Details captured from replies.
    #[serde(default)]
    pub collaboration_type: Option<String>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,

    pub workflow_complete: bool,

    /// Append-only audit trail.
    pub message_log: Vec<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    /// A fresh state positioned at the first stage.
    pub fn new() -> Self {
        let first = StageId::first();
        Self {
            influencer_info: None,
            current_stage: first,
            current_stage_index: first.index(),
            stage_completed: false,
            pending_reply: None,
            outgoing_message: None,
            message_sent: false,
            escalation_notified: false,
            follow_up_sent: false,
            decoded: None,
            intent: None,
            route_decision: None,
            has_questions: false,
            needs_human_review: false,
            is_confirmed: false,
            schedule_confirmed: false,
            address_collected: false,
            product_selected: false,
            collaboration_type: None,
            price_range: None,
            shipping_address: None,
            workflow_complete: false,
            message_log: Vec::new(),
        }
    }

    /// Append an entry to the audit trail.
    pub fn log(&mut self, entry: impl Into<String>) {
        self.message_log.push(entry.into());
    }

    pub fn latest_log(&self) -> Option<&str> {
        self.message_log.last().map(|s| s.as_str())
    }

    pub fn nickname(&self) -> Option<&str> {
        self.influencer_info.as_ref().and_then(|i| i.display_name())
    }

    /// Apply a handler's patch. Confirmation flags are only raised.
    pub fn apply_patch(&mut self, patch: StagePatch) {
        if patch.clear_pending_reply {
            self.pending_reply = None;
        }
        if let Some(message) = patch.outgoing_message {
            self.outgoing_message = Some(message);
            self.message_sent = false;
        }
        if patch.stage_completed {
            self.stage_completed = true;
        }
        if patch.schedule_confirmed == Some(true) {
            self.schedule_confirmed = true;
        }
        if patch.product_selected == Some(true) {
            self.product_selected = true;
        }
        if patch.address_collected == Some(true) {
            self.address_collected = true;
        }
        if let Some(entry) = patch.log_entry {
            self.log(entry);
        }
    }

    /// Move to `stage`, dropping every per-stage field.
    pub(crate) fn enter_stage(&mut self, stage: StageId) {
        self.current_stage = stage;
        self.current_stage_index = stage.index();
        self.stage_completed = false;
        self.outgoing_message = None;
        self.message_sent = false;
        self.escalation_notified = false;
        self.follow_up_sent = false;
        self.clear_reply();
    }

    /// Drop the reply and everything derived from it.
    pub(crate) fn clear_reply(&mut self) {
        self.pending_reply = None;
        self.decoded = None;
        self.intent = None;
        self.route_decision = None;
    }

    /// Verify the stage-position invariants.
    pub fn check_invariants(&self) -> CoreResult<()> {
        if !self.workflow_complete && self.current_stage_index >= STAGE_ORDER.len() {
            return Err(CoreError::InvalidState(format!(
                "stage index {} out of range while workflow is running",
                self.current_stage_index
            )));
        }
        match StageId::at(self.current_stage_index) {
            Some(stage) if stage == self.current_stage => Ok(()),
            _ => Err(CoreError::InvalidState(format!(
                "current stage '{}' does not match stage order at index {}",
                self.current_stage, self.current_stage_index
            ))),
        }
    }
}

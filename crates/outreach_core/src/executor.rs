//! Workflow executor with checkpointing and resume support.
//!
//! The executor drives one conversation ("thread") through the node graph in
//! [`crate::graph`], one step at a time. After every step it checks the state
//! invariants and saves a checkpoint, so a thread interrupted at any point
//! (typically while waiting for a reply) resumes from the step it stopped at.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
use crate::classifier::{Intent, KeywordClassifier, ReplyClassifier};
use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::graph::{Node, Transition};
use crate::polish::{polish_guarded, MessagePolisher, PassthroughPolisher};
use crate::registry::StageRegistry;
use crate::resolution::{
    escalation_reply, holding_reply, AutoResolver, EscalationEvent, EscalationSink,
    LogEscalationSink, QuestionResolver,
};
use crate::routing::{route_decoded, RouteDecision};
use crate::stage::{StageId, StagePatch, STAGE_ORDER};
use crate::state::{InfluencerInfo, WorkflowState};
use crate::transport::{SimulatedTransport, Transport};

/// Steps a conversation needs when every reply is a plain acceptance.
pub const MIN_STEPS_FOR_FULL_RUN: usize = 1 + 6 * STAGE_ORDER.len();

/// Steps a conversation needs when every stage takes a detour.
pub const MAX_STEPS_FOR_FULL_RUN: usize = 1 + 7 * STAGE_ORDER.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Upper bound on executed steps per thread, across resumes.
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_steps: 100 }
    }
}

impl ExecutorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_steps: settings.max_steps,
        }
    }
}

/// Result of driving a thread to the end.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub thread_id: String,
    pub state: WorkflowState,
    /// Total steps executed on this thread.
    pub steps: usize,
    /// Stages processed during this call, in order.
    pub stages_visited: Vec<StageId>,
}

/// Termination guard run after every advancement.
///
/// Both conditions are checked; the index test catches a state that ran past
/// the last stage without the completion flag.
pub fn should_end(state: &WorkflowState) -> bool {
    state.workflow_complete || state.current_stage_index >= STAGE_ORDER.len()
}

/// Builder for [`WorkflowExecutor`].
///
/// Every collaborator has an offline default: simulated transport, keyword
/// classifier, automatic question answering, log-only escalation and an
/// in-memory checkpoint store.
pub struct ExecutorBuilder {
    registry: Arc<StageRegistry>,
    polisher: Arc<dyn MessagePolisher>,
    transport: Arc<dyn Transport>,
    classifier: Option<Arc<dyn ReplyClassifier>>,
    resolver: Arc<dyn QuestionResolver>,
    escalation: Arc<dyn EscalationSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: ExecutorConfig,
}

impl ExecutorBuilder {
    pub fn polisher(mut self, polisher: Arc<dyn MessagePolisher>) -> Self {
        self.polisher = polisher;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ReplyClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn QuestionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn escalation_sink(mut self, sink: Arc<dyn EscalationSink>) -> Self {
        self.escalation = sink;
        self
    }

    pub fn checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    pub fn build(self) -> CoreResult<WorkflowExecutor> {
        if self.config.max_steps == 0 {
            return Err(CoreError::Config("max_steps must be greater than zero".to_string()));
        }
        let missing = self.registry.missing();
        if !missing.is_empty() {
            warn!(
                "No handler registered for stages: {}",
                missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            );
        }

        let classifier = match self.classifier {
            Some(classifier) => classifier,
            None => Arc::new(KeywordClassifier::standard()?),
        };

        Ok(WorkflowExecutor {
            registry: self.registry,
            polisher: self.polisher,
            transport: self.transport,
            classifier,
            resolver: self.resolver,
            escalation: self.escalation,
            checkpoints: self.checkpoints,
            config: self.config,
        })
    }
}

/// Drives outreach conversations through the stage loop.
pub struct WorkflowExecutor {
    registry: Arc<StageRegistry>,
    polisher: Arc<dyn MessagePolisher>,
    transport: Arc<dyn Transport>,
    classifier: Arc<dyn ReplyClassifier>,
    resolver: Arc<dyn QuestionResolver>,
    escalation: Arc<dyn EscalationSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn builder(registry: Arc<StageRegistry>) -> ExecutorBuilder {
        ExecutorBuilder {
            registry,
            polisher: Arc::new(PassthroughPolisher),
            transport: Arc::new(SimulatedTransport),
            classifier: None,
            resolver: Arc::new(AutoResolver),
            escalation: Arc::new(LogEscalationSink),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            config: ExecutorConfig::default(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// Start a new conversation on `thread_id` and drive it to the end.
    ///
    /// Fails if the thread already has checkpoints; use [`Self::resume`] for
    /// those.
    pub async fn run(&self, thread_id: &str, influencer: Option<InfluencerInfo>) -> CoreResult<RunOutcome> {
        if self.checkpoints.load_latest(thread_id)?.is_some() {
            return Err(CoreError::InvalidState(format!(
                "Thread '{}' already exists; resume it or pick another thread id",
                thread_id
            )));
        }

        let mut state = WorkflowState::new();
        state.influencer_info = influencer;
        self.checkpoints
            .save(&Checkpoint::new(thread_id, 0, Some(Node::Initialization), state.clone()))?;

        info!(thread = thread_id, "Starting outreach workflow");
        self.run_from(thread_id, state, Node::Initialization, 0).await
    }

    /// Continue a thread from its latest checkpoint.
    ///
    /// A finished thread is returned as-is without executing any step.
    pub async fn resume(&self, thread_id: &str) -> CoreResult<RunOutcome> {
        let checkpoint = self.checkpoints.load_latest(thread_id)?.ok_or_else(|| {
            CoreError::InvalidState(format!("No checkpoint found for thread '{}'", thread_id))
        })?;

        match checkpoint.next {
            None => {
                info!(thread = thread_id, "Thread already finished, nothing to resume");
                Ok(RunOutcome {
                    thread_id: thread_id.to_string(),
                    state: checkpoint.state,
                    steps: checkpoint.step,
                    stages_visited: Vec::new(),
                })
            }
            Some(node) => {
                checkpoint.state.check_invariants()?;
                info!(
                    thread = thread_id,
                    step = checkpoint.step,
                    "Resuming at {} (stage {})",
                    node,
                    checkpoint.state.current_stage
                );
                self.run_from(thread_id, checkpoint.state, node, checkpoint.step).await
            }
        }
    }

    /// Run from `node` until END, saving a checkpoint after each step.
    async fn run_from(
        &self,
        thread_id: &str,
        mut state: WorkflowState,
        mut node: Node,
        mut steps: usize,
    ) -> CoreResult<RunOutcome> {
        let mut stages_visited = Vec::new();

        loop {
            if steps >= self.config.max_steps {
                error!(thread = thread_id, steps, "Iteration limit reached at {}", node);
                return Err(CoreError::IterationLimitExceeded {
                    limit: self.config.max_steps,
                    steps,
                });
            }

            debug!(thread = thread_id, step = steps + 1, stage = %state.current_stage, "Executing {}", node);
            if node == Node::StageProcessor {
                stages_visited.push(state.current_stage);
            }

            let transition = match self.step(thread_id, node, &mut state).await {
                Ok(transition) => transition,
                Err(e) => {
                    error!(thread = thread_id, stage = %state.current_stage, "Step {} failed: {}", node, e);
                    return Err(e);
                }
            };
            steps += 1;
            state.check_invariants()?;

            let next = match transition {
                Transition::Next(next) => Some(next),
                Transition::End => None,
            };
            self.checkpoints
                .save(&Checkpoint::new(thread_id, steps, next, state.clone()))?;

            match next {
                Some(next) => node = next,
                None => break,
            }
        }

        info!(thread = thread_id, steps, "Outreach workflow completed");
        Ok(RunOutcome {
            thread_id: thread_id.to_string(),
            state,
            steps,
            stages_visited,
        })
    }

    async fn step(&self, thread_id: &str, node: Node, state: &mut WorkflowState) -> CoreResult<Transition> {
        match node {
            Node::Initialization => Ok(self.initialize(state)),
            Node::StageProcessor => self.process_stage(state).await,
            Node::Decorator => self.decorate(state).await,
            Node::AwaitResponse => self.await_response(thread_id, state).await,
            Node::Decoder => Ok(self.decode(state)),
            Node::ResponseCheck => Ok(self.check_response(state)),
            Node::QuestionHandler => self.handle_question(thread_id, state).await,
            Node::HumanEscalation => self.escalate(thread_id, state).await,
            Node::AdvanceStage => Ok(self.advance(state)),
        }
    }

    fn initialize(&self, state: &mut WorkflowState) -> Transition {
        let influencer = state.influencer_info.take();
        *state = WorkflowState::new();
        state.influencer_info = influencer;
        state.log(format!(
            "[init] Workflow initialized - starting at {} stage",
            state.current_stage.as_str().to_uppercase()
        ));
        Transition::Next(Node::StageProcessor)
    }

    async fn process_stage(&self, state: &mut WorkflowState) -> CoreResult<Transition> {
        let stage = state.current_stage;

        let Some(handler) = self.registry.get(stage) else {
            warn!(%stage, "No handler registered, skipping stage");
            state.apply_patch(StagePatch::skipped(format!("Unknown stage: {}", stage)));
            return Ok(Transition::Next(Node::AdvanceStage));
        };

        info!("Processing stage [{}/{}]: {}", stage.index() + 1, STAGE_ORDER.len(), stage);
        let patch = handler.produce(state).await?;

        if patch.outgoing_message.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(CoreError::InvalidState(format!(
                "Handler for stage '{}' produced no message",
                stage
            )));
        }
        if patch.completes_workflow != stage.is_last() {
            warn!(
                %stage,
                claims_completion = patch.completes_workflow,
                "Handler completion claim disagrees with stage order, advance decides"
            );
        }

        state.apply_patch(patch);
        Ok(Transition::Next(Node::Decorator))
    }

    async fn decorate(&self, state: &mut WorkflowState) -> CoreResult<Transition> {
        let stage = state.current_stage;
        let message = state.outgoing_message.clone().ok_or_else(|| {
            CoreError::InvalidState(format!("No outgoing message to polish for stage '{}'", stage))
        })?;

        let polished = polish_guarded(self.polisher.as_ref(), stage, &message, state).await;
        state.outgoing_message = Some(polished);
        state.log(format!("[decorator] Response polished for stage: {}", stage));
        Ok(Transition::Next(Node::AwaitResponse))
    }

    async fn await_response(&self, thread_id: &str, state: &mut WorkflowState) -> CoreResult<Transition> {
        let stage = state.current_stage;

        if !state.message_sent {
            let message = state.outgoing_message.clone().ok_or_else(|| {
                CoreError::InvalidState(format!("No outgoing message to send for stage '{}'", stage))
            })?;
            self.transport.send(thread_id, stage, &message).await?;
            state.message_sent = true;

            // A process restarted while waiting must not send again.
            self.save_progress(thread_id, Node::AwaitResponse, state)?;
        }

        let reply = self.transport.receive_reply(thread_id, stage).await?;
        state.clear_reply();
        state.pending_reply = Some(reply);
        state.log(format!("[await] Response received for stage: {}", stage));
        Ok(Transition::Next(Node::Decoder))
    }

    /// Checkpoint a side effect mid-step, so a resume re-enters `node` without repeating it.
    fn save_progress(&self, thread_id: &str, node: Node, state: &WorkflowState) -> CoreResult<()> {
        let step = self
            .checkpoints
            .load_latest(thread_id)?
            .map(|c| c.step)
            .unwrap_or_default();
        self.checkpoints
            .save(&Checkpoint::new(thread_id, step, Some(node), state.clone()))
    }

    fn decode(&self, state: &mut WorkflowState) -> Transition {
        let stage = state.current_stage;
        // The raw text lives on in `decoded.raw_text`.
        state.decoded = state.pending_reply.take().map(|text| self.classifier.classify(&text));
        if let Some(decoded) = &state.decoded {
            debug!(%stage, intent = %decoded.intent, has_question = decoded.has_question, "Reply decoded");
        }
        state.log(format!("[decoder] Response decoded for stage: {}", stage));
        Transition::Next(Node::ResponseCheck)
    }

    fn check_response(&self, state: &mut WorkflowState) -> Transition {
        let (intent, decision) = route_decoded(state.decoded.as_ref());
        let has_question = state.decoded.as_ref().map_or(false, |d| d.has_question);

        state.intent = Some(intent);
        state.route_decision = Some(decision);
        state.is_confirmed = intent == Intent::Accept && !has_question;
        if decision == RouteDecision::Continue {
            self.capture_details(state);
        }

        state.log(format!("[response_check] Intent: {}, Route: {}", intent, decision));
        Transition::Next(decision.target())
    }

    /// Record structured details from an accepted reply.
    fn capture_details(&self, state: &mut WorkflowState) {
        let Some(decoded) = state.decoded.clone() else {
            return;
        };

        match state.current_stage {
            StageId::Greet => {
                if let (Some(url), Some(info)) = (decoded.entity("url"), state.influencer_info.as_mut()) {
                    info.contact_info = Some(url.to_string());
                }
            }
            StageId::Type => {
                if let Some(kind) = decoded.entity("collaboration_type") {
                    state.collaboration_type = Some(kind.to_string());
                }
                if let Some(price) = decoded.entity("price") {
                    state.price_range = Some(price.to_string());
                }
            }
            StageId::Address if decoded.intent == Intent::Accept => {
                let address = decoded.raw_text.trim();
                if !address.is_empty() {
                    state.shipping_address = Some(address.to_string());
                }
            }
            _ => {}
        }
    }

    async fn handle_question(&self, thread_id: &str, state: &mut WorkflowState) -> CoreResult<Transition> {
        let stage = state.current_stage;
        let decoded = state.decoded.clone().ok_or_else(|| {
            CoreError::InvalidState(format!("Question routed without a decoded reply at stage '{}'", stage))
        })?;
        state.has_questions = true;

        match self.resolver.resolve(stage, &decoded, state).await? {
            Some(answer) => {
                self.transport.send(thread_id, stage, &answer).await?;
                state.outgoing_message = Some(answer);
                state.log(format!("[question_handler] Question resolved for stage: {}", stage));
            }
            None => {
                state.needs_human_review = true;
                if !state.follow_up_sent {
                    let holding = holding_reply(stage);
                    self.transport.send(thread_id, stage, &holding).await?;
                    state.outgoing_message = Some(holding);
                    state.follow_up_sent = true;
                    self.save_progress(thread_id, Node::QuestionHandler, state)?;
                }
                if !state.escalation_notified {
                    self.notify(EscalationEvent::new(
                        thread_id,
                        stage,
                        decoded.intent,
                        format!("Unresolved question: {}", decoded.raw_text.trim()),
                    ))
                    .await?;
                    state.escalation_notified = true;
                }
                state.log(format!("[question_handler] Question flagged for review: {}", stage));
            }
        }
        Ok(Transition::Next(Node::AdvanceStage))
    }

    async fn escalate(&self, thread_id: &str, state: &mut WorkflowState) -> CoreResult<Transition> {
        let stage = state.current_stage;
        let intent = state.intent.unwrap_or(Intent::Unclear);
        state.needs_human_review = true;

        if !state.escalation_notified {
            self.notify(EscalationEvent::new(
                thread_id,
                stage,
                intent,
                format!("Stage: {}, Intent: {}", stage, intent),
            ))
            .await?;
            state.escalation_notified = true;
            self.save_progress(thread_id, Node::HumanEscalation, state)?;
        }

        if !state.follow_up_sent {
            let reply = escalation_reply(stage);
            self.transport.send(thread_id, stage, &reply).await?;
            state.outgoing_message = Some(reply);
            state.follow_up_sent = true;
        }
        state.log(format!("[human_escalation] Escalated to human for stage: {}", stage));
        Ok(Transition::Next(Node::AdvanceStage))
    }

    async fn notify(&self, event: EscalationEvent) -> CoreResult<()> {
        self.escalation
            .notify(event)
            .await
            .map_err(|e| CoreError::Escalation(e.to_string()))
    }

    fn advance(&self, state: &mut WorkflowState) -> Transition {
        let current = state.current_stage;

        if !state.workflow_complete {
            match current.next() {
                Some(next) => {
                    state.enter_stage(next);
                    state.log(format!("[advance] Stage advanced: {} → {}", current, next));
                    info!("Stage advanced: {} -> {}", current, next);
                }
                None => {
                    state.workflow_complete = true;
                    state.log("[advance] All stages completed - workflow finished");
                }
            }
        }

        if should_end(state) {
            Transition::End
        } else {
            Transition::Next(Node::StageProcessor)
        }
    }
}

//! # outreach_core
//!
//! Stage-loop workflow engine for influencer outreach conversations.
//!
//! A conversation walks nine fixed stages, from the first greeting to the
//! closing message. Each stage sends a message, waits for the influencer's
//! reply, classifies it and routes to one of three paths (continue, answer a
//! question, or hand off to a human) before advancing.
//!
//! # Architecture
//!
//! - **Stages**: closed [`StageId`] enum in [`STAGE_ORDER`], handlers in a [`StageRegistry`]
//! - **Collaborators**: content, polishing, transport, classification, question resolution and escalation, each behind a trait
//! - **Executor**: runs the node graph with an iteration ceiling and a checkpoint after every step
//! - **Checkpoints**: in-memory or file-backed, used for exact resume
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use outreach_core::{
//!     InfluencerInfo, StageRegistry, TemplateContentProvider, WorkflowExecutor,
//! };
//!
//! let registry = StageRegistry::standard(Arc::new(TemplateContentProvider::new()));
//! let executor = WorkflowExecutor::builder(Arc::new(registry)).build()?;
//!
//! let influencer = InfluencerInfo::new("Mia", "xiaohongshu");
//! let outcome = executor.run("influencer_outreach_001", Some(influencer)).await?;
//! assert!(outcome.state.workflow_complete);
//! ```

pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod content;
pub mod error;
pub mod executor;
pub mod graph;
pub mod mock;
pub mod polish;
pub mod registry;
pub mod resolution;
pub mod routing;
pub mod stage;
pub mod stages;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use classifier::{DecodedReply, Intent, KeywordClassifier, MarkerSet, ReplyClassifier, Sentiment};
pub use config::{Settings, DEFAULT_THREAD_ID};
pub use content::{ContentProvider, TemplateContentProvider};
pub use error::{CoreError, CoreResult};
pub use executor::{
    should_end, ExecutorBuilder, ExecutorConfig, RunOutcome, WorkflowExecutor,
    MAX_STEPS_FOR_FULL_RUN, MIN_STEPS_FOR_FULL_RUN,
};
pub use graph::{Node, Transition};
pub use mock::{CapturedSend, MemoryEscalationSink, ScriptedTransport};
pub use polish::{MessagePolisher, PassthroughPolisher, SalutationPolisher};
pub use registry::StageRegistry;
pub use resolution::{
    AutoResolver, EscalationEvent, EscalationSink, JsonlEscalationSink, LogEscalationSink,
    PredicateResolver, QuestionResolver,
};
pub use routing::{route, RouteDecision};
pub use stage::{StageHandler, StageId, StagePatch, STAGE_ORDER};
pub use stages::OutreachStage;
pub use state::{InfluencerInfo, WorkflowState};
pub use transport::{RetryingTransport, SimulatedTransport, Transport};

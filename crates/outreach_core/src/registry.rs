//! Stage registry mapping each stage to its handler.

use std::sync::Arc;

use tracing::debug;

use crate::content::ContentProvider;
use crate::error::{CoreError, CoreResult};
use crate::stage::{StageHandler, StageId, STAGE_ORDER};
use crate::stages::OutreachStage;

/// A registry of stage handlers.
///
/// Slots are indexed by [`StageId::index`], so lookups are total over the
/// closed set of stages. A missing slot is not an error at this level; the
/// executor decides how to treat it.
#[derive(Default)]
pub struct StageRegistry {
    handlers: [Option<Arc<dyn StageHandler>>; 9],
}

impl StageRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled handler for every stage.
    pub fn standard(content: Arc<dyn ContentProvider>) -> Self {
        let mut registry = Self::new();
        for stage in STAGE_ORDER {
            registry.register(Arc::new(OutreachStage::new(stage, Arc::clone(&content))));
        }
        registry
    }

    /// Register a handler under the stage it reports.
    ///
    /// An existing handler for the same stage is replaced.
    pub fn register(&mut self, handler: Arc<dyn StageHandler>) {
        let stage = handler.stage();
        debug!("Registering handler for stage: {}", stage);
        self.handlers[stage.index()] = Some(handler);
    }

    pub fn get(&self, stage: StageId) -> Option<Arc<dyn StageHandler>> {
        self.handlers[stage.index()].clone()
    }

    /// Get a handler, returning an error if none is registered.
    pub fn get_required(&self, stage: StageId) -> CoreResult<Arc<dyn StageHandler>> {
        self.get(stage)
            .ok_or_else(|| CoreError::StageNotFound(stage.to_string()))
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.handlers[stage.index()].is_some()
    }

    /// Remove a stage's handler.
    pub fn unregister(&mut self, stage: StageId) -> Option<Arc<dyn StageHandler>> {
        debug!("Unregistering handler for stage: {}", stage);
        self.handlers[stage.index()].take()
    }

    /// Stages with no handler, in stage order.
    pub fn missing(&self) -> Vec<StageId> {
        STAGE_ORDER
            .iter()
            .copied()
            .filter(|s| !self.contains(*s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.iter().filter(|h| h.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<&str> = STAGE_ORDER
            .iter()
            .filter(|s| self.contains(**s))
            .map(|s| s.as_str())
            .collect();
        f.debug_struct("StageRegistry")
            .field("stages", &registered)
            .finish()
    }
}

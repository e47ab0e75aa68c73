use std::sync::Arc;

use log::{debug, info};

use crate::adjudication;
use crate::config::*;
use crate::detector::{self, PreCheck};
use crate::queue;
use crate::registry;
use crate::store::WriteInStore;
use crate::viewer::{self, FocusTransform, ZoomLevel};

/// Queries and commands of write-in adjudication over a shared store.
///
/// Queries take the store lock in shared mode and never write. Each
/// command runs under the exclusive lock from validation to the last
/// write. The engine is cheap to clone; clones share the store.
#[derive(Clone)]
pub struct AdjudicationEngine {
    store: Arc<WriteInStore>,
    config: EngineConfig,
}

impl AdjudicationEngine {
    pub fn new(store: Arc<WriteInStore>, config: EngineConfig) -> AdjudicationEngine {
        AdjudicationEngine { store, config }
    }

    pub fn store(&self) -> &WriteInStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ********* Queries ***********

    pub fn queue_metadata(&self, contest_id: Option<&str>) -> AdjudicationResult<Vec<QueueMetadata>> {
        queue::queue_metadata(&self.store.read(), contest_id)
    }

    pub fn queue(&self, contest_id: &str) -> AdjudicationResult<Vec<WriteInId>> {
        queue::queue(&self.store.read(), contest_id)
    }

    pub fn first_pending_id(&self, contest_id: &str) -> AdjudicationResult<Option<WriteInId>> {
        queue::first_pending_id(&self.store.read(), contest_id)
    }

    pub fn write_in_records(&self, filter: &WriteInFilter) -> Vec<WriteIn> {
        queue::write_in_records(&self.store.read(), filter)
    }

    pub fn adjudication_context(&self, write_in_id: &str) -> AdjudicationResult<AdjudicationContext> {
        queue::adjudication_context(&self.store.read(), write_in_id)
    }

    pub fn image_view(&self, write_in_id: &str) -> AdjudicationResult<ImageView> {
        let state = self.store.read();
        state.write_in(write_in_id)?;
        state
            .images
            .get(write_in_id)
            .cloned()
            .ok_or_else(|| AdjudicationError::ImageNotFound(write_in_id.to_string()))
    }

    /// Placement of the ballot image of a write-in. Uses the configured
    /// viewport unless one is given.
    pub fn focus_transform(
        &self,
        write_in_id: &str,
        zoom_level: ZoomLevel,
        viewport: Option<Viewport>,
    ) -> AdjudicationResult<FocusTransform> {
        let view = self.image_view(write_in_id)?;
        let viewport = viewport.unwrap_or(self.config.viewport);
        Ok(viewer::focus_transform(
            &view,
            zoom_level,
            &viewport,
            self.config.image_scale,
        ))
    }

    pub fn list_candidates(&self, contest_id: &str) -> AdjudicationResult<CandidateListing> {
        registry::list_candidates(&self.store.read(), contest_id)
    }

    /// Checks a selection against the rest of the ballot before it is
    /// committed. Never blocks: the result is for the reviewer to confirm.
    pub fn precheck(&self, write_in_id: &str, target: &CandidateTarget) -> AdjudicationResult<PreCheck> {
        let context = self.adjudication_context(write_in_id)?;
        let res = detector::precheck(target, &context);
        debug!("precheck: {} -> {}: {:?}", write_in_id, target, res);
        Ok(res)
    }

    // ********* Commands ***********

    pub fn adjudicate(&self, request: &AdjudicationRequest) -> AdjudicationResult<AdjudicationOutcome> {
        let mut state = self.store.write();
        adjudication::adjudicate(&mut state, &self.config, request)
    }

    pub fn add_candidate(&self, contest_id: &str, name: &str) -> AdjudicationResult<WriteInCandidate> {
        let mut state = self.store.write();
        let res = registry::add_candidate(&mut state, contest_id, name);
        if let Err(e) = &res {
            info!("add_candidate: rejected {:?} for {}: {}", name, contest_id, e);
        }
        res
    }
}

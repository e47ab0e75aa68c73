//! A reviewer walking through the write-ins of one contest.
//!
//! The session goes through a [QueryCache] for every query and keeps it
//! honest itself: after each command it drops what depends on the
//! contest and the ballot that changed.

use log::{debug, info, warn};

use crate::cache::{CacheKey, CacheScope, Operation, QueryCache};
use crate::config::*;
use crate::detector::{self, DoubleVote, PreCheck};
use crate::engine::AdjudicationEngine;
use crate::navigation::NavigationState;
use crate::viewer::{self, FocusTransform};

/// What happened to a selection.
#[derive(PartialEq, Debug, Clone)]
pub enum SelectionResult {
    /// The write-in already had this adjudication. Nothing was sent and
    /// the session did not move.
    Unchanged,
    /// Double vote. Call [ReviewSession::confirm] to commit anyway or
    /// [ReviewSession::cancel] to drop the selection.
    NeedsConfirmation(DoubleVote),
    Committed {
        write_in: WriteIn,
        /// The pending write-in the session moved to, if any is left.
        advanced_to: Option<WriteInId>,
    },
}

pub struct ReviewSession {
    engine: AdjudicationEngine,
    cache: QueryCache,
    contest_id: ContestId,
    queue: Vec<WriteInId>,
    navigation: NavigationState,
    awaiting_confirmation: Option<(WriteInId, Adjudication)>,
}

impl ReviewSession {
    /// Opens the queue of a contest on its first pending write-in, or on
    /// the first write-in if everything is adjudicated.
    pub fn open(engine: AdjudicationEngine, contest_id: &str) -> AdjudicationResult<ReviewSession> {
        let mut session = ReviewSession {
            engine,
            cache: QueryCache::new(),
            contest_id: contest_id.to_string(),
            queue: vec![],
            navigation: NavigationState::new(),
            awaiting_confirmation: None,
        };
        session.queue = session.load_queue()?;
        if let Some(first) = session.first_pending_id()? {
            if let Some(nav) = session.navigation.jump_to(&session.queue, &first) {
                session.navigation = nav;
            }
        }
        info!(
            "open: contest {}: {} write-ins, starting at offset {}",
            contest_id,
            session.queue.len(),
            session.navigation.offset
        );
        session.prefetch();
        Ok(session)
    }

    pub fn contest_id(&self) -> &str {
        &self.contest_id
    }

    pub fn queue(&self) -> &[WriteInId] {
        &self.queue
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn current_id(&self) -> Option<&WriteInId> {
        self.navigation.current_id(&self.queue)
    }

    pub fn awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation.is_some()
    }

    // ********* Cached queries ***********

    fn contest_scope(&self) -> Vec<CacheScope> {
        vec![CacheScope::Contest(self.contest_id.clone())]
    }

    fn load_queue(&mut self) -> AdjudicationResult<Vec<WriteInId>> {
        let key = CacheKey::new(Operation::Queue, &[Some(self.contest_id.as_str())]);
        let scopes = self.contest_scope();
        let engine = &self.engine;
        let contest_id = &self.contest_id;
        self.cache
            .get_or_load(key, scopes, || engine.queue(contest_id))
    }

    fn first_pending_id(&mut self) -> AdjudicationResult<Option<WriteInId>> {
        let key = CacheKey::new(Operation::FirstPendingId, &[Some(self.contest_id.as_str())]);
        let scopes = self.contest_scope();
        let engine = &self.engine;
        let contest_id = &self.contest_id;
        self.cache
            .get_or_load(key, scopes, || engine.first_pending_id(contest_id))
    }

    pub fn metadata(&mut self) -> AdjudicationResult<Option<QueueMetadata>> {
        let key = CacheKey::new(Operation::QueueMetadata, &[Some(self.contest_id.as_str())]);
        let scopes = self.contest_scope();
        let engine = &self.engine;
        let contest_id = &self.contest_id;
        let res: Vec<QueueMetadata> = self
            .cache
            .get_or_load(key, scopes, || engine.queue_metadata(Some(contest_id.as_str())))?;
        Ok(res.into_iter().next())
    }

    /// Tallies of every contest of the election. Any commit drops them.
    pub fn election_metadata(&mut self) -> AdjudicationResult<Vec<QueueMetadata>> {
        let key = CacheKey::new(Operation::QueueMetadata, &[None]);
        let engine = &self.engine;
        self.cache
            .get_or_load(key, vec![CacheScope::Election], || engine.queue_metadata(None))
    }

    pub fn candidates(&mut self) -> AdjudicationResult<CandidateListing> {
        let key = CacheKey::new(Operation::ListCandidates, &[Some(self.contest_id.as_str())]);
        let scopes = self.contest_scope();
        let engine = &self.engine;
        let contest_id = &self.contest_id;
        self.cache
            .get_or_load(key, scopes, || engine.list_candidates(contest_id))
    }

    fn records(&mut self) -> AdjudicationResult<Vec<WriteIn>> {
        let key = CacheKey::new(Operation::WriteInRecords, &[Some(self.contest_id.as_str()), None, None]);
        let scopes = self.contest_scope();
        let engine = &self.engine;
        let filter = WriteInFilter {
            contest_id: Some(self.contest_id.clone()),
            ..Default::default()
        };
        self.cache
            .get_or_load(key, scopes, || Ok(engine.write_in_records(&filter)))
    }

    /// The context of a write-in depends on its contest and on its ballot.
    /// The ballot is only known once loaded.
    pub fn context(&mut self, write_in_id: &str) -> AdjudicationResult<AdjudicationContext> {
        let key = CacheKey::new(Operation::AdjudicationContext, &[Some(write_in_id)]);
        if let Some(ctx) = self.cache.get(&key) {
            return Ok(ctx);
        }
        let ctx = self.engine.adjudication_context(write_in_id)?;
        let scopes = vec![
            CacheScope::Contest(ctx.write_in.contest_id.clone()),
            CacheScope::Cvr(ctx.cvr_id.clone()),
        ];
        self.cache.insert(key, scopes, ctx.clone());
        Ok(ctx)
    }

    fn image_view(&mut self, write_in_id: &str) -> AdjudicationResult<ImageView> {
        let key = CacheKey::new(Operation::ImageView, &[Some(write_in_id)]);
        let engine = &self.engine;
        self.cache
            .get_or_load(key, vec![CacheScope::Fixed], || engine.image_view(write_in_id))
    }

    // ********* Navigation ***********

    /// Loads the image views of the navigation window that are not loaded
    /// yet. A failure is logged and does not stop the others.
    fn prefetch(&mut self) {
        for id in self.navigation.missing_prefetches(&self.queue) {
            match self.image_view(&id) {
                Ok(_) => {
                    self.navigation = self.navigation.record_prefetched(&self.queue, &id);
                }
                Err(e) => warn!("prefetch: no image view for {}: {}", id, e),
            }
        }
        debug!("prefetch: loaded {:?}", self.navigation.prefetched_ids);
    }

    fn move_to(&mut self, navigation: NavigationState) -> bool {
        if navigation.offset == self.navigation.offset {
            return false;
        }
        self.navigation = navigation;
        self.awaiting_confirmation = None;
        self.prefetch();
        true
    }

    pub fn next(&mut self) -> bool {
        let nav = self.navigation.next(&self.queue);
        self.move_to(nav)
    }

    pub fn previous(&mut self) -> bool {
        let nav = self.navigation.previous(&self.queue);
        self.move_to(nav)
    }

    pub fn jump_to(&mut self, write_in_id: &str) -> bool {
        match self.navigation.jump_to(&self.queue, write_in_id) {
            Some(nav) => self.move_to(nav),
            None => false,
        }
    }

    pub fn zoom_in(&mut self) -> bool {
        if !self.navigation.zoom_level.can_zoom_in() {
            return false;
        }
        self.navigation = self.navigation.with_zoom(self.navigation.zoom_level.zoom_in());
        true
    }

    pub fn zoom_out(&mut self) -> bool {
        if !self.navigation.zoom_level.can_zoom_out() {
            return false;
        }
        self.navigation = self.navigation.with_zoom(self.navigation.zoom_level.zoom_out());
        true
    }

    /// Placement of the current ballot image at the current zoom level.
    pub fn current_view(&mut self) -> AdjudicationResult<Option<FocusTransform>> {
        let id = match self.current_id() {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        let view = self.image_view(&id)?;
        let config = self.engine.config();
        Ok(Some(viewer::focus_transform(
            &view,
            self.navigation.zoom_level,
            &config.viewport,
            config.image_scale,
        )))
    }

    // ********* Selection ***********

    fn current_or_err(&self) -> AdjudicationResult<WriteInId> {
        self.current_id()
            .cloned()
            .ok_or_else(|| AdjudicationError::EmptyQueue(self.contest_id.clone()))
    }

    /// Selects a candidate for the current write-in. Commits right away
    /// unless the selection would count the ballot twice for the candidate.
    pub fn select(&mut self, target: CandidateTarget) -> AdjudicationResult<SelectionResult> {
        let write_in_id = self.current_or_err()?;
        let ctx = self.context(&write_in_id)?;
        match detector::precheck(&target, &ctx) {
            PreCheck::Unchanged => Ok(SelectionResult::Unchanged),
            PreCheck::Clear => self.commit(&ctx, target.into()),
            PreCheck::Advisory(double_vote) => {
                info!(
                    "select: {} -> {}: {}",
                    write_in_id,
                    target,
                    double_vote.kind.as_str()
                );
                self.awaiting_confirmation = Some((write_in_id, target.into()));
                Ok(SelectionResult::NeedsConfirmation(double_vote))
            }
        }
    }

    pub fn select_invalid(&mut self) -> AdjudicationResult<SelectionResult> {
        let write_in_id = self.current_or_err()?;
        let ctx = self.context(&write_in_id)?;
        if ctx.write_in.adjudication() == Some(&Adjudication::Invalid) {
            return Ok(SelectionResult::Unchanged);
        }
        self.commit(&ctx, Adjudication::Invalid)
    }

    /// Registers a new write-in candidate and selects it.
    pub fn add_candidate_and_select(&mut self, name: &str) -> AdjudicationResult<SelectionResult> {
        let candidate = self.engine.add_candidate(&self.contest_id, name)?;
        self.cache.invalidate_contest(&self.contest_id);
        self.select(CandidateTarget::WriteInCandidate(candidate.id))
    }

    /// Commits the selection that raised a double vote advisory.
    pub fn confirm(&mut self) -> AdjudicationResult<Option<SelectionResult>> {
        let (write_in_id, adjudication) = match self.awaiting_confirmation.take() {
            Some(x) => x,
            None => return Ok(None),
        };
        let ctx = self.context(&write_in_id)?;
        self.commit(&ctx, adjudication).map(Some)
    }

    pub fn cancel(&mut self) {
        self.awaiting_confirmation = None;
    }

    fn commit(
        &mut self,
        ctx: &AdjudicationContext,
        adjudication: Adjudication,
    ) -> AdjudicationResult<SelectionResult> {
        let request = AdjudicationRequest {
            write_in_id: ctx.write_in.id.clone(),
            adjudication_type: adjudication.adjudication_type(),
            candidate_id: adjudication.candidate_id().map(|s| s.to_string()),
            expected_version: Some(ctx.write_in.version),
        };
        let res = self.engine.adjudicate(&request);
        // Even a failed command may mean the cached ballot was stale.
        self.cache.invalidate_contest(&ctx.write_in.contest_id);
        self.cache.invalidate_cvr(&ctx.cvr_id);
        self.awaiting_confirmation = None;
        let outcome = res?;
        if !outcome.is_applied() {
            return Ok(SelectionResult::Unchanged);
        }
        let advanced_to = self.advance_to_next_pending()?;
        Ok(SelectionResult::Committed {
            write_in: outcome.write_in().clone(),
            advanced_to,
        })
    }

    /// Moves to the next pending write-in after the current one, wrapping
    /// around to the start of the queue. Stays in place if none is left.
    fn advance_to_next_pending(&mut self) -> AdjudicationResult<Option<WriteInId>> {
        self.queue = self.load_queue()?;
        let records = self.records()?;
        let pending: Vec<&WriteInId> = self
            .queue
            .iter()
            .filter(|id| records.iter().any(|w| w.id == **id && w.is_pending()))
            .collect();
        let offset = self.navigation.offset;
        let target = pending
            .iter()
            .find(|id| self.queue.iter().position(|q| q == **id).map_or(false, |p| p > offset))
            .or_else(|| pending.first())
            .map(|id| (*id).clone());
        if let Some(id) = &target {
            if let Some(nav) = self.navigation.jump_to(&self.queue, id) {
                self.move_to(nav);
            }
        }
        debug!("advance_to_next_pending: {:?}", target);
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DoubleVoteKind;
    use crate::store::tests::animal_store;
    use crate::viewer::ZoomLevel;
    use std::sync::Arc;

    fn engine_with_images() -> AdjudicationEngine {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = animal_store();
        for (id, cvr_id) in [("win0", "cvr-a"), ("win1", "cvr-a"), ("win2", "cvr-b")] {
            store
                .set_image_view(ImageView {
                    write_in_id: id.to_string(),
                    cvr_id: cvr_id.to_string(),
                    image: format!("{}-front.jpg", cvr_id),
                    ballot_bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
                    contest_bounds: Rect::new(0.0, 0.0, 100.0, 50.0),
                    write_in_bounds: Rect::new(40.0, 20.0, 60.0, 20.0),
                })
                .unwrap();
        }
        AdjudicationEngine::new(Arc::new(store), EngineConfig::DEFAULT)
    }

    fn adjudicate(engine: &AdjudicationEngine, id: &str, t: AdjudicationType, c: Option<&str>) {
        engine
            .adjudicate(&AdjudicationRequest::new(id, t, c))
            .unwrap();
    }

    fn official(id: &str) -> CandidateTarget {
        CandidateTarget::OfficialCandidate(id.to_string())
    }

    #[test]
    fn opens_on_first_pending_and_prefetches_neighbors() {
        let engine = engine_with_images();
        adjudicate(&engine, "win0", AdjudicationType::OfficialCandidate, Some("otter"));
        adjudicate(&engine, "win2", AdjudicationType::Invalid, None);
        let session = ReviewSession::open(engine, "best-animal-mammal").unwrap();
        assert_eq!(session.queue(), &["win0", "win1", "win2"]);
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win1"));
        assert_eq!(session.navigation().prefetched_ids, vec!["win1", "win2", "win0"]);
        assert_eq!(session.navigation().zoom_level, ZoomLevel::ZoomedIn);
    }

    #[test]
    fn missing_neighbor_images_do_not_block() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine, "zoo-council-mammal").unwrap();
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("zoo0"));
        assert!(session.navigation().prefetched_ids.is_empty());
        assert!(session.current_view().is_err());
        assert!(!session.next());
        assert!(!session.previous());
    }

    #[test]
    fn missing_neighbor_image_keeps_current_view() {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = animal_store();
        store
            .set_image_view(ImageView {
                write_in_id: "win0".to_string(),
                cvr_id: "cvr-a".to_string(),
                image: "cvr-a-front.jpg".to_string(),
                ballot_bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
                contest_bounds: Rect::new(0.0, 0.0, 100.0, 50.0),
                write_in_bounds: Rect::new(40.0, 20.0, 60.0, 20.0),
            })
            .unwrap();
        let engine = AdjudicationEngine::new(Arc::new(store), EngineConfig::DEFAULT);
        let mut session = ReviewSession::open(engine, "best-animal-mammal").unwrap();
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win0"));
        assert_eq!(session.navigation().prefetched_ids, vec!["win0"]);
        assert!(session.current_view().unwrap().is_some());
        // The neighbor without an image still gets selected and committed.
        assert!(session.next());
        assert!(session.current_view().is_err());
        assert!(matches!(
            session.select_invalid().unwrap(),
            SelectionResult::Committed { .. }
        ));
    }

    #[test]
    fn empty_contest_has_nothing_to_select() {
        let engine = engine_with_images();
        engine.store().add_contest(Contest {
            id: "best-animal-bird".to_string(),
            title: "Best Bird".to_string(),
            candidates: vec![],
        });
        let mut session = ReviewSession::open(engine, "best-animal-bird").unwrap();
        assert_eq!(session.current_id(), None);
        assert_eq!(session.current_view().unwrap(), None);
        let err = session.select_invalid().unwrap_err();
        assert_eq!(err, AdjudicationError::EmptyQueue("best-animal-bird".to_string()));
        assert_eq!(err.to_string(), "contest best-animal-bird has no write-ins to review");
    }

    #[test]
    fn election_metadata_is_refreshed_after_commit() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine, "best-animal-mammal").unwrap();
        let pending = |m: &[QueueMetadata]| m.iter().map(|x| x.pending_tally).sum::<u64>();
        assert_eq!(pending(&session.election_metadata().unwrap()), 4);
        assert_eq!(pending(&session.election_metadata().unwrap()), 4);
        let (hits, _) = session.cache().stats();
        assert!(hits >= 1);
        session.select_invalid().unwrap();
        assert_eq!(pending(&session.election_metadata().unwrap()), 3);
    }

    #[test]
    fn commit_advances_to_next_pending() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine.clone(), "best-animal-mammal").unwrap();
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win0"));
        assert_eq!(session.metadata().unwrap().unwrap().pending_tally, 3);

        let res = session.select(official("otter")).unwrap();
        match res {
            SelectionResult::Committed {
                write_in,
                advanced_to,
            } => {
                assert_eq!(write_in.id, "win0");
                assert_eq!(advanced_to.as_deref(), Some("win1"));
            }
            x => panic!("unexpected {:?}", x),
        }
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win1"));
        // The cached tally was refreshed.
        assert_eq!(session.metadata().unwrap().unwrap().pending_tally, 2);

        // Pending items before the current one are found by wrapping around.
        assert!(session.jump_to("win2"));
        session.select_invalid().unwrap();
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win1"));
    }

    #[test]
    fn repeated_selection_is_a_no_op() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine.clone(), "best-animal-mammal").unwrap();
        assert!(session.jump_to("win2"));
        session.select(official("horse")).unwrap();
        // Nothing left after win2 but win0 and win1.
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win0"));
        assert!(session.jump_to("win2"));
        assert_eq!(session.select(official("horse")).unwrap(), SelectionResult::Unchanged);
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win2"));
        assert_eq!(engine.store().snapshot().write_ins[2].version, 1);
    }

    #[test]
    fn double_vote_needs_confirmation() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine.clone(), "best-animal-mammal").unwrap();
        match session.select(official("fox")).unwrap() {
            SelectionResult::NeedsConfirmation(dv) => {
                assert_eq!(dv.kind, DoubleVoteKind::BubbleMarkedElsewhere)
            }
            x => panic!("unexpected {:?}", x),
        }
        assert!(session.awaiting_confirmation());
        assert!(engine.store().snapshot().write_ins[0].is_pending());
        let res = session.confirm().unwrap().unwrap();
        assert!(matches!(res, SelectionResult::Committed { .. }));
        assert!(!engine.store().snapshot().write_ins[0].is_pending());
        assert_eq!(session.confirm().unwrap(), None);
    }

    #[test]
    fn new_candidate_then_double_vote_on_same_ballot() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine, "best-animal-mammal").unwrap();
        let res = session.add_candidate_and_select("Lemur").unwrap();
        assert!(matches!(res, SelectionResult::Committed { .. }));
        let listing = session.candidates().unwrap();
        assert_eq!(listing.write_in.len(), 1);
        let lemur = CandidateTarget::WriteInCandidate(listing.write_in[0].id.clone());
        assert_eq!(session.current_id().map(|s| s.as_str()), Some("win1"));
        match session.select(lemur).unwrap() {
            SelectionResult::NeedsConfirmation(dv) => {
                assert_eq!(dv.kind, DoubleVoteKind::AlreadyAdjudicatedWriteIn)
            }
            x => panic!("unexpected {:?}", x),
        }
        session.cancel();
        assert!(!session.awaiting_confirmation());
        assert!(session.add_candidate_and_select("lemur").is_err());
    }

    #[test]
    fn stale_cache_turns_into_a_conflict() {
        let engine = engine_with_images();
        let mut a = ReviewSession::open(engine.clone(), "best-animal-mammal").unwrap();
        let mut b = ReviewSession::open(engine, "best-animal-mammal").unwrap();
        a.context("win0").unwrap();
        b.select(official("otter")).unwrap();
        let err = a.select(official("horse")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        // The stale entries are gone; a second try goes through.
        assert!(matches!(
            a.select(official("horse")).unwrap(),
            SelectionResult::Committed { .. }
        ));
    }

    #[test]
    fn zoom_controls() {
        let engine = engine_with_images();
        let mut session = ReviewSession::open(engine, "best-animal-mammal").unwrap();
        assert!(!session.zoom_in());
        let zoomed_in = session.current_view().unwrap().unwrap();
        assert!(session.zoom_out());
        assert!(!session.zoom_out());
        let zoomed_out = session.current_view().unwrap().unwrap();
        assert_eq!(zoomed_out.scale, 0.5);
        assert!(zoomed_in.scale > zoomed_out.scale);
        // A new write-in starts zoomed in again.
        assert!(session.next());
        assert_eq!(session.navigation().zoom_level, ZoomLevel::ZoomedIn);
    }
}

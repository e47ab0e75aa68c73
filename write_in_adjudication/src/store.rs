//! The write-in store: contests, cast vote records, write-ins, write-in
//! candidates and ballot image layouts for one election.
//!
//! The store is shared between readers and the two mutating commands
//! (`adjudicate` and `add_candidate`). It is guarded by a single
//! reader-writer lock: every command runs under one write guard, so a
//! concurrent reader sees either the state before the command or after it.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::*;
use crate::registry;

/// Serializable image of a store. This is what gets persisted.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(rename = "electionId")]
    pub election_id: ElectionId,
    #[serde(default)]
    pub contests: Vec<Contest>,
    #[serde(rename = "castVoteRecords", default)]
    pub cast_vote_records: Vec<CastVoteRecord>,
    #[serde(rename = "writeIns", default)]
    pub write_ins: Vec<WriteIn>,
    #[serde(rename = "writeInCandidates", default)]
    pub write_in_candidates: Vec<WriteInCandidate>,
    #[serde(default)]
    pub images: Vec<ImageView>,
}

pub(crate) struct StoreState {
    pub(crate) election_id: ElectionId,
    // Contests keep the order in which they were registered.
    pub(crate) contests: Vec<Contest>,
    pub(crate) cvrs: HashMap<CvrId, CastVoteRecord>,
    // Append-only, in ingestion order.
    pub(crate) write_ins: Vec<WriteIn>,
    write_in_index: HashMap<WriteInId, usize>,
    pub(crate) write_in_candidates: Vec<WriteInCandidate>,
    pub(crate) images: HashMap<WriteInId, ImageView>,
    next_sequence: u64,
}

impl StoreState {
    fn new(election_id: &str) -> StoreState {
        StoreState {
            election_id: election_id.to_string(),
            contests: Vec::new(),
            cvrs: HashMap::new(),
            write_ins: Vec::new(),
            write_in_index: HashMap::new(),
            write_in_candidates: Vec::new(),
            images: HashMap::new(),
            next_sequence: 0,
        }
    }

    pub(crate) fn contest(&self, contest_id: &str) -> AdjudicationResult<&Contest> {
        self.contests
            .iter()
            .find(|c| c.id == contest_id)
            .ok_or_else(|| AdjudicationError::ContestNotFound(contest_id.to_string()))
    }

    pub(crate) fn cvr(&self, cvr_id: &str) -> AdjudicationResult<&CastVoteRecord> {
        self.cvrs
            .get(cvr_id)
            .ok_or_else(|| AdjudicationError::CvrNotFound(cvr_id.to_string()))
    }

    pub(crate) fn write_in(&self, write_in_id: &str) -> AdjudicationResult<&WriteIn> {
        self.write_in_index
            .get(write_in_id)
            .map(|&idx| &self.write_ins[idx])
            .ok_or_else(|| AdjudicationError::WriteInNotFound(write_in_id.to_string()))
    }

    pub(crate) fn write_in_mut(&mut self, write_in_id: &str) -> AdjudicationResult<&mut WriteIn> {
        match self.write_in_index.get(write_in_id) {
            Some(&idx) => Ok(&mut self.write_ins[idx]),
            None => Err(AdjudicationError::WriteInNotFound(write_in_id.to_string())),
        }
    }

    /// The write-ins of a contest, in ingestion order.
    pub(crate) fn contest_write_ins<'a>(
        &'a self,
        contest_id: &'a str,
    ) -> impl Iterator<Item = &'a WriteIn> + 'a {
        self.write_ins
            .iter()
            .filter(move |w| w.contest_id == contest_id)
    }

    pub(crate) fn contest_write_in_candidates<'a>(
        &'a self,
        contest_id: &'a str,
    ) -> impl Iterator<Item = &'a WriteInCandidate> + 'a {
        self.write_in_candidates
            .iter()
            .filter(move |c| c.contest_id == contest_id)
    }

    fn insert_write_in(&mut self, write_in: WriteIn) -> AdjudicationResult<()> {
        if self.write_in_index.contains_key(&write_in.id) {
            return Err(AdjudicationError::DuplicateWriteIn(write_in.id));
        }
        self.next_sequence = self.next_sequence.max(write_in.sequence.saturating_add(1));
        self.write_in_index
            .insert(write_in.id.clone(), self.write_ins.len());
        self.write_ins.push(write_in);
        Ok(())
    }
}

pub struct WriteInStore {
    state: RwLock<StoreState>,
}

impl WriteInStore {
    pub fn new(election_id: &str) -> WriteInStore {
        WriteInStore {
            state: RwLock::new(StoreState::new(election_id)),
        }
    }

    pub fn election_id(&self) -> ElectionId {
        self.read().election_id.clone()
    }

    // A panic while holding the guard cannot leave a half-applied command
    // behind: commands validate everything before their first write.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a contest and its official roster. Replaces any contest
    /// with the same id.
    pub fn add_contest(&self, contest: Contest) {
        let mut state = self.write();
        debug!(
            "add_contest: {} with {} candidates",
            contest.id,
            contest.candidates.len()
        );
        if let Some(existing) = state.contests.iter_mut().find(|c| c.id == contest.id) {
            *existing = contest;
        } else {
            state.contests.push(contest);
        }
    }

    pub fn add_cast_vote_record(&self, cvr: CastVoteRecord) {
        let mut state = self.write();
        state.cvrs.insert(cvr.id.clone(), cvr);
    }

    /// Stores a new pending write-in and returns its id.
    pub fn add_write_in(&self, new_write_in: NewWriteIn) -> AdjudicationResult<WriteInId> {
        let mut state = self.write();
        state.contest(&new_write_in.contest_id)?;
        state.cvr(&new_write_in.cvr_id)?;
        let id = new_write_in
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let write_in = WriteIn {
            id: id.clone(),
            election_id: state.election_id.clone(),
            contest_id: new_write_in.contest_id,
            option_id: new_write_in.option_id,
            cvr_id: new_write_in.cvr_id,
            is_unmarked: new_write_in.is_unmarked,
            status: WriteInStatus::Pending,
            sequence: state.next_sequence,
            version: 0,
        };
        state.insert_write_in(write_in)?;
        Ok(id)
    }

    pub fn set_image_view(&self, view: ImageView) -> AdjudicationResult<()> {
        let mut state = self.write();
        state.write_in(&view.write_in_id)?;
        state.images.insert(view.write_in_id.clone(), view);
        Ok(())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        let mut cast_vote_records: Vec<CastVoteRecord> = state.cvrs.values().cloned().collect();
        cast_vote_records.sort_by(|a, b| a.id.cmp(&b.id));
        let mut images: Vec<ImageView> = state.images.values().cloned().collect();
        images.sort_by(|a, b| a.write_in_id.cmp(&b.write_in_id));
        StoreSnapshot {
            election_id: state.election_id.clone(),
            contests: state.contests.clone(),
            cast_vote_records,
            write_ins: state.write_ins.clone(),
            write_in_candidates: state.write_in_candidates.clone(),
            images,
        }
    }

    /// Rebuilds a store from a snapshot, checking that every write-in
    /// points to a known contest and ballot, that adjudications name
    /// candidates of their contest and that write-in candidate names are
    /// unique within a contest.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> AdjudicationResult<WriteInStore> {
        let mut state = StoreState::new(&snapshot.election_id);
        state.contests = snapshot.contests;
        for cvr in snapshot.cast_vote_records {
            state.cvrs.insert(cvr.id.clone(), cvr);
        }
        let mut write_ins = snapshot.write_ins;
        write_ins.sort_by_key(|w| w.sequence);
        for w in write_ins {
            state.contest(&w.contest_id)?;
            state.cvr(&w.cvr_id)?;
            state.insert_write_in(w)?;
        }
        for candidate in snapshot.write_in_candidates {
            registry::check_name_available(&state, &candidate.contest_id, &candidate.name)?;
            state.write_in_candidates.push(candidate);
        }
        for w in state.write_ins.iter() {
            if let Some(target) = w.adjudication().and_then(|a| a.target()) {
                registry::resolve_target(&state, &w.contest_id, &target)?;
            }
        }
        for view in snapshot.images {
            state.write_in(&view.write_in_id)?;
            state.images.insert(view.write_in_id.clone(), view);
        }
        info!(
            "from_snapshot: election {}: {} contests, {} ballots, {} write-ins",
            state.election_id,
            state.contests.len(),
            state.cvrs.len(),
            state.write_ins.len()
        );
        Ok(WriteInStore {
            state: RwLock::new(state),
        })
    }
}

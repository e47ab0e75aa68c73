//! Write-in candidates discovered during adjudication.

use log::{debug, info};
use uuid::Uuid;

use crate::config::*;
use crate::store::StoreState;

/// Candidate names are compared trimmed and case-insensitively.
pub fn normalize_candidate_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The official candidates of a contest, sorted by name. Write-in
/// placeholders of the roster are left out.
pub(crate) fn official_candidates(contest: &Contest) -> Vec<Candidate> {
    let mut res: Vec<Candidate> = contest
        .candidates
        .iter()
        .filter(|c| !c.is_write_in)
        .cloned()
        .collect();
    res.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    res
}

pub(crate) fn list_candidates(
    state: &StoreState,
    contest_id: &str,
) -> AdjudicationResult<CandidateListing> {
    let contest = state.contest(contest_id)?;
    Ok(CandidateListing {
        contest_id: contest_id.to_string(),
        official: official_candidates(contest),
        write_in: state.contest_write_in_candidates(contest_id).cloned().collect(),
    })
}

/// Checks that `target` names a candidate of the contest: an official
/// candidate for the official variant, a write-in candidate of the same
/// contest for the write-in variant.
pub(crate) fn resolve_target(
    state: &StoreState,
    contest_id: &str,
    target: &CandidateTarget,
) -> AdjudicationResult<()> {
    let contest = state.contest(contest_id)?;
    let found = match target {
        CandidateTarget::OfficialCandidate(cid) => contest
            .candidates
            .iter()
            .any(|c| !c.is_write_in && c.id == *cid),
        CandidateTarget::WriteInCandidate(cid) => state
            .contest_write_in_candidates(contest_id)
            .any(|c| c.id == *cid),
    };
    if found {
        Ok(())
    } else {
        Err(AdjudicationError::UnknownCandidate {
            contest_id: contest_id.to_string(),
            target: target.clone(),
        })
    }
}

/// Checks that `name` is not empty and does not collide with an official or
/// write-in candidate of the contest. Returns the trimmed name.
pub(crate) fn check_name_available<'a>(
    state: &StoreState,
    contest_id: &str,
    name: &'a str,
) -> AdjudicationResult<&'a str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AdjudicationError::EmptyCandidateName);
    }
    let contest = state.contest(contest_id)?;
    let normalized = normalize_candidate_name(trimmed);
    let collides = contest
        .candidates
        .iter()
        .filter(|c| !c.is_write_in)
        .map(|c| c.name.as_str())
        .chain(
            state
                .contest_write_in_candidates(contest_id)
                .map(|c| c.name.as_str()),
        )
        .any(|existing| normalize_candidate_name(existing) == normalized);
    if collides {
        debug!(
            "check_name_available: {:?} collides with an existing candidate of {}",
            trimmed, contest_id
        );
        return Err(AdjudicationError::DuplicateCandidateName {
            contest_id: contest_id.to_string(),
            name: trimmed.to_string(),
        });
    }
    Ok(trimmed)
}

pub(crate) fn add_candidate(
    state: &mut StoreState,
    contest_id: &str,
    name: &str,
) -> AdjudicationResult<WriteInCandidate> {
    let trimmed = check_name_available(state, contest_id, name)?;
    let candidate = WriteInCandidate {
        id: Uuid::new_v4().to_string(),
        election_id: state.election_id.clone(),
        contest_id: contest_id.to_string(),
        name: trimmed.to_string(),
    };
    info!(
        "add_candidate: contest {}: new write-in candidate {} ({})",
        contest_id, candidate.name, candidate.id
    );
    state.write_in_candidates.push(candidate.clone());
    Ok(candidate)
}

/// Removes a write-in candidate if no write-in is adjudicated for it.
/// Returns true if the candidate was removed.
pub(crate) fn prune_if_unreferenced(state: &mut StoreState, candidate_id: &str) -> bool {
    let referenced = state.write_ins.iter().any(|w| {
        matches!(
            w.adjudication(),
            Some(Adjudication::WriteInCandidate { candidate_id: cid }) if cid == candidate_id
        )
    });
    if referenced {
        return false;
    }
    let before = state.write_in_candidates.len();
    state
        .write_in_candidates
        .retain(|c| c.id != candidate_id);
    let removed = state.write_in_candidates.len() < before;
    if removed {
        info!("prune_if_unreferenced: removed write-in candidate {}", candidate_id);
    }
    removed
}

//! Adjudication queues: the write-ins of a contest in review order, and
//! their tallies.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::config::*;
use crate::store::StoreState;

fn tally<'a>(contest_id: &str, write_ins: impl Iterator<Item = &'a WriteIn>) -> QueueMetadata {
    let mut total_tally = 0;
    let mut pending_tally = 0;
    for w in write_ins {
        total_tally += 1;
        if w.is_pending() {
            pending_tally += 1;
        }
    }
    QueueMetadata {
        contest_id: contest_id.to_string(),
        total_tally,
        pending_tally,
    }
}

/// Tallies per contest.
///
/// With a contest, the result has one entry, or none if the contest has
/// no write-ins. Without a contest, every contest with at least one
/// write-in is reported, ordered by contest id.
pub(crate) fn queue_metadata(
    state: &StoreState,
    contest_id: Option<&str>,
) -> AdjudicationResult<Vec<QueueMetadata>> {
    match contest_id {
        Some(cid) => {
            state.contest(cid)?;
            let metadata = tally(cid, state.contest_write_ins(cid));
            if metadata.total_tally == 0 {
                Ok(vec![])
            } else {
                Ok(vec![metadata])
            }
        }
        None => {
            let mut per_contest: BTreeMap<&str, Vec<&WriteIn>> = BTreeMap::new();
            for w in state.write_ins.iter() {
                per_contest.entry(w.contest_id.as_str()).or_default().push(w);
            }
            Ok(per_contest
                .into_iter()
                .map(|(cid, write_ins)| tally(cid, write_ins.into_iter()))
                .collect())
        }
    }
}

/// All the write-ins of a contest, pending or not, in ingestion order.
pub(crate) fn queue(state: &StoreState, contest_id: &str) -> AdjudicationResult<Vec<WriteInId>> {
    state.contest(contest_id)?;
    Ok(state
        .contest_write_ins(contest_id)
        .map(|w| w.id.clone())
        .collect())
}

pub(crate) fn first_pending_id(
    state: &StoreState,
    contest_id: &str,
) -> AdjudicationResult<Option<WriteInId>> {
    state.contest(contest_id)?;
    let res = state
        .contest_write_ins(contest_id)
        .find(|w| w.is_pending())
        .map(|w| w.id.clone());
    debug!("first_pending_id: {}: {:?}", contest_id, res);
    Ok(res)
}

/// Write-in records matching every field set in the filter, ordered by
/// ballot then option.
pub(crate) fn write_in_records(state: &StoreState, filter: &WriteInFilter) -> Vec<WriteIn> {
    let mut res: Vec<WriteIn> = state
        .write_ins
        .iter()
        .filter(|w| {
            filter.contest_id.as_ref().map_or(true, |c| *c == w.contest_id)
                && filter.cvr_id.as_ref().map_or(true, |c| *c == w.cvr_id)
                && filter.write_in_id.as_ref().map_or(true, |i| *i == w.id)
        })
        .cloned()
        .collect();
    res.sort_by(|a, b| {
        (a.cvr_id.as_str(), a.option_id.as_str(), a.id.as_str()).cmp(&(
            b.cvr_id.as_str(),
            b.option_id.as_str(),
            b.id.as_str(),
        ))
    });
    res
}

/// The write-in together with the rest of its ballot: the other write-ins
/// and the bubble marks.
pub(crate) fn adjudication_context(
    state: &StoreState,
    write_in_id: &str,
) -> AdjudicationResult<AdjudicationContext> {
    let write_in = state.write_in(write_in_id)?;
    let cvr = state.cvr(&write_in.cvr_id)?;
    let related_write_ins: Vec<WriteIn> = state
        .write_ins
        .iter()
        .filter(|w| w.cvr_id == write_in.cvr_id && w.id != write_in.id)
        .cloned()
        .collect();
    let cvr_votes: BTreeMap<ContestId, BTreeSet<OptionId>> = cvr
        .votes
        .iter()
        .map(|(contest_id, options)| (contest_id.clone(), options.iter().cloned().collect()))
        .collect();
    Ok(AdjudicationContext {
        write_in: write_in.clone(),
        related_write_ins,
        cvr_id: cvr.id.clone(),
        cvr_votes,
    })
}

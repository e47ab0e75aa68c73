// ********* JSON output of the commands ***********

use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::review::*;
use write_in_adjudication::*;

fn to_js<T: Serialize>(x: &T) -> ReviewResult<JSValue> {
    serde_json::to_value(x).context(SerializingJsonSnafu {})
}

pub fn metadata_js(metadata: &[QueueMetadata]) -> ReviewResult<JSValue> {
    Ok(json!({ "metadata": to_js(&metadata)? }))
}

pub fn queue_js(contest_id: &str, queue: &[WriteInId]) -> JSValue {
    json!({ "contestId": contest_id, "queue": queue })
}

pub fn first_pending_js(contest_id: &str, first: &Option<WriteInId>) -> JSValue {
    json!({ "contestId": contest_id, "firstPendingId": first })
}

pub fn context_js(context: &AdjudicationContext) -> ReviewResult<JSValue> {
    to_js(context)
}

pub fn candidates_js(listing: &CandidateListing) -> ReviewResult<JSValue> {
    to_js(listing)
}

pub fn records_js(records: &[WriteIn]) -> ReviewResult<JSValue> {
    Ok(json!({ "writeIns": to_js(&records)? }))
}

pub fn new_candidate_js(candidate: &WriteInCandidate) -> ReviewResult<JSValue> {
    Ok(json!({ "candidate": to_js(candidate)? }))
}

/// A selection that was not committed because of a double vote.
pub fn needs_confirmation_js(write_in_id: &str, double_vote: &DoubleVote) -> ReviewResult<JSValue> {
    Ok(json!({
        "result": "needs-confirmation",
        "writeInId": write_in_id,
        "doubleVote": to_js(double_vote)?,
    }))
}

pub fn outcome_js(outcome: &AdjudicationOutcome, advisory: Option<&DoubleVote>) -> ReviewResult<JSValue> {
    let mut js = match outcome {
        AdjudicationOutcome::Unchanged(write_in) => json!({
            "result": "unchanged",
            "writeIn": to_js(write_in)?,
        }),
        AdjudicationOutcome::Applied {
            previous,
            write_in,
            pruned_candidate,
        } => json!({
            "result": "applied",
            "previous": to_js(previous)?,
            "writeIn": to_js(write_in)?,
            "prunedCandidateId": pruned_candidate,
        }),
    };
    if let (Some(dv), Some(obj)) = (advisory, js.as_object_mut()) {
        obj.insert("confirmedDoubleVote".to_string(), to_js(dv)?);
    }
    Ok(js)
}

pub fn view_js(view: &ImageView, transform: &FocusTransform) -> ReviewResult<JSValue> {
    Ok(json!({
        "writeInId": view.write_in_id,
        "image": view.image,
        "zoomInEnabled": transform.zoom_level.can_zoom_in(),
        "zoomOutEnabled": transform.zoom_level.can_zoom_out(),
        "transform": to_js(transform)?,
    }))
}

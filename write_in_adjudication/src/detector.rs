//! Double vote detection.
//!
//! A ballot must not be credited twice in the same contest for the same
//! candidate, either because the voter also filled the bubble of that
//! candidate or because another write-in of the ballot was already
//! resolved to it. Detection is advisory: nothing here blocks a commit.

use serde::Serialize;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DoubleVoteKind {
    BubbleMarkedElsewhere,
    AlreadyAdjudicatedOfficial,
    AlreadyAdjudicatedWriteIn,
}

impl DoubleVoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoubleVoteKind::BubbleMarkedElsewhere => "bubble-marked-elsewhere",
            DoubleVoteKind::AlreadyAdjudicatedOfficial => "already-adjudicated-official",
            DoubleVoteKind::AlreadyAdjudicatedWriteIn => "already-adjudicated-write-in",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct DoubleVote {
    pub kind: DoubleVoteKind,
    #[serde(rename = "candidateId")]
    pub candidate_id: CandidateId,
    /// The other write-in already credited to the candidate. Not set for
    /// bubble marks.
    #[serde(rename = "relatedWriteInId", skip_serializing_if = "Option::is_none")]
    pub related_write_in_id: Option<WriteInId>,
}

/// Result of checking a selection before it is committed.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum PreCheck {
    /// The selection is what the write-in already holds.
    Unchanged,
    Clear,
    Advisory(DoubleVote),
}

impl PreCheck {
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, PreCheck::Advisory(_))
    }
}

/// Checks `target` against the bubble marks and the related write-ins of
/// the ballot. The first matching rule wins.
pub fn detect_double_vote(
    target: &CandidateTarget,
    context: &AdjudicationContext,
) -> Option<DoubleVote> {
    let write_in = &context.write_in;

    if let CandidateTarget::OfficialCandidate(cid) = target {
        let bubbled = context
            .cvr_votes
            .get(&write_in.contest_id)
            .map(|marks| marks.contains(cid))
            .unwrap_or(false);
        if bubbled {
            return Some(DoubleVote {
                kind: DoubleVoteKind::BubbleMarkedElsewhere,
                candidate_id: cid.clone(),
                related_write_in_id: None,
            });
        }
    }

    let kind = match target {
        CandidateTarget::OfficialCandidate(_) => DoubleVoteKind::AlreadyAdjudicatedOfficial,
        CandidateTarget::WriteInCandidate(_) => DoubleVoteKind::AlreadyAdjudicatedWriteIn,
    };
    context
        .related_write_ins
        .iter()
        .filter(|other| {
            other.id != write_in.id
                && other.contest_id == write_in.contest_id
                && other.cvr_id == write_in.cvr_id
                && other.option_id != write_in.option_id
        })
        .find(|other| other.adjudication().and_then(|a| a.target()).as_ref() == Some(target))
        .map(|other| DoubleVote {
            kind,
            candidate_id: target.candidate_id().to_string(),
            related_write_in_id: Some(other.id.clone()),
        })
}

/// Pre-check run by the caller before committing a selection. Selecting
/// what is already applied is reported as unchanged without running the
/// detection.
pub fn precheck(target: &CandidateTarget, context: &AdjudicationContext) -> PreCheck {
    let current = context.write_in.adjudication().and_then(|a| a.target());
    if current.as_ref() == Some(target) {
        return PreCheck::Unchanged;
    }
    match detect_double_vote(target, context) {
        Some(double_vote) => PreCheck::Advisory(double_vote),
        None => PreCheck::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn write_in(id: &str, option_id: &str, status: WriteInStatus) -> WriteIn {
        WriteIn {
            id: id.to_string(),
            election_id: "election-1".to_string(),
            contest_id: "best-animal-mammal".to_string(),
            option_id: option_id.to_string(),
            cvr_id: "cvr-a".to_string(),
            is_unmarked: false,
            status,
            sequence: 0,
            version: 0,
        }
    }

    fn context(write_in: WriteIn, related: Vec<WriteIn>, marks: &[&str]) -> AdjudicationContext {
        let mut cvr_votes = BTreeMap::new();
        cvr_votes.insert(
            "best-animal-mammal".to_string(),
            marks.iter().map(|m| m.to_string()).collect::<BTreeSet<_>>(),
        );
        AdjudicationContext {
            cvr_id: write_in.cvr_id.clone(),
            write_in,
            related_write_ins: related,
            cvr_votes,
        }
    }

    fn official(id: &str) -> CandidateTarget {
        CandidateTarget::OfficialCandidate(id.to_string())
    }

    fn write_in_candidate(id: &str) -> CandidateTarget {
        CandidateTarget::WriteInCandidate(id.to_string())
    }

    fn adjudicated(target: CandidateTarget) -> WriteInStatus {
        WriteInStatus::Adjudicated(target.into())
    }

    #[test]
    fn bubble_marked_official_candidate() {
        let ctx = context(write_in("w0", "write-in-0", WriteInStatus::Pending), vec![], &["fox"]);
        let res = detect_double_vote(&official("fox"), &ctx).unwrap();
        assert_eq!(res.kind, DoubleVoteKind::BubbleMarkedElsewhere);
        assert_eq!(res.candidate_id, "fox");
        assert_eq!(res.related_write_in_id, None);
        assert_eq!(detect_double_vote(&official("otter"), &ctx), None);
        // Bubble marks only ever name official candidates.
        assert_eq!(detect_double_vote(&write_in_candidate("fox"), &ctx), None);
    }

    #[test]
    fn prior_write_in_candidate() {
        let first = write_in("w0", "write-in-0", adjudicated(write_in_candidate("lemur")));
        let ctx = context(
            write_in("w1", "write-in-1", WriteInStatus::Pending),
            vec![first],
            &[],
        );
        let res = detect_double_vote(&write_in_candidate("lemur"), &ctx).unwrap();
        assert_eq!(res.kind, DoubleVoteKind::AlreadyAdjudicatedWriteIn);
        assert_eq!(res.related_write_in_id.as_deref(), Some("w0"));
        // Same id, other variant: no collision.
        assert_eq!(detect_double_vote(&official("lemur"), &ctx), None);
    }

    #[test]
    fn prior_official_candidate() {
        let first = write_in("w0", "write-in-0", adjudicated(official("otter")));
        let ctx = context(
            write_in("w1", "write-in-1", WriteInStatus::Pending),
            vec![first],
            &[],
        );
        let res = detect_double_vote(&official("otter"), &ctx).unwrap();
        assert_eq!(res.kind, DoubleVoteKind::AlreadyAdjudicatedOfficial);
    }

    #[test]
    fn bubble_mark_wins_over_related_write_in() {
        let first = write_in("w0", "write-in-0", adjudicated(official("fox")));
        let ctx = context(
            write_in("w1", "write-in-1", WriteInStatus::Pending),
            vec![first],
            &["fox"],
        );
        assert_eq!(
            detect_double_vote(&official("fox"), &ctx).map(|d| d.kind),
            Some(DoubleVoteKind::BubbleMarkedElsewhere)
        );
    }

    #[test]
    fn unrelated_write_ins_are_ignored() {
        let mut other_contest = write_in("w0", "write-in-0", adjudicated(official("otter")));
        other_contest.contest_id = "zoo-council-mammal".to_string();
        // Same slot on the same ballot: the write-in itself seen again.
        let same_option = write_in("w2", "write-in-1", adjudicated(official("otter")));
        let invalid = write_in("w3", "write-in-3", WriteInStatus::Adjudicated(Adjudication::Invalid));
        let ctx = context(
            write_in("w1", "write-in-1", WriteInStatus::Pending),
            vec![other_contest, same_option, invalid],
            &[],
        );
        assert_eq!(detect_double_vote(&official("otter"), &ctx), None);
    }

    #[test]
    fn precheck_reports_unchanged_and_advisories() {
        let ctx = context(
            write_in("w0", "write-in-0", adjudicated(official("fox"))),
            vec![],
            &["fox"],
        );
        // Already applied: no detection even though fox is bubbled.
        assert_eq!(precheck(&official("fox"), &ctx), PreCheck::Unchanged);
        assert_eq!(precheck(&official("horse"), &ctx), PreCheck::Clear);

        let ctx = context(write_in("w0", "write-in-0", WriteInStatus::Pending), vec![], &["fox"]);
        let res = precheck(&official("fox"), &ctx);
        assert!(res.needs_confirmation());
    }

    #[test]
    fn detection_is_deterministic() {
        let first = write_in("w0", "write-in-0", adjudicated(write_in_candidate("lemur")));
        let ctx = context(
            write_in("w1", "write-in-1", WriteInStatus::Pending),
            vec![first],
            &["fox"],
        );
        for target in [
            official("fox"),
            official("otter"),
            write_in_candidate("lemur"),
            write_in_candidate("kiwi"),
        ] {
            let expected = detect_double_vote(&target, &ctx);
            for _ in 0..10 {
                assert_eq!(detect_double_vote(&target, &ctx.clone()), expected);
            }
        }
    }
}

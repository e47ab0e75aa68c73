//! The adjudication state machine.
//!
//! A write-in starts `pending` and moves to `adjudicated` with one of the
//! three outcomes. It never moves back; an adjudicated write-in can be
//! moved to another outcome.

use log::{debug, info, warn};

use crate::config::*;
use crate::registry;
use crate::store::StoreState;

/// Applies an adjudication request to the store.
///
/// Everything is checked before the write-in is touched, so a failed
/// request leaves the store as it was.
pub(crate) fn adjudicate(
    state: &mut StoreState,
    config: &EngineConfig,
    request: &AdjudicationRequest,
) -> AdjudicationResult<AdjudicationOutcome> {
    let adjudication =
        Adjudication::from_parts(request.adjudication_type, request.candidate_id.clone())?;
    let current = state.write_in(&request.write_in_id)?;
    if let Some(target) = adjudication.target() {
        registry::resolve_target(state, &current.contest_id, &target)?;
    }

    if current.adjudication() == Some(&adjudication) {
        debug!(
            "adjudicate: write-in {} already adjudicated as {:?}",
            current.id, adjudication
        );
        return Ok(AdjudicationOutcome::Unchanged(current.clone()));
    }

    if let Some(expected) = request.expected_version {
        if expected != current.version {
            warn!(
                "adjudicate: stale write on {}: expected version {}, found {}",
                current.id, expected, current.version
            );
            return Err(AdjudicationError::StaleWrite {
                write_in_id: current.id.clone(),
                expected,
                actual: current.version,
            });
        }
    }

    let write_in = state.write_in_mut(&request.write_in_id)?;
    let previous = std::mem::replace(
        &mut write_in.status,
        WriteInStatus::Adjudicated(adjudication),
    );
    write_in.version += 1;
    let write_in = write_in.clone();
    info!(
        "adjudicate: write-in {} ({} / {}): {:?} -> {:?} (version {})",
        write_in.id,
        write_in.contest_id,
        write_in.cvr_id,
        previous,
        write_in.status,
        write_in.version
    );

    let mut pruned_candidate = None;
    if config.prune_unreferenced_candidates {
        if let WriteInStatus::Adjudicated(Adjudication::WriteInCandidate { candidate_id }) =
            &previous
        {
            if registry::prune_if_unreferenced(state, candidate_id) {
                pruned_candidate = Some(candidate_id.clone());
            }
        }
    }

    Ok(AdjudicationOutcome::Applied {
        previous,
        write_in,
        pruned_candidate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::animal_store;
    use crate::store::WriteInStore;

    fn run(store: &WriteInStore, request: AdjudicationRequest) -> AdjudicationResult<AdjudicationOutcome> {
        let mut state = store.write();
        adjudicate(&mut state, &EngineConfig::DEFAULT, &request)
    }

    #[test]
    fn pending_to_official() {
        let store = animal_store();
        let outcome = run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("otter")),
        )
        .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(outcome.write_in().version, 1);
        assert_eq!(
            outcome.write_in().adjudication(),
            Some(&Adjudication::OfficialCandidate {
                candidate_id: "otter".to_string()
            })
        );
        match outcome {
            AdjudicationOutcome::Applied { previous, .. } => {
                assert_eq!(previous, WriteInStatus::Pending)
            }
            _ => panic!("expected an applied outcome"),
        }
    }

    #[test]
    fn repeat_is_a_no_op() {
        let store = animal_store();
        let request = AdjudicationRequest::new("win0", AdjudicationType::Invalid, None);
        assert!(run(&store, request.clone()).unwrap().is_applied());
        let again = run(&store, request).unwrap();
        assert!(!again.is_applied());
        assert_eq!(again.write_in().version, 1);
    }

    #[test]
    fn readjudication_moves_the_target() {
        let store = animal_store();
        run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("otter")),
        )
        .unwrap();
        let outcome = run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("horse")),
        )
        .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(outcome.write_in().version, 2);
        assert!(!store.read().write_in("win0").unwrap().is_pending());
    }

    #[test]
    fn invalid_requests_leave_the_store_untouched() {
        let store = animal_store();
        let before = store.snapshot();
        let requests = vec![
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, None),
            AdjudicationRequest::new("win0", AdjudicationType::Invalid, Some("fox")),
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("zebra")),
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("write-in-0")),
            AdjudicationRequest::new("win0", AdjudicationType::WriteInCandidate, Some("nobody")),
        ];
        for request in requests {
            let err = run(&store, request).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let err = run(
            &store,
            AdjudicationRequest::new("nope", AdjudicationType::Invalid, None),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let store = animal_store();
        run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::Invalid, None).with_expected_version(0),
        )
        .unwrap();
        let err = run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("fox"))
                .with_expected_version(0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AdjudicationError::StaleWrite {
                write_in_id: "win0".to_string(),
                expected: 0,
                actual: 1
            }
        );
        assert_eq!(
            store.read().write_in("win0").unwrap().adjudication(),
            Some(&Adjudication::Invalid)
        );
        // Without a version, last write wins.
        assert!(run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::OfficialCandidate, Some("fox")),
        )
        .unwrap()
        .is_applied());
    }

    #[test]
    fn unreferenced_write_in_candidates_are_pruned() {
        let store = animal_store();
        let lemur = {
            let mut state = store.write();
            registry::add_candidate(&mut state, "best-animal-mammal", "Lemur").unwrap()
        };
        for id in ["win0", "win2"] {
            run(
                &store,
                AdjudicationRequest::new(id, AdjudicationType::WriteInCandidate, Some(lemur.id.as_str())),
            )
            .unwrap();
        }
        // Still referenced by win2.
        let outcome = run(
            &store,
            AdjudicationRequest::new("win0", AdjudicationType::Invalid, None),
        )
        .unwrap();
        assert_eq!(
            outcome,
            AdjudicationOutcome::Applied {
                previous: WriteInStatus::Adjudicated(Adjudication::WriteInCandidate {
                    candidate_id: lemur.id.clone()
                }),
                write_in: store.read().write_in("win0").unwrap().clone(),
                pruned_candidate: None,
            }
        );
        let outcome = run(
            &store,
            AdjudicationRequest::new("win2", AdjudicationType::Invalid, None),
        )
        .unwrap();
        match outcome {
            AdjudicationOutcome::Applied {
                pruned_candidate, ..
            } => assert_eq!(pruned_candidate, Some(lemur.id.clone())),
            _ => panic!("expected an applied outcome"),
        }
        assert!(store.read().write_in_candidates.is_empty());
    }

    #[test]
    fn pruning_can_be_disabled() {
        let store = animal_store();
        let config = EngineConfig {
            prune_unreferenced_candidates: false,
            ..EngineConfig::DEFAULT
        };
        let mut state = store.write();
        let lemur = registry::add_candidate(&mut state, "best-animal-mammal", "Lemur").unwrap();
        let to_lemur =
            AdjudicationRequest::new("win0", AdjudicationType::WriteInCandidate, Some(lemur.id.as_str()));
        adjudicate(&mut state, &config, &to_lemur).unwrap();
        let to_invalid = AdjudicationRequest::new("win0", AdjudicationType::Invalid, None);
        adjudicate(&mut state, &config, &to_invalid).unwrap();
        assert_eq!(state.write_in_candidates, vec![lemur]);
    }
}

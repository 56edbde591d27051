//! Property tests for engine state transitions.

use compass_engine::ReflectionEngine;
use compass_test_utils::generators::*;
use compass_test_utils::{InMemorySnapshotStore, MockRemoteStore, Mode};
use proptest::prelude::*;
use std::sync::Arc;

fn guest_engine() -> ReflectionEngine {
    ReflectionEngine::new(
        Box::new(InMemorySnapshotStore::new()),
        Arc::new(MockRemoteStore::new()),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Progress stays in range whatever subset of answers was given.
    #[test]
    fn progress_is_bounded(
        year in arb_year(),
        period in arb_period(),
        (mode, responses) in arb_mode().prop_flat_map(|m| (Just(m), arb_response_map(m))),
    ) {
        let mut engine = guest_engine();
        engine.start_reflection(year, mode, period).unwrap();
        for (question_id, response) in &responses {
            engine.set_response(question_id, response.value.clone());
        }
        prop_assert!(engine.progress() <= 100);
        prop_assert_eq!(engine.responses().len(), responses.len());
    }

    /// Upgrading copies every answer and never touches the source.
    #[test]
    fn upgrade_preserves_source_answers(
        year in arb_year(),
        period in arb_period(),
        responses in arb_response_map(Mode::Quick),
        target in prop_oneof![Just(Mode::Ok), Just(Mode::Deep)],
    ) {
        let mut engine = guest_engine();
        let source_id = engine.start_reflection(year, Mode::Quick, period).unwrap().id.clone();
        for (question_id, response) in &responses {
            engine.set_response(question_id, response.value.clone());
        }
        engine.complete_reflection();
        let source = engine.reflection(&source_id).unwrap().clone();

        let upgraded = engine.upgrade_mode(&source_id, target).unwrap().clone();

        prop_assert_eq!(&upgraded.responses, &source.responses);
        prop_assert_eq!(upgraded.upgraded_from.as_ref(), Some(&source_id));
        prop_assert!(upgraded.progress <= 100);
        prop_assert!(!upgraded.completed);
        prop_assert_eq!(engine.reflection(&source_id), Some(&source));
        prop_assert_eq!(engine.history().len(), 2);
    }

    /// Modes at or above the source depth are always refused.
    #[test]
    fn non_deeper_upgrades_are_refused(
        source_mode in arb_mode(),
        target in arb_mode(),
    ) {
        prop_assume!(!target.is_deeper_than(source_mode));
        let mut engine = guest_engine();
        let id = engine
            .start_reflection(2025, source_mode, compass_test_utils::Period::YearEnd)
            .unwrap()
            .id
            .clone();
        engine.complete_reflection();

        prop_assert!(engine.upgrade_mode(&id, target).is_err());
        prop_assert_eq!(engine.history().len(), 1);
        prop_assert_eq!(ReflectionEngine::can_upgrade(engine.reflection(&id).unwrap()), source_mode.deeper_modes());
    }
}

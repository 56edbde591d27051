//! Compass Test Utilities
//!
//! Shared test infrastructure for the Compass workspace:
//! - Proptest generators for modes, periods and response values
//! - Fixtures for reflections, profiles and legacy snapshots
//! - Re-exports of the in-memory snapshot and remote stores

pub use compass_storage::{InMemorySnapshotStore, MockRemoteStore, RemoteCall};

pub use compass_core::{
    Achievement, AchievementType, Mode, Period, Reflection, ReflectionId, Response, ResponseMap,
    ResponseValue, UserId, UserProfile,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use compass_core::{questions_for_mode, QuestionKind, LIFE_AREAS, MONTHS};
    use proptest::collection::{btree_map, vec};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    pub fn arb_mode() -> impl Strategy<Value = Mode> {
        prop_oneof![Just(Mode::Quick), Just(Mode::Ok), Just(Mode::Deep)]
    }

    pub fn arb_period() -> impl Strategy<Value = Period> {
        prop_oneof![Just(Period::Q1), Just(Period::MidYear), Just(Period::YearEnd)]
    }

    pub fn arb_year() -> impl Strategy<Value = i32> {
        2000..2100i32
    }

    /// A value of the shape `kind` expects. Text may be blank so generated
    /// maps include unanswered questions.
    pub fn arb_response_value(kind: QuestionKind) -> BoxedStrategy<ResponseValue> {
        match kind {
            QuestionKind::Text | QuestionKind::Textarea | QuestionKind::Word => {
                "[a-z ]{0,12}".prop_map(ResponseValue::Text).boxed()
            }
            QuestionKind::List => vec("[a-z]{0,8}", 0..4)
                .prop_map(ResponseValue::List)
                .boxed(),
            QuestionKind::Rating => {
                let ids: Vec<String> = LIFE_AREAS.iter().map(|a| a.id.to_string()).collect();
                vec(1u8..=10, ids.len())
                    .prop_map(move |ratings| {
                        ResponseValue::Ratings(ids.iter().cloned().zip(ratings).collect())
                    })
                    .boxed()
            }
            QuestionKind::Calendar => {
                btree_map(proptest::sample::select(MONTHS), "[a-z ]{1,10}", 0..4)
                    .prop_map(|notes| {
                        ResponseValue::Calendar(
                            notes
                                .into_iter()
                                .map(|(month, note)| (month.to_string(), note))
                                .collect::<BTreeMap<_, _>>(),
                        )
                    })
                    .boxed()
            }
        }
    }

    /// Responses to an arbitrary subset of `mode`'s questions.
    pub fn arb_response_map(mode: Mode) -> impl Strategy<Value = ResponseMap> {
        let strategies: Vec<_> = questions_for_mode(mode)
            .into_iter()
            .map(|q| {
                let id = q.id;
                proptest::option::of(arb_response_value(q.kind))
                    .prop_map(move |value| value.map(|v| (id, v)))
            })
            .collect();
        strategies.prop_map(|answers| {
            answers
                .into_iter()
                .flatten()
                .map(|(id, value)| (id.to_string(), Response::new(id, value)))
                .collect()
        })
    }

    pub fn arb_reflection() -> impl Strategy<Value = Reflection> {
        (arb_year(), arb_mode(), arb_period()).prop_flat_map(|(year, mode, period)| {
            arb_response_map(mode).prop_map(move |responses| {
                let mut reflection = Reflection::start(year, mode, period, None);
                reflection.progress = compass_core::calculate_progress(mode, &responses);
                reflection.responses = responses;
                reflection
            })
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::{Duration, Utc};
    use compass_core::{questions_for_mode, QuestionKind, LIFE_AREAS, LIFE_AREAS_QUESTION};
    use compass_storage::{LegacyJourney, Snapshot};

    pub fn signed_in_user() -> UserProfile {
        let mut profile = UserProfile::new("user-1");
        profile.email = Some("reflector@example.com".to_string());
        profile.full_name = Some("Test Reflector".to_string());
        profile
    }

    /// A non-blank value of the shape `kind` expects.
    pub fn answer_for(kind: QuestionKind) -> ResponseValue {
        match kind {
            QuestionKind::Text | QuestionKind::Textarea | QuestionKind::Word => {
                ResponseValue::text("answered")
            }
            QuestionKind::List => ResponseValue::list(["one", "two", "three"]),
            QuestionKind::Rating => ResponseValue::Ratings(
                LIFE_AREAS.iter().map(|a| (a.id.to_string(), 8)).collect(),
            ),
            QuestionKind::Calendar => ResponseValue::Calendar(
                [("January".to_string(), "fresh start".to_string())]
                    .into_iter()
                    .collect(),
            ),
        }
    }

    /// Every question of `mode` answered.
    pub fn full_answers(mode: Mode) -> ResponseMap {
        questions_for_mode(mode)
            .into_iter()
            .map(|q| (q.id.to_string(), Response::new(q.id, answer_for(q.kind))))
            .collect()
    }

    /// Life areas all rated `rating`.
    pub fn life_area_ratings(rating: u8) -> ResponseValue {
        ResponseValue::Ratings(LIFE_AREAS.iter().map(|a| (a.id.to_string(), rating)).collect())
    }

    pub fn active_reflection(year: i32, mode: Mode) -> Reflection {
        Reflection::start(year, mode, Period::YearEnd, None)
    }

    /// Completed `minutes` after it started, every question answered.
    pub fn completed_reflection(year: i32, mode: Mode, minutes: i64) -> Reflection {
        let mut reflection = Reflection::start(year, mode, Period::YearEnd, None);
        reflection.started_at = Utc::now() - Duration::minutes(minutes);
        reflection.responses = full_answers(mode);
        reflection.progress = 100;
        reflection.completed = true;
        reflection.completed_at = Some(Utc::now());
        reflection
    }

    /// A remote-confirmed reflection owned by `user_id`.
    pub fn synced_reflection(year: i32, mode: Mode, user_id: &UserId) -> Reflection {
        let mut reflection = completed_reflection(year, mode, 30);
        reflection.user_id = Some(user_id.clone());
        reflection.local_only = false;
        reflection.synced_at = Some(Utc::now());
        reflection
    }

    pub fn legacy_journey(year: i32, mode: Mode) -> LegacyJourney {
        let mut responses = ResponseMap::new();
        responses.insert(
            LIFE_AREAS_QUESTION.to_string(),
            Response::new(LIFE_AREAS_QUESTION, life_area_ratings(6)),
        );
        LegacyJourney {
            id: ReflectionId::new(format!("journey-{year}")),
            year,
            mode,
            progress: compass_core::calculate_progress(mode, &responses),
            responses,
            completed: true,
            started_at: Utc::now() - Duration::days(30),
            completed_at: Some(Utc::now() - Duration::days(29)),
        }
    }

    /// Snapshot written by an older client: legacy journeys only.
    pub fn legacy_snapshot(years: &[i32]) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for year in years {
            snapshot.journeys.insert(*year, legacy_journey(*year, Mode::Ok));
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::generators::*;
    use super::Mode;
    use compass_core::{calculate_progress, questions_for_mode};
    use proptest::prelude::*;

    #[test]
    fn full_answers_complete_every_mode() {
        for mode in Mode::ALL {
            assert_eq!(calculate_progress(*mode, &full_answers(*mode)), 100);
        }
    }

    #[test]
    fn legacy_snapshot_has_one_journey_per_year() {
        let snapshot = legacy_snapshot(&[2023, 2024]);
        assert_eq!(snapshot.journeys.len(), 2);
        assert!(snapshot.reflections.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn generated_maps_stay_within_mode(
            (mode, responses) in arb_mode().prop_flat_map(|m| (Just(m), arb_response_map(m)))
        ) {
            let questions = questions_for_mode(mode);
            prop_assert!(responses.keys().all(|k| questions.iter().any(|q| q.id == k)));
        }
    }
}

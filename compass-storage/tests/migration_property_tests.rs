use chrono::{TimeZone, Utc};
use compass_core::{Mode, Period, ReflectionId};
use compass_storage::{
    has_pending_upload, journey_to_reflection, local_data_summary, migrate_legacy_journeys,
    LegacyJourney, Snapshot,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

fn arb_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![Just(Mode::Quick), Just(Mode::Ok), Just(Mode::Deep)]
}

fn arb_journey(year: i32) -> impl Strategy<Value = LegacyJourney> {
    (arb_mode(), 0u8..=100, any::<bool>(), 0i64..1_700_000_000).prop_map(
        move |(mode, progress, completed, secs)| LegacyJourney {
            id: ReflectionId::new(format!("{secs}-legacy{year}")),
            year,
            mode,
            responses: BTreeMap::new(),
            progress,
            completed,
            started_at: Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now),
            completed_at: None,
        },
    )
}

fn arb_journeys() -> impl Strategy<Value = BTreeMap<i32, LegacyJourney>> {
    prop::collection::btree_set(2000i32..2030, 0..6).prop_flat_map(|years| {
        years
            .into_iter()
            .map(|year| arb_journey(year).prop_map(move |j| (year, j)))
            .collect::<Vec<_>>()
            .prop_map(|pairs| pairs.into_iter().collect())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn every_journey_lands_in_history(journeys in arb_journeys()) {
        let mut snapshot = Snapshot { journeys: journeys.clone(), ..Default::default() };

        let outcome = migrate_legacy_journeys(&mut snapshot);

        prop_assert_eq!(outcome.migrated, journeys.len());
        prop_assert!(snapshot.journeys.is_empty());
        for journey in journeys.values() {
            let reflection = snapshot.reflection(&journey.id);
            prop_assert!(reflection.is_some());
            let reflection = reflection.unwrap();
            prop_assert_eq!(reflection.period, Period::YearEnd);
            prop_assert_eq!(reflection.year, journey.year);
            prop_assert!(reflection.local_only);
        }
    }

    #[test]
    fn history_ids_stay_unique(journeys in arb_journeys(), preexisting in 0usize..3) {
        let mut snapshot = Snapshot { journeys: journeys.clone(), ..Default::default() };
        for journey in journeys.values().take(preexisting) {
            snapshot.reflections.push(journey_to_reflection(journey));
        }

        migrate_legacy_journeys(&mut snapshot);
        migrate_legacy_journeys(&mut snapshot);

        let ids: HashSet<_> = snapshot.reflections.iter().map(|r| r.id.clone()).collect();
        prop_assert_eq!(ids.len(), snapshot.reflections.len());
        prop_assert_eq!(snapshot.reflections.len(), journeys.len());
    }

    #[test]
    fn summary_is_stable_across_migration(journeys in arb_journeys()) {
        let mut snapshot = Snapshot { journeys, ..Default::default() };
        let before = local_data_summary(&snapshot);

        migrate_legacy_journeys(&mut snapshot);

        prop_assert_eq!(local_data_summary(&snapshot), before);
        prop_assert_eq!(has_pending_upload(&snapshot), !snapshot.reflections.is_empty());
    }
}

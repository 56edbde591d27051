//! Legacy snapshot migration.
//!
//! Older snapshots kept one journey per year with no period and no upgrade
//! chain. Start-up converts them into reflections; the legacy shape never
//! reaches engine logic.

use crate::snapshot::{LegacyJourney, Snapshot};
use compass_core::{Period, Reflection};
use std::collections::{BTreeSet, HashSet};

/// Result of a start-up migration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Journeys converted and appended to history.
    pub migrated: usize,
    /// Journeys skipped because their id was already in history.
    pub already_present: usize,
}

impl MigrationOutcome {
    pub fn changed(&self) -> bool {
        self.migrated > 0 || self.already_present > 0
    }
}

/// Convert a legacy journey. Total: every journey maps to a reflection.
pub fn journey_to_reflection(journey: &LegacyJourney) -> Reflection {
    Reflection {
        id: journey.id.clone(),
        user_id: None,
        year: journey.year,
        period: Period::YearEnd,
        period_label: None,
        mode: journey.mode,
        responses: journey.responses.clone(),
        progress: journey.progress.min(100),
        completed: journey.completed,
        started_at: journey.started_at,
        completed_at: journey.completed_at,
        upgraded_from: None,
        synced_at: None,
        local_only: true,
        pending_push: false,
    }
}

/// Move legacy journeys into history.
///
/// Journeys whose id is already in history are left alone. The legacy map is
/// emptied either way, so running this again is a no-op.
pub fn migrate_legacy_journeys(snapshot: &mut Snapshot) -> MigrationOutcome {
    let mut outcome = MigrationOutcome::default();
    if snapshot.journeys.is_empty() {
        return outcome;
    }

    let mut known: HashSet<_> = snapshot.reflections.iter().map(|r| r.id.clone()).collect();
    let journeys = std::mem::take(&mut snapshot.journeys);
    for journey in journeys.values() {
        if known.contains(&journey.id) {
            outcome.already_present += 1;
            continue;
        }
        known.insert(journey.id.clone());
        snapshot.reflections.push(journey_to_reflection(journey));
        outcome.migrated += 1;
    }

    tracing::info!(
        migrated = outcome.migrated,
        already_present = outcome.already_present,
        "Migrated legacy journeys into reflection history"
    );
    outcome
}

/// Whether the snapshot holds data the remote store does not have: legacy
/// journeys, local-only reflections, or confirmed reflections whose last
/// push failed.
pub fn has_pending_upload(snapshot: &Snapshot) -> bool {
    !snapshot.journeys.is_empty()
        || snapshot.reflections.iter().any(Reflection::is_unsynced)
        || snapshot
            .current_reflection
            .as_ref()
            .is_some_and(|r| r.pending_push || (r.local_only && !r.responses.is_empty()))
}

/// Summary shown before uploading local data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalDataSummary {
    pub reflection_count: usize,
    pub achievement_count: usize,
    /// Distinct years, newest first.
    pub years: Vec<i32>,
}

pub fn local_data_summary(snapshot: &Snapshot) -> LocalDataSummary {
    let years: BTreeSet<i32> = snapshot
        .journeys
        .values()
        .map(|j| j.year)
        .chain(snapshot.reflections.iter().map(|r| r.year))
        .collect();
    let legacy_only = snapshot
        .journeys
        .values()
        .filter(|j| snapshot.reflection(&j.id).is_none())
        .count();

    LocalDataSummary {
        reflection_count: snapshot.reflections.len() + legacy_only,
        achievement_count: snapshot.achievements.len(),
        years: years.into_iter().rev().collect(),
    }
}

//! Awaited cloud operations: uploading local data after sign-in and
//! hydrating history from the remote store.
//!
//! Unlike the background sync these return remote failures to the caller.

use crate::engine::ReflectionEngine;
use chrono::Utc;
use compass_core::{CompassError, CompassResult, Reflection, ReflectionId, Response};
use compass_storage::{NewReflection, ReflectionPatch};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Outcome of [`ReflectionEngine::migrate_local_to_cloud`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudMigrationReport {
    pub migrated_reflections: usize,
    pub migrated_achievements: usize,
    pub errors: Vec<String>,
}

impl CloudMigrationReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ReflectionEngine {
    /// Upload every local reflection the remote store has not fully received
    /// and every local achievement for the signed-in user.
    ///
    /// Local-only reflections are created in history order so an upgrade's
    /// source is confirmed before the upgrade itself, and `upgraded_from`
    /// links are rewritten to confirmed ids. An upgrade whose source failed
    /// to upload is skipped and reported as blocked. A reflection counts as
    /// migrated only once its progress and answers landed too; otherwise it
    /// is marked for a later retry. Per-item failures are collected in the
    /// report; the migration-pending signal clears only when there are none.
    pub async fn migrate_local_to_cloud(&mut self) -> CompassResult<CloudMigrationReport> {
        let user_id = self.user_id().ok_or(CompassError::NotAuthenticated)?;
        self.migrate_journeys_to_reflections();

        let candidates = self.upload_candidates();
        let local_ids: HashSet<ReflectionId> = candidates
            .iter()
            .filter(|r| r.local_only)
            .map(|r| r.id.clone())
            .collect();

        tracing::info!(
            %user_id,
            reflections = candidates.len(),
            achievements = self.state.achievements.len(),
            "Uploading local data"
        );

        let remote = Arc::clone(&self.remote);
        let mut report = CloudMigrationReport::default();
        let mut confirmed: HashMap<ReflectionId, Reflection> = HashMap::new();
        let mut pushed: HashMap<ReflectionId, bool> = HashMap::new();

        for reflection in &candidates {
            let target_id = if reflection.local_only {
                let mut new = NewReflection::from_reflection(reflection, &user_id);
                if let Some(source) = reflection.upgraded_from.as_ref() {
                    if local_ids.contains(source) {
                        let Some(created) = confirmed.get(source) else {
                            tracing::warn!(
                                reflection_id = %reflection.id,
                                upgraded_from = %source,
                                "Skipping upload of upgrade whose source was not uploaded"
                            );
                            report.errors.push(format!(
                                "reflection {} ({}): blocked, source {} was not uploaded",
                                reflection.year, reflection.id, source
                            ));
                            continue;
                        };
                        new.upgraded_from = Some(created.id.clone());
                    }
                }

                match remote.create_reflection(&new).await {
                    Ok(created) => {
                        let id = created.id.clone();
                        confirmed.insert(reflection.id.clone(), created);
                        id
                    }
                    Err(e) => {
                        tracing::warn!(reflection_id = %reflection.id, error = %e, "Reflection upload failed");
                        report
                            .errors
                            .push(format!("reflection {} ({}): {}", reflection.year, reflection.id, e));
                        continue;
                    }
                }
            } else {
                reflection.id.clone()
            };

            let patch = ReflectionPatch::completion_of(reflection);
            let responses: Vec<Response> = reflection.responses.values().cloned().collect();
            let details = async {
                remote.update_reflection(&target_id, &patch).await?;
                remote.upsert_responses(&target_id, &responses).await
            };
            match details.await {
                Ok(()) => {
                    report.migrated_reflections += 1;
                    pushed.insert(reflection.id.clone(), true);
                }
                Err(e) => {
                    tracing::warn!(reflection_id = %target_id, error = %e, "Reflection details upload failed");
                    report
                        .errors
                        .push(format!("reflection {} ({}): {}", reflection.year, target_id, e));
                    pushed.insert(reflection.id.clone(), false);
                }
            }
        }

        for achievement in &self.state.achievements {
            match remote
                .unlock_achievement(&user_id, achievement.achievement_type)
                .await
            {
                Ok(()) => report.migrated_achievements += 1,
                Err(e) => {
                    tracing::warn!(achievement_type = %achievement.achievement_type, error = %e, "Achievement upload failed");
                    report
                        .errors
                        .push(format!("achievement {}: {}", achievement.achievement_type, e));
                }
            }
        }

        self.apply_confirmed(&confirmed, &pushed);
        if report.success() {
            self.migration_pending = false;
        }
        self.persist();

        tracing::info!(
            migrated_reflections = report.migrated_reflections,
            migrated_achievements = report.migrated_achievements,
            errors = report.errors.len(),
            "Local data upload finished"
        );
        Ok(report)
    }

    /// Reflections with data the remote store lacks, history first.
    ///
    /// The current reflection contributes the flat answers, which may be
    /// newer than its history copy.
    fn upload_candidates(&self) -> Vec<Reflection> {
        let current = self.state.current_reflection.as_ref();
        let with_flat_answers = |reflection: &Reflection| {
            let mut reflection = reflection.clone();
            if current.is_some_and(|c| c.id == reflection.id) {
                reflection.responses = self.state.responses.clone();
            }
            reflection
        };

        let mut candidates: Vec<Reflection> = self
            .state
            .reflections
            .iter()
            .filter(|r| r.is_unsynced())
            .map(&with_flat_answers)
            .collect();
        if let Some(current) = current {
            if current.is_unsynced() && self.state.reflection(&current.id).is_none() {
                let mut current = with_flat_answers(current);
                if !current.completed {
                    current.progress = self.progress();
                }
                candidates.push(current);
            }
        }
        candidates
    }

    /// Replace history and achievements with the signed-in user's remote copy.
    ///
    /// Refused with [`CompassError::MigrationPending`] while local data still
    /// awaits upload.
    pub async fn load_from_cloud(&mut self) -> CompassResult<()> {
        let user_id = self.user_id().ok_or(CompassError::NotAuthenticated)?;
        if self.migration_pending {
            return Err(CompassError::MigrationPending);
        }

        let remote = Arc::clone(&self.remote);
        let tracker = Arc::clone(self.sync.tracker());
        tracker.begin();
        let loaded = async {
            let reflections = remote.list_reflections(&user_id).await?;
            let achievements = remote.list_achievements(&user_id).await?;
            Ok::<_, compass_core::RemoteError>((reflections, achievements))
        }
        .await;

        match loaded {
            Ok((reflections, achievements)) => {
                tracker.finish(true);
                self.replace_history(reflections, achievements, None);
                Ok(())
            }
            Err(e) => {
                tracker.finish(false);
                tracing::warn!(%user_id, error = %e, "Loading history from remote store failed");
                Err(e.into())
            }
        }
    }

    /// Move uploaded reflections onto their confirmed ids and record which
    /// still have progress or answers to send. Both maps are keyed by the
    /// id the reflection had before the upload.
    fn apply_confirmed(
        &mut self,
        confirmed: &HashMap<ReflectionId, Reflection>,
        pushed: &HashMap<ReflectionId, bool>,
    ) {
        let now = Utc::now();
        let targets = self
            .state
            .reflections
            .iter_mut()
            .chain(self.state.current_reflection.as_mut());
        for reflection in targets {
            if let Some(ok) = pushed.get(&reflection.id) {
                reflection.pending_push = !ok;
            }
            if let Some(created) = confirmed.get(&reflection.id) {
                reflection.id = created.id.clone();
                reflection.user_id = created.user_id.clone();
                reflection.local_only = false;
                reflection.synced_at = created.synced_at.or(Some(now));
            }
            if let Some(created) = reflection
                .upgraded_from
                .as_ref()
                .and_then(|id| confirmed.get(id))
            {
                reflection.upgraded_from = Some(created.id.clone());
            }
        }

        for (local_id, ok) in pushed {
            if *ok {
                let id = confirmed.get(local_id).map_or(local_id, |c| &c.id);
                self.failed_pushes.remove(id);
            }
        }
    }
}

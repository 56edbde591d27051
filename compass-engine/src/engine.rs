//! The reflection engine.
//!
//! Owns the authoritative state: current reflection, flat responses, history,
//! achievements and UI preferences. Every mutation is applied locally and
//! written to the snapshot store first; remote persistence follows in the
//! background and never rolls local state back.

use crate::achievements;
use crate::sync::{SyncEvent, SyncQueue};
use chrono::Utc;
use compass_core::{
    calculate_progress, questions_for_mode, validate_year, Achievement, AchievementType,
    CompassError, CompassResult, EntityType, Mode, Period, ProfilePatch, Question, Reflection,
    ReflectionId, Response, ResponseMap, ResponseValue, SyncStatus, Theme, Timestamp, UserId,
    UserProfile,
};
use compass_storage::{
    has_pending_upload, local_data_summary, migrate_legacy_journeys, LocalDataSummary,
    MigrationOutcome, NewReflection, ReflectionPatch, RemoteStore, Snapshot, SnapshotStore,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What the collaborator must do after a session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// Back to guest mode; nothing to do.
    SignedOut,
    /// Local data must be uploaded (`migrate_local_to_cloud`) before remote
    /// history can be loaded.
    MigrationPending,
    /// Remote history is being fetched in the background.
    HydrationQueued,
}

/// A reflection with the questions of its mode, in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportView {
    pub reflection: Reflection,
    pub questions: Vec<&'static Question>,
}

/// Local-first reflection state engine.
pub struct ReflectionEngine {
    pub(crate) state: Snapshot,
    pub(crate) user: Option<UserProfile>,
    pub(crate) last_saved: Option<Timestamp>,
    pub(crate) migration_pending: bool,
    pub(crate) snapshots: Box<dyn SnapshotStore>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) sync: SyncQueue,
    /// Local ids whose remote creation is in flight.
    pub(crate) creating: HashSet<ReflectionId>,
    pub(crate) push_generation: u64,
    /// Latest failed write generation per reflection.
    pub(crate) failed_pushes: HashMap<ReflectionId, u64>,
}

impl std::fmt::Debug for ReflectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionEngine")
            .field("state", &self.state)
            .field("user", &self.user)
            .field("last_saved", &self.last_saved)
            .field("migration_pending", &self.migration_pending)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl ReflectionEngine {
    /// Load the snapshot and run the legacy migration.
    ///
    /// A missing snapshot starts from defaults, as does a corrupt one (logged).
    pub fn new(snapshots: Box<dyn SnapshotStore>, remote: Arc<dyn RemoteStore>) -> Self {
        let state = match snapshots.load() {
            Ok(Some(state)) => state,
            Ok(None) => Snapshot::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot unreadable, starting from defaults");
                Snapshot::default()
            }
        };

        let mut engine = Self {
            state,
            user: None,
            last_saved: None,
            migration_pending: false,
            snapshots,
            remote,
            sync: SyncQueue::new(),
            creating: HashSet::new(),
            push_generation: 0,
            failed_pushes: HashMap::new(),
        };
        engine.migrate_journeys_to_reflections();
        engine
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn current_reflection(&self) -> Option<&Reflection> {
        self.state.current_reflection.as_ref()
    }

    pub fn history(&self) -> &[Reflection] {
        &self.state.reflections
    }

    pub fn reflection(&self, id: &ReflectionId) -> Option<&Reflection> {
        self.state.reflection(id)
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.state.achievements
    }

    pub fn has_achievement(&self, achievement_type: AchievementType) -> bool {
        self.state
            .achievements
            .iter()
            .any(|a| a.achievement_type == achievement_type)
    }

    pub fn responses(&self) -> &ResponseMap {
        &self.state.responses
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_guest(&self) -> bool {
        self.state.is_guest
    }

    pub fn theme(&self) -> Theme {
        self.state.theme
    }

    pub fn has_seen_welcome(&self) -> bool {
        self.state.has_seen_welcome
    }

    pub fn current_question_index(&self) -> usize {
        self.state.current_question_index
    }

    pub fn mode(&self) -> Option<Mode> {
        self.state.mode
    }

    pub fn current_year(&self) -> Option<i32> {
        self.state.current_year
    }

    pub fn journey_started_at(&self) -> Option<Timestamp> {
        self.state.journey_started_at
    }

    pub fn last_saved(&self) -> Option<Timestamp> {
        self.last_saved
    }

    pub fn migration_pending(&self) -> bool {
        self.migration_pending
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.tracker().status()
    }

    pub fn last_synced_at(&self) -> Option<Timestamp> {
        self.sync.tracker().last_synced_at()
    }

    pub(crate) fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id.clone())
    }

    // ========================================================================
    // REFLECTION LIFECYCLE
    // ========================================================================

    /// Begin a new reflection and make it current.
    ///
    /// It stays local-only until the remote store confirms creation.
    pub fn start_reflection(
        &mut self,
        year: i32,
        mode: Mode,
        period: Period,
    ) -> CompassResult<&Reflection> {
        let year = validate_year(year)?;
        let reflection = Reflection::start(year, mode, period, self.user_id());
        tracing::info!(reflection_id = %reflection.id, year, %mode, %period, "Reflection started");

        self.state.current_year = Some(year);
        self.state.mode = Some(mode);
        self.state.responses.clear();
        self.state.current_question_index = 0;
        self.state.journey_started_at = Some(reflection.started_at);
        self.state.current_reflection = Some(reflection.clone());
        self.persist();

        self.queue_create(&reflection);
        self.current_reflection_or_err()
    }

    /// Parse-and-start for callers holding raw strings.
    pub fn start_reflection_str(
        &mut self,
        year: i32,
        mode: &str,
        period: &str,
    ) -> CompassResult<&Reflection> {
        let mode = Mode::from_db_str(mode)?;
        let period = Period::from_db_str(period)?;
        self.start_reflection(year, mode, period)
    }

    /// Record an answer. Progress is not recomputed here.
    pub fn set_response(&mut self, question_id: &str, value: ResponseValue) {
        let response = Response::new(question_id, value);
        let now = response.updated_at;
        self.state
            .responses
            .insert(question_id.to_string(), response.clone());
        if let Some(current) = self.state.current_reflection.as_mut() {
            current
                .responses
                .insert(question_id.to_string(), response.clone());
        }
        self.last_saved = Some(now);
        self.persist();

        // Local-only reflections get their responses re-sent on confirmation.
        let target = self
            .state
            .current_reflection
            .as_ref()
            .filter(|r| !r.local_only)
            .map(|r| r.id.clone());
        if let Some(reflection_id) = target.filter(|_| self.user.is_some()) {
            let failed = SyncEvent::PushFailed {
                id: reflection_id.clone(),
                generation: self.next_push_generation(),
            };
            let remote = Arc::clone(&self.remote);
            self.sync.spawn_or_report(
                "upsert_response",
                async move {
                    remote.upsert_response(&reflection_id, &response).await?;
                    Ok(None)
                },
                failed,
            );
        }
    }

    /// Progress of the current mode over the flat responses.
    pub fn progress(&self) -> u8 {
        let mode = self
            .state
            .current_reflection
            .as_ref()
            .map(|r| r.mode)
            .or(self.state.mode);
        match mode {
            Some(mode) => calculate_progress(mode, &self.state.responses),
            None => 0,
        }
    }

    /// Freeze the current reflection as completed and evaluate achievements.
    ///
    /// Returns the achievement types newly unlocked. Completing again keeps
    /// the first `completed_at`.
    pub fn complete_reflection(&mut self) -> Vec<AchievementType> {
        let responses = self.state.responses.clone();
        let Some(current) = self.state.current_reflection.as_mut() else {
            return Vec::new();
        };
        current.responses = responses;
        current.progress = 100;
        current.completed = true;
        if current.completed_at.is_none() {
            current.completed_at = Some(Utc::now());
        }
        let completed = current.clone();
        tracing::info!(reflection_id = %completed.id, mode = %completed.mode, "Reflection completed");

        match self.state.reflection_mut(&completed.id) {
            Some(existing) => *existing = completed.clone(),
            None => self.state.reflections.push(completed.clone()),
        }
        self.persist();

        if self.user.is_some() && !completed.local_only {
            self.queue_push(&completed);
        }

        let earned = achievements::evaluate(&self.state.reflections, &self.state.responses);
        earned
            .into_iter()
            .filter(|t| self.unlock_achievement(*t))
            .collect()
    }

    /// Make a history reflection current. Unknown ids are ignored.
    pub fn load_reflection(&mut self, id: &ReflectionId) -> bool {
        let Some(reflection) = self.state.reflection(id).cloned() else {
            tracing::debug!(reflection_id = %id, "load_reflection: not in history");
            return false;
        };
        self.state.current_year = Some(reflection.year);
        self.state.mode = Some(reflection.mode);
        self.state.responses = reflection.responses.clone();
        self.state.current_question_index = 0;
        self.state.journey_started_at = Some(reflection.started_at);
        self.state.current_reflection = Some(reflection);
        self.persist();
        true
    }

    /// Start a deeper reflection pre-filled with the answers of `from_id`.
    ///
    /// The source is left untouched; the new reflection links back to it.
    /// While the source is still local-only, remote creation of the upgrade
    /// waits for the source to be confirmed so the link points at a remote id.
    pub fn upgrade_mode(&mut self, from_id: &ReflectionId, to_mode: Mode) -> CompassResult<&Reflection> {
        let source = self
            .state
            .reflection(from_id)
            .cloned()
            .ok_or_else(|| CompassError::NotFound {
                entity_type: EntityType::Reflection,
                id: from_id.to_string(),
            })?;
        if !to_mode.is_deeper_than(source.mode) {
            return Err(CompassError::InvalidUpgrade {
                from: source.mode,
                to: to_mode,
            });
        }

        let mut upgraded = Reflection::start(source.year, to_mode, source.period, self.user_id());
        upgraded.period_label = source.period_label.clone();
        upgraded.responses = source.responses.clone();
        upgraded.progress = calculate_progress(to_mode, &upgraded.responses);
        upgraded.upgraded_from = Some(source.id.clone());
        tracing::info!(
            reflection_id = %upgraded.id,
            upgraded_from = %source.id,
            from = %source.mode,
            to = %to_mode,
            "Reflection upgraded"
        );

        self.state.current_year = Some(upgraded.year);
        self.state.mode = Some(to_mode);
        self.state.responses = upgraded.responses.clone();
        self.state.current_question_index = 0;
        self.state.journey_started_at = Some(upgraded.started_at);
        self.state.current_reflection = Some(upgraded.clone());
        self.state.reflections.push(upgraded.clone());
        self.persist();

        self.queue_create(&upgraded);
        self.current_reflection_or_err()
    }

    /// Modes a reflection can still be upgraded to, shallowest first.
    pub fn can_upgrade(reflection: &Reflection) -> Vec<Mode> {
        reflection.mode.deeper_modes()
    }

    /// Drop the current reflection and flat answers. History is kept.
    pub fn reset_current_journey(&mut self) {
        self.state.current_reflection = None;
        self.state.mode = None;
        self.state.responses.clear();
        self.state.current_question_index = 0;
        self.state.journey_started_at = None;
        self.persist();
    }

    /// Convert legacy journeys into history. Idempotent; runs on every load.
    pub fn migrate_journeys_to_reflections(&mut self) -> MigrationOutcome {
        let outcome = migrate_legacy_journeys(&mut self.state);
        if outcome.changed() {
            self.persist();
        }
        outcome
    }

    // ========================================================================
    // ACHIEVEMENTS
    // ========================================================================

    /// Unlock an achievement. Returns `false` if it was already unlocked.
    pub fn unlock_achievement(&mut self, achievement_type: AchievementType) -> bool {
        if self.has_achievement(achievement_type) {
            return false;
        }
        self.state
            .achievements
            .push(Achievement::unlock(achievement_type));
        tracing::info!(%achievement_type, "Achievement unlocked");
        self.persist();

        if let Some(user_id) = self.user_id() {
            let remote = Arc::clone(&self.remote);
            self.sync.spawn("unlock_achievement", async move {
                remote.unlock_achievement(&user_id, achievement_type).await?;
                Ok(None)
            });
        }
        true
    }

    // ========================================================================
    // SESSION AND PREFERENCES
    // ========================================================================

    /// Attach or detach the authenticated user.
    ///
    /// Signing in with local data the remote store has never seen raises the
    /// migration-pending signal instead of hydrating, which would overwrite it.
    pub fn set_user(&mut self, user: Option<UserProfile>) -> SessionTransition {
        self.state.is_guest = user.is_none();
        self.user = user;

        let Some(user_id) = self.user_id() else {
            self.migration_pending = false;
            self.persist();
            tracing::info!("Signed out");
            return SessionTransition::SignedOut;
        };

        self.persist();
        if has_pending_upload(&self.state) {
            self.migration_pending = true;
            tracing::info!(%user_id, "Signed in with local data pending upload");
            return SessionTransition::MigrationPending;
        }

        self.migration_pending = false;
        let requested_at = Utc::now();
        let remote = Arc::clone(&self.remote);
        self.sync.spawn("load_history", async move {
            let reflections = remote.list_reflections(&user_id).await?;
            let achievements = remote.list_achievements(&user_id).await?;
            Ok(Some(SyncEvent::HistoryLoaded {
                reflections,
                achievements,
                requested_at,
            }))
        });
        SessionTransition::HydrationQueued
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.state.theme = theme;
        self.persist();
    }

    pub fn set_has_seen_welcome(&mut self, seen: bool) {
        self.state.has_seen_welcome = seen;
        self.persist();
    }

    pub fn set_question_index(&mut self, index: usize) {
        self.state.current_question_index = index;
        self.persist();
    }

    /// Update the signed-in user's profile locally and remotely.
    pub fn update_profile(&mut self, patch: ProfilePatch) -> CompassResult<&UserProfile> {
        let user = self.user.as_mut().ok_or(CompassError::NotAuthenticated)?;
        user.apply(&patch);
        user.updated_at = Some(Utc::now());
        let user_id = user.id.clone();

        let remote = Arc::clone(&self.remote);
        self.sync.spawn("update_profile", async move {
            let stored = remote.update_profile(&user_id, &patch).await?;
            Ok(stored.map(SyncEvent::ProfileUpdated))
        });
        self.user.as_ref().ok_or(CompassError::NotAuthenticated)
    }

    // ========================================================================
    // SYNC
    // ========================================================================

    /// Push the current reflection's progress and answers to the remote
    /// store, creating it first if it was never confirmed.
    ///
    /// Returns `false` when there is nothing to push or no user.
    pub fn sync_current(&mut self) -> bool {
        if self.user.is_none() {
            return false;
        }
        let Some(mut current) = self.state.current_reflection.clone() else {
            return false;
        };
        if current.local_only {
            let root = self.unconfirmed_root(&current);
            self.queue_create(&root);
            return true;
        }
        current.responses = self.state.responses.clone();
        if !current.completed {
            current.progress = self.progress();
        }
        self.queue_push(&current);
        true
    }

    /// Apply events posted by finished background calls. Returns how many
    /// were applied.
    pub fn process_sync_events(&mut self) -> usize {
        let events = self.sync.drain_events();
        let count = events.len();
        for event in events {
            self.apply_event(event);
        }
        count
    }

    /// Wait until no background call is in flight and every event, including
    /// those from follow-up calls, has been applied.
    pub async fn settle(&mut self) {
        loop {
            self.sync.wait_idle().await;
            let applied = self.process_sync_events();
            if applied == 0 && self.sync.is_idle() {
                break;
            }
        }
    }

    fn apply_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::ReflectionCreated { local_id, remote } => {
                self.creating.remove(&local_id);
                self.reconcile_created(&local_id, remote)
            }
            SyncEvent::CreateFailed { local_id } => {
                self.creating.remove(&local_id);
            }
            SyncEvent::ReflectionPushed { id, generation } => {
                let superseded = self
                    .failed_pushes
                    .get(&id)
                    .is_some_and(|failed| *failed > generation);
                if !superseded {
                    self.failed_pushes.remove(&id);
                    self.set_pending_push(&id, false);
                }
            }
            SyncEvent::PushFailed { id, generation } => {
                let latest = self.failed_pushes.entry(id.clone()).or_insert(generation);
                *latest = (*latest).max(generation);
                self.set_pending_push(&id, true);
            }
            SyncEvent::HistoryLoaded {
                reflections,
                achievements,
                requested_at,
            } => {
                if self.migration_pending {
                    tracing::warn!("Discarding remote history while local upload is pending");
                    return;
                }
                self.replace_history(reflections, achievements, Some(requested_at));
            }
            SyncEvent::ProfileUpdated(profile) => {
                if let Some(user) = self.user.as_mut().filter(|u| u.id == profile.id) {
                    *user = profile;
                }
            }
        }
    }

    /// Move a confirmed reflection onto its remote id and re-send its answers
    /// under that id.
    fn reconcile_created(&mut self, local_id: &ReflectionId, remote: Reflection) {
        let confirmed = remote.id.clone();
        let mut found = false;

        let targets = self
            .state
            .reflections
            .iter_mut()
            .chain(self.state.current_reflection.as_mut());
        for reflection in targets {
            if &reflection.id == local_id {
                reflection.id = confirmed.clone();
                reflection.local_only = false;
                reflection.synced_at = remote.synced_at.or_else(|| Some(Utc::now()));
                reflection.user_id = remote.user_id.clone();
                found = true;
            }
            if reflection.upgraded_from.as_ref() == Some(local_id) {
                reflection.upgraded_from = Some(confirmed.clone());
            }
        }

        if !found {
            tracing::debug!(local_id = %local_id, "Created reflection no longer held locally");
            return;
        }
        tracing::info!(local_id = %local_id, reflection_id = %confirmed, "Reflection confirmed by remote store");
        self.persist();

        let is_current = self
            .state
            .current_reflection
            .as_ref()
            .is_some_and(|r| r.id == confirmed);
        let pending = if is_current {
            self.state.current_reflection.clone().map(|mut r| {
                r.responses = self.state.responses.clone();
                if !r.completed {
                    r.progress = self.progress();
                }
                r
            })
        } else {
            self.state.reflection(&confirmed).cloned()
        };
        if let Some(reflection) = pending {
            if self.user.is_some() {
                self.queue_push(&reflection);
            }
        }

        // Upgrades held back until their source had a remote id.
        let mut dependents: Vec<Reflection> = Vec::new();
        for reflection in self
            .state
            .reflections
            .iter()
            .chain(self.state.current_reflection.as_ref())
        {
            if reflection.local_only
                && reflection.upgraded_from.as_ref() == Some(&confirmed)
                && !dependents.iter().any(|d| d.id == reflection.id)
            {
                dependents.push(reflection.clone());
            }
        }
        for dependent in &dependents {
            self.queue_create(dependent);
        }
    }

    /// Replace history and achievements with the remote copy.
    ///
    /// Local reflections the remote copy lacks are kept when they still
    /// carry unsent data, or when they were confirmed after `requested_at`
    /// and so could not be in the fetched list.
    pub(crate) fn replace_history(
        &mut self,
        reflections: Vec<Reflection>,
        achievements: Vec<Achievement>,
        requested_at: Option<Timestamp>,
    ) {
        let remote_ids: HashSet<ReflectionId> =
            reflections.iter().map(|r| r.id.clone()).collect();
        let kept: Vec<Reflection> = self
            .state
            .reflections
            .drain(..)
            .filter(|r| !remote_ids.contains(&r.id))
            .filter(|r| {
                r.is_unsynced()
                    || requested_at
                        .zip(r.synced_at)
                        .is_some_and(|(requested, synced)| synced >= requested)
            })
            .collect();

        let mut seen = HashSet::new();
        let mut merged_achievements: Vec<Achievement> = achievements
            .into_iter()
            .filter(|a| seen.insert(a.achievement_type))
            .collect();
        if let Some(requested) = requested_at {
            for achievement in &self.state.achievements {
                if achievement.unlocked_at >= requested && seen.insert(achievement.achievement_type) {
                    merged_achievements.push(achievement.clone());
                }
            }
        }

        tracing::info!(
            reflections = reflections.len(),
            kept_local = kept.len(),
            achievements = merged_achievements.len(),
            "History loaded from remote store"
        );
        self.state.reflections = reflections;
        self.state.reflections.extend(kept);
        self.state.achievements = merged_achievements;
        self.persist();
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// A reflection from history (or the current one) with its questions.
    pub fn export_view(&self, id: &ReflectionId) -> Option<ExportView> {
        let reflection = self.state.reflection(id).or_else(|| {
            self.state
                .current_reflection
                .as_ref()
                .filter(|r| &r.id == id)
        })?;
        Some(ExportView {
            questions: questions_for_mode(reflection.mode),
            reflection: reflection.clone(),
        })
    }

    /// Counts shown before uploading local data.
    pub fn local_data_summary(&self) -> LocalDataSummary {
        local_data_summary(&self.state)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Write the snapshot. Failures are logged, never propagated.
    pub(crate) fn persist(&mut self) {
        if let Err(e) = self.snapshots.save(&self.state) {
            tracing::error!(error = %e, "Failed to write snapshot");
        }
    }

    fn current_reflection_or_err(&self) -> CompassResult<&Reflection> {
        self.state
            .current_reflection
            .as_ref()
            .ok_or_else(|| CompassError::NotFound {
                entity_type: EntityType::Reflection,
                id: "current".to_string(),
            })
    }

    /// Queue remote creation of a local reflection when a user is attached.
    ///
    /// Skipped while the same create is in flight, and while the reflection
    /// is an upgrade of a source that is itself still local-only.
    fn queue_create(&mut self, reflection: &Reflection) {
        let Some(user_id) = self.user_id() else {
            return;
        };
        if let Some(source) = self.local_source(reflection) {
            tracing::debug!(
                reflection_id = %reflection.id,
                upgraded_from = %source.id,
                "Deferring create until source is confirmed"
            );
            return;
        }
        if !self.creating.insert(reflection.id.clone()) {
            return;
        }
        let new = NewReflection::from_reflection(reflection, &user_id);
        let failed = SyncEvent::CreateFailed {
            local_id: new.id.clone(),
        };
        let remote = Arc::clone(&self.remote);
        self.sync.spawn_or_report(
            "create_reflection",
            async move {
                let created = remote.create_reflection(&new).await?;
                Ok(Some(SyncEvent::ReflectionCreated {
                    local_id: new.id,
                    remote: created,
                }))
            },
            failed,
        );
    }

    /// Queue the progress patch and a batch upsert of `reflection`'s answers.
    fn queue_push(&mut self, reflection: &Reflection) {
        let id = reflection.id.clone();
        let generation = self.next_push_generation();
        let patch = ReflectionPatch::completion_of(reflection);
        let responses: Vec<Response> = reflection.responses.values().cloned().collect();
        let failed = SyncEvent::PushFailed {
            id: id.clone(),
            generation,
        };
        let remote = Arc::clone(&self.remote);
        self.sync.spawn_or_report(
            "push_reflection",
            async move {
                remote.update_reflection(&id, &patch).await?;
                remote.upsert_responses(&id, &responses).await?;
                Ok(Some(SyncEvent::ReflectionPushed { id, generation }))
            },
            failed,
        );
    }

    fn next_push_generation(&mut self) -> u64 {
        self.push_generation += 1;
        self.push_generation
    }

    /// The locally held, still local-only reflection `reflection` was
    /// upgraded from.
    fn local_source(&self, reflection: &Reflection) -> Option<&Reflection> {
        let source_id = reflection.upgraded_from.as_ref()?;
        self.state
            .reflections
            .iter()
            .chain(self.state.current_reflection.as_ref())
            .find(|r| &r.id == source_id && r.local_only)
    }

    /// First reflection up the upgrade chain that can be created now.
    fn unconfirmed_root(&self, reflection: &Reflection) -> Reflection {
        let mut root = reflection;
        let mut visited = HashSet::new();
        while let Some(source) = self.local_source(root) {
            if !visited.insert(source.id.clone()) {
                break;
            }
            root = source;
        }
        root.clone()
    }

    fn set_pending_push(&mut self, id: &ReflectionId, pending: bool) {
        let mut changed = false;
        let targets = self
            .state
            .reflections
            .iter_mut()
            .chain(self.state.current_reflection.as_mut());
        for reflection in targets.filter(|r| &r.id == id) {
            if reflection.pending_push != pending {
                reflection.pending_push = pending;
                changed = true;
            }
        }
        if changed {
            if pending {
                tracing::warn!(reflection_id = %id, "Reflection has unsent changes");
            }
            self.persist();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::{THREE_WORDS_QUESTION, WORD_OF_YEAR_QUESTION};
    use compass_storage::{InMemorySnapshotStore, MockRemoteStore};

    fn engine() -> ReflectionEngine {
        ReflectionEngine::new(
            Box::new(InMemorySnapshotStore::new()),
            Arc::new(MockRemoteStore::new()),
        )
    }

    #[test]
    fn start_rejects_out_of_range_year() {
        let mut engine = engine();
        let err = engine
            .start_reflection(1800, Mode::Quick, Period::YearEnd)
            .unwrap_err();
        assert!(matches!(err, CompassError::InvalidInput(_)));
        assert!(engine.current_reflection().is_none());
    }

    #[test]
    fn start_from_strings_validates_enums() {
        let mut engine = engine();
        assert!(engine.start_reflection_str(2025, "quick", "mid_year").is_ok());
        assert!(matches!(
            engine.start_reflection_str(2025, "extreme", "mid_year"),
            Err(CompassError::InvalidInput(_))
        ));
    }

    #[test]
    fn partial_quick_answers_give_partial_progress() {
        let mut engine = engine();
        engine
            .start_reflection(2025, Mode::Quick, Period::YearEnd)
            .unwrap();
        engine.set_response(THREE_WORDS_QUESTION, ResponseValue::list(["a", "b", "c"]));
        engine.set_response(WORD_OF_YEAR_QUESTION, ResponseValue::text("steady"));

        let progress = engine.progress();
        assert!(progress > 0 && progress < 100);
        assert!(engine.last_saved().is_some());
        assert_eq!(engine.current_reflection().unwrap().progress, 0);
    }

    #[test]
    fn set_response_without_reflection_only_touches_flat_map() {
        let mut engine = engine();
        engine.set_response("unlisted_question", ResponseValue::text("kept"));
        assert!(engine.responses().contains_key("unlisted_question"));
        assert_eq!(engine.progress(), 0);
    }

    #[test]
    fn complete_without_current_is_noop() {
        let mut engine = engine();
        assert!(engine.complete_reflection().is_empty());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn second_completion_keeps_first_timestamp() {
        let mut engine = engine();
        engine
            .start_reflection(2025, Mode::Quick, Period::YearEnd)
            .unwrap();
        engine.complete_reflection();
        let first = engine.current_reflection().unwrap().completed_at;

        engine.set_response(WORD_OF_YEAR_QUESTION, ResponseValue::text("later"));
        engine.complete_reflection();

        let current = engine.current_reflection().unwrap();
        assert_eq!(current.completed_at, first);
        assert_eq!(current.progress, 100);
        assert!(current.has_answer(WORD_OF_YEAR_QUESTION));
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn upgrade_copies_answers_and_links_source() {
        let mut engine = engine();
        let source_id = engine
            .start_reflection(2025, Mode::Quick, Period::YearEnd)
            .unwrap()
            .id
            .clone();
        engine.set_response(WORD_OF_YEAR_QUESTION, ResponseValue::text("bold"));
        engine.complete_reflection();

        let upgraded = engine.upgrade_mode(&source_id, Mode::Deep).unwrap().clone();

        assert_eq!(upgraded.upgraded_from, Some(source_id.clone()));
        assert_eq!(upgraded.mode, Mode::Deep);
        assert!(!upgraded.completed);
        assert_eq!(
            upgraded.value(WORD_OF_YEAR_QUESTION),
            Some(&ResponseValue::text("bold"))
        );
        assert!(ReflectionEngine::can_upgrade(&upgraded).is_empty());
        assert!(engine.reflection(&source_id).unwrap().completed);
        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn downgrade_is_rejected_without_change() {
        let mut engine = engine();
        let id = engine
            .start_reflection(2025, Mode::Deep, Period::YearEnd)
            .unwrap()
            .id
            .clone();
        engine.complete_reflection();

        let err = engine.upgrade_mode(&id, Mode::Quick).unwrap_err();

        assert_eq!(
            err,
            CompassError::InvalidUpgrade {
                from: Mode::Deep,
                to: Mode::Quick
            }
        );
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn upgrade_unknown_source_is_not_found() {
        let mut engine = engine();
        let err = engine
            .upgrade_mode(&ReflectionId::new("missing"), Mode::Deep)
            .unwrap_err();
        assert!(matches!(err, CompassError::NotFound { .. }));
    }

    #[test]
    fn load_reflection_hydrates_flat_state() {
        let mut engine = engine();
        let id = engine
            .start_reflection(2024, Mode::Ok, Period::MidYear)
            .unwrap()
            .id
            .clone();
        engine.set_response(WORD_OF_YEAR_QUESTION, ResponseValue::text("calm"));
        engine.complete_reflection();
        engine.reset_current_journey();
        assert!(engine.responses().is_empty());

        assert!(engine.load_reflection(&id));
        assert_eq!(engine.mode(), Some(Mode::Ok));
        assert_eq!(engine.current_question_index(), 0);
        assert!(engine.responses().contains_key(WORD_OF_YEAR_QUESTION));
        assert!(!engine.load_reflection(&ReflectionId::new("nope")));
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut engine = engine();
        assert!(engine.unlock_achievement(AchievementType::Sharer));
        assert!(!engine.unlock_achievement(AchievementType::Sharer));
        assert_eq!(engine.achievements().len(), 1);
    }

    #[test]
    fn guest_remote_work_is_never_queued() {
        let remote = Arc::new(MockRemoteStore::new());
        let mut engine = ReflectionEngine::new(
            Box::new(InMemorySnapshotStore::new()),
            remote.clone(),
        );
        engine
            .start_reflection(2025, Mode::Quick, Period::YearEnd)
            .unwrap();
        engine.set_response(WORD_OF_YEAR_QUESTION, ResponseValue::text("solo"));
        engine.complete_reflection();

        assert!(remote.calls().is_empty());
        assert_eq!(engine.sync_status(), SyncStatus::Idle);
    }

    #[test]
    fn history_load_keeps_reflections_newer_than_the_request() {
        let mut engine = engine();
        let requested_at = Utc::now() - chrono::Duration::minutes(1);
        let confirmed = |year, synced_at| {
            let mut reflection = Reflection::start(year, Mode::Quick, Period::YearEnd, None);
            reflection.local_only = false;
            reflection.synced_at = Some(synced_at);
            reflection
        };
        let stale = confirmed(2022, requested_at - chrono::Duration::minutes(1));
        let fresh = confirmed(2025, Utc::now());
        let unsent = Reflection::start(2024, Mode::Quick, Period::YearEnd, None);
        engine.state.reflections = vec![stale, fresh.clone(), unsent.clone()];
        engine.unlock_achievement(AchievementType::Sharer);
        let remote_copy = confirmed(2023, requested_at);

        engine.apply_event(SyncEvent::HistoryLoaded {
            reflections: vec![remote_copy.clone()],
            achievements: Vec::new(),
            requested_at,
        });

        let ids: Vec<ReflectionId> = engine.history().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![remote_copy.id, fresh.id, unsent.id]);
        assert!(engine.has_achievement(AchievementType::Sharer));
    }

    #[test]
    fn older_successful_push_does_not_clear_a_later_failure() {
        let mut engine = engine();
        let id = engine
            .start_reflection(2025, Mode::Quick, Period::YearEnd)
            .unwrap()
            .id
            .clone();
        let pending = |engine: &ReflectionEngine| engine.current_reflection().unwrap().pending_push;

        engine.apply_event(SyncEvent::PushFailed {
            id: id.clone(),
            generation: 2,
        });
        assert!(pending(&engine));
        engine.apply_event(SyncEvent::ReflectionPushed {
            id: id.clone(),
            generation: 1,
        });
        assert!(pending(&engine));
        engine.apply_event(SyncEvent::ReflectionPushed { id, generation: 3 });
        assert!(!pending(&engine));
    }

    #[test]
    fn export_view_lists_mode_questions() {
        let mut engine = engine();
        let id = engine
            .start_reflection(2025, Mode::Quick, Period::YearEnd)
            .unwrap()
            .id
            .clone();
        let view = engine.export_view(&id).unwrap();
        assert_eq!(view.questions.len(), questions_for_mode(Mode::Quick).len());
        assert!(engine.export_view(&ReflectionId::new("nope")).is_none());
    }
}

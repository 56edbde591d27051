//! In-memory implementations of the storage ports for testing.

use crate::snapshot::{Snapshot, SnapshotEnvelope};
use crate::{NewReflection, ReflectionPatch, RemoteStore, SnapshotStore};
use async_trait::async_trait;
use chrono::Utc;
use compass_core::{
    Achievement, AchievementType, EntityType, Mode, ProfilePatch, QuestionId, Reflection,
    ReflectionId, RemoteError, Response, SnapshotError, UserId, UserProfile,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

// ============================================================================
// SNAPSHOT STORE
// ============================================================================

/// In-memory snapshot store.
///
/// Keeps the serialized envelope rather than the struct so tests can seed a
/// corrupt blob and see exactly what a real store would have written.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    raw: Mutex<Option<String>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`.
    pub fn with_snapshot(snapshot: &Snapshot) -> Self {
        let store = Self::new();
        if let Ok(raw) = serde_json::to_string(&SnapshotEnvelope::wrap(snapshot.clone())) {
            *lock(&store.raw) = Some(raw);
        }
        store
    }

    /// Store pre-seeded with an arbitrary blob, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        *lock(&store.raw) = Some(raw.into());
        store
    }

    /// The last stored snapshot, if it parses.
    pub fn stored(&self) -> Option<Snapshot> {
        lock(&self.raw)
            .as_deref()
            .and_then(|raw| serde_json::from_str::<SnapshotEnvelope>(raw).ok())
            .map(|envelope| envelope.state)
    }

    pub fn raw(&self) -> Option<String> {
        lock(&self.raw).clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }

    /// Make every subsequent save fail with an IO error.
    pub fn set_fail_saves(&self, fail: bool) {
        *lock(&self.fail_saves) = fail;
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let raw = self.raw.lock().map_err(|_| SnapshotError::LockPoisoned)?;
        match raw.as_deref() {
            None => Ok(None),
            Some(raw) => {
                let envelope = serde_json::from_str::<SnapshotEnvelope>(raw)?;
                Ok(Some(envelope.state))
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if *lock(&self.fail_saves) {
            return Err(SnapshotError::Io {
                reason: "simulated write failure".to_string(),
            });
        }
        let raw = serde_json::to_string(&SnapshotEnvelope::wrap(snapshot.clone()))?;
        *self.raw.lock().map_err(|_| SnapshotError::LockPoisoned)? = Some(raw);
        *lock(&self.saves) += 1;
        Ok(())
    }
}

// ============================================================================
// REMOTE STORE
// ============================================================================

/// One call received by [`MockRemoteStore`], recorded before failure
/// injection is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    CreateReflection {
        id: ReflectionId,
        year: i32,
        mode: Mode,
        upgraded_from: Option<ReflectionId>,
    },
    GetReflection {
        id: ReflectionId,
    },
    UpdateReflection {
        id: ReflectionId,
        patch: ReflectionPatch,
    },
    UpsertResponses {
        reflection_id: ReflectionId,
        question_ids: Vec<QuestionId>,
    },
    UnlockAchievement {
        user_id: UserId,
        achievement_type: AchievementType,
    },
    ListReflections {
        user_id: UserId,
    },
    ListAchievements {
        user_id: UserId,
    },
    GetProfile {
        user_id: UserId,
    },
    UpdateProfile {
        user_id: UserId,
        patch: ProfilePatch,
    },
}

#[derive(Debug, Default)]
struct RemoteState {
    reflections: Vec<Reflection>,
    achievements: HashMap<UserId, Vec<Achievement>>,
    profiles: HashMap<UserId, UserProfile>,
    calls: Vec<RemoteCall>,
    fail_all: Option<RemoteError>,
    fail_next: usize,
    fail_upserts: usize,
    assign_ids: bool,
}

impl RemoteState {
    fn record(&mut self, call: RemoteCall) -> Result<(), RemoteError> {
        self.calls.push(call);
        if let Some(err) = &self.fail_all {
            return Err(err.clone());
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(RemoteError::Transport {
                reason: "simulated transient failure".to_string(),
            });
        }
        Ok(())
    }

    fn reflection_mut(&mut self, id: &ReflectionId) -> Result<&mut Reflection, RemoteError> {
        self.reflections
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::NotFound {
                entity_type: EntityType::Reflection,
                id: id.to_string(),
            })
    }
}

/// In-memory remote store with a call log, failure injection and a gate
/// that holds reflection creation until released.
#[derive(Debug)]
pub struct MockRemoteStore {
    state: Arc<Mutex<RemoteState>>,
    creates_paused: watch::Sender<bool>,
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        let (creates_paused, _) = watch::channel(false);
        Self {
            state: Arc::default(),
            creates_paused,
        }
    }
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign fresh ids on creation instead of keeping the client's.
    pub fn assigning_ids() -> Self {
        let store = Self::new();
        store.state().assign_ids = true;
        store
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        lock(&self.state)
    }

    // === Failure injection ===

    /// Fail every call with `err` until cleared with `None`.
    pub fn fail_all(&self, err: Option<RemoteError>) {
        self.state().fail_all = err;
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.state().fail_next = n;
    }

    /// Fail the next `n` response upserts, letting every other call through.
    pub fn fail_upserts(&self, n: usize) {
        self.state().fail_upserts = n;
    }

    /// Hold `create_reflection` calls until [`Self::resume_creates`].
    pub fn pause_creates(&self) {
        self.creates_paused.send_replace(true);
    }

    pub fn resume_creates(&self) {
        self.creates_paused.send_replace(false);
    }

    // === Seeding ===

    pub fn seed_reflection(&self, reflection: Reflection) {
        self.state().reflections.push(reflection);
    }

    pub fn seed_achievement(&self, user_id: &UserId, achievement: Achievement) {
        self.state()
            .achievements
            .entry(user_id.clone())
            .or_default()
            .push(achievement);
    }

    pub fn seed_profile(&self, profile: UserProfile) {
        self.state().profiles.insert(profile.id.clone(), profile);
    }

    // === Inspection ===

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn reflections(&self) -> Vec<Reflection> {
        self.state().reflections.clone()
    }

    pub fn reflection(&self, id: &ReflectionId) -> Option<Reflection> {
        self.state().reflections.iter().find(|r| &r.id == id).cloned()
    }

    pub fn achievements(&self, user_id: &UserId) -> Vec<Achievement> {
        self.state()
            .achievements
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn profile(&self, user_id: &UserId) -> Option<UserProfile> {
        self.state().profiles.get(user_id).cloned()
    }

    pub fn reflection_count(&self) -> usize {
        self.state().reflections.len()
    }

    pub fn create_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, RemoteCall::CreateReflection { .. }))
            .count()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn create_reflection(&self, new: &NewReflection) -> Result<Reflection, RemoteError> {
        let mut paused = self.creates_paused.subscribe();
        paused
            .wait_for(|paused| !*paused)
            .await
            .map_err(|_| RemoteError::Transport {
                reason: "create gate closed".to_string(),
            })?;

        let mut state = self.state();
        state.record(RemoteCall::CreateReflection {
            id: new.id.clone(),
            year: new.year,
            mode: new.mode,
            upgraded_from: new.upgraded_from.clone(),
        })?;

        let id = if state.assign_ids {
            ReflectionId::generate()
        } else {
            new.id.clone()
        };
        let mut reflection = Reflection::start(new.year, new.mode, new.period, Some(new.user_id.clone()));
        reflection.id = id;
        reflection.period_label = new.period_label.clone();
        reflection.started_at = new.started_at;
        reflection.upgraded_from = new.upgraded_from.clone();
        reflection.synced_at = Some(Utc::now());
        reflection.local_only = false;
        state.reflections.push(reflection.clone());
        Ok(reflection)
    }

    async fn get_reflection(&self, id: &ReflectionId) -> Result<Option<Reflection>, RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::GetReflection { id: id.clone() })?;
        Ok(state.reflections.iter().find(|r| &r.id == id).cloned())
    }

    async fn update_reflection(
        &self,
        id: &ReflectionId,
        patch: &ReflectionPatch,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::UpdateReflection {
            id: id.clone(),
            patch: patch.clone(),
        })?;
        let reflection = state.reflection_mut(id)?;
        if let Some(progress) = patch.progress {
            reflection.progress = progress;
        }
        if let Some(completed) = patch.completed {
            reflection.completed = completed;
        }
        if let Some(completed_at) = patch.completed_at {
            reflection.completed_at = Some(completed_at);
        }
        if let Some(mode) = patch.mode {
            reflection.mode = mode;
        }
        reflection.synced_at = Some(Utc::now());
        Ok(())
    }

    async fn upsert_responses(
        &self,
        reflection_id: &ReflectionId,
        responses: &[Response],
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::UpsertResponses {
            reflection_id: reflection_id.clone(),
            question_ids: responses.iter().map(|r| r.question_id.clone()).collect(),
        })?;
        if state.fail_upserts > 0 {
            state.fail_upserts -= 1;
            return Err(RemoteError::Transport {
                reason: "simulated upsert failure".to_string(),
            });
        }
        let reflection = state.reflection_mut(reflection_id)?;
        for response in responses {
            reflection
                .responses
                .insert(response.question_id.clone(), response.clone());
        }
        Ok(())
    }

    async fn unlock_achievement(
        &self,
        user_id: &UserId,
        achievement_type: AchievementType,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::UnlockAchievement {
            user_id: user_id.clone(),
            achievement_type,
        })?;
        let unlocked = state.achievements.entry(user_id.clone()).or_default();
        if !unlocked.iter().any(|a| a.achievement_type == achievement_type) {
            unlocked.push(Achievement::unlock(achievement_type));
        }
        Ok(())
    }

    async fn list_reflections(&self, user_id: &UserId) -> Result<Vec<Reflection>, RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::ListReflections {
            user_id: user_id.clone(),
        })?;
        let mut reflections: Vec<_> = state
            .reflections
            .iter()
            .filter(|r| r.user_id.as_ref() == Some(user_id))
            .cloned()
            .collect();
        reflections.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then_with(|| b.started_at.cmp(&a.started_at))
        });
        Ok(reflections)
    }

    async fn list_achievements(&self, user_id: &UserId) -> Result<Vec<Achievement>, RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::ListAchievements {
            user_id: user_id.clone(),
        })?;
        Ok(state.achievements.get(user_id).cloned().unwrap_or_default())
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::GetProfile {
            user_id: user_id.clone(),
        })?;
        Ok(state.profiles.get(user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Option<UserProfile>, RemoteError> {
        let mut state = self.state();
        state.record(RemoteCall::UpdateProfile {
            user_id: user_id.clone(),
            patch: patch.clone(),
        })?;
        Ok(state.profiles.get_mut(user_id).map(|profile| {
            profile.apply(patch);
            profile.updated_at = Some(Utc::now());
            profile.clone()
        }))
    }
}

/// Lock ignoring poisoning: a panicking test thread must not cascade into
/// every later assertion.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::{Period, ResponseValue};

    fn new_reflection(user: &UserId) -> NewReflection {
        let local = Reflection::start(2025, Mode::Quick, Period::YearEnd, None);
        NewReflection::from_reflection(&local, user)
    }

    #[test]
    fn snapshot_store_round_trips_through_envelope() {
        let store = InMemorySnapshotStore::new();
        assert_eq!(store.load().unwrap(), None);

        let snapshot = Snapshot {
            has_seen_welcome: true,
            ..Default::default()
        };
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert_eq!(store.save_count(), 1);
        assert!(store.raw().unwrap().contains("\"version\""));
    }

    #[test]
    fn corrupt_blob_is_malformed() {
        let store = InMemorySnapshotStore::with_raw("not json at all");
        assert!(matches!(store.load(), Err(SnapshotError::Malformed { .. })));
        assert_eq!(store.stored(), None);
    }

    #[test]
    fn failing_saves_keep_previous_blob() {
        let store = InMemorySnapshotStore::with_snapshot(&Snapshot::default());
        store.set_fail_saves(true);
        let changed = Snapshot {
            has_seen_welcome: true,
            ..Default::default()
        };
        assert!(store.save(&changed).is_err());
        assert_eq!(store.stored(), Some(Snapshot::default()));
    }

    #[tokio::test]
    async fn create_keeps_client_id_by_default() {
        let remote = MockRemoteStore::new();
        let user = UserId::new("user-1");
        let new = new_reflection(&user);

        let created = remote.create_reflection(&new).await.unwrap();

        assert_eq!(created.id, new.id);
        assert!(!created.local_only);
        assert_eq!(remote.reflection_count(), 1);
    }

    #[tokio::test]
    async fn assigning_store_returns_new_id() {
        let remote = MockRemoteStore::assigning_ids();
        let new = new_reflection(&UserId::new("user-1"));
        let created = remote.create_reflection(&new).await.unwrap();
        assert_ne!(created.id, new.id);
    }

    #[tokio::test]
    async fn upsert_to_unknown_reflection_is_not_found() {
        let remote = MockRemoteStore::new();
        let response = Response::new("word_of_year", ResponseValue::text("calm"));
        let err = remote
            .upsert_response(&ReflectionId::new("missing"), &response)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_unlock_is_absorbed() {
        let remote = MockRemoteStore::new();
        let user = UserId::new("user-1");
        remote
            .unlock_achievement(&user, AchievementType::FirstJourney)
            .await
            .unwrap();
        remote
            .unlock_achievement(&user, AchievementType::FirstJourney)
            .await
            .unwrap();
        assert_eq!(remote.achievements(&user).len(), 1);
    }

    #[tokio::test]
    async fn upsert_failures_leave_other_calls_alone() {
        let remote = MockRemoteStore::new();
        let user = UserId::new("user-1");
        let reflection = remote
            .create_reflection(&new_reflection(&user))
            .await
            .unwrap();
        remote.fail_upserts(1);

        let response = Response::new("word_of_year", ResponseValue::text("steady"));
        assert!(remote
            .update_reflection(&reflection.id, &ReflectionPatch::default())
            .await
            .is_ok());
        assert!(remote.upsert_response(&reflection.id, &response).await.is_err());
        assert!(remote.upsert_response(&reflection.id, &response).await.is_ok());
        assert!(remote
            .reflection(&reflection.id)
            .unwrap()
            .has_answer("word_of_year"));
    }

    #[tokio::test]
    async fn fail_next_recovers_after_n_calls() {
        let remote = MockRemoteStore::new();
        let user = UserId::new("user-1");
        remote.fail_next(1);
        assert!(remote.list_reflections(&user).await.is_err());
        assert!(remote.list_reflections(&user).await.is_ok());
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn list_orders_newest_year_first() {
        let remote = MockRemoteStore::new();
        let user = UserId::new("user-1");
        for year in [2022, 2024, 2023] {
            let mut r = Reflection::start(year, Mode::Quick, Period::YearEnd, Some(user.clone()));
            r.local_only = false;
            remote.seed_reflection(r);
        }
        let years: Vec<_> = remote
            .list_reflections(&user)
            .await
            .unwrap()
            .iter()
            .map(|r| r.year)
            .collect();
        assert_eq!(years, vec![2024, 2023, 2022]);
    }
}

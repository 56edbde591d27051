//! Compass Storage - Persistence Ports and Mock Implementations
//!
//! Defines the two ports the engine is built with: the durable local
//! snapshot ([`SnapshotStore`]) and the remote persistence adapter
//! ([`RemoteStore`]). The REST implementation of the remote port lives in
//! compass-remote.

pub mod file;
pub mod migration;
pub mod mock;
pub mod snapshot;

pub use file::FileSnapshotStore;
pub use migration::{
    has_pending_upload, journey_to_reflection, local_data_summary, migrate_legacy_journeys,
    LocalDataSummary, MigrationOutcome,
};
pub use mock::{InMemorySnapshotStore, MockRemoteStore, RemoteCall};
pub use snapshot::{LegacyJourney, Snapshot, SnapshotEnvelope, SNAPSHOT_VERSION};

use async_trait::async_trait;
use compass_core::{
    Achievement, AchievementType, Mode, Period, ProfilePatch, Reflection, ReflectionId,
    RemoteError, Response, SnapshotError, Timestamp, UserId, UserProfile,
};

// ============================================================================
// SNAPSHOT PORT
// ============================================================================

/// Durable local snapshot storage.
///
/// Read once at start-up and written synchronously after every mutation.
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot. `Ok(None)` when nothing was ever written.
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        (**self).save(snapshot)
    }
}

// ============================================================================
// REMOTE PORT
// ============================================================================

/// Insert payload for reflections.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReflection {
    /// Client-generated id. The remote may keep it or assign its own.
    pub id: ReflectionId,
    pub user_id: UserId,
    pub year: i32,
    pub period: Period,
    pub period_label: Option<String>,
    pub mode: Mode,
    pub started_at: Timestamp,
    pub upgraded_from: Option<ReflectionId>,
}

impl NewReflection {
    pub fn from_reflection(reflection: &Reflection, user_id: &UserId) -> Self {
        Self {
            id: reflection.id.clone(),
            user_id: user_id.clone(),
            year: reflection.year,
            period: reflection.period,
            period_label: reflection.period_label.clone(),
            mode: reflection.mode,
            started_at: reflection.started_at,
            upgraded_from: reflection.upgraded_from.clone(),
        }
    }
}

/// Partial update payload for reflections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReflectionPatch {
    pub progress: Option<u8>,
    pub completed: Option<bool>,
    pub completed_at: Option<Timestamp>,
    pub mode: Option<Mode>,
}

impl ReflectionPatch {
    /// Patch carrying a reflection's progress and completion fields.
    pub fn completion_of(reflection: &Reflection) -> Self {
        Self {
            progress: Some(reflection.progress),
            completed: Some(reflection.completed),
            completed_at: reflection.completed_at,
            mode: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.progress.is_none()
            && self.completed.is_none()
            && self.completed_at.is_none()
            && self.mode.is_none()
    }
}

/// Remote persistence adapter.
///
/// Holds no entity state. Every call may fail independently; callers treat
/// failures as advisory. Upserts and unlocks are idempotent so a batch can be
/// re-sent after a transient failure.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a reflection row. Returns the row as stored, whose id may
    /// differ from the one requested.
    async fn create_reflection(&self, new: &NewReflection) -> Result<Reflection, RemoteError>;

    /// Fetch one reflection with its responses.
    async fn get_reflection(&self, id: &ReflectionId) -> Result<Option<Reflection>, RemoteError>;

    /// Apply a partial update to a reflection row.
    async fn update_reflection(
        &self,
        id: &ReflectionId,
        patch: &ReflectionPatch,
    ) -> Result<(), RemoteError>;

    /// Upsert many responses keyed by (reflection id, question id).
    async fn upsert_responses(
        &self,
        reflection_id: &ReflectionId,
        responses: &[Response],
    ) -> Result<(), RemoteError>;

    /// Upsert a single response.
    async fn upsert_response(
        &self,
        reflection_id: &ReflectionId,
        response: &Response,
    ) -> Result<(), RemoteError> {
        self.upsert_responses(reflection_id, std::slice::from_ref(response))
            .await
    }

    /// Unlock an achievement. Already unlocked is success.
    async fn unlock_achievement(
        &self,
        user_id: &UserId,
        achievement_type: AchievementType,
    ) -> Result<(), RemoteError>;

    /// All reflections of a user with nested responses, newest year first.
    async fn list_reflections(&self, user_id: &UserId) -> Result<Vec<Reflection>, RemoteError>;

    /// All achievements of a user.
    async fn list_achievements(&self, user_id: &UserId) -> Result<Vec<Achievement>, RemoteError>;

    /// Fetch a profile row.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, RemoteError>;

    /// Update a profile row, returning it as stored.
    async fn update_profile(
        &self,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<Option<UserProfile>, RemoteError>;
}

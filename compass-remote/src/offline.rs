//! Remote store used when no endpoint is configured.

use async_trait::async_trait;
use compass_core::{
    Achievement, AchievementType, ProfilePatch, Reflection, ReflectionId, RemoteError, Response,
    UserId, UserProfile,
};
use compass_storage::{NewReflection, ReflectionPatch, RemoteStore};

/// Fails every call with [`RemoteError::NotConfigured`]. The engine keeps
/// working purely locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemoteStore;

#[async_trait]
impl RemoteStore for OfflineRemoteStore {
    async fn create_reflection(&self, _new: &NewReflection) -> Result<Reflection, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn get_reflection(&self, _id: &ReflectionId) -> Result<Option<Reflection>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_reflection(
        &self,
        _id: &ReflectionId,
        _patch: &ReflectionPatch,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn upsert_responses(
        &self,
        _reflection_id: &ReflectionId,
        _responses: &[Response],
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn unlock_achievement(
        &self,
        _user_id: &UserId,
        _achievement_type: AchievementType,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn list_reflections(&self, _user_id: &UserId) -> Result<Vec<Reflection>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn list_achievements(&self, _user_id: &UserId) -> Result<Vec<Achievement>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn get_profile(&self, _user_id: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_profile(
        &self,
        _user_id: &UserId,
        _patch: &ProfilePatch,
    ) -> Result<Option<UserProfile>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}

//! Row shapes of the hosted schema and their conversion to entities.
//!
//! Columns are snake_case. Enum columns travel as their `as_db_str` form and
//! response values as untyped JSON, resolved against the question catalog.

use chrono::Utc;
use compass_core::{
    Achievement, AchievementId, AchievementType, Mode, Period, ProfilePatch, Reflection,
    ReflectionId, Response, ResponseMap, ResponseValue, Theme, Timestamp, UserId, UserProfile,
    ValidationError,
};
use compass_storage::{NewReflection, ReflectionPatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// READ ROWS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DbReflection {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    pub period: String,
    #[serde(default)]
    pub period_label: Option<String>,
    pub mode: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    pub started_at: Timestamp,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    #[serde(default)]
    pub upgraded_from: Option<String>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl DbReflection {
    /// Confirmed remote rows are never local-only; `updated_at` becomes the
    /// sync time.
    pub fn into_reflection(self, responses: ResponseMap) -> Result<Reflection, ValidationError> {
        Ok(Reflection {
            id: ReflectionId::new(self.id),
            user_id: Some(UserId::new(self.user_id)),
            year: self.year,
            period: Period::from_db_str(&self.period)?,
            period_label: self.period_label,
            mode: Mode::from_db_str(&self.mode)?,
            responses,
            progress: self.progress.min(100),
            completed: self.completed,
            started_at: self.started_at,
            completed_at: self.completed_at,
            upgraded_from: self.upgraded_from.map(ReflectionId::new),
            synced_at: Some(self.updated_at.unwrap_or_else(Utc::now)),
            local_only: false,
            pending_push: false,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbResponse {
    pub reflection_id: String,
    pub question_id: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl DbResponse {
    pub fn into_response(self) -> Result<Response, ValidationError> {
        let value = ResponseValue::decode_lenient(&self.question_id, self.value)?;
        Ok(Response {
            question_id: self.question_id,
            value,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Group response rows by reflection id. Rows whose value cannot be decoded
/// under any shape are skipped.
pub fn group_responses(rows: Vec<DbResponse>) -> HashMap<String, ResponseMap> {
    let mut grouped: HashMap<String, ResponseMap> = HashMap::new();
    for row in rows {
        let reflection_id = row.reflection_id.clone();
        let question_id = row.question_id.clone();
        match row.into_response() {
            Ok(response) => {
                grouped
                    .entry(reflection_id)
                    .or_default()
                    .insert(response.question_id.clone(), response);
            }
            Err(e) => {
                tracing::warn!(%reflection_id, %question_id, error = %e, "Skipping undecodable response row");
            }
        }
    }
    grouped
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbAchievement {
    pub id: String,
    #[serde(rename = "type")]
    pub achievement_type: String,
    pub unlocked_at: Timestamp,
}

impl DbAchievement {
    pub fn into_achievement(self) -> Result<Achievement, ValidationError> {
        Ok(Achievement {
            id: AchievementId::new(self.id),
            achievement_type: AchievementType::from_db_str(&self.achievement_type)?,
            unlocked_at: self.unlocked_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl DbProfile {
    /// Unknown themes fall back to the default rather than failing sign-in.
    pub fn into_profile(self) -> UserProfile {
        let theme = match self.theme.as_deref().map(Theme::from_db_str) {
            Some(Ok(theme)) => theme,
            Some(Err(e)) => {
                tracing::warn!(user_id = %self.id, error = %e, "Unknown profile theme, using default");
                Theme::default()
            }
            None => Theme::default(),
        };
        UserProfile {
            id: UserId::new(self.id),
            email: self.email,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            theme,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// WRITE ROWS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ReflectionInsert {
    /// Sent only when the client id is a UUID; legacy ids are left for the
    /// database to replace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub year: i32,
    pub period: &'static str,
    pub period_label: Option<String>,
    pub mode: &'static str,
    pub progress: u8,
    pub completed: bool,
    pub started_at: Timestamp,
    pub upgraded_from: Option<String>,
}

impl From<&NewReflection> for ReflectionInsert {
    fn from(new: &NewReflection) -> Self {
        let id = uuid::Uuid::parse_str(new.id.as_str())
            .ok()
            .map(|_| new.id.to_string());
        Self {
            id,
            user_id: new.user_id.to_string(),
            year: new.year,
            period: new.period.as_db_str(),
            period_label: new.period_label.clone(),
            mode: new.mode.as_db_str(),
            progress: 0,
            completed: false,
            started_at: new.started_at,
            upgraded_from: new.upgraded_from.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReflectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
}

impl From<&ReflectionPatch> for ReflectionUpdate {
    fn from(patch: &ReflectionPatch) -> Self {
        Self {
            progress: patch.progress,
            completed: patch.completed,
            completed_at: patch.completed_at,
            mode: patch.mode.map(|m| m.as_db_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseUpsert {
    pub reflection_id: String,
    pub question_id: String,
    pub value: serde_json::Value,
    pub updated_at: Timestamp,
}

impl ResponseUpsert {
    pub fn new(reflection_id: &ReflectionId, response: &Response) -> Self {
        Self {
            reflection_id: reflection_id.to_string(),
            question_id: response.question_id.clone(),
            value: response.value.to_json(),
            updated_at: response.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementInsert {
    pub user_id: String,
    #[serde(rename = "type")]
    pub achievement_type: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<&'static str>,
}

impl From<&ProfilePatch> for ProfileUpdate {
    fn from(patch: &ProfilePatch) -> Self {
        Self {
            full_name: patch.full_name.clone(),
            avatar_url: patch.avatar_url.clone(),
            theme: patch.theme.map(|t| t.as_db_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reflection_row_converts() {
        let row: DbReflection = serde_json::from_value(json!({
            "id": "4b1f0c1e-4a7f-4f49-9a57-6c1b1f3c2d10",
            "user_id": "user-1",
            "year": 2025,
            "period": "mid_year",
            "period_label": null,
            "mode": "deep",
            "progress": 40,
            "completed": false,
            "started_at": "2025-06-30T08:00:00+00:00",
            "completed_at": null,
            "upgraded_from": "0c9a",
            "created_at": "2025-06-30T08:00:00+00:00",
            "updated_at": "2025-06-30T08:05:00+00:00"
        }))
        .unwrap();

        let reflection = row.into_reflection(ResponseMap::new()).unwrap();

        assert_eq!(reflection.period, Period::MidYear);
        assert_eq!(reflection.mode, Mode::Deep);
        assert!(!reflection.local_only);
        assert_eq!(reflection.upgraded_from, Some(ReflectionId::new("0c9a")));
        assert!(reflection.synced_at.is_some());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let row: DbReflection = serde_json::from_value(json!({
            "id": "r", "user_id": "u", "year": 2025, "period": "year_end",
            "mode": "extreme", "started_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(row.into_reflection(ResponseMap::new()).is_err());
    }

    #[test]
    fn responses_group_by_reflection() {
        let rows: Vec<DbResponse> = serde_json::from_value(json!([
            { "reflection_id": "a", "question_id": "word_of_year", "value": "grit" },
            { "reflection_id": "a", "question_id": "three_words", "value": ["x", "y", "z"] },
            { "reflection_id": "b", "question_id": "life_areas_past", "value": { "finances": 8 } }
        ]))
        .unwrap();

        let grouped = group_responses(rows);

        assert_eq!(grouped["a"].len(), 2);
        assert!(matches!(
            grouped["b"]["life_areas_past"].value,
            ResponseValue::Ratings(_)
        ));
    }

    #[test]
    fn one_bad_response_row_does_not_fail_the_group() {
        let rows: Vec<DbResponse> = serde_json::from_value(json!([
            { "reflection_id": "a", "question_id": "word_of_year", "value": "grit" },
            { "reflection_id": "a", "question_id": "gratitude", "value": ["now a list"] },
            { "reflection_id": "a", "question_id": "dreams", "value": null }
        ]))
        .unwrap();

        let grouped = group_responses(rows);

        assert_eq!(grouped["a"].len(), 2);
        assert_eq!(
            grouped["a"]["gratitude"].value,
            ResponseValue::list(["now a list"])
        );
        assert!(!grouped["a"].contains_key("dreams"));
    }

    #[test]
    fn insert_drops_non_uuid_ids() {
        let mut local = Reflection::start(2024, Mode::Quick, Period::YearEnd, None);
        local.id = ReflectionId::new("1703000000000-aaaabbbbc");
        let insert = ReflectionInsert::from(&NewReflection::from_reflection(
            &local,
            &UserId::new("user-1"),
        ));
        let value = serde_json::to_value(&insert).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["period"], "year_end");

        let fresh = Reflection::start(2024, Mode::Quick, Period::YearEnd, None);
        let insert =
            ReflectionInsert::from(&NewReflection::from_reflection(&fresh, &UserId::new("u")));
        assert_eq!(insert.id.as_deref(), Some(fresh.id.as_str()));
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let update = ReflectionUpdate::from(&ReflectionPatch::default());
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({}));
    }

    #[test]
    fn profile_with_unknown_theme_uses_default() {
        let row: DbProfile = serde_json::from_value(json!({
            "id": "user-1", "theme": "neon"
        }))
        .unwrap();
        assert_eq!(row.into_profile().theme, Theme::default());
    }
}

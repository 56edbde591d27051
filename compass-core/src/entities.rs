//! Core entity structures
//!
//! Serialized field names are camelCase: the durable snapshot shares its
//! layout with blobs written by the web client.

use crate::{
    catalog, AchievementId, AchievementType, Mode, Period, QuestionId, QuestionKind,
    ReflectionId, Theme, Timestamp, UserId, ValidationError, ValueShape,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Answer value. The owning question's [`QuestionKind`] is the discriminant;
/// the untagged serialized form matches the remote `value` JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseValue {
    /// `text`, `textarea` and `word` questions
    Text(String),
    /// `list` questions, ordered
    List(Vec<String>),
    /// `rating` questions: life area id -> 1..=10
    Ratings(BTreeMap<String, u8>),
    /// `calendar` questions: month name -> notes
    Calendar(BTreeMap<String, String>),
}

impl ResponseValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            ResponseValue::Text(_) => ValueShape::Text,
            ResponseValue::List(_) => ValueShape::List,
            ResponseValue::Ratings(_) => ValueShape::Ratings,
            ResponseValue::Calendar(_) => ValueShape::Calendar,
        }
    }

    /// Whether the value carries an answer: trimmed text, at least one
    /// non-blank list item, or at least one mapping key.
    pub fn has_content(&self) -> bool {
        match self {
            ResponseValue::Text(s) => !s.trim().is_empty(),
            ResponseValue::List(items) => items.iter().any(|v| !v.trim().is_empty()),
            ResponseValue::Ratings(map) => !map.is_empty(),
            ResponseValue::Calendar(map) => !map.is_empty(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ResponseValue::Text(s) => serde_json::Value::String(s.clone()),
            ResponseValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
            ResponseValue::Ratings(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(*v)))
                    .collect(),
            ),
            ResponseValue::Calendar(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
        }
    }

    /// Decode an untyped JSON value for `question_id`.
    ///
    /// The catalog kind decides the expected shape. Ids unknown to the
    /// catalog fall back to inferring the shape from the JSON itself.
    pub fn decode(question_id: &str, value: serde_json::Value) -> Result<Self, ValidationError> {
        match catalog::question(question_id) {
            Some(q) => Self::decode_as(question_id, q.kind, value),
            None => Self::infer(question_id, value),
        }
    }

    /// Like [`Self::decode`], but a value stored under an older catalog kind
    /// keeps the shape it was written with instead of failing.
    pub fn decode_lenient(
        question_id: &str,
        value: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let Some(q) = catalog::question(question_id) else {
            return Self::infer(question_id, value);
        };
        match Self::decode_as(question_id, q.kind, value.clone()) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                tracing::warn!(question_id, error = %e, "Stored response no longer matches catalog kind");
                Self::infer(question_id, value)
            }
        }
    }

    /// Decode an untyped JSON value as the given kind.
    pub fn decode_as(
        question_id: &str,
        kind: QuestionKind,
        value: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let mismatch = |reason: &str| ValidationError::ValueShapeMismatch {
            question_id: question_id.to_string(),
            expected: kind.to_string(),
            reason: reason.to_string(),
        };

        match kind.value_shape() {
            ValueShape::Text => match value {
                serde_json::Value::String(s) => Ok(Self::Text(s)),
                serde_json::Value::Number(n) => Ok(Self::Text(n.to_string())),
                _ => Err(mismatch("expected a string")),
            },
            ValueShape::List => match value {
                serde_json::Value::String(s) => Ok(Self::List(vec![s])),
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => Ok(s),
                        serde_json::Value::Null => Ok(String::new()),
                        _ => Err(mismatch("list items must be strings")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::List),
                _ => Err(mismatch("expected an array of strings")),
            },
            ValueShape::Ratings => match value {
                serde_json::Value::Object(map) => map
                    .into_iter()
                    .map(|(k, v)| match v.as_u64() {
                        Some(n) if (1..=10).contains(&n) => Ok((k, n as u8)),
                        _ => Err(mismatch("ratings must be integers between 1 and 10")),
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()
                    .map(Self::Ratings),
                _ => Err(mismatch("expected an object of ratings")),
            },
            ValueShape::Calendar => match value {
                serde_json::Value::Object(map) => map
                    .into_iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => Ok((k, s)),
                        _ => Err(mismatch("calendar entries must be strings")),
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()
                    .map(Self::Calendar),
                _ => Err(mismatch("expected an object keyed by month")),
            },
        }
    }

    fn infer(question_id: &str, value: serde_json::Value) -> Result<Self, ValidationError> {
        let kind = match &value {
            serde_json::Value::String(_) | serde_json::Value::Number(_) => QuestionKind::Text,
            serde_json::Value::Array(_) => QuestionKind::List,
            serde_json::Value::Object(map) if map.values().all(|v| v.is_u64()) => {
                QuestionKind::Rating
            }
            serde_json::Value::Object(_) => QuestionKind::Calendar,
            _ => {
                return Err(ValidationError::InvalidValue {
                    field: question_id.to_string(),
                    reason: "response value must not be null or boolean".to_string(),
                })
            }
        };
        Self::decode_as(question_id, kind, value)
    }
}

/// Answer to one question within one reflection. Each update replaces the
/// whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawResponse")]
pub struct Response {
    pub question_id: QuestionId,
    pub value: ResponseValue,
    pub updated_at: Timestamp,
}

impl Response {
    pub fn new(question_id: impl Into<QuestionId>, value: ResponseValue) -> Self {
        Self {
            question_id: question_id.into(),
            value,
            updated_at: Utc::now(),
        }
    }
}

/// Untyped wire form of [`Response`]; the value is resolved against the
/// catalog on the way in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    question_id: QuestionId,
    value: serde_json::Value,
    updated_at: Timestamp,
}

impl TryFrom<RawResponse> for Response {
    type Error = ValidationError;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        let value = ResponseValue::decode_lenient(&raw.question_id, raw.value)?;
        Ok(Self {
            question_id: raw.question_id,
            value,
            updated_at: raw.updated_at,
        })
    }
}

/// Responses keyed by question id.
pub type ResponseMap = BTreeMap<QuestionId, Response>;

/// Deserialize a [`ResponseMap`], dropping entries that cannot be decoded
/// at all so one bad answer never discards the document around it.
pub fn deserialize_response_map<'de, D>(deserializer: D) -> Result<ResponseMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<QuestionId, serde_json::Value>::deserialize(deserializer)?;
    let mut responses = ResponseMap::new();
    for (question_id, value) in raw {
        match serde_json::from_value::<Response>(value) {
            Ok(response) => {
                responses.insert(question_id, response);
            }
            Err(e) => {
                tracing::warn!(%question_id, error = %e, "Dropping undecodable response");
            }
        }
    }
    Ok(responses)
}

/// Reflection - one questionnaire instance for a (year, period, mode).
/// The aggregate root; upgraded reflections link back via `upgraded_from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub id: ReflectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub year: i32,
    pub period: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_label: Option<String>,
    pub mode: Mode,
    #[serde(default, deserialize_with = "deserialize_response_map")]
    pub responses: ResponseMap,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_from: Option<ReflectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<Timestamp>,
    #[serde(default)]
    pub local_only: bool,
    /// Confirmed remotely, but the last push of progress or answers did not
    /// land. Cleared once a full push succeeds.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_push: bool,
}

impl Reflection {
    /// A fresh in-progress reflection, local-only until the remote store
    /// confirms creation.
    pub fn start(year: i32, mode: Mode, period: Period, user_id: Option<UserId>) -> Self {
        Self {
            id: ReflectionId::generate(),
            user_id,
            year,
            period,
            period_label: None,
            mode,
            responses: ResponseMap::new(),
            progress: 0,
            completed: false,
            started_at: Utc::now(),
            completed_at: None,
            upgraded_from: None,
            synced_at: None,
            local_only: true,
            pending_push: false,
        }
    }

    /// Value answered for `question_id`, if any.
    pub fn value(&self, question_id: &str) -> Option<&ResponseValue> {
        self.responses.get(question_id).map(|r| &r.value)
    }

    /// Whether `question_id` has a non-empty answer.
    pub fn has_answer(&self, question_id: &str) -> bool {
        self.value(question_id).is_some_and(ResponseValue::has_content)
    }

    /// Data the remote store does not have yet.
    pub fn is_unsynced(&self) -> bool {
        self.local_only || self.pending_push
    }
}

/// Unlocked achievement. At most one per type per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: AchievementId,
    #[serde(rename = "type")]
    pub achievement_type: AchievementType,
    pub unlocked_at: Timestamp,
}

impl Achievement {
    pub fn unlock(achievement_type: AchievementType) -> Self {
        Self {
            id: AchievementId::new(achievement_type.as_db_str()),
            achievement_type,
            unlocked_at: Utc::now(),
        }
    }
}

/// Authenticated user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
            avatar_url: None,
            theme: Theme::default(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(full_name) = &patch.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(avatar_url) = &patch.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
    }
}

/// Update payload for profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<Theme>,
}

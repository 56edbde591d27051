//! Durable local snapshot shape.
//!
//! One named blob holding UI preferences and the engine's persisted state.
//! The layout (camelCase keys inside a `{ state, version }` envelope) is the
//! one the web client writes, so existing blobs load unchanged.

use compass_core::{
    Achievement, Mode, Reflection, ReflectionId, ResponseMap, Theme, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot envelope version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub theme: Theme,
    pub has_seen_welcome: bool,
    pub is_guest: bool,
    pub current_year: Option<i32>,
    pub mode: Option<Mode>,
    pub current_question_index: usize,
    #[serde(deserialize_with = "compass_core::deserialize_response_map")]
    pub responses: ResponseMap,
    pub journey_started_at: Option<Timestamp>,
    pub current_reflection: Option<Reflection>,
    pub reflections: Vec<Reflection>,
    pub achievements: Vec<Achievement>,
    /// Legacy one-reflection-per-year entries keyed by year. Emptied by the
    /// start-up migration.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub journeys: BTreeMap<i32, LegacyJourney>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            has_seen_welcome: false,
            is_guest: true,
            current_year: None,
            mode: None,
            current_question_index: 0,
            responses: ResponseMap::new(),
            journey_started_at: None,
            current_reflection: None,
            reflections: Vec::new(),
            achievements: Vec::new(),
            journeys: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Find a reflection in history by id.
    pub fn reflection(&self, id: &ReflectionId) -> Option<&Reflection> {
        self.reflections.iter().find(|r| &r.id == id)
    }

    pub fn reflection_mut(&mut self, id: &ReflectionId) -> Option<&mut Reflection> {
        self.reflections.iter_mut().find(|r| &r.id == id)
    }
}

/// Legacy journey: one reflection per year, no period, no upgrade chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyJourney {
    pub id: ReflectionId,
    pub year: i32,
    pub mode: Mode,
    #[serde(default, deserialize_with = "compass_core::deserialize_response_map")]
    pub responses: ResponseMap,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

/// On-disk wrapper around [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    pub state: Snapshot,
    #[serde(default)]
    pub version: u32,
}

impl SnapshotEnvelope {
    pub fn wrap(state: Snapshot) -> Self {
        Self {
            state,
            version: SNAPSHOT_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::{Period, ResponseValue};
    use serde_json::json;

    #[test]
    fn default_snapshot_is_guest() {
        let snapshot = Snapshot::default();
        assert!(snapshot.is_guest);
        assert!(snapshot.reflections.is_empty());
        assert_eq!(snapshot.theme, Theme::Cosmic);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let envelope: SnapshotEnvelope =
            serde_json::from_value(json!({ "state": { "theme": "calm" } })).unwrap();
        assert_eq!(envelope.state.theme, Theme::Calm);
        assert!(envelope.state.is_guest);
        assert_eq!(envelope.version, 0);
    }

    #[test]
    fn web_client_blob_loads() {
        let blob = json!({
            "state": {
                "theme": "sunset",
                "hasSeenWelcome": true,
                "isGuest": true,
                "currentYear": 2024,
                "mode": "quick",
                "currentQuestionIndex": 3,
                "responses": {},
                "journeyStartedAt": null,
                "currentReflection": null,
                "reflections": [{
                    "id": "1735000000000-k2j3h4g5f",
                    "year": 2024,
                    "period": "year_end",
                    "mode": "quick",
                    "responses": {
                        "word_of_year": {
                            "questionId": "word_of_year",
                            "value": "focus",
                            "updatedAt": "2024-12-31T10:00:00.000Z"
                        }
                    },
                    "progress": 100,
                    "completed": true,
                    "startedAt": "2024-12-31T09:50:00.000Z",
                    "completedAt": "2024-12-31T10:01:00.000Z",
                    "localOnly": true
                }],
                "achievements": [{
                    "id": "first_journey",
                    "type": "first_journey",
                    "name": "First Steps",
                    "description": "Complete your first reflection journey",
                    "icon": "🚀",
                    "unlockedAt": "2024-12-31T10:01:00.000Z"
                }],
                "journeys": {
                    "2023": {
                        "id": "1703000000000-aaaabbbbc",
                        "year": 2023,
                        "mode": "ok",
                        "responses": {},
                        "progress": 40,
                        "completed": false,
                        "startedAt": "2023-12-30T09:00:00.000Z"
                    }
                }
            },
            "version": 0
        });

        let envelope: SnapshotEnvelope = serde_json::from_value(blob).unwrap();
        let state = envelope.state;
        assert_eq!(state.theme, Theme::Sunset);
        assert_eq!(state.current_question_index, 3);
        assert_eq!(state.reflections.len(), 1);
        assert_eq!(state.reflections[0].period, Period::YearEnd);
        assert_eq!(
            state.reflections[0].value("word_of_year"),
            Some(&ResponseValue::text("focus"))
        );
        assert_eq!(state.achievements.len(), 1);
        assert_eq!(state.journeys.get(&2023).map(|j| j.progress), Some(40));
    }

    #[test]
    fn stale_response_shapes_do_not_discard_history() {
        let reflection = |id: &str, responses: serde_json::Value| {
            json!({
                "id": id,
                "year": 2024,
                "period": "year_end",
                "mode": "ok",
                "responses": responses,
                "startedAt": "2024-12-31T09:00:00.000Z"
            })
        };
        let blob = json!({
            "state": {
                "reflections": [
                    reflection("kept", json!({
                        "word_of_year": {
                            "questionId": "word_of_year",
                            "value": "steady",
                            "updatedAt": "2024-12-31T10:00:00.000Z"
                        }
                    })),
                    reflection("reshaped", json!({
                        "gratitude": {
                            "questionId": "gratitude",
                            "value": ["moved to a list"],
                            "updatedAt": "2024-12-31T10:00:00.000Z"
                        },
                        "secret_wish": {
                            "questionId": "secret_wish",
                            "value": null,
                            "updatedAt": "2024-12-31T10:00:00.000Z"
                        }
                    }))
                ],
                "responses": {
                    "dreams": { "questionId": "dreams", "value": true, "updatedAt": "2024-12-31T10:00:00.000Z" }
                }
            },
            "version": 1
        });

        let state = serde_json::from_value::<SnapshotEnvelope>(blob).unwrap().state;

        assert_eq!(state.reflections.len(), 2);
        assert!(state.reflections[0].has_answer("word_of_year"));
        let reshaped = &state.reflections[1];
        assert_eq!(
            reshaped.value("gratitude"),
            Some(&ResponseValue::list(["moved to a list"]))
        );
        assert!(reshaped.value("secret_wish").is_none());
        assert!(state.responses.is_empty());
    }

    #[test]
    fn empty_legacy_map_is_not_written() {
        let value = serde_json::to_value(Snapshot::default()).unwrap();
        assert!(value.get("journeys").is_none());
    }
}

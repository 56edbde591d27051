//! Identity types for Compass entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Question identifiers are catalog keys such as `word_of_year`.
pub type QuestionId = String;

/// Generate a new UUIDv7 string (timestamp-sortable).
pub fn new_entity_id() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, timestamp-sortable identifier.
            pub fn generate() -> Self {
                Self(new_entity_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Reflection identifier.
    ///
    /// Generated client-side. Legacy snapshots carry `"<millis>-<random>"`
    /// strings, the remote schema carries UUIDs, so this stays a string.
    ReflectionId
);

string_id!(
    /// Authenticated user identifier (remote auth subject).
    UserId
);

string_id!(
    /// Achievement record identifier.
    AchievementId
);

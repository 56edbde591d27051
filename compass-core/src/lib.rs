//! Compass Core - Entity Types, Catalog and Progress
//!
//! Data structures shared by every other crate, the static question catalog,
//! and the pure progress calculation. No IO and no engine state here.

pub mod catalog;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod progress;

pub use catalog::{
    achievement_def, question, questions_by_section, questions_for_mode, AchievementDef,
    LifeArea, Question, ACHIEVEMENTS, LIFE_AREAS, LIFE_AREAS_QUESTION, MONTHS, QUESTIONS,
    THREE_WORDS_QUESTION, WORD_OF_YEAR_QUESTION,
};
pub use entities::{
    deserialize_response_map, Achievement, ProfilePatch, Reflection, Response, ResponseMap,
    ResponseValue, UserProfile,
};
pub use enums::{
    AchievementType, EntityType, Mode, Period, QuestionKind, Section, SyncStatus, Theme,
    ValueShape,
};
pub use error::{CompassError, CompassResult, RemoteError, SnapshotError, ValidationError};
pub use identity::{
    new_entity_id, AchievementId, QuestionId, ReflectionId, Timestamp, UserId,
};
pub use progress::{calculate_progress, is_answered};

/// Earliest year a reflection may be started for.
pub const MIN_YEAR: i32 = 1900;

/// Latest year a reflection may be started for.
pub const MAX_YEAR: i32 = 2200;

/// Validate a reflection year against the supported domain.
pub fn validate_year(year: i32) -> Result<i32, ValidationError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(ValidationError::YearOutOfRange {
            year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        })
    }
}

//! Enum types for Compass entities

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed string enum with database/wire string conversions.
///
/// Parsing is case-insensitive and rejects anything outside the domain with
/// [`ValidationError::InvalidValue`].
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Convert to database string representation.
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse from database string representation.
            pub fn from_db_str(s: &str) -> Result<Self, ValidationError> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::InvalidValue {
                        field: $field.to_string(),
                        reason: format!("unknown value '{}'", s),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_db_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

db_enum! {
    /// Reflection depth tier. Strictly ordered `Quick < Ok < Deep`.
    Mode, "mode" {
        /// Just the essentials (~15 min)
        Quick => "quick",
        /// Balanced reflection (~45 min)
        Ok => "ok",
        /// Every question (~90 min)
        Deep => "deep",
    }
}

impl Mode {
    /// Position in the depth ordering.
    pub fn depth(&self) -> u8 {
        match self {
            Mode::Quick => 0,
            Mode::Ok => 1,
            Mode::Deep => 2,
        }
    }

    /// Whether `self` is strictly deeper than `other`.
    pub fn is_deeper_than(&self, other: Mode) -> bool {
        self.depth() > other.depth()
    }

    /// Modes strictly deeper than this one, shallowest first.
    pub fn deeper_modes(&self) -> Vec<Mode> {
        Mode::ALL
            .iter()
            .copied()
            .filter(|m| m.is_deeper_than(*self))
            .collect()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Quick => "Quick",
            Mode::Ok => "Just Ok",
            Mode::Deep => "Deep Think",
        }
    }

    pub fn estimated_time(&self) -> &'static str {
        match self {
            Mode::Quick => "~15 min",
            Mode::Ok => "~45 min",
            Mode::Deep => "~90 min",
        }
    }
}

impl PartialOrd for Mode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Mode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.depth().cmp(&other.depth())
    }
}

db_enum! {
    /// Sub-year checkpoint a reflection belongs to.
    Period, "period" {
        Q1 => "q1",
        MidYear => "mid_year",
        YearEnd => "year_end",
    }
}

impl Period {
    pub fn display_name(&self) -> &'static str {
        match self {
            Period::Q1 => "Q1 Check-in",
            Period::MidYear => "Mid-Year Review",
            Period::YearEnd => "Year-End Reflection",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Period::Q1 => "First quarter reflection",
            Period::MidYear => "Half-year checkpoint",
            Period::YearEnd => "Full year reflection",
        }
    }
}

db_enum! {
    /// Which half of the questionnaire a question belongs to.
    Section, "section" {
        Past => "past",
        Future => "future",
    }
}

db_enum! {
    /// Input widget kind of a question; decides the response value shape.
    QuestionKind, "question_kind" {
        Text => "text",
        Textarea => "textarea",
        List => "list",
        Rating => "rating",
        Word => "word",
        Calendar => "calendar",
    }
}

/// Shape a response value must have for a given question kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Text,
    List,
    Ratings,
    Calendar,
}

impl QuestionKind {
    pub fn value_shape(&self) -> ValueShape {
        match self {
            QuestionKind::Text | QuestionKind::Textarea | QuestionKind::Word => ValueShape::Text,
            QuestionKind::List => ValueShape::List,
            QuestionKind::Rating => ValueShape::Ratings,
            QuestionKind::Calendar => ValueShape::Calendar,
        }
    }
}

db_enum! {
    /// Visual theme preference.
    #[derive(Default)]
    Theme, "theme" {
        #[default]
        Cosmic => "cosmic",
        Calm => "calm",
        Minimal => "minimal",
        Sunset => "sunset",
    }
}

db_enum! {
    /// Fixed set of unlockable achievements.
    AchievementType, "achievement_type" {
        FirstJourney => "first_journey",
        DeepThinker => "deep_thinker",
        SpeedRunner => "speed_runner",
        Consistent => "consistent",
        AllAreas => "all_areas",
        WordMaster => "word_master",
        Sharer => "sharer",
    }
}

db_enum! {
    /// Coarse remote synchronization status.
    #[derive(Default)]
    SyncStatus, "sync_status" {
        #[default]
        Idle => "idle",
        Syncing => "syncing",
        Error => "error",
    }
}

/// Entity type discriminator used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Reflection,
    Response,
    Achievement,
    Profile,
}

//! Achievement evaluation over reflection history.
//!
//! Each rule is independent. The evaluator only reports which types qualify;
//! unlocking (and its idempotence) belongs to the engine.

use chrono::Duration;
use compass_core::{
    AchievementType, Mode, Reflection, ResponseMap, ResponseValue, LIFE_AREAS,
    LIFE_AREAS_QUESTION, WORD_OF_YEAR_QUESTION,
};
use std::collections::BTreeSet;

/// Quick reflections completed faster than this earn `speed_runner`.
pub const SPEED_RUN_LIMIT_MINUTES: i64 = 10;

/// Minimum rating on every life area for `all_areas`.
pub const ALL_AREAS_MIN_RATING: u8 = 7;

/// Reflections with a word of the year needed for `word_master`.
pub const WORD_MASTER_COUNT: usize = 3;

/// Achievement types whose rule currently holds.
///
/// `responses` is the engine's flat response map, which the life-area rule
/// reads. `sharer` is never derived.
pub fn evaluate(history: &[Reflection], responses: &ResponseMap) -> Vec<AchievementType> {
    let mut earned = Vec::new();
    if first_journey(history) {
        earned.push(AchievementType::FirstJourney);
    }
    if deep_thinker(history) {
        earned.push(AchievementType::DeepThinker);
    }
    if speed_runner(history) {
        earned.push(AchievementType::SpeedRunner);
    }
    if consistent(history) {
        earned.push(AchievementType::Consistent);
    }
    if all_areas(responses) {
        earned.push(AchievementType::AllAreas);
    }
    if word_master(history) {
        earned.push(AchievementType::WordMaster);
    }
    earned
}

fn completed(history: &[Reflection]) -> impl Iterator<Item = &Reflection> {
    history.iter().filter(|r| r.completed)
}

fn first_journey(history: &[Reflection]) -> bool {
    completed(history).next().is_some()
}

fn deep_thinker(history: &[Reflection]) -> bool {
    completed(history).any(|r| r.mode == Mode::Deep)
}

/// Latest completion by `completed_at`; on ties the earliest in history wins.
fn latest_completed(history: &[Reflection]) -> Option<&Reflection> {
    completed(history).fold(None, |best: Option<&Reflection>, r| match best {
        Some(b) if b.completed_at >= r.completed_at => Some(b),
        _ => Some(r),
    })
}

fn speed_runner(history: &[Reflection]) -> bool {
    let Some(latest) = latest_completed(history) else {
        return false;
    };
    let Some(completed_at) = latest.completed_at else {
        return false;
    };
    latest.mode == Mode::Quick
        && completed_at - latest.started_at < Duration::minutes(SPEED_RUN_LIMIT_MINUTES)
}

fn consistent(history: &[Reflection]) -> bool {
    let years: BTreeSet<i32> = completed(history).map(|r| r.year).collect();
    years
        .iter()
        .zip(years.iter().skip(1))
        .any(|(a, b)| b - a == 1)
}

fn all_areas(responses: &ResponseMap) -> bool {
    let Some(ResponseValue::Ratings(ratings)) = responses.get(LIFE_AREAS_QUESTION).map(|r| &r.value)
    else {
        return false;
    };
    ratings.len() == LIFE_AREAS.len()
        && LIFE_AREAS.iter().all(|area| {
            ratings
                .get(area.id)
                .is_some_and(|rating| *rating >= ALL_AREAS_MIN_RATING)
        })
}

fn word_master(history: &[Reflection]) -> bool {
    history
        .iter()
        .filter(|r| r.has_answer(WORD_OF_YEAR_QUESTION))
        .count()
        >= WORD_MASTER_COUNT
}

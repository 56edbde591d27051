//! Completion percentage for a mode and a set of responses.

use crate::{catalog, Mode, Question, ResponseMap};

/// Whether `question` is answered in `responses`.
///
/// The question's declared kind picks the expected value shape; a value of
/// another shape does not count as an answer.
pub fn is_answered(question: &Question, responses: &ResponseMap) -> bool {
    responses.get(question.id).is_some_and(|response| {
        response.value.shape() == question.kind.value_shape() && response.value.has_content()
    })
}

/// Percentage (0..=100) of the mode's questions that are answered.
///
/// Responses to questions outside the mode, or unknown to the catalog, are
/// ignored. A mode with no applicable questions yields 0.
pub fn calculate_progress(mode: Mode, responses: &ResponseMap) -> u8 {
    let questions = catalog::questions_for_mode(mode);
    let total = questions.len();
    if total == 0 {
        return 0;
    }
    let answered = questions
        .iter()
        .filter(|q| is_answered(q, responses))
        .count();
    ((answered as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Response, ResponseValue};
    use std::collections::BTreeMap;

    fn answer(map: &mut ResponseMap, id: &str, value: ResponseValue) {
        map.insert(id.to_string(), Response::new(id, value));
    }

    #[test]
    fn empty_responses_are_zero() {
        for mode in Mode::ALL {
            assert_eq!(calculate_progress(*mode, &ResponseMap::new()), 0);
        }
    }

    #[test]
    fn two_quick_answers_are_a_quarter() {
        let mut responses = ResponseMap::new();
        answer(&mut responses, "three_words", ResponseValue::list(["calm", "bold", "kind"]));
        answer(&mut responses, "word_of_year", ResponseValue::text("focus"));
        assert_eq!(calculate_progress(Mode::Quick, &responses), 25);
        // 2 of 21
        assert_eq!(calculate_progress(Mode::Deep, &responses), 10);
    }

    #[test]
    fn blank_values_do_not_count() {
        let mut responses = ResponseMap::new();
        answer(&mut responses, "gratitude", ResponseValue::text("   "));
        answer(&mut responses, "dreams", ResponseValue::list(["", " "]));
        answer(&mut responses, "life_areas_past", ResponseValue::Ratings(BTreeMap::new()));
        assert_eq!(calculate_progress(Mode::Quick, &responses), 0);
    }

    #[test]
    fn mismatched_shape_does_not_count() {
        let mut responses = ResponseMap::new();
        answer(&mut responses, "three_words", ResponseValue::text("not a list"));
        assert_eq!(calculate_progress(Mode::Quick, &responses), 0);
    }

    #[test]
    fn questions_outside_mode_are_ignored() {
        let mut responses = ResponseMap::new();
        answer(&mut responses, "daydream", ResponseValue::text("a beach"));
        answer(&mut responses, "not_in_catalog", ResponseValue::text("x"));
        assert_eq!(calculate_progress(Mode::Quick, &responses), 0);
        assert_eq!(calculate_progress(Mode::Deep, &responses), 5);
    }

    #[test]
    fn all_quick_answers_are_complete() {
        let mut responses = ResponseMap::new();
        for q in catalog::questions_for_mode(Mode::Quick) {
            let value = match q.kind.value_shape() {
                crate::ValueShape::Text => ResponseValue::text("yes"),
                crate::ValueShape::List => ResponseValue::list(["one"]),
                crate::ValueShape::Ratings => {
                    ResponseValue::Ratings(BTreeMap::from([("finances".to_string(), 5)]))
                }
                crate::ValueShape::Calendar => ResponseValue::Calendar(BTreeMap::from([(
                    "January".to_string(),
                    "snow".to_string(),
                )])),
            };
            answer(&mut responses, q.id, value);
        }
        assert_eq!(calculate_progress(Mode::Quick, &responses), 100);
        assert!(calculate_progress(Mode::Ok, &responses) < 100);
    }
}

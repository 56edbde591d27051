//! Static question catalog and display metadata.
//!
//! Ordered as presented. Never mutated at runtime.

use crate::{AchievementType, Mode, QuestionKind, Section};
use serde::Serialize;

/// Question id of the life-area rating question.
pub const LIFE_AREAS_QUESTION: &str = "life_areas_past";

/// Question id of the word-of-the-year question.
pub const WORD_OF_YEAR_QUESTION: &str = "word_of_year";

/// Question id of the three-words question.
pub const THREE_WORDS_QUESTION: &str = "three_words";

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: &'static str,
    pub section: Section,
    pub kind: QuestionKind,
    pub title: &'static str,
    pub prompt: &'static str,
    pub placeholder: Option<&'static str>,
    pub modes: &'static [Mode],
    pub list_count: Option<u8>,
    pub quote: Option<&'static str>,
}

impl Question {
    pub fn applies_to(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }
}

const ALL_MODES: &[Mode] = &[Mode::Quick, Mode::Ok, Mode::Deep];
const OK_AND_DEEP: &[Mode] = &[Mode::Ok, Mode::Deep];
const DEEP_ONLY: &[Mode] = &[Mode::Deep];

pub static QUESTIONS: &[Question] = &[
    // Part 1: the past year
    Question {
        id: "calendar",
        section: Section::Past,
        kind: QuestionKind::Calendar,
        title: "Your Year in Review",
        prompt: "Go through each month. What were the key events, moments, or milestones?",
        placeholder: Some("What happened this month..."),
        modes: DEEP_ONLY,
        list_count: None,
        quote: Some("\"The unexamined life is not worth living.\" — Socrates"),
    },
    Question {
        id: "year_title",
        section: Section::Past,
        kind: QuestionKind::Text,
        title: "Title Your Year",
        prompt: "If a book or movie was made about your year, what would the title be?",
        placeholder: Some("My year was called..."),
        modes: OK_AND_DEEP,
        list_count: None,
        quote: Some("\"Every story has a title. What's yours?\""),
    },
    Question {
        id: THREE_WORDS_QUESTION,
        section: Section::Past,
        kind: QuestionKind::List,
        title: "Three Words",
        prompt: "Choose three words that define your past year.",
        placeholder: Some("One word that captures this year..."),
        modes: ALL_MODES,
        list_count: Some(3),
        quote: Some("\"In the beginning was the Word.\" — John 1:1"),
    },
    Question {
        id: "best_moments",
        section: Section::Past,
        kind: QuestionKind::Textarea,
        title: "Best Moments",
        prompt: "Describe your happiest, most memorable moments. How did you feel? Who was there? What made them special?",
        placeholder: Some("My most treasured moments were..."),
        modes: DEEP_ONLY,
        list_count: None,
        quote: Some("\"Collect moments, not things.\""),
    },
    Question {
        id: "accomplishments",
        section: Section::Past,
        kind: QuestionKind::List,
        title: "Biggest Accomplishments",
        prompt: "What are the three things you're most proud of achieving this year?",
        placeholder: Some("I accomplished..."),
        modes: ALL_MODES,
        list_count: Some(3),
        quote: Some("\"Success is not final, failure is not fatal: it is the courage to continue that counts.\" — Winston Churchill"),
    },
    Question {
        id: "challenges",
        section: Section::Past,
        kind: QuestionKind::List,
        title: "Biggest Challenges",
        prompt: "What were the three biggest challenges you faced this year?",
        placeholder: Some("I struggled with..."),
        modes: OK_AND_DEEP,
        list_count: Some(3),
        quote: Some("\"The obstacle is the way.\" — Marcus Aurelius"),
    },
    Question {
        id: "important_people",
        section: Section::Past,
        kind: QuestionKind::List,
        title: "Most Important People",
        prompt: "Who were the three most important people in your year? Why did they matter?",
        placeholder: Some("This person was important because..."),
        modes: DEEP_ONLY,
        list_count: Some(3),
        quote: Some("\"We are the average of the five people we spend the most time with.\" — Jim Rohn"),
    },
    Question {
        id: "wisest_decisions",
        section: Section::Past,
        kind: QuestionKind::List,
        title: "Wisest Decisions",
        prompt: "What were the three wisest decisions you made this year?",
        placeholder: Some("I wisely chose to..."),
        modes: OK_AND_DEEP,
        list_count: Some(3),
        quote: Some("\"In any moment of decision, the best thing you can do is the right thing.\" — Theodore Roosevelt"),
    },
    Question {
        id: "lessons",
        section: Section::Past,
        kind: QuestionKind::List,
        title: "Biggest Lessons",
        prompt: "What were the three most important lessons you learned this year?",
        placeholder: Some("I learned that..."),
        modes: DEEP_ONLY,
        list_count: Some(3),
        quote: Some("\"The only real mistake is the one from which we learn nothing.\" — Henry Ford"),
    },
    Question {
        id: "gratitude",
        section: Section::Past,
        kind: QuestionKind::Textarea,
        title: "Gratitude",
        prompt: "What are you most grateful for this year?",
        placeholder: Some("I am grateful for..."),
        modes: ALL_MODES,
        list_count: None,
        quote: Some("\"Gratitude turns what we have into enough.\""),
    },
    Question {
        id: LIFE_AREAS_QUESTION,
        section: Section::Past,
        kind: QuestionKind::Rating,
        title: "Life Areas Rating",
        prompt: "How satisfied were you with each area of your life this year? (1 = very unsatisfied, 10 = couldn't be better)",
        placeholder: None,
        modes: ALL_MODES,
        list_count: None,
        quote: Some("\"Balance is not something you find, it's something you create.\" — Jana Kingsford"),
    },
    Question {
        id: "forgiveness",
        section: Section::Past,
        kind: QuestionKind::Textarea,
        title: "Forgiveness",
        prompt: "What do you need to forgive yourself for? What mistakes or regrets can you let go of?",
        placeholder: Some("I forgive myself for..."),
        modes: OK_AND_DEEP,
        list_count: None,
        quote: Some("\"Forgiveness is the fragrance that the violet sheds on the heel that has crushed it.\" — Mark Twain"),
    },
    Question {
        id: "letting_go",
        section: Section::Past,
        kind: QuestionKind::Textarea,
        title: "Letting Go",
        prompt: "What beliefs, habits, or grudges are you ready to release? What no longer serves you?",
        placeholder: Some("I let go of..."),
        modes: OK_AND_DEEP,
        list_count: None,
        quote: Some("\"Some of us think holding on makes us strong, but sometimes it is letting go.\" — Hermann Hesse"),
    },
    // Part 2: the year ahead
    Question {
        id: "daydream",
        section: Section::Future,
        kind: QuestionKind::Textarea,
        title: "Daydream",
        prompt: "Close your eyes. Imagine your ideal year ahead. What do you see? Where are you? How do you feel? What have you accomplished?",
        placeholder: Some("In my ideal year, I see..."),
        modes: DEEP_ONLY,
        list_count: None,
        quote: Some("\"The future belongs to those who believe in the beauty of their dreams.\" — Eleanor Roosevelt"),
    },
    Question {
        id: "dreams",
        section: Section::Future,
        kind: QuestionKind::List,
        title: "Dreams & Wishes",
        prompt: "What are your three biggest dreams or wishes for the coming year?",
        placeholder: Some("I dream of..."),
        modes: ALL_MODES,
        list_count: Some(3),
        quote: Some("\"A dream you dream alone is only a dream. A dream you dream together is reality.\" — Yoko Ono"),
    },
    Question {
        id: WORD_OF_YEAR_QUESTION,
        section: Section::Future,
        kind: QuestionKind::Word,
        title: "Word of the Year",
        prompt: "Pick one word to define and guide your upcoming year. This word will be your compass when you need direction.",
        placeholder: Some("My word is..."),
        modes: ALL_MODES,
        list_count: None,
        quote: Some("\"One word frees us of all the weight and pain of life: that word is love.\" — Sophocles"),
    },
    Question {
        id: "special_because",
        section: Section::Future,
        kind: QuestionKind::Textarea,
        title: "This Year Will Be Special",
        prompt: "Complete this sentence: \"This year will be special for me because...\"",
        placeholder: Some("This year will be special because..."),
        modes: OK_AND_DEEP,
        list_count: None,
        quote: Some("\"The magic you are looking for is in the work you are avoiding.\""),
    },
    Question {
        id: "self_advice",
        section: Section::Future,
        kind: QuestionKind::Textarea,
        title: "Advice to Yourself",
        prompt: "What advice would you give yourself for the year ahead?",
        placeholder: Some("I advise myself to..."),
        modes: OK_AND_DEEP,
        list_count: None,
        quote: Some("\"Be yourself; everyone else is already taken.\" — Oscar Wilde"),
    },
    Question {
        id: "life_area_goals",
        section: Section::Future,
        kind: QuestionKind::List,
        title: "Life Area Goals",
        prompt: "Set one specific goal for each area of your life.",
        placeholder: Some("My goal for this area is..."),
        modes: DEEP_ONLY,
        list_count: Some(7),
        quote: Some("\"Setting goals is the first step in turning the invisible into the visible.\" — Tony Robbins"),
    },
    Question {
        id: "secret_wish",
        section: Section::Future,
        kind: QuestionKind::Textarea,
        title: "Secret Wish",
        prompt: "What is your deepest, secret wish for this year? (No one else needs to know)",
        placeholder: Some("My secret wish is..."),
        modes: ALL_MODES,
        list_count: None,
        quote: Some("\"When you want something, all the universe conspires in helping you to achieve it.\" — Paulo Coelho"),
    },
    Question {
        id: "commitment",
        section: Section::Future,
        kind: QuestionKind::Textarea,
        title: "Your Commitment",
        prompt: "Write your commitment statement. How will you make this year meaningful?",
        placeholder: Some("I commit to making this year meaningful by..."),
        modes: ALL_MODES,
        list_count: None,
        quote: Some("\"The future depends on what you do today.\" — Mahatma Gandhi"),
    },
];

/// Look up a question by id.
pub fn question(id: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Questions that appear in `mode`, in catalog order.
pub fn questions_for_mode(mode: Mode) -> Vec<&'static Question> {
    QUESTIONS.iter().filter(|q| q.applies_to(mode)).collect()
}

/// Filter `questions` down to one section, preserving order.
pub fn questions_by_section<'a>(
    questions: &[&'a Question],
    section: Section,
) -> Vec<&'a Question> {
    questions
        .iter()
        .copied()
        .filter(|q| q.section == section)
        .collect()
}

/// Life area rated by the life-area question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifeArea {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

pub static LIFE_AREAS: &[LifeArea] = &[
    LifeArea { id: "personal_growth", name: "Personal Growth", icon: "🌱" },
    LifeArea { id: "work_career", name: "Work & Career", icon: "💼" },
    LifeArea { id: "health_fitness", name: "Health & Fitness", icon: "💪" },
    LifeArea { id: "relationships", name: "Relationships", icon: "❤️" },
    LifeArea { id: "fun_recreation", name: "Fun & Recreation", icon: "🎉" },
    LifeArea { id: "finances", name: "Finances", icon: "💰" },
    LifeArea { id: "spirituality", name: "Spirituality & Inner Peace", icon: "🧘" },
];

/// Keys of the calendar question.
pub static MONTHS: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Display metadata for an achievement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDef {
    pub achievement_type: AchievementType,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

pub static ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        achievement_type: AchievementType::FirstJourney,
        name: "First Steps",
        description: "Complete your first reflection journey",
        icon: "🚀",
    },
    AchievementDef {
        achievement_type: AchievementType::DeepThinker,
        name: "Deep Thinker",
        description: "Complete a Deep Think journey",
        icon: "🧠",
    },
    AchievementDef {
        achievement_type: AchievementType::SpeedRunner,
        name: "Speed Runner",
        description: "Complete Quick mode in under 10 minutes",
        icon: "⚡",
    },
    AchievementDef {
        achievement_type: AchievementType::Consistent,
        name: "Consistent",
        description: "Complete journeys 2 years in a row",
        icon: "📅",
    },
    AchievementDef {
        achievement_type: AchievementType::AllAreas,
        name: "Balanced Life",
        description: "Rate all 7 life areas as 7 or higher",
        icon: "⚖️",
    },
    AchievementDef {
        achievement_type: AchievementType::WordMaster,
        name: "Word Master",
        description: "Set your word of the year 3 times",
        icon: "📝",
    },
    AchievementDef {
        achievement_type: AchievementType::Sharer,
        name: "Sharer",
        description: "Create your first shareable card",
        icon: "🔗",
    },
];

pub fn achievement_def(achievement_type: AchievementType) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS
        .iter()
        .find(|d| d.achievement_type == achievement_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn question_ids_are_unique() {
        let ids: HashSet<_> = QUESTIONS.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), QUESTIONS.len());
    }

    #[test]
    fn deeper_modes_are_supersets() {
        let quick: HashSet<_> = questions_for_mode(Mode::Quick).iter().map(|q| q.id).collect();
        let ok: HashSet<_> = questions_for_mode(Mode::Ok).iter().map(|q| q.id).collect();
        let deep: HashSet<_> = questions_for_mode(Mode::Deep).iter().map(|q| q.id).collect();
        assert!(quick.is_subset(&ok));
        assert!(ok.is_subset(&deep));
        assert_eq!(quick.len(), 8);
        assert_eq!(ok.len(), 15);
        assert_eq!(deep.len(), QUESTIONS.len());
    }

    #[test]
    fn list_questions_declare_counts() {
        for q in QUESTIONS.iter().filter(|q| q.kind == QuestionKind::List) {
            assert!(q.list_count.is_some(), "{} has no list count", q.id);
        }
        assert_eq!(question("life_area_goals").unwrap().list_count, Some(LIFE_AREAS.len() as u8));
    }

    #[test]
    fn sections_preserve_catalog_order() {
        let quick = questions_for_mode(Mode::Quick);
        let future = questions_by_section(&quick, Section::Future);
        let ids: Vec<_> = future.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["dreams", "word_of_year", "secret_wish", "commitment"]);
    }

    #[test]
    fn every_achievement_type_has_a_definition() {
        for t in AchievementType::ALL {
            assert!(achievement_def(*t).is_some());
        }
    }
}

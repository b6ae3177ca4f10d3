use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Strategy;

pub const DEFAULT_EASINESS: f64 = 2.5;
pub const MIN_EASINESS: f64 = 1.3;
pub const DEFAULT_INTERVAL: u32 = 1;
/// Longest review interval, roughly a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordList {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub from_language: Option<String>,
    pub to_language: Option<String>,
    pub forked_from: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub word_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub value: String,
    pub language_code: String,
}

impl Translation {
    pub fn new(value: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language_code: language_code.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub list_id: String,
    /// The prompt shown to the learner.
    pub text: String,
    /// Free-form tag; the interleaved strategy alternates across these.
    pub category: String,
    /// Higher is harder. Always positive.
    pub complexity: f64,
    pub translations: Vec<Translation>,
    pub spaced_repetition: Option<SpacedRepetitionData>,
}

impl Word {
    pub fn primary_translation(&self) -> Option<&Translation> {
        self.translations.first()
    }

    /// The answer every mode grades against first.
    pub fn correct_answer(&self) -> &str {
        self.primary_translation()
            .map(|t| t.value.as_str())
            .unwrap_or("")
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.spaced_repetition
            .as_ref()
            .is_some_and(|d| d.is_overdue(now))
    }
}

/// Per-word SM-2 scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacedRepetitionData {
    pub easiness: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

impl SpacedRepetitionData {
    /// State used for a word that has never been reviewed.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            easiness: DEFAULT_EASINESS,
            interval: DEFAULT_INTERVAL,
            repetitions: 0,
            next_review: now,
            last_review: None,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.next_review
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_review
    }

    pub fn days_until_review(&self, now: DateTime<Utc>) -> i64 {
        (self.next_review - now).num_days()
    }

    /// `None` when the date falls outside the representable range.
    pub(crate) fn review_after(now: DateTime<Utc>, interval: u32) -> Option<DateTime<Utc>> {
        now.checked_add_signed(Duration::days(i64::from(interval)))
    }
}

// Practice modes offered to the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
    Flashcards,
    Writing,
    MultipleChoice,
    Listening,
}

impl PracticeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeMode::Flashcards => "flashcards",
            PracticeMode::Writing => "writing",
            PracticeMode::MultipleChoice => "multiple_choice",
            PracticeMode::Listening => "listening",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flashcards" | "flashcard" | "cards" => Some(PracticeMode::Flashcards),
            "writing" | "write" => Some(PracticeMode::Writing),
            "multiple_choice" | "multiple-choice" | "quiz" | "choice" => {
                Some(PracticeMode::MultipleChoice)
            }
            "listening" | "listen" => Some(PracticeMode::Listening),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PracticeMode::Flashcards => "Flashcards",
            PracticeMode::Writing => "Writing",
            PracticeMode::MultipleChoice => "Multiple choice",
            PracticeMode::Listening => "Listening",
        }
    }

    /// Free-text modes grade against every translation, not only the first.
    pub fn accepts_synonyms(&self) -> bool {
        matches!(self, PracticeMode::Writing | PracticeMode::Listening)
    }

    pub fn is_self_graded(&self) -> bool {
        matches!(self, PracticeMode::Flashcards)
    }
}

/// One learner response to one word. Never mutated after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub word_id: String,
    pub given_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    /// 0-100 similarity between the given and expected answer.
    pub match_score: u8,
    pub time_spent_ms: u64,
    /// 1-based count of attempts made on this word within the session.
    pub attempt_number: u32,
}

/// The word a result was scored against.
///
/// The adaptive strategy reads `complexity` from here to pick its next target,
/// and the interleaved strategy reads `category` to avoid repeating a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWord {
    pub id: String,
    pub category: String,
    pub complexity: f64,
}

impl From<&Word> for CurrentWord {
    fn from(word: &Word) -> Self {
        Self {
            id: word.id.clone(),
            category: word.category.clone(),
            complexity: word.complexity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub word_order: Vec<String>,
    pub current_index: usize,
    pub remaining_words: Vec<String>,
    pub mistake_words: Vec<String>,
    pub current_word: Option<CurrentWord>,
}

/// Aggregate of attempts against one list. Handed to the result sink as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: String,
    pub list_id: String,
    pub mode: PracticeMode,
    pub strategy: Strategy,
    pub answers: Vec<Attempt>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_time_ms: u64,
    pub correct_count: u32,
    pub total_count: u32,
    pub score: f64,
    pub state: SessionSnapshot,
}

impl SessionResult {
    pub fn attempts_for<'a>(&'a self, word_id: &'a str) -> impl Iterator<Item = &'a Attempt> {
        self.answers.iter().filter(move |a| a.word_id == word_id)
    }

    /// Share of correct answers, or `None` when nothing was answered.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_count == 0 {
            None
        } else {
            Some(f64::from(self.correct_count) / f64::from(self.total_count))
        }
    }

    pub fn score_for(correct_count: u32, total_count: u32) -> f64 {
        if total_count == 0 {
            0.0
        } else {
            f64::from(correct_count) / f64::from(total_count) * 100.0
        }
    }
}

// JSON output wrapper for the CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

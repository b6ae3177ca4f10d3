//! Practice session controller.
//!
//! A session owns its word pool, asks the configured [`Strategy`] for the next
//! word, grades answers, reschedules the word, and re-queues it when the
//! strategy says so. Scheduling state is handed to the [`SessionStore`] after
//! every scored answer; the aggregated [`SessionResult`] once the pool runs dry.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::hint::mask_answer;
use crate::engine::matching::{grade, MatchOptions, MatchOutcome, MAX_ERROR_TOLERANCE, MIN_ERROR_TOLERANCE};
use crate::engine::ordering::order_for_review;
use crate::engine::quality::estimate_quality;
use crate::engine::scheduler::schedule_next;
use crate::engine::Strategy;
use crate::error::{EngineError, Result};
use crate::models::{
    Attempt, CurrentWord, PracticeMode, SessionResult, SessionSnapshot, SpacedRepetitionData, Word,
};

pub const DEFAULT_MAX_PRESENTATIONS: u32 = 3;

/// Where a session commits its work. Both writes may be retried with the
/// same payload, so implementations must be idempotent.
pub trait SessionStore {
    fn save_schedule(&self, word_id: &str, data: &SpacedRepetitionData) -> Result<()>;
    fn save_result(&self, result: &SessionResult) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub strategy: Strategy,
    pub mode: PracticeMode,
    pub matching: MatchOptions,
    /// Upper bound on how often one word is shown in a session.
    pub max_presentations: u32,
    /// Also hand every single-answer result to the store.
    pub persist_each_answer: bool,
    pub random_order: bool,
    /// Start from overdue words; takes precedence over `random_order`.
    pub prioritize_due: bool,
    pub show_hints: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            mode: PracticeMode::Writing,
            matching: MatchOptions::default(),
            max_presentations: DEFAULT_MAX_PRESENTATIONS,
            persist_each_answer: false,
            random_order: false,
            prioritize_due: false,
            show_hints: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_presentations == 0 {
            return Err(EngineError::invalid("max_presentations must be at least 1"));
        }
        let tolerance = self.matching.error_tolerance;
        if !(MIN_ERROR_TOLERANCE..=MAX_ERROR_TOLERANCE).contains(&tolerance) {
            return Err(EngineError::invalid(format!(
                "error tolerance {} outside [{}, {}]",
                tolerance, MIN_ERROR_TOLERANCE, MAX_ERROR_TOLERANCE
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    AwaitingAnswer(Word),
    Scoring,
    Finished,
}

/// What happened to one submitted answer.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub attempt: Attempt,
    pub quality: f64,
    pub schedule: SpacedRepetitionData,
    pub repeated: bool,
    pub finished: bool,
    /// Set when the store rejected a write. The session has advanced anyway.
    pub persistence_error: Option<EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub presented: usize,
    pub remaining: usize,
    pub answered: usize,
    pub correct: usize,
}

pub struct Session<R: Rng> {
    id: String,
    list_id: String,
    config: SessionConfig,
    rng: R,
    words: Vec<Word>,
    pool: Vec<Word>,
    state: SessionState,
    history: Vec<SessionResult>,
    answers: Vec<Attempt>,
    word_order: Vec<String>,
    presentations: HashMap<String, u32>,
    started_at: DateTime<Utc>,
    result: Option<SessionResult>,
}

impl<R: Rng> Session<R> {
    pub fn start(
        list_id: impl Into<String>,
        words: Vec<Word>,
        config: SessionConfig,
        rng: R,
    ) -> Result<Self> {
        Self::start_at(list_id, words, config, rng, Utc::now())
    }

    pub fn start_at(
        list_id: impl Into<String>,
        words: Vec<Word>,
        config: SessionConfig,
        mut rng: R,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if words.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        config.validate()?;

        let pool: Vec<Word> = if config.prioritize_due {
            order_for_review(&words, now).into_iter().cloned().collect()
        } else {
            let mut pool = words.clone();
            if config.random_order {
                pool.shuffle(&mut rng);
            }
            pool
        };

        let mut session = Self {
            id: Uuid::new_v4().to_string(),
            list_id: list_id.into(),
            config,
            rng,
            words,
            pool,
            state: SessionState::Finished,
            history: Vec::new(),
            answers: Vec::new(),
            word_order: Vec::new(),
            presentations: HashMap::new(),
            started_at: now,
            result: None,
        };
        session.present_next()?;

        info!(
            session_id = %session.id,
            list_id = %session.list_id,
            strategy = session.config.strategy.as_str(),
            mode = session.config.mode.as_str(),
            words = session.words.len(),
            "practice session started"
        );
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn current_word(&self) -> Option<&Word> {
        match &self.state {
            SessionState::AwaitingAnswer(word) => Some(word),
            _ => None,
        }
    }

    /// Words still waiting, excluding the one on screen.
    pub fn pool(&self) -> &[Word] {
        &self.pool
    }

    /// Every word of the session with its latest scheduling state.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Single-answer results, newest first.
    pub fn history(&self) -> &[SessionResult] {
        &self.history
    }

    pub fn answers(&self) -> &[Attempt] {
        &self.answers
    }

    /// The aggregated result, once finished.
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            presented: self.word_order.len(),
            remaining: self.pool.len() + usize::from(self.current_word().is_some()),
            answered: self.answers.len(),
            correct: self.answers.iter().filter(|a| a.is_correct).count(),
        }
    }

    /// Attempts and mistakes recorded so far on `word_id`.
    pub fn attempts_on(&self, word_id: &str) -> (u32, u32) {
        self.answers
            .iter()
            .filter(|a| a.word_id == word_id)
            .fold((0, 0), |(n, m), a| (n + 1, m + u32::from(!a.is_correct)))
    }

    pub fn hint_level(&self) -> u8 {
        let Some(word) = self.current_word() else {
            return 0;
        };
        if !self.config.show_hints {
            return 0;
        }
        let (attempts, mistakes) = self.attempts_on(&word.id);
        self.config.strategy.hint_level(attempts + 1, mistakes)
    }

    /// The current answer redacted to the strategy's hint level.
    pub fn hint(&self) -> String {
        match self.current_word() {
            Some(word) => mask_answer(word.correct_answer(), self.hint_level()),
            None => String::new(),
        }
    }

    /// Shuffled options for multiple choice: the correct answer plus up to
    /// `count - 1` distractors drawn from the other session words.
    pub fn choices(&mut self, count: usize) -> Vec<String> {
        let Some(word) = self.current_word() else {
            return Vec::new();
        };
        let correct = word.correct_answer().to_string();
        let word_id = word.id.clone();

        let mut seen = HashSet::new();
        seen.insert(correct.to_lowercase());
        let mut distractors: Vec<String> = self
            .words
            .iter()
            .filter(|w| w.id != word_id)
            .map(|w| w.correct_answer().to_string())
            .filter(|answer| !answer.is_empty() && seen.insert(answer.to_lowercase()))
            .collect();
        distractors.shuffle(&mut self.rng);
        distractors.truncate(count.saturating_sub(1));

        distractors.push(correct);
        distractors.shuffle(&mut self.rng);
        distractors
    }

    pub fn submit_answer<S: SessionStore + ?Sized>(
        &mut self,
        given: &str,
        time_spent_ms: u64,
        store: &S,
    ) -> Result<AnswerOutcome> {
        self.submit_answer_at(given, time_spent_ms, store, Utc::now())
    }

    pub fn submit_answer_at<S: SessionStore + ?Sized>(
        &mut self,
        given: &str,
        time_spent_ms: u64,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome> {
        let word = self.awaiting()?;
        let outcome = grade(given, word, self.config.mode, &self.config.matching);
        self.record(given.trim().to_string(), outcome, time_spent_ms, store, now)
    }

    /// Self-graded answer, as used by flashcards.
    pub fn submit_recall<S: SessionStore + ?Sized>(
        &mut self,
        recalled: bool,
        time_spent_ms: u64,
        store: &S,
    ) -> Result<AnswerOutcome> {
        self.submit_recall_at(recalled, time_spent_ms, store, Utc::now())
    }

    pub fn submit_recall_at<S: SessionStore + ?Sized>(
        &mut self,
        recalled: bool,
        time_spent_ms: u64,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome> {
        let given = if recalled {
            self.awaiting()?.correct_answer().to_string()
        } else {
            self.awaiting()?;
            String::new()
        };
        let outcome = MatchOutcome {
            is_correct: recalled,
            match_score: if recalled { 100 } else { 0 },
            matched: recalled.then_some(0),
        };
        self.record(given, outcome, time_spent_ms, store, now)
    }

    /// Writes the aggregated result again, e.g. after a reported failure.
    pub fn retry_persist<S: SessionStore + ?Sized>(&self, store: &S) -> Result<()> {
        match &self.result {
            Some(result) => store.save_result(result),
            None => Err(EngineError::invalid("session has not finished yet")),
        }
    }

    fn awaiting(&self) -> Result<&Word> {
        match &self.state {
            SessionState::AwaitingAnswer(word) => Ok(word),
            SessionState::Scoring => Err(EngineError::invalid("an answer is already being scored")),
            SessionState::Finished => Err(EngineError::invalid("session is finished")),
        }
    }

    fn record<S: SessionStore + ?Sized>(
        &mut self,
        given: String,
        outcome: MatchOutcome,
        time_spent_ms: u64,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome> {
        let word = self.awaiting()?.clone();
        let (attempts, _) = self.attempts_on(&word.id);

        let attempt = Attempt {
            word_id: word.id.clone(),
            given_answer: given,
            correct_answer: word.correct_answer().to_string(),
            is_correct: outcome.is_correct,
            match_score: outcome.match_score,
            time_spent_ms,
            attempt_number: attempts + 1,
        };
        let answer_result = self.single_answer_result(&word, &attempt, now);

        // Everything fallible runs before the session is touched.
        let quality = estimate_quality(&answer_result)?;
        let schedule = schedule_next(quality, word.spaced_repetition.as_ref(), now)?;

        let updated = Word {
            spaced_repetition: Some(schedule.clone()),
            ..word
        };
        let slot = self
            .words
            .iter_mut()
            .find(|w| w.id == updated.id)
            .ok_or_else(|| EngineError::NotFound(updated.id.clone()))?;
        *slot = updated.clone();
        self.state = SessionState::Scoring;

        self.answers.push(attempt.clone());
        self.history.insert(0, answer_result);

        debug!(
            word_id = %updated.id,
            correct = attempt.is_correct,
            quality,
            interval = schedule.interval,
            "answer scored"
        );

        let mut persistence_error = self.persist(|| store.save_schedule(&updated.id, &schedule));
        if self.config.persist_each_answer {
            let answer_result = &self.history[0];
            if let Some(e) = self.persist(|| store.save_result(answer_result)) {
                persistence_error.get_or_insert(e);
            }
        }

        let shown = self.presentations.get(&updated.id).copied().unwrap_or(0);
        let repeated = shown < self.config.max_presentations
            && self.config.strategy.should_repeat(&updated, &self.history[0]);
        if repeated {
            self.pool.push(updated);
        }

        if self.pool.is_empty() {
            let result = self.finish(now);
            if let Some(e) = self.persist(|| store.save_result(&result)) {
                persistence_error.get_or_insert(e);
            }
            self.result = Some(result);
        } else {
            self.present_next()?;
        }

        Ok(AnswerOutcome {
            attempt,
            quality,
            schedule,
            repeated,
            finished: self.is_finished(),
            persistence_error,
        })
    }

    fn persist<F: FnOnce() -> Result<()>>(&self, write: F) -> Option<EngineError> {
        match write() {
            Ok(()) => None,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "session write failed");
                Some(e)
            }
        }
    }

    fn present_next(&mut self) -> Result<()> {
        let index = self
            .config
            .strategy
            .select_index(&self.pool, &self.history, &mut self.rng)?;
        let word = self.pool.remove(index);
        *self.presentations.entry(word.id.clone()).or_insert(0) += 1;
        self.word_order.push(word.id.clone());
        self.state = SessionState::AwaitingAnswer(word);
        Ok(())
    }

    fn mistake_words(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.answers
            .iter()
            .filter(|a| !a.is_correct && seen.insert(a.word_id.as_str()))
            .map(|a| a.word_id.clone())
            .collect()
    }

    fn single_answer_result(&self, word: &Word, attempt: &Attempt, now: DateTime<Utc>) -> SessionResult {
        let correct = u32::from(attempt.is_correct);
        let mut mistake_words = self.mistake_words();
        if !attempt.is_correct && !mistake_words.contains(&word.id) {
            mistake_words.push(word.id.clone());
        }

        SessionResult {
            id: Uuid::new_v4().to_string(),
            list_id: self.list_id.clone(),
            mode: self.config.mode,
            strategy: self.config.strategy,
            answers: vec![attempt.clone()],
            started_at: i64::try_from(attempt.time_spent_ms)
                .ok()
                .map(Duration::milliseconds)
                .and_then(|spent| now.checked_sub_signed(spent))
                .unwrap_or(now),
            completed_at: now,
            total_time_ms: attempt.time_spent_ms,
            correct_count: correct,
            total_count: 1,
            score: SessionResult::score_for(correct, 1),
            state: SessionSnapshot {
                word_order: self.word_order.clone(),
                current_index: self.word_order.len().saturating_sub(1),
                remaining_words: self.pool.iter().map(|w| w.id.clone()).collect(),
                mistake_words,
                current_word: Some(CurrentWord::from(word)),
            },
        }
    }

    fn finish(&mut self, now: DateTime<Utc>) -> SessionResult {
        self.state = SessionState::Finished;

        let total = self.answers.len() as u32;
        let correct = self.answers.iter().filter(|a| a.is_correct).count() as u32;
        let last_word = self
            .word_order
            .last()
            .and_then(|id| self.words.iter().find(|w| &w.id == id))
            .map(CurrentWord::from);

        let result = SessionResult {
            id: self.id.clone(),
            list_id: self.list_id.clone(),
            mode: self.config.mode,
            strategy: self.config.strategy,
            answers: self.answers.clone(),
            started_at: self.started_at,
            completed_at: now,
            total_time_ms: self
                .answers
                .iter()
                .fold(0u64, |total, a| total.saturating_add(a.time_spent_ms)),
            correct_count: correct,
            total_count: total,
            score: SessionResult::score_for(correct, total),
            state: SessionSnapshot {
                word_order: self.word_order.clone(),
                current_index: self.word_order.len(),
                remaining_words: Vec::new(),
                mistake_words: self.mistake_words(),
                current_word: last_word,
            },
        };

        info!(
            session_id = %self.id,
            correct,
            total,
            score = result.score,
            "practice session finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Translation;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct MemoryStore {
        schedules: RefCell<HashMap<String, SpacedRepetitionData>>,
        results: RefCell<Vec<SessionResult>>,
        fail_results: Cell<bool>,
    }

    impl SessionStore for MemoryStore {
        fn save_schedule(&self, word_id: &str, data: &SpacedRepetitionData) -> Result<()> {
            self.schedules
                .borrow_mut()
                .insert(word_id.to_string(), data.clone());
            Ok(())
        }

        fn save_result(&self, result: &SessionResult) -> Result<()> {
            if self.fail_results.get() {
                return Err(EngineError::PersistenceFailure("sink offline".into()));
            }
            let mut results = self.results.borrow_mut();
            results.retain(|r| r.id != result.id);
            results.push(result.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()
    }

    fn word(id: &str, category: &str, complexity: f64, answer: &str) -> Word {
        Word {
            id: id.into(),
            list_id: "list".into(),
            text: format!("prompt-{}", id),
            category: category.into(),
            complexity,
            translations: vec![Translation::new(answer, "fr")],
            spaced_repetition: None,
        }
    }

    fn three_words() -> Vec<Word> {
        vec![
            word("a", "noun", 1.0, "chat"),
            word("b", "verb", 2.0, "manger"),
            word("c", "adj", 3.0, "rouge"),
        ]
    }

    fn config(strategy: Strategy) -> SessionConfig {
        SessionConfig {
            strategy,
            ..SessionConfig::default()
        }
    }

    fn start(words: Vec<Word>, config: SessionConfig) -> Session<ChaCha8Rng> {
        Session::start_at("list", words, config, ChaCha8Rng::seed_from_u64(42), now()).unwrap()
    }

    fn answer_correctly(session: &mut Session<ChaCha8Rng>, store: &MemoryStore) -> AnswerOutcome {
        let answer = session.current_word().unwrap().correct_answer().to_string();
        session.submit_answer_at(&answer, 1_500, store, now()).unwrap()
    }

    mod start_tests {
        use super::*;

        #[test]
        fn empty_word_list_is_rejected() {
            let result = Session::start_at(
                "list",
                vec![],
                SessionConfig::default(),
                ChaCha8Rng::seed_from_u64(1),
                now(),
            );
            assert!(matches!(result, Err(EngineError::EmptyPool)));
        }

        #[test]
        fn invalid_config_is_rejected() {
            let bad = SessionConfig {
                max_presentations: 0,
                ..SessionConfig::default()
            };
            let result = Session::start_at("list", three_words(), bad, ChaCha8Rng::seed_from_u64(1), now());
            assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        }

        #[test]
        fn first_word_is_awaiting_answer() {
            let session = start(three_words(), config(Strategy::AdaptiveDifficulty));
            assert_eq!(session.current_word().unwrap().id, "a");
            assert_eq!(session.pool().len(), 2);
            assert_eq!(session.progress().remaining, 3);
        }

        #[test]
        fn prioritize_due_starts_with_overdue_word() {
            let mut words = three_words();
            words[2].spaced_repetition = Some(SpacedRepetitionData {
                next_review: now() - Duration::days(2),
                ..SpacedRepetitionData::initial(now())
            });
            let cfg = SessionConfig {
                strategy: Strategy::RetrievalPractice,
                prioritize_due: true,
                ..SessionConfig::default()
            };
            let session = start(words, cfg);
            assert_eq!(session.current_word().unwrap().id, "c");
        }
    }

    mod end_to_end_tests {
        use super::*;

        #[test]
        fn three_correct_fast_answers_finish_the_session() {
            let store = MemoryStore::default();
            let mut session = start(three_words(), config(Strategy::Interleaved));

            for _ in 0..3 {
                let outcome = answer_correctly(&mut session, &store);
                assert!(outcome.attempt.is_correct);
                assert!(!outcome.repeated);
                assert!((outcome.quality - 5.0).abs() < 1e-9);
            }

            assert!(session.is_finished());
            let result = session.result().unwrap();
            assert_eq!(result.correct_count, 3);
            assert_eq!(result.total_count, 3);
            assert_eq!(result.score, 100.0);
            assert!(result.state.mistake_words.is_empty());
            assert_eq!(result.state.word_order.len(), 3);

            for w in session.words() {
                assert_eq!(w.spaced_repetition.as_ref().unwrap().repetitions, 1);
            }
            assert_eq!(store.schedules.borrow().len(), 3);
            assert!(store.schedules.borrow().values().all(|d| d.repetitions == 1));
            assert_eq!(store.results.borrow().len(), 1);
        }

        #[test]
        fn answering_after_finish_is_rejected() {
            let store = MemoryStore::default();
            let mut session = start(vec![word("a", "x", 1.0, "chat")], config(Strategy::Interleaved));
            answer_correctly(&mut session, &store);
            assert!(session.is_finished());
            assert!(matches!(
                session.submit_answer_at("chat", 100, &store, now()),
                Err(EngineError::InvalidInput(_))
            ));
        }

        #[test]
        fn wrong_answer_requeues_word() {
            let store = MemoryStore::default();
            let mut session = start(vec![word("a", "x", 1.0, "chat")], config(Strategy::Interleaved));

            let outcome = session.submit_answer_at("chien", 1_000, &store, now()).unwrap();
            assert!(!outcome.attempt.is_correct);
            assert!(outcome.repeated);
            assert!(!outcome.finished);
            assert_eq!(outcome.schedule.repetitions, 0);
            assert_eq!(session.current_word().unwrap().id, "a");

            let outcome = answer_correctly(&mut session, &store);
            assert_eq!(outcome.attempt.attempt_number, 2);
            assert!(outcome.finished);
            assert_eq!(session.result().unwrap().state.mistake_words, vec!["a".to_string()]);
        }

        #[test]
        fn presentation_cap_ends_repeats() {
            let store = MemoryStore::default();
            let cfg = SessionConfig {
                max_presentations: 2,
                ..config(Strategy::Interleaved)
            };
            let mut session = start(vec![word("a", "x", 1.0, "chat")], cfg);

            session.submit_answer_at("non", 1_000, &store, now()).unwrap();
            let outcome = session.submit_answer_at("non", 1_000, &store, now()).unwrap();
            assert!(!outcome.repeated);
            assert!(outcome.finished);
            assert_eq!(session.answers().len(), 2);
        }

        #[test]
        fn adaptive_repeats_until_cap() {
            let store = MemoryStore::default();
            let mut session = start(vec![word("a", "x", 1.0, "chat")], config(Strategy::AdaptiveDifficulty));
            for _ in 0..DEFAULT_MAX_PRESENTATIONS {
                answer_correctly(&mut session, &store);
            }
            assert!(session.is_finished());
            assert_eq!(session.words()[0].spaced_repetition.as_ref().unwrap().repetitions, 3);
        }

        #[test]
        fn history_is_newest_first_with_snapshot() {
            let store = MemoryStore::default();
            let mut session = start(three_words(), config(Strategy::AdaptiveDifficulty));
            answer_correctly(&mut session, &store);
            let first = session.history()[0].state.current_word.clone().unwrap();
            answer_correctly(&mut session, &store);
            assert_eq!(session.history().len(), 2);
            assert_eq!(session.history()[1].state.current_word.as_ref().unwrap(), &first);
        }
    }

    mod robustness_tests {
        use super::*;

        #[test]
        fn huge_answer_time_does_not_overflow() {
            let store = MemoryStore::default();
            let mut session = start(vec![word("a", "x", 1.0, "chat")], config(Strategy::Interleaved));

            let outcome = session.submit_answer_at("chat", u64::MAX, &store, now()).unwrap();
            assert!(outcome.finished);
            assert_eq!(session.history()[0].started_at, now());
            assert_eq!(session.result().unwrap().total_time_ms, u64::MAX);
        }

        #[test]
        fn unknown_word_leaves_session_awaiting() {
            let store = MemoryStore::default();
            let mut session = start(vec![word("a", "x", 1.0, "chat")], config(Strategy::Interleaved));
            session.words.clear();

            let err = session.submit_answer_at("chat", 1_000, &store, now()).unwrap_err();
            assert_eq!(err, EngineError::NotFound("a".into()));
            assert!(matches!(session.state(), SessionState::AwaitingAnswer(w) if w.id == "a"));
            assert!(session.answers().is_empty());
        }
    }

    mod flashcard_tests {
        use super::*;

        #[test]
        fn recall_is_self_graded() {
            let store = MemoryStore::default();
            let cfg = SessionConfig {
                mode: PracticeMode::Flashcards,
                ..config(Strategy::Interleaved)
            };
            let mut session = start(vec![word("a", "x", 1.0, "chat")], cfg);

            let outcome = session.submit_recall_at(false, 3_000, &store, now()).unwrap();
            assert!(!outcome.attempt.is_correct);
            assert_eq!(outcome.attempt.match_score, 0);

            let outcome = session.submit_recall_at(true, 3_000, &store, now()).unwrap();
            assert!(outcome.attempt.is_correct);
            assert_eq!(outcome.attempt.given_answer, "chat");
            assert!(outcome.finished);
        }
    }

    mod persistence_tests {
        use super::*;

        #[test]
        fn failed_result_write_still_finishes() {
            let store = MemoryStore::default();
            store.fail_results.set(true);
            let mut session = start(vec![word("a", "x", 1.0, "chat")], config(Strategy::Interleaved));

            let outcome = answer_correctly(&mut session, &store);
            assert!(outcome.finished);
            assert!(matches!(
                outcome.persistence_error,
                Some(EngineError::PersistenceFailure(_))
            ));
            assert!(session.is_finished());
            assert!(session.result().is_some());

            store.fail_results.set(false);
            session.retry_persist(&store).unwrap();
            session.retry_persist(&store).unwrap();
            assert_eq!(store.results.borrow().len(), 1);
        }

        #[test]
        fn retry_before_finish_is_invalid() {
            let store = MemoryStore::default();
            let session = start(three_words(), config(Strategy::Interleaved));
            assert!(session.retry_persist(&store).is_err());
        }

        #[test]
        fn granular_mode_saves_every_answer() {
            let store = MemoryStore::default();
            let cfg = SessionConfig {
                persist_each_answer: true,
                ..config(Strategy::Interleaved)
            };
            let mut session = start(three_words(), cfg);
            for _ in 0..3 {
                answer_correctly(&mut session, &store);
            }
            // three single-answer results plus the aggregate
            assert_eq!(store.results.borrow().len(), 4);
        }
    }

    mod hint_tests {
        use super::*;

        #[test]
        fn interleaved_hint_after_two_mistakes() {
            let store = MemoryStore::default();
            let cfg = SessionConfig {
                max_presentations: 5,
                ..config(Strategy::Interleaved)
            };
            let mut session = start(vec![word("a", "x", 1.0, "bonjour")], cfg);
            assert_eq!(session.hint(), "");

            session.submit_answer_at("non", 1_000, &store, now()).unwrap();
            assert_eq!(session.hint(), "");
            session.submit_answer_at("non", 1_000, &store, now()).unwrap();
            assert_eq!(session.hint_level(), 1);
            assert_eq!(session.hint(), "b...");
        }

        #[test]
        fn hints_can_be_disabled() {
            let store = MemoryStore::default();
            let cfg = SessionConfig {
                show_hints: false,
                max_presentations: 5,
                ..config(Strategy::Interleaved)
            };
            let mut session = start(vec![word("a", "x", 1.0, "bonjour")], cfg);
            session.submit_answer_at("non", 1_000, &store, now()).unwrap();
            session.submit_answer_at("non", 1_000, &store, now()).unwrap();
            assert_eq!(session.hint(), "");
        }
    }

    mod choice_tests {
        use super::*;

        #[test]
        fn choices_include_correct_answer() {
            let mut session = start(three_words(), config(Strategy::AdaptiveDifficulty));
            let options = session.choices(4);
            assert_eq!(options.len(), 3);
            assert!(options.contains(&"chat".to_string()));
            assert!(options.contains(&"manger".to_string()));
        }

        #[test]
        fn choices_respect_count() {
            let mut session = start(three_words(), config(Strategy::AdaptiveDifficulty));
            let options = session.choices(2);
            assert_eq!(options.len(), 2);
            assert!(options.contains(&"chat".to_string()));
        }
    }
}

//! Word selection strategies.
//!
//! Each strategy decides which word from the session pool comes next, whether a
//! just-answered word has to come back, and how much of a hint to reveal.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{SessionResult, Word};

/// Per-word success rate at which retrieval practice stops repeating a word.
const RETRIEVAL_TARGET_RATE: f64 = 0.8;
/// Adaptive difficulty steps up above this success rate...
const ADAPTIVE_STEP_UP_RATE: f64 = 0.8;
/// ...and down below this one.
const ADAPTIVE_STEP_DOWN_RATE: f64 = 0.6;
const ADAPTIVE_MIN_ATTEMPTS: usize = 3;
const MIN_COMPLEXITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Interleaved,
    RetrievalPractice,
    AdaptiveDifficulty,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::Interleaved,
        Strategy::RetrievalPractice,
        Strategy::AdaptiveDifficulty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Interleaved => "interleaved",
            Strategy::RetrievalPractice => "retrieval_practice",
            Strategy::AdaptiveDifficulty => "adaptive_difficulty",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "interleaved" | "interleave" => Some(Strategy::Interleaved),
            "retrieval_practice" | "retrieval" => Some(Strategy::RetrievalPractice),
            "adaptive_difficulty" | "adaptive" => Some(Strategy::AdaptiveDifficulty),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Interleaved => "Interleaved Practice",
            Strategy::RetrievalPractice => "Retrieval Practice",
            Strategy::AdaptiveDifficulty => "Adaptive Difficulty",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Interleaved => "Mix different categories of words to enhance learning transfer",
            Strategy::RetrievalPractice => "Emphasize active recall of the words you miss most",
            Strategy::AdaptiveDifficulty => "Adjust word difficulty to match your recent performance",
        }
    }

    /// Picks the next word from `pool`. `history` is newest first.
    pub fn next_word<'a, R: Rng + ?Sized>(
        &self,
        pool: &'a [Word],
        history: &[SessionResult],
        rng: &mut R,
    ) -> Result<&'a Word> {
        let index = self.select_index(pool, history, rng)?;
        Ok(&pool[index])
    }

    /// Same as [`Strategy::next_word`], returning the position in `pool`.
    pub fn select_index<R: Rng + ?Sized>(
        &self,
        pool: &[Word],
        history: &[SessionResult],
        rng: &mut R,
    ) -> Result<usize> {
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }

        let index = match self {
            Strategy::Interleaved => pick_interleaved(pool, history, rng),
            Strategy::RetrievalPractice => pick_weakest(pool, history),
            Strategy::AdaptiveDifficulty => pick_adaptive(pool, history),
        };

        debug!(
            strategy = self.as_str(),
            word_id = %pool[index].id,
            pool_size = pool.len(),
            "selected next word"
        );
        Ok(index)
    }

    /// Whether `word` has to come back after being scored in `result`.
    pub fn should_repeat(&self, word: &Word, result: &SessionResult) -> bool {
        let attempts: Vec<bool> = result.attempts_for(&word.id).map(|a| a.is_correct).collect();

        match self {
            Strategy::Interleaved => attempts.iter().any(|ok| !ok),
            Strategy::RetrievalPractice => {
                if attempts.is_empty() {
                    return false;
                }
                let correct = attempts.iter().filter(|ok| **ok).count();
                (correct as f64 / attempts.len() as f64) < RETRIEVAL_TARGET_RATE
            }
            Strategy::AdaptiveDifficulty => {
                attempts.len() < ADAPTIVE_MIN_ATTEMPTS
                    || attempts.iter().rev().take(2).any(|ok| !ok)
            }
        }
    }

    /// Hint level 0-3 for the word on screen, given attempts and mistakes on it so far.
    pub fn hint_level(&self, attempts: u32, mistakes: u32) -> u8 {
        let level = match self {
            Strategy::Interleaved => (mistakes / 2).min(3),
            Strategy::RetrievalPractice => {
                if attempts == 1 {
                    0
                } else {
                    (mistakes / 3).min(2)
                }
            }
            Strategy::AdaptiveDifficulty => {
                if mistakes == 0 {
                    0
                } else {
                    attempts.saturating_sub(mistakes).min(3)
                }
            }
        };
        level as u8
    }
}

fn pick_interleaved<R: Rng + ?Sized>(pool: &[Word], history: &[SessionResult], rng: &mut R) -> usize {
    let mut categories: Vec<(&str, Vec<usize>)> = Vec::new();
    for (i, word) in pool.iter().enumerate() {
        match categories.iter_mut().find(|(c, _)| *c == word.category) {
            Some((_, members)) => members.push(i),
            None => categories.push((word.category.as_str(), vec![i])),
        }
    }

    let last_category = history
        .first()
        .and_then(|r| r.state.current_word.as_ref())
        .map(|w| w.category.as_str());

    let available: Vec<&[usize]> = categories
        .iter()
        .filter(|(c, _)| Some(*c) != last_category)
        .map(|(_, members)| members.as_slice())
        .collect();

    if available.is_empty() {
        return rng.gen_range(0..pool.len());
    }

    let members = available[rng.gen_range(0..available.len())];
    members[rng.gen_range(0..members.len())]
}

fn pick_weakest(pool: &[Word], history: &[SessionResult]) -> usize {
    first_min_by(pool, |word| {
        let (total, correct) = history
            .iter()
            .flat_map(|r| r.attempts_for(&word.id))
            .fold((0u32, 0u32), |(t, c), a| (t + 1, c + u32::from(a.is_correct)));
        if total == 0 {
            1.0
        } else {
            f64::from(correct) / f64::from(total)
        }
    })
}

fn pick_adaptive(pool: &[Word], history: &[SessionResult]) -> usize {
    let Some(last) = history.first() else {
        return first_min_by(pool, |w| w.complexity);
    };

    // Results without a snapshot step from the lowest complexity.
    let current = last
        .state
        .current_word
        .as_ref()
        .map_or(MIN_COMPLEXITY, |w| w.complexity);

    let target = match last.success_rate() {
        Some(rate) if rate > ADAPTIVE_STEP_UP_RATE => current + 1.0,
        Some(rate) if rate < ADAPTIVE_STEP_DOWN_RATE => (current - 1.0).max(MIN_COMPLEXITY),
        _ => current,
    };

    debug!(current, target, "adaptive difficulty target");
    first_min_by(pool, |w| (w.complexity - target).abs())
}

/// Index of the first element with the smallest key; earlier elements win ties.
fn first_min_by<F: Fn(&Word) -> f64>(pool: &[Word], key: F) -> usize {
    let mut best = 0;
    let mut best_key = f64::INFINITY;
    for (i, word) in pool.iter().enumerate() {
        let k = key(word);
        if k < best_key {
            best = i;
            best_key = k;
        }
    }
    best
}

//! Grading a typed answer against a word's translations.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{PracticeMode, Word};

pub const MIN_ERROR_TOLERANCE: u8 = 50;
pub const MAX_ERROR_TOLERANCE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub ignore_accents: bool,
    pub ignore_punctuation: bool,
    /// Minimum match score (50-100) for an answer to count as correct.
    pub error_tolerance: u8,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            ignore_accents: true,
            ignore_punctuation: true,
            error_tolerance: 85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub is_correct: bool,
    pub match_score: u8,
    /// Index of the translation that scored best.
    pub matched: Option<usize>,
}

pub fn normalize(text: &str, options: &MatchOptions) -> String {
    let mut text = if options.case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    };

    if options.ignore_accents {
        text = text.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect();
    }

    if options.ignore_punctuation {
        text.retain(|c| !is_punctuation(c));
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '¿' | '¡' | '«' | '»' | '…' | '“' | '”' | '‘' | '’' | '–' | '—' | '„' | '·'
        )
}

/// Char-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity of two already-normalized strings, 0-100.
pub fn similarity(a: &str, b: &str) -> u8 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100;
    }
    let distance = levenshtein(a, b);
    let score = 100.0 * (1.0 - distance as f64 / longest as f64);
    score.round().clamp(0.0, 100.0) as u8
}

/// Grades `given` against the word's first translation, or against all of them
/// when the mode accepts synonyms.
pub fn grade(given: &str, word: &Word, mode: PracticeMode, options: &MatchOptions) -> MatchOutcome {
    let given = normalize(given, options);
    let candidates = if mode.accepts_synonyms() {
        word.translations.len()
    } else {
        word.translations.len().min(1)
    };

    let mut best: Option<(usize, u8)> = None;
    for (i, translation) in word.translations.iter().take(candidates).enumerate() {
        let score = similarity(&given, &normalize(&translation.value, options));
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }

    match best {
        Some((index, score)) => MatchOutcome {
            is_correct: score >= options.error_tolerance,
            match_score: score,
            matched: Some(index),
        },
        None => MatchOutcome {
            is_correct: false,
            match_score: 0,
            matched: None,
        },
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::matching::{MatchOptions, MAX_ERROR_TOLERANCE, MIN_ERROR_TOLERANCE};
use crate::engine::session::DEFAULT_MAX_PRESENTATIONS;
use crate::engine::{SessionConfig, Strategy};
use crate::error::{EngineError, Result};
use crate::models::PracticeMode;

pub const DB_ENV: &str = "LEXIS_DB";
const DEFAULT_DB_NAME: &str = "lexis.db";

const MIN_OPTION_COUNT: usize = 2;
const MAX_OPTION_COUNT: usize = 6;

pub fn db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_ENV) {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lexis");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

/// User-tunable practice settings, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeSettings {
    pub general: GeneralSettings,
    pub session: SessionSettings,
    pub writing: WritingSettings,
    pub quiz: QuizSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub random_order: bool,
    pub prioritize_due: bool,
    pub case_sensitive: bool,
    pub error_tolerance: u8,
    pub ignore_accents: bool,
    pub ignore_punctuation: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        let matching = MatchOptions::default();
        Self {
            random_order: true,
            prioritize_due: true,
            case_sensitive: matching.case_sensitive,
            error_tolerance: matching.error_tolerance,
            ignore_accents: matching.ignore_accents,
            ignore_punctuation: matching.ignore_punctuation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub strategy: Strategy,
    pub mode: PracticeMode,
    pub max_presentations: u32,
    pub persist_each_answer: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            mode: PracticeMode::Writing,
            max_presentations: DEFAULT_MAX_PRESENTATIONS,
            persist_each_answer: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WritingSettings {
    pub show_hint: bool,
}

impl Default for WritingSettings {
    fn default() -> Self {
        Self { show_hint: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    pub option_count: usize,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self { option_count: 4 }
    }
}

impl PracticeSettings {
    pub fn validate(&self) -> Result<()> {
        let tolerance = self.general.error_tolerance;
        if !(MIN_ERROR_TOLERANCE..=MAX_ERROR_TOLERANCE).contains(&tolerance) {
            return Err(EngineError::invalid(format!(
                "general.error_tolerance must be between {} and {}",
                MIN_ERROR_TOLERANCE, MAX_ERROR_TOLERANCE
            )));
        }
        if self.session.max_presentations == 0 {
            return Err(EngineError::invalid("session.max_presentations must be at least 1"));
        }
        if !(MIN_OPTION_COUNT..=MAX_OPTION_COUNT).contains(&self.quiz.option_count) {
            return Err(EngineError::invalid(format!(
                "quiz.option_count must be between {} and {}",
                MIN_OPTION_COUNT, MAX_OPTION_COUNT
            )));
        }
        Ok(())
    }

    /// Sets a dotted key such as `general.error_tolerance` from its text form.
    /// Leaves `self` untouched when the result would be invalid.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)
            .map_err(|e| EngineError::invalid(e.to_string()))?;

        let mut node = &mut tree;
        for part in key.split('.') {
            node = node
                .get_mut(part)
                .ok_or_else(|| EngineError::invalid(format!("unknown setting '{}'", key)))?;
        }
        if node.is_object() {
            return Err(EngineError::invalid(format!("'{}' is a section, not a setting", key)));
        }
        *node = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        let updated: PracticeSettings = serde_json::from_value(tree)
            .map_err(|e| EngineError::invalid(format!("bad value for '{}': {}", key, e)))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn matching(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.general.case_sensitive,
            ignore_accents: self.general.ignore_accents,
            ignore_punctuation: self.general.ignore_punctuation,
            error_tolerance: self.general.error_tolerance,
        }
    }

    pub fn session_config(&self, strategy: Option<Strategy>, mode: Option<PracticeMode>) -> SessionConfig {
        SessionConfig {
            strategy: strategy.unwrap_or(self.session.strategy),
            mode: mode.unwrap_or(self.session.mode),
            matching: self.matching(),
            max_presentations: self.session.max_presentations,
            persist_each_answer: self.session.persist_each_answer,
            random_order: self.general.random_order,
            prioritize_due: self.general.prioritize_due,
            show_hints: self.writing.show_hint,
        }
    }
}

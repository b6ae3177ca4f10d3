use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use crate::config::PracticeSettings;
use crate::engine::{SessionStore, Strategy};
use crate::error::EngineError;
use crate::models::{
    Attempt, PracticeMode, SessionResult, SessionSnapshot, SpacedRepetitionData, Translation, Word,
    WordList,
};

const SCHEMA_VERSION: i32 = 1;
const SETTINGS_KEY: &str = "practice";

pub struct Database {
    conn: Connection,
}

/// Fields needed to create a word; ids and scheduling state are assigned later.
#[derive(Debug, Clone)]
pub struct NewWord {
    pub text: String,
    pub category: String,
    pub complexity: f64,
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub total_lists: i64,
    pub total_words: i64,
    pub reviewed_words: i64,
    pub due_now: i64,
    pub total_sessions: i64,
    pub avg_score: f64,
}

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn require_translation(translations: &[Translation]) -> Result<()> {
    if translations.is_empty() {
        return Err(rusqlite::Error::ToSqlConversionFailure(
            "a word needs at least one translation".into(),
        ));
    }
    Ok(())
}

// SQLite integers are signed
fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn now_ts() -> String {
    format_ts(&Utc::now())
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS word_lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                from_language TEXT,
                to_language TEXT,
                forked_from TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS words (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL,
                text TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                complexity REAL NOT NULL DEFAULT 1.0 CHECK(complexity > 0),
                position INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (list_id) REFERENCES word_lists(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS translations (
                word_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                value TEXT NOT NULL,
                language_code TEXT NOT NULL,
                PRIMARY KEY (word_id, position),
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
            );

            -- SM-2 scheduling state, one row per reviewed word
            CREATE TABLE IF NOT EXISTS schedules (
                word_id TEXT PRIMARY KEY,
                easiness REAL NOT NULL CHECK(easiness >= 1.3),
                interval_days INTEGER NOT NULL CHECK(interval_days >= 1),
                repetitions INTEGER NOT NULL CHECK(repetitions >= 0),
                next_review TEXT NOT NULL,
                last_review TEXT,
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS session_results (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                strategy TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                total_time_ms INTEGER NOT NULL,
                correct_count INTEGER NOT NULL,
                total_count INTEGER NOT NULL,
                score REAL NOT NULL,
                state_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS attempts (
                result_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                word_id TEXT NOT NULL,
                given_answer TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                is_correct INTEGER NOT NULL,
                match_score INTEGER NOT NULL,
                time_spent_ms INTEGER NOT NULL,
                attempt_number INTEGER NOT NULL,
                PRIMARY KEY (result_id, position),
                FOREIGN KEY (result_id) REFERENCES session_results(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_words_list ON words(list_id);
            CREATE INDEX IF NOT EXISTS idx_schedules_next_review ON schedules(next_review);
            CREATE INDEX IF NOT EXISTS idx_results_list ON session_results(list_id);
            CREATE INDEX IF NOT EXISTS idx_results_completed ON session_results(completed_at);
            CREATE INDEX IF NOT EXISTS idx_attempts_word ON attempts(word_id);
            "#,
        )?;

        self.migrate()?;
        Ok(())
    }

    // Schema upgrades are keyed on PRAGMA user_version
    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < SCHEMA_VERSION {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        }

        Ok(())
    }

    // List operations
    pub fn create_list(
        &self,
        name: &str,
        description: Option<&str>,
        from_language: Option<&str>,
        to_language: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = now_ts();
        self.conn.execute(
            r#"
            INSERT INTO word_lists (id, name, description, from_language, to_language, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![id, name, description, from_language, to_language, now],
        )?;
        Ok(id)
    }

    pub fn get_list(&self, id: &str) -> Result<Option<WordList>> {
        self.conn
            .query_row(
                r#"
                SELECT l.id, l.name, l.description, l.from_language, l.to_language, l.forked_from,
                       l.created_at, l.updated_at,
                       (SELECT COUNT(*) FROM words w WHERE w.list_id = l.id)
                FROM word_lists l
                WHERE l.id = ?1
                "#,
                params![id],
                Self::row_to_list,
            )
            .optional()
    }

    pub fn list_lists(&self) -> Result<Vec<WordList>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT l.id, l.name, l.description, l.from_language, l.to_language, l.forked_from,
                   l.created_at, l.updated_at,
                   (SELECT COUNT(*) FROM words w WHERE w.list_id = l.id)
            FROM word_lists l
            ORDER BY l.name
            "#,
        )?;

        let rows = stmt.query_map([], Self::row_to_list)?;
        rows.collect()
    }

    fn row_to_list(row: &Row) -> Result<WordList> {
        Ok(WordList {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            from_language: row.get(3)?,
            to_language: row.get(4)?,
            forked_from: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            word_count: row.get(8)?,
        })
    }

    pub fn update_list(&self, id: &str, name: Option<&str>, description: Option<&str>) -> Result<bool> {
        let rows = self.conn.execute(
            r#"
            UPDATE word_lists
            SET name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                updated_at = ?3
            WHERE id = ?4
            "#,
            params![name, description, now_ts(), id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_list(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM word_lists WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Copies a list with its words, translations and scheduling state.
    pub fn fork_list(&self, id: &str, name: Option<&str>) -> Result<Option<String>> {
        let Some(source) = self.get_list(id)? else {
            return Ok(None);
        };
        let words = self.list_words(id)?;

        let tx = self.conn.unchecked_transaction()?;
        let fork_id = Uuid::new_v4().to_string();
        let now = now_ts();
        let fork_name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (copy)", source.name));

        tx.execute(
            r#"
            INSERT INTO word_lists (id, name, description, from_language, to_language, forked_from, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                fork_id,
                fork_name,
                source.description,
                source.from_language,
                source.to_language,
                source.id,
                now
            ],
        )?;

        for (position, word) in words.iter().enumerate() {
            let word_id = Uuid::new_v4().to_string();
            Self::insert_word(&tx, &word_id, &fork_id, position as i64, &word.text, &word.category, word.complexity)?;
            Self::insert_translations(&tx, &word_id, &word.translations)?;
            if let Some(data) = &word.spaced_repetition {
                Self::upsert_schedule(&tx, &word_id, data)?;
            }
        }

        tx.commit()?;
        debug!(source = %id, fork = %fork_id, words = words.len(), "forked word list");
        Ok(Some(fork_id))
    }

    // Word operations
    pub fn add_word(&self, list_id: &str, word: &NewWord) -> Result<String> {
        require_translation(&word.translations)?;
        let id = Uuid::new_v4().to_string();
        let position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM words WHERE list_id = ?1",
            params![list_id],
            |row| row.get(0),
        )?;

        let tx = self.conn.unchecked_transaction()?;
        Self::insert_word(&tx, &id, list_id, position, &word.text, &word.category, word.complexity)?;
        Self::insert_translations(&tx, &id, &word.translations)?;
        tx.execute(
            "UPDATE word_lists SET updated_at = ?1 WHERE id = ?2",
            params![now_ts(), list_id],
        )?;
        tx.commit()?;

        Ok(id)
    }

    fn insert_word(
        conn: &Connection,
        id: &str,
        list_id: &str,
        position: i64,
        text: &str,
        category: &str,
        complexity: f64,
    ) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO words (id, list_id, text, category, complexity, position, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![id, list_id, text, category, complexity, position, now_ts()],
        )?;
        Ok(())
    }

    fn insert_translations(conn: &Connection, word_id: &str, translations: &[Translation]) -> Result<()> {
        conn.execute("DELETE FROM translations WHERE word_id = ?1", params![word_id])?;
        for (position, t) in translations.iter().enumerate() {
            conn.execute(
                "INSERT INTO translations (word_id, position, value, language_code) VALUES (?1, ?2, ?3, ?4)",
                params![word_id, position as i64, t.value, t.language_code],
            )?;
        }
        Ok(())
    }

    pub fn get_word(&self, id: &str) -> Result<Option<Word>> {
        let word = self
            .conn
            .query_row(
                "SELECT id, list_id, text, category, complexity FROM words WHERE id = ?1",
                params![id],
                Self::row_to_word,
            )
            .optional()?;

        match word {
            Some(mut w) => {
                self.fill_word(&mut w)?;
                Ok(Some(w))
            }
            None => Ok(None),
        }
    }

    /// Words of a list in insertion order, with translations and scheduling state.
    pub fn list_words(&self, list_id: &str) -> Result<Vec<Word>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, list_id, text, category, complexity
            FROM words
            WHERE list_id = ?1
            ORDER BY position, created_at
            "#,
        )?;

        let rows = stmt.query_map(params![list_id], Self::row_to_word)?;
        let mut words = rows.collect::<Result<Vec<_>>>()?;

        for word in &mut words {
            self.fill_word(word)?;
        }

        Ok(words)
    }

    fn row_to_word(row: &Row) -> Result<Word> {
        Ok(Word {
            id: row.get(0)?,
            list_id: row.get(1)?,
            text: row.get(2)?,
            category: row.get(3)?,
            complexity: row.get(4)?,
            translations: vec![],
            spaced_repetition: None,
        })
    }

    fn fill_word(&self, word: &mut Word) -> Result<()> {
        word.translations = self.get_translations(&word.id)?;
        word.spaced_repetition = self.get_schedule(&word.id)?;
        Ok(())
    }

    fn get_translations(&self, word_id: &str) -> Result<Vec<Translation>> {
        let mut stmt = self.conn.prepare(
            "SELECT value, language_code FROM translations WHERE word_id = ?1 ORDER BY position",
        )?;

        let rows = stmt.query_map(params![word_id], |row| {
            Ok(Translation {
                value: row.get(0)?,
                language_code: row.get(1)?,
            })
        })?;

        rows.collect()
    }

    pub fn update_word(&self, word: &Word) -> Result<bool> {
        require_translation(&word.translations)?;
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE words SET text = ?1, category = ?2, complexity = ?3 WHERE id = ?4",
            params![word.text, word.category, word.complexity, word.id],
        )?;
        if rows > 0 {
            Self::insert_translations(&tx, &word.id, &word.translations)?;
        }
        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn delete_word(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM words WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Scheduling state
    pub fn get_schedule(&self, word_id: &str) -> Result<Option<SpacedRepetitionData>> {
        self.conn
            .query_row(
                r#"
                SELECT easiness, interval_days, repetitions, next_review, last_review
                FROM schedules
                WHERE word_id = ?1
                "#,
                params![word_id],
                |row| {
                    let next_review: String = row.get(3)?;
                    let last_review: Option<String> = row.get(4)?;
                    Ok(SpacedRepetitionData {
                        easiness: row.get(0)?,
                        interval: row.get(1)?,
                        repetitions: row.get(2)?,
                        next_review: parse_ts(3, &next_review)?,
                        last_review: last_review.map(|s| parse_ts(4, &s)).transpose()?,
                    })
                },
            )
            .optional()
    }

    pub fn put_schedule(&self, word_id: &str, data: &SpacedRepetitionData) -> Result<()> {
        Self::upsert_schedule(&self.conn, word_id, data)
    }

    fn upsert_schedule(conn: &Connection, word_id: &str, data: &SpacedRepetitionData) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO schedules (word_id, easiness, interval_days, repetitions, next_review, last_review)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                word_id,
                data.easiness,
                data.interval,
                data.repetitions,
                format_ts(&data.next_review),
                data.last_review.as_ref().map(format_ts)
            ],
        )?;
        Ok(())
    }

    // Session results
    /// Stores a result; writing the same result id again replaces it.
    pub fn put_result(&self, result: &SessionResult) -> Result<()> {
        let state_json = serde_json::to_string(&result.state)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM attempts WHERE result_id = ?1", params![result.id])?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO session_results
                (id, list_id, mode, strategy, started_at, completed_at, total_time_ms,
                 correct_count, total_count, score, state_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                result.id,
                result.list_id,
                result.mode.as_str(),
                result.strategy.as_str(),
                format_ts(&result.started_at),
                format_ts(&result.completed_at),
                clamp_ms(result.total_time_ms),
                result.correct_count,
                result.total_count,
                result.score,
                state_json
            ],
        )?;

        for (position, a) in result.answers.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO attempts
                    (result_id, position, word_id, given_answer, correct_answer, is_correct,
                     match_score, time_spent_ms, attempt_number)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    result.id,
                    position as i64,
                    a.word_id,
                    a.given_answer,
                    a.correct_answer,
                    a.is_correct,
                    a.match_score,
                    clamp_ms(a.time_spent_ms),
                    a.attempt_number
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_result(&self, id: &str) -> Result<Option<SessionResult>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, list_id, mode, strategy, started_at, completed_at, total_time_ms,
                       correct_count, total_count, score, state_json
                FROM session_results
                WHERE id = ?1
                "#,
                params![id],
                Self::row_to_result,
            )
            .optional()?;

        match result {
            Some(mut r) => {
                r.answers = self.get_attempts(&r.id)?;
                Ok(Some(r))
            }
            None => Ok(None),
        }
    }

    /// Most recent results first, optionally for one list.
    pub fn list_results(&self, list_id: Option<&str>, limit: usize) -> Result<Vec<SessionResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, list_id, mode, strategy, started_at, completed_at, total_time_ms,
                   correct_count, total_count, score, state_json
            FROM session_results
            WHERE ?1 IS NULL OR list_id = ?1
            ORDER BY completed_at DESC
            LIMIT ?2
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![list_id, limit], Self::row_to_result)?;
        let mut results = rows.collect::<Result<Vec<_>>>()?;

        for result in &mut results {
            result.answers = self.get_attempts(&result.id)?;
        }

        Ok(results)
    }

    fn row_to_result(row: &Row) -> Result<SessionResult> {
        let mode: String = row.get(2)?;
        let strategy: String = row.get(3)?;
        let started_at: String = row.get(4)?;
        let completed_at: String = row.get(5)?;
        let total_time_ms: i64 = row.get(6)?;
        let state_json: String = row.get(10)?;
        let state: SessionSnapshot = serde_json::from_str(&state_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(SessionResult {
            id: row.get(0)?,
            list_id: row.get(1)?,
            mode: PracticeMode::from_str(&mode).unwrap_or(PracticeMode::Writing),
            strategy: Strategy::from_str(&strategy).unwrap_or_default(),
            answers: vec![],
            started_at: parse_ts(4, &started_at)?,
            completed_at: parse_ts(5, &completed_at)?,
            total_time_ms: total_time_ms.max(0) as u64,
            correct_count: row.get(7)?,
            total_count: row.get(8)?,
            score: row.get(9)?,
            state,
        })
    }

    fn get_attempts(&self, result_id: &str) -> Result<Vec<Attempt>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT word_id, given_answer, correct_answer, is_correct, match_score, time_spent_ms, attempt_number
            FROM attempts
            WHERE result_id = ?1
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map(params![result_id], |row| {
            let time_spent_ms: i64 = row.get(5)?;
            Ok(Attempt {
                word_id: row.get(0)?,
                given_answer: row.get(1)?,
                correct_answer: row.get(2)?,
                is_correct: row.get(3)?,
                match_score: row.get(4)?,
                time_spent_ms: time_spent_ms.max(0) as u64,
                attempt_number: row.get(6)?,
            })
        })?;

        rows.collect()
    }

    // Settings
    pub fn load_settings(&self) -> Result<PracticeSettings> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            }),
            None => Ok(PracticeSettings::default()),
        }
    }

    pub fn save_settings(&self, settings: &PracticeSettings) -> Result<()> {
        let json = serde_json::to_string(settings)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![SETTINGS_KEY, json],
        )?;
        Ok(())
    }

    pub fn reset_settings(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", params![SETTINGS_KEY])?;
        Ok(())
    }

    pub fn get_stats(&self) -> Result<Stats> {
        let total_lists: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM word_lists", [], |row| row.get(0))?;

        let total_words: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))?;

        let reviewed_words: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))?;

        // Never-reviewed words count as due
        let due_now: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM words w
            LEFT JOIN schedules s ON s.word_id = w.id
            WHERE s.word_id IS NULL OR s.next_review <= ?1
            "#,
            params![now_ts()],
            |row| row.get(0),
        )?;

        let total_sessions: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM session_results", [], |row| row.get(0))?;

        let avg_score: f64 = self.conn.query_row(
            "SELECT COALESCE(AVG(score), 0) FROM session_results WHERE total_count > 0",
            [],
            |row| row.get(0),
        )?;

        Ok(Stats {
            total_lists,
            total_words,
            reviewed_words,
            due_now,
            total_sessions,
            avg_score,
        })
    }
}

impl SessionStore for Database {
    fn save_schedule(&self, word_id: &str, data: &SpacedRepetitionData) -> crate::error::Result<()> {
        self.put_schedule(word_id, data).map_err(EngineError::from)
    }

    fn save_result(&self, result: &SessionResult) -> crate::error::Result<()> {
        self.put_result(result).map_err(EngineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Session, SessionConfig};
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn new_word(text: &str, answer: &str) -> NewWord {
        NewWord {
            text: text.to_string(),
            category: "noun".to_string(),
            complexity: 1.0,
            translations: vec![Translation::new(answer, "fr")],
        }
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 7, 30, 0).unwrap()
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_creates_tables() {
            let db = setup_db();
            for table in ["word_lists", "words", "translations", "schedules", "session_results", "attempts", "settings"] {
                let count: i64 = db
                    .conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                    .expect("table should exist");
                assert_eq!(count, 0, "{} should start empty", table);
            }
        }

        #[test]
        fn init_is_idempotent() {
            let db = setup_db();
            db.create_list("Test", None, None, None).unwrap();

            db.init().expect("Re-init should succeed");

            assert_eq!(db.list_lists().unwrap().len(), 1);
        }

        #[test]
        fn init_sets_schema_version() {
            let db = setup_db();
            let version: i32 = db
                .conn
                .query_row("PRAGMA user_version", [], |row| row.get(0))
                .unwrap();
            assert_eq!(version, SCHEMA_VERSION);
        }
    }

    mod list_tests {
        use super::*;

        #[test]
        fn create_and_get_list() {
            let db = setup_db();
            let id = db
                .create_list("French", Some("Basics"), Some("en"), Some("fr"))
                .unwrap();

            let list = db.get_list(&id).unwrap().unwrap();
            assert_eq!(list.name, "French");
            assert_eq!(list.description, Some("Basics".to_string()));
            assert_eq!(list.to_language, Some("fr".to_string()));
            assert_eq!(list.word_count, 0);
            assert!(list.forked_from.is_none());
        }

        #[test]
        fn get_list_not_found() {
            let db = setup_db();
            assert!(db.get_list("missing").unwrap().is_none());
        }

        #[test]
        fn list_lists_sorted_by_name() {
            let db = setup_db();
            db.create_list("Zulu", None, None, None).unwrap();
            db.create_list("Alpha", None, None, None).unwrap();

            let lists = db.list_lists().unwrap();
            assert_eq!(lists[0].name, "Alpha");
            assert_eq!(lists[1].name, "Zulu");
        }

        #[test]
        fn update_list_keeps_unset_fields() {
            let db = setup_db();
            let id = db.create_list("Old", Some("desc"), None, None).unwrap();

            assert!(db.update_list(&id, Some("New"), None).unwrap());

            let list = db.get_list(&id).unwrap().unwrap();
            assert_eq!(list.name, "New");
            assert_eq!(list.description, Some("desc".to_string()));
        }

        #[test]
        fn delete_list_cascades_words() {
            let db = setup_db();
            let id = db.create_list("Temp", None, None, None).unwrap();
            let word_id = db.add_word(&id, &new_word("cat", "chat")).unwrap();

            assert!(db.delete_list(&id).unwrap());
            assert!(db.get_word(&word_id).unwrap().is_none());
            assert!(!db.delete_list(&id).unwrap());
        }

        #[test]
        fn fork_copies_words_and_schedules() {
            let db = setup_db();
            let id = db.create_list("French", None, Some("en"), Some("fr")).unwrap();
            let word_id = db.add_word(&id, &new_word("cat", "chat")).unwrap();
            db.add_word(&id, &new_word("dog", "chien")).unwrap();
            let mut data = SpacedRepetitionData::initial(ts(1));
            data.repetitions = 2;
            db.put_schedule(&word_id, &data).unwrap();

            let fork_id = db.fork_list(&id, None).unwrap().unwrap();
            let fork = db.get_list(&fork_id).unwrap().unwrap();
            assert_eq!(fork.name, "French (copy)");
            assert_eq!(fork.forked_from, Some(id.clone()));
            assert_eq!(fork.word_count, 2);

            let words = db.list_words(&fork_id).unwrap();
            assert_eq!(words[0].text, "cat");
            assert_ne!(words[0].id, word_id);
            assert_eq!(words[0].spaced_repetition.as_ref().unwrap().repetitions, 2);
            assert!(words[1].spaced_repetition.is_none());
        }

        #[test]
        fn fork_missing_list() {
            let db = setup_db();
            assert!(db.fork_list("missing", Some("x")).unwrap().is_none());
        }
    }

    mod word_tests {
        use super::*;

        #[test]
        fn add_word_with_translations() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let mut word = new_word("hello", "bonjour");
            word.translations.push(Translation::new("salut", "fr"));
            let id = db.add_word(&list, &word).unwrap();

            let stored = db.get_word(&id).unwrap().unwrap();
            assert_eq!(stored.text, "hello");
            assert_eq!(stored.correct_answer(), "bonjour");
            assert_eq!(stored.translations.len(), 2);
            assert!(stored.spaced_repetition.is_none());
        }

        #[test]
        fn list_words_in_insertion_order() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            db.add_word(&list, &new_word("zebra", "zèbre")).unwrap();
            db.add_word(&list, &new_word("apple", "pomme")).unwrap();

            let words = db.list_words(&list).unwrap();
            assert_eq!(words[0].text, "zebra");
            assert_eq!(words[1].text, "apple");
        }

        #[test]
        fn non_positive_complexity_is_rejected() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let mut word = new_word("cat", "chat");
            word.complexity = 0.0;
            assert!(db.add_word(&list, &word).is_err());
        }

        #[test]
        fn word_without_translations_is_rejected() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let mut word = new_word("cat", "chat");
            word.translations.clear();

            assert!(db.add_word(&list, &word).is_err());
            assert!(db.list_words(&list).unwrap().is_empty());

            let id = db.add_word(&list, &new_word("dog", "chien")).unwrap();
            let mut stored = db.get_word(&id).unwrap().unwrap();
            stored.translations.clear();
            assert!(db.update_word(&stored).is_err());
            assert_eq!(db.get_word(&id).unwrap().unwrap().correct_answer(), "chien");
        }

        #[test]
        fn word_requires_existing_list() {
            let db = setup_db();
            assert!(db.add_word("missing", &new_word("cat", "chat")).is_err());
        }

        #[test]
        fn update_word_replaces_translations() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let id = db.add_word(&list, &new_word("cat", "chat")).unwrap();

            let mut word = db.get_word(&id).unwrap().unwrap();
            word.complexity = 2.5;
            word.translations = vec![Translation::new("matou", "fr")];
            assert!(db.update_word(&word).unwrap());

            let stored = db.get_word(&id).unwrap().unwrap();
            assert_eq!(stored.complexity, 2.5);
            assert_eq!(stored.translations, vec![Translation::new("matou", "fr")]);
        }

        #[test]
        fn delete_word() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let id = db.add_word(&list, &new_word("cat", "chat")).unwrap();

            assert!(db.delete_word(&id).unwrap());
            assert!(db.get_word(&id).unwrap().is_none());
            assert!(!db.delete_word(&id).unwrap());
        }
    }

    mod schedule_tests {
        use super::*;

        #[test]
        fn schedule_round_trips() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let id = db.add_word(&list, &new_word("cat", "chat")).unwrap();

            let data = SpacedRepetitionData {
                easiness: 2.36,
                interval: 6,
                repetitions: 2,
                next_review: ts(9),
                last_review: Some(ts(3)),
            };
            db.put_schedule(&id, &data).unwrap();
            assert_eq!(db.get_schedule(&id).unwrap(), Some(data.clone()));

            let updated = SpacedRepetitionData { interval: 15, ..data };
            db.put_schedule(&id, &updated).unwrap();
            assert_eq!(db.get_schedule(&id).unwrap().unwrap().interval, 15);
        }

        #[test]
        fn schedule_rejects_easiness_below_floor() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            let id = db.add_word(&list, &new_word("cat", "chat")).unwrap();
            let data = SpacedRepetitionData {
                easiness: 1.0,
                ..SpacedRepetitionData::initial(ts(1))
            };
            assert!(db.put_schedule(&id, &data).is_err());
        }
    }

    mod result_tests {
        use super::*;

        fn practice_list(db: &Database) -> String {
            let list = db.create_list("French", None, None, None).unwrap();
            db.add_word(&list, &new_word("cat", "chat")).unwrap();
            db.add_word(&list, &new_word("dog", "chien")).unwrap();
            list
        }

        fn run_session(db: &Database, list: &str, at: DateTime<Utc>) -> SessionResult {
            let words = db.list_words(list).unwrap();
            let mut session = Session::start_at(
                list,
                words,
                SessionConfig::default(),
                ChaCha8Rng::seed_from_u64(3),
                at,
            )
            .unwrap();
            while let Some(word) = session.current_word() {
                let answer = word.correct_answer().to_string();
                let outcome = session.submit_answer_at(&answer, 2_000, db, at).unwrap();
                assert!(outcome.persistence_error.is_none());
            }
            session.result().unwrap().clone()
        }

        #[test]
        fn session_writes_schedules_and_result() {
            let db = setup_db();
            let list = practice_list(&db);

            let result = run_session(&db, &list, ts(1));

            let stored = db.get_result(&result.id).unwrap().unwrap();
            assert_eq!(stored, result);
            for word in db.list_words(&list).unwrap() {
                let data = word.spaced_repetition.unwrap();
                assert_eq!(data.repetitions, 1);
                assert_eq!(data.next_review, ts(1) + Duration::days(1));
            }
        }

        #[test]
        fn save_result_is_idempotent() {
            let db = setup_db();
            let list = practice_list(&db);
            let result = run_session(&db, &list, ts(1));

            db.save_result(&result).unwrap();
            db.save_result(&result).unwrap();

            assert_eq!(db.list_results(None, 10).unwrap().len(), 1);
            let attempts: i64 = db
                .conn
                .query_row("SELECT COUNT(*) FROM attempts", [], |row| row.get(0))
                .unwrap();
            assert_eq!(attempts, 2);
        }

        #[test]
        fn list_results_newest_first_and_filtered() {
            let db = setup_db();
            let list = practice_list(&db);
            let other = practice_list(&db);
            let older = run_session(&db, &list, ts(1));
            let newer = run_session(&db, &list, ts(5));
            run_session(&db, &other, ts(3));

            let results = db.list_results(Some(&list), 10).unwrap();
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].id, newer.id);
            assert_eq!(results[1].id, older.id);

            assert_eq!(db.list_results(None, 2).unwrap().len(), 2);
        }

        #[test]
        fn oversized_durations_are_clamped() {
            let db = setup_db();
            let list = practice_list(&db);
            let mut result = run_session(&db, &list, ts(1));
            result.total_time_ms = u64::MAX;
            result.answers[0].time_spent_ms = u64::MAX;

            db.save_result(&result).unwrap();

            let stored = db.get_result(&result.id).unwrap().unwrap();
            assert_eq!(stored.total_time_ms, i64::MAX as u64);
            assert_eq!(stored.answers[0].time_spent_ms, i64::MAX as u64);
        }

        #[test]
        fn get_result_not_found() {
            let db = setup_db();
            assert!(db.get_result("missing").unwrap().is_none());
        }
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn defaults_when_unset() {
            let db = setup_db();
            assert_eq!(db.load_settings().unwrap(), PracticeSettings::default());
        }

        #[test]
        fn save_load_and_reset() {
            let db = setup_db();
            let mut settings = PracticeSettings::default();
            settings.set("general.error_tolerance", "95").unwrap();
            db.save_settings(&settings).unwrap();

            assert_eq!(db.load_settings().unwrap().general.error_tolerance, 95);

            db.reset_settings().unwrap();
            assert_eq!(db.load_settings().unwrap(), PracticeSettings::default());
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn stats_empty_db() {
            let db = setup_db();
            let stats = db.get_stats().unwrap();
            assert_eq!(stats.total_lists, 0);
            assert_eq!(stats.total_words, 0);
            assert_eq!(stats.due_now, 0);
            assert_eq!(stats.avg_score, 0.0);
        }

        #[test]
        fn stats_counts_due_and_reviewed() {
            let db = setup_db();
            let list = db.create_list("French", None, None, None).unwrap();
            db.add_word(&list, &new_word("cat", "chat")).unwrap();
            let later = db.add_word(&list, &new_word("dog", "chien")).unwrap();
            let data = SpacedRepetitionData {
                next_review: Utc::now() + Duration::days(30),
                ..SpacedRepetitionData::initial(Utc::now())
            };
            db.put_schedule(&later, &data).unwrap();

            let stats = db.get_stats().unwrap();
            assert_eq!(stats.total_lists, 1);
            assert_eq!(stats.total_words, 2);
            assert_eq!(stats.reviewed_words, 1);
            assert_eq!(stats.due_now, 1);
        }
    }
}

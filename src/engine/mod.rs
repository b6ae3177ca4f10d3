//! Adaptive learning engine
//!
//! Decides which word to present next, how much of the answer to hint at,
//! how well an answer demonstrated recall, and when the word is due again.
//!
//! - `quality`: attempts -> 0-5 recall quality
//! - `scheduler`: SM-2 next review from quality and prior state
//! - `ordering`: overdue-first review order
//! - `strategy`: interleaved / retrieval practice / adaptive difficulty
//! - `hint`: answer redaction per hint level
//! - `matching`: grading typed answers
//! - `session`: the controller tying these together

pub mod hint;
pub mod matching;
pub mod ordering;
pub mod quality;
pub mod scheduler;
pub mod session;
pub mod strategy;

pub use hint::mask_answer;
pub use matching::{grade, MatchOptions, MatchOutcome};
pub use ordering::{due_for_review, order_for_review};
pub use quality::estimate_quality;
pub use scheduler::schedule_next;
pub use session::{AnswerOutcome, Progress, Session, SessionConfig, SessionState, SessionStore};
pub use strategy::Strategy;

//! lexis: vocabulary practice with SM-2 review scheduling.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;

pub use engine::{Session, SessionConfig, SessionState, SessionStore, Strategy};
pub use error::{EngineError, Result};

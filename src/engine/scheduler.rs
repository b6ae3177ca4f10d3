//! SuperMemo-2 review scheduling.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::quality::MAX_QUALITY;
use crate::error::{EngineError, Result};
use crate::models::{SpacedRepetitionData, MAX_INTERVAL_DAYS, MIN_EASINESS};

/// Answers below this quality count as a lapse.
pub const PASSING_QUALITY: f64 = 3.0;

/// Next scheduling state for a word reviewed at `now` with the given quality.
///
/// `prior` is `None` for a word that has never been reviewed.
pub fn schedule_next(
    quality: f64,
    prior: Option<&SpacedRepetitionData>,
    now: DateTime<Utc>,
) -> Result<SpacedRepetitionData> {
    if !(0.0..=MAX_QUALITY).contains(&quality) {
        return Err(EngineError::invalid(format!(
            "quality {} outside [0, {}]",
            quality, MAX_QUALITY
        )));
    }

    let initial = SpacedRepetitionData::initial(now);
    let prior = prior.unwrap_or(&initial);

    let miss = MAX_QUALITY - quality;
    let easiness = (prior.easiness + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASINESS);

    let (interval, repetitions) = if quality < PASSING_QUALITY {
        (1, 0)
    } else {
        let repetitions = prior.repetitions + 1;
        let interval = match repetitions {
            1 => 1,
            2 => 6,
            _ => grow_interval(prior.interval, prior.easiness),
        };
        (interval, repetitions)
    };

    let next_review = SpacedRepetitionData::review_after(now, interval).ok_or_else(|| {
        EngineError::invalid(format!("review {} days after {} is out of range", interval, now))
    })?;

    debug!(
        quality,
        easiness, interval, repetitions, "scheduled next review"
    );

    Ok(SpacedRepetitionData {
        easiness,
        interval,
        repetitions,
        next_review,
        last_review: Some(now),
    })
}

fn grow_interval(interval: u32, easiness: f64) -> u32 {
    let grown = (f64::from(interval) * easiness).round();
    if grown >= f64::from(MAX_INTERVAL_DAYS) {
        MAX_INTERVAL_DAYS
    } else {
        (grown as u32).max(1)
    }
}

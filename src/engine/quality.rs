//! Recall quality: how well a batch of attempts demonstrated recall, 0-5.

use crate::error::{EngineError, Result};
use crate::models::SessionResult;

const TIME_WEIGHT: f64 = 0.4;
const ACCURACY_WEIGHT: f64 = 0.6;
/// Answering faster than this per word saturates the time factor.
const REFERENCE_PACE_MS: f64 = 10_000.0;

pub const MAX_QUALITY: f64 = 5.0;

pub fn estimate_quality(result: &SessionResult) -> Result<f64> {
    quality_from_totals(result.total_time_ms, result.total_count, result.correct_count)
}

pub fn quality_from_totals(total_time_ms: u64, total_count: u32, correct_count: u32) -> Result<f64> {
    if total_count == 0 {
        return Err(EngineError::invalid("cannot estimate quality of zero attempts"));
    }
    if correct_count > total_count {
        return Err(EngineError::invalid(format!(
            "correct count {} exceeds total count {}",
            correct_count, total_count
        )));
    }

    let average_ms = total_time_ms as f64 / f64::from(total_count);
    let time_factor = if average_ms <= 0.0 {
        1.0
    } else {
        (REFERENCE_PACE_MS / average_ms).min(1.0)
    };
    let accuracy_factor = f64::from(correct_count) / f64::from(total_count);

    let quality = MAX_QUALITY * (TIME_WEIGHT * time_factor + ACCURACY_WEIGHT * accuracy_factor);
    Ok(quality.clamp(0.0, MAX_QUALITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fast_and_correct_is_perfect() {
        assert!(approx(quality_from_totals(2_000, 1, 1).unwrap(), 5.0));
    }

    #[test]
    fn reference_pace_saturates_time_factor() {
        assert!(approx(quality_from_totals(10_000, 1, 1).unwrap(), 5.0));
    }

    #[test]
    fn slow_answers_lose_time_credit() {
        // 20s per word: time factor 0.5 -> 5 * (0.2 + 0.6)
        assert!(approx(quality_from_totals(40_000, 2, 2).unwrap(), 4.0));
    }

    #[test]
    fn wrong_but_fast_keeps_time_credit() {
        assert!(approx(quality_from_totals(1_000, 1, 0).unwrap(), 2.0));
    }

    #[test]
    fn half_accuracy() {
        // 5 * (0.4 + 0.6 * 0.5)
        assert!(approx(quality_from_totals(5_000, 2, 1).unwrap(), 3.5));
    }

    #[test]
    fn zero_time_counts_as_fast() {
        assert!(approx(quality_from_totals(0, 3, 3).unwrap(), 5.0));
    }

    #[test]
    fn zero_total_is_invalid() {
        assert!(matches!(
            quality_from_totals(1_000, 0, 0),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn more_correct_than_total_is_invalid() {
        assert!(quality_from_totals(1_000, 1, 2).is_err());
    }

    #[test]
    fn estimate_is_deterministic() {
        let a = quality_from_totals(12_345, 3, 2).unwrap();
        let b = quality_from_totals(12_345, 3, 2).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn very_slow_wrong_answers_approach_zero() {
        let q = quality_from_totals(u64::MAX / 2, 1, 0).unwrap();
        assert!(q >= 0.0 && q < 0.01);
    }
}

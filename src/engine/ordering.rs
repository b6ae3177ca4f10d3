//! Review priority: overdue words first, then by scheduled date, then unseen words.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::Word;

/// Orders words for review without mutating them. The sort is stable, so
/// words that compare equal keep their input order.
pub fn order_for_review(words: &[Word], now: DateTime<Utc>) -> Vec<&Word> {
    let mut ordered: Vec<&Word> = words.iter().collect();
    ordered.sort_by(|a, b| compare_for_review(a, b, now));
    ordered
}

pub fn compare_for_review(a: &Word, b: &Word, now: DateTime<Utc>) -> Ordering {
    match (a.is_overdue(now), b.is_overdue(now)) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    match (&a.spaced_repetition, &b.spaced_repetition) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.next_review.cmp(&b.next_review),
    }
}

/// Words whose review date has arrived, in review order.
pub fn due_for_review(words: &[Word], now: DateTime<Utc>) -> Vec<&Word> {
    order_for_review(words, now)
        .into_iter()
        .filter(|w| {
            w.spaced_repetition
                .as_ref()
                .map_or(true, |d| d.is_due(now))
        })
        .collect()
}

//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Random Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Returns a uniformly random integer in `[min, max]` (both inclusive).
///
/// Returns `min` when the range is empty.
pub fn rand_int(min: u32, max: u32) -> u32 {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Returns a uniformly random float in `[min, max)` rounded to two decimals.
pub fn rand_float(min: f64, max: f64) -> f64 {
    if max <= min {
        return round2(min);
    }
    round2(rand::thread_rng().gen_range(min..max))
}

/// Picks a random element from a slice, or `None` if it is empty.
pub fn pick<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..items.len());
    items.get(index)
}

/// Rounds to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! Client-side `Watcher` reconnect scheduling (`spec.md` §4.5): a short
//! fixed delay after a clean watch, exponential backoff with jitter after an
//! error.

use std::time::Duration;

use rand::Rng;

/// Delay scheduled after a watch resolves normally, before issuing the next
/// one — a debounce, not a backoff.
pub const DELAY_ON_SUCCESS: Duration = Duration::from_secs(1);

pub const MIN_INTERVAL_MILLIS: u64 = 2_000;
pub const MAX_INTERVAL_MILLIS: u64 = 60_000;

/// Width of the jitter band applied around the computed backoff, as a
/// fraction of the base delay (`spec.md` §4.5: `[delay*0.8, delay*1.2]`).
const JITTER_FRACTION: f64 = 0.2;

/// The un-jittered backoff for the `attempt`-th consecutive failure
/// (1-indexed): `MIN_INTERVAL` on the first attempt, doubling thereafter up
/// to `MAX_INTERVAL`.
pub fn base_delay_millis(attempt: u32) -> u64 {
    if attempt <= 1 {
        return MIN_INTERVAL_MILLIS;
    }
    let shift = (attempt - 1).min(63);
    MIN_INTERVAL_MILLIS
        .saturating_mul(1u64 << shift)
        .min(MAX_INTERVAL_MILLIS)
}

/// Applies `[0.8, 1.2] * base` jitter using `rng`, so tests can supply a
/// seeded source instead of the thread-local generator.
pub fn jittered(base_millis: u64, rng: &mut impl Rng) -> Duration {
    let lower = base_millis as f64 * (1.0 - JITTER_FRACTION);
    let upper = base_millis as f64 * (1.0 + JITTER_FRACTION);
    let millis = if upper > lower {
        rng.gen_range(lower..=upper)
    } else {
        base_millis as f64
    };
    Duration::from_millis(millis.round() as u64)
}

/// The jittered reconnect delay for the `attempt`-th consecutive failure,
/// using the thread-local RNG.
pub fn reconnect_delay(attempt: u32) -> Duration {
    jittered(base_delay_millis(attempt), &mut rand::thread_rng())
}

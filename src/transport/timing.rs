use std::time::{Duration, Instant};

/// Signed seconds from `reference` to `instant` (negative when `instant`
/// is earlier).
pub fn signed_secs_since(instant: Instant, reference: Instant) -> f64 {
    if instant >= reference {
        instant.duration_since(reference).as_secs_f64()
    } else {
        -reference.duration_since(instant).as_secs_f64()
    }
}

/// Time left until `deadline`, zero once it has passed.
pub fn until(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}

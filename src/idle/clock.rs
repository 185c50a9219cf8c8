//! Wall-clock timestamps derived from the monotonic clock.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Anchors a monotonic instant to a wall-clock reading so later instants can
/// be reported as timestamps without re-reading the system clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock {
    origin: Instant,
    origin_wall: DateTime<Utc>,
}

impl Clock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_wall: Utc::now(),
        }
    }

    pub(crate) fn to_wall(&self, instant: Instant) -> DateTime<Utc> {
        let offset = if instant >= self.origin {
            chrono::Duration::from_std(instant - self.origin).unwrap_or_default()
        } else {
            -chrono::Duration::from_std(self.origin - instant).unwrap_or_default()
        };
        self.origin_wall + offset
    }
}

//! Idle detection: event filtering, the countdown deadline and the
//! idle/active state machine.

mod binding;
mod callbacks;
mod clock;
mod event;
mod filter;
mod machine;
mod source;
mod timer;

use chrono::{DateTime, Utc};

/// User activity state.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityState {
    /// User is currently active.
    Active,
    /// User has been idle since the given time.
    Idle { since: DateTime<Utc> },
}

pub use callbacks::Callback;
pub use event::{ActivityEvent, EventKind, Point, DEFAULT_EVENTS};
pub use machine::{IdleTimer, IdleTimerBuilder};
pub use source::{EventBus, EventSource, Listener, ListenerId, ListenerOptions};

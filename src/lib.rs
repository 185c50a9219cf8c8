//! Idlewatch - activity-driven idle detection
//!
//! Tracks whether a subject is active or idle from a stream of activity
//! events and an inactivity timeout. The countdown can be paused, resumed
//! and reset, and qualifying activity can be reported through a debounced
//! or throttled action hook.

pub mod config;
pub mod console;
pub mod error;
pub mod idle;
pub mod logging;

pub use config::IdleConfig;
pub use error::{IdleError, Result};
pub use idle::{
    ActivityEvent, ActivityState, EventBus, EventKind, EventSource, IdleTimer, IdleTimerBuilder,
};

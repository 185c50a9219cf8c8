//! The single pending deadline behind the idle countdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Called when a deadline elapses, with the generation it was armed under.
pub(crate) type FireFn = Arc<dyn Fn(u64) + Send + Sync>;

/// At most one scheduled one-shot callback.
///
/// Each arm bumps the generation. A firing whose generation no longer
/// matches was cancelled or replaced after its task woke, and must be
/// ignored by the receiver.
pub(crate) struct Deadline {
    runtime: Handle,
    on_fire: FireFn,
    task: Option<JoinHandle<()>>,
    generation: u64,
    armed_at: Option<Instant>,
    armed_for: Duration,
}

impl Deadline {
    pub(crate) fn new(runtime: Handle, on_fire: FireFn) -> Self {
        Self {
            runtime,
            on_fire,
            task: None,
            generation: 0,
            armed_at: None,
            armed_for: Duration::ZERO,
        }
    }

    pub(crate) fn arm(&mut self, duration: Duration, now: Instant) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let on_fire = self.on_fire.clone();
        let deadline = now + duration;
        self.task = Some(self.runtime.spawn(async move {
            sleep_until(deadline).await;
            on_fire(generation);
        }));
        self.armed_at = Some(now);
        self.armed_for = duration;
        debug!("Deadline armed for {:?}", duration);
    }

    /// Idempotent.
    pub(crate) fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.armed_at = None;
        self.generation += 1;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Consume a firing. Returns false for a stale generation.
    pub(crate) fn take_fired(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.armed_at.is_none() {
            return false;
        }
        self.task = None;
        self.armed_at = None;
        true
    }

    /// Time left on the armed deadline, or `None` when nothing is armed.
    pub(crate) fn remaining(&self, now: Instant) -> Option<Duration> {
        self.armed_at
            .map(|at| self.armed_for.saturating_sub(now.saturating_duration_since(at)))
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.cancel();
    }
}

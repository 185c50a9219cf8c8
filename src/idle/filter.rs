//! Event filtering: movement-noise suppression, throttling and debouncing.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::callbacks::CallbackCell;
use super::event::{ActivityEvent, Point};

/// Movement arriving sooner than this after a reset is treated as jitter.
pub(crate) const MOVEMENT_FLOOR: Duration = Duration::from_millis(200);

/// Whether a movement event carries no real movement.
///
/// Non-movement kinds always pass. A movement with no coordinates, with the
/// coordinates last seen, or inside the post-reset floor is noise.
pub(crate) fn is_movement_noise(
    event: &ActivityEvent,
    last_pointer: Option<Point>,
    since_reset: Duration,
) -> bool {
    if !event.kind.is_movement() {
        return false;
    }
    match event.position {
        None => true,
        Some(position) if Some(position) == last_pointer => true,
        Some(_) => since_reset < MOVEMENT_FLOOR,
    }
}

/// Leading-edge throttle: the first call in a window passes, the rest of the
/// window is dropped. A zero window lets everything through.
#[derive(Debug)]
pub(crate) struct Throttle {
    window: Duration,
    opened_at: Option<Instant>,
}

impl Throttle {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            opened_at: None,
        }
    }

    pub(crate) fn try_pass(&mut self, now: Instant) -> bool {
        if self.window.is_zero() {
            return true;
        }
        match self.opened_at {
            Some(opened) if now.saturating_duration_since(opened) < self.window => false,
            _ => {
                self.opened_at = Some(now);
                true
            }
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.opened_at = None;
    }
}

/// Trailing-edge debounce of a callback cell.
///
/// Each call replaces the pending invocation, so the target runs once,
/// `delay` after the last call, with the last call's event.
pub(crate) struct Debouncer {
    delay: Duration,
    runtime: Handle,
    target: Arc<CallbackCell>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration, runtime: Handle, target: Arc<CallbackCell>) -> Self {
        Self {
            delay,
            runtime,
            target,
            pending: Mutex::new(None),
        }
    }

    pub(crate) fn call(&self, event: ActivityEvent) {
        let deadline = Instant::now() + self.delay;
        let target = self.target.clone();
        let task = self.runtime.spawn(async move {
            sleep_until(deadline).await;
            target.invoke(Some(&event));
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub(crate) fn cancel(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            task.abort();
        }
    }
}

/// Shapes delivery of qualifying events to `on_action`.
pub(crate) enum ActionPipeline {
    Immediate(Arc<CallbackCell>),
    Throttled {
        gate: Mutex<Throttle>,
        target: Arc<CallbackCell>,
    },
    Debounced(Debouncer),
}

impl ActionPipeline {
    /// Expects `debounce` and `throttle` not to both be set.
    pub(crate) fn new(
        debounce: Duration,
        throttle: Duration,
        runtime: Handle,
        target: Arc<CallbackCell>,
    ) -> Self {
        if !debounce.is_zero() {
            ActionPipeline::Debounced(Debouncer::new(debounce, runtime, target))
        } else if !throttle.is_zero() {
            ActionPipeline::Throttled {
                gate: Mutex::new(Throttle::new(throttle)),
                target,
            }
        } else {
            ActionPipeline::Immediate(target)
        }
    }

    pub(crate) fn emit(&self, event: &ActivityEvent, now: Instant) {
        match self {
            ActionPipeline::Immediate(target) => target.invoke(Some(event)),
            ActionPipeline::Throttled { gate, target } => {
                let pass = gate
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .try_pass(now);
                if pass {
                    target.invoke(Some(event));
                }
            }
            ActionPipeline::Debounced(debouncer) => debouncer.call(event.clone()),
        }
    }

    pub(crate) fn cancel(&self) {
        match self {
            ActionPipeline::Immediate(_) => {}
            ActionPipeline::Throttled { gate, .. } => gate
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .cancel(),
            ActionPipeline::Debounced(debouncer) => debouncer.cancel(),
        }
    }
}

//! Idle/active state machine and the public timer handle.
//!
//! ```text
//!              deadline elapsed, or overdue activity
//!   Active ─────────────────────────────────────────► Idle
//!     ▲                                                 │
//!     └──────────── activity (unless stop_on_idle) ─────┘
//!     ▲                                                 │
//!     └──────────────────── reset() ────────────────────┘
//! ```
//!
//! All session state lives behind one mutex owned by the timer. Event
//! listeners and deadline tasks hold only weak references to it, and user
//! callbacks run after the lock is released, once the session is already
//! consistent. A panicking callback unwinds into whoever triggered it.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::binding::Binding;
use super::callbacks::{noop, Callback, CallbackCell, Handlers};
use super::clock::Clock;
use super::event::{ActivityEvent, Point};
use super::filter::{is_movement_noise, ActionPipeline, Throttle};
use super::source::{EventSource, Listener};
use super::timer::{Deadline, FireFn};
use super::ActivityState;
use crate::config::IdleConfig;
use crate::error::{IdleError, Result};

/// A state change, carried out of the lock so callbacks run unlocked.
enum Transition {
    Idle(Option<ActivityEvent>),
    Active(Option<ActivityEvent>),
}

struct Session {
    timeout: Duration,
    stop_on_idle: bool,
    idle: bool,
    session_start: Instant,
    last_active_at: Option<Instant>,
    last_idle_at: Option<Instant>,
    /// Completed idle intervals only.
    accumulated_idle: Duration,
    /// Set exactly while paused.
    pending_remaining: Option<Duration>,
    last_pointer: Option<Point>,
    events_gate: Throttle,
    /// Suppresses the re-evaluation on the initial timeout configuration.
    first_load: bool,
    torn_down: bool,
    deadline: Deadline,
    binding: Binding,
}

impl Session {
    fn is_paused(&self) -> bool {
        self.pending_remaining.is_some()
    }

    fn toggle(&mut self, event: Option<ActivityEvent>, now: Instant) -> Transition {
        self.idle = !self.idle;
        if self.idle {
            // Idleness began when the countdown started, not when it was noticed.
            let since = now.checked_sub(self.timeout).unwrap_or(self.session_start);
            self.last_idle_at = Some(since);
            if self.stop_on_idle {
                self.deadline.cancel();
                self.binding.unbind();
            }
            info!("Became idle");
            Transition::Idle(event)
        } else {
            if let Some(since) = self.last_idle_at {
                self.accumulated_idle += now.saturating_duration_since(since);
            }
            self.binding.bind();
            info!("Became active");
            Transition::Active(event)
        }
    }

    fn register_activity(&mut self, event: &ActivityEvent, now: Instant) -> Option<Transition> {
        if self.idle && self.stop_on_idle {
            trace!("Ignoring activity until reset");
            return None;
        }

        let last_active = self.last_active_at.unwrap_or(self.session_start);
        let overdue = now.saturating_duration_since(last_active) > self.timeout;
        let transition = if self.idle || overdue {
            Some(self.toggle(Some(event.clone()), now))
        } else {
            None
        };

        self.last_active_at = Some(now);
        if event.position.is_some() {
            self.last_pointer = event.position;
        }
        if !(self.idle && self.stop_on_idle) {
            self.deadline.arm(self.timeout, now);
        }
        transition
    }

    fn reset(&mut self, now: Instant) {
        self.deadline.cancel();
        self.binding.bind();
        if self.idle {
            // Leaving idle closes the open interval.
            if let Some(since) = self.last_idle_at {
                self.accumulated_idle += now.saturating_duration_since(since);
            }
            self.idle = false;
        }
        self.session_start = now;
        self.last_active_at = Some(now);
        self.pending_remaining = None;
        self.deadline.arm(self.timeout, now);
    }

    fn remaining(&self, now: Instant) -> Duration {
        if let Some(pending) = self.pending_remaining {
            return pending;
        }
        if let Some(remaining) = self.deadline.remaining(now) {
            return remaining;
        }
        let last_active = self.last_active_at.unwrap_or(self.session_start);
        self.timeout
            .saturating_sub(now.saturating_duration_since(last_active))
    }

    fn total_idle(&self, now: Instant) -> Duration {
        match (self.idle, self.last_idle_at) {
            (true, Some(since)) => self.accumulated_idle + now.saturating_duration_since(since),
            _ => self.accumulated_idle,
        }
    }
}

struct Shared {
    session: Mutex<Session>,
    handlers: Handlers,
    actions: ActionPipeline,
    clock: Clock,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, transition: Option<Transition>) {
        match transition {
            Some(Transition::Idle(event)) => self.handlers.on_idle.invoke(event.as_ref()),
            Some(Transition::Active(event)) => self.handlers.on_active.invoke(event.as_ref()),
            None => {}
        }
    }

    fn handle_event(&self, event: &ActivityEvent) {
        let now = Instant::now();
        {
            let mut session = self.lock();
            if session.torn_down || session.is_paused() {
                return;
            }
            if !session.events_gate.try_pass(now) {
                return;
            }
            let since_reset = now.saturating_duration_since(session.session_start);
            if is_movement_noise(event, session.last_pointer, since_reset) {
                trace!("Dropped movement noise");
                return;
            }
        }

        self.actions.emit(event, now);

        let transition = {
            let mut session = self.lock();
            if session.torn_down || session.is_paused() {
                return;
            }
            session.register_activity(event, now)
        };
        self.notify(transition);
    }

    fn on_deadline(&self, generation: u64) {
        let transition = {
            let mut session = self.lock();
            if session.torn_down || !session.deadline.take_fired(generation) {
                return;
            }
            if session.idle {
                trace!("Ignoring deadline while already idle");
                return;
            }
            session.toggle(None, Instant::now())
        };
        self.notify(Some(transition));
    }

    fn apply_timeout(&self, timeout: Duration) {
        let transition = {
            let mut session = self.lock();
            session.timeout = timeout;
            if session.first_load {
                session.first_load = false;
                return;
            }
            debug!("Timeout changed to {:?}", timeout);
            if session.is_paused() {
                return;
            }

            let now = Instant::now();
            let transition = if session.idle {
                Some(session.toggle(None, now))
            } else {
                None
            };
            if transition.is_some() || session.deadline.is_armed() {
                session.reset(now);
            }
            transition
        };
        self.notify(transition);
    }

    fn teardown(&self) {
        let mut session = self.lock();
        if session.torn_down {
            return;
        }
        session.torn_down = true;
        session.deadline.cancel();
        session.binding.unbind();
        self.actions.cancel();
        debug!("Idle timer torn down");
    }
}

/// Tracks whether a subject is idle, based on activity events and a timeout.
///
/// Dropping the timer (or calling [`destroy`](Self::destroy)) cancels the
/// deadline, removes every listener and cancels a pending debounced action.
pub struct IdleTimer {
    shared: Arc<Shared>,
}

impl IdleTimer {
    pub fn builder(config: IdleConfig) -> IdleTimerBuilder {
        IdleTimerBuilder::new(config)
    }

    /// A timer with no event source and no-op callbacks.
    pub fn new(config: IdleConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock().idle
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().is_paused()
    }

    /// Whether the event handler is currently subscribed to the source.
    pub fn is_bound(&self) -> bool {
        self.shared.lock().binding.is_bound()
    }

    pub fn timeout(&self) -> Duration {
        self.shared.lock().timeout
    }

    pub fn state(&self) -> ActivityState {
        let session = self.shared.lock();
        match (session.idle, session.last_idle_at) {
            (true, Some(since)) => ActivityState::Idle {
                since: self.shared.clock.to_wall(since),
            },
            _ => ActivityState::Active,
        }
    }

    /// Restart the countdown from now, as active. Safe from any state.
    pub fn reset(&self) {
        self.shared.lock().reset(Instant::now());
        info!("Idle timer reset");
    }

    /// Freeze the countdown. No-op when already paused.
    pub fn pause(&self) {
        let mut session = self.shared.lock();
        if session.torn_down || session.is_paused() {
            return;
        }
        let remaining = session.remaining(Instant::now());
        session.binding.unbind();
        session.deadline.cancel();
        session.pending_remaining = Some(remaining);
        info!("Idle timer paused with {:?} remaining", remaining);
    }

    /// Continue a paused countdown. No-op when not paused.
    ///
    /// An idle session is not re-armed: it stays idle until activity or a
    /// reset.
    pub fn resume(&self) {
        let mut session = self.shared.lock();
        if session.torn_down {
            return;
        }
        let Some(remaining) = session.pending_remaining.take() else {
            return;
        };

        let now = Instant::now();
        if !session.idle {
            session.binding.bind();
            session.deadline.arm(remaining, now);
            session.last_active_at = Some(now);
        } else if !session.stop_on_idle {
            session.binding.bind();
        }
        info!("Idle timer resumed with {:?} remaining", remaining);
    }

    /// Change the timeout while running.
    ///
    /// When idle the timer flips back to active (calling `on_active` with no
    /// event) and restarts; a running countdown restarts under the new value.
    /// A paused timer only records the new value.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(IdleError::Configuration(
                "timeout must be greater than 0".to_string(),
            ));
        }
        self.shared.apply_timeout(timeout);
        Ok(())
    }

    pub fn set_on_idle<F>(&self, callback: F)
    where
        F: Fn(Option<&ActivityEvent>) + Send + Sync + 'static,
    {
        self.shared.handlers.on_idle.replace(Arc::new(callback));
    }

    pub fn set_on_active<F>(&self, callback: F)
    where
        F: Fn(Option<&ActivityEvent>) + Send + Sync + 'static,
    {
        self.shared.handlers.on_active.replace(Arc::new(callback));
    }

    /// Replaces the action callback without disturbing a pending debounce.
    pub fn set_on_action<F>(&self, callback: F)
    where
        F: Fn(Option<&ActivityEvent>) + Send + Sync + 'static,
    {
        self.shared.handlers.on_action.replace(Arc::new(callback));
    }

    /// When idleness last began, back-dated by the timeout.
    pub fn last_idle_time(&self) -> Option<DateTime<Utc>> {
        let session = self.shared.lock();
        session.last_idle_at.map(|at| self.shared.clock.to_wall(at))
    }

    pub fn last_active_time(&self) -> Option<DateTime<Utc>> {
        let session = self.shared.lock();
        session.last_active_at.map(|at| self.shared.clock.to_wall(at))
    }

    /// Accumulated idle time, including the open interval when idle.
    pub fn total_idle_time(&self) -> Duration {
        self.shared.lock().total_idle(Instant::now())
    }

    pub fn total_active_time(&self) -> Duration {
        let session = self.shared.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(session.session_start);
        elapsed.saturating_sub(session.total_idle(now))
    }

    /// Time since the session started (creation or last reset).
    pub fn elapsed_time(&self) -> Duration {
        let session = self.shared.lock();
        Instant::now().saturating_duration_since(session.session_start)
    }

    /// Time left before going idle, frozen while paused.
    pub fn remaining_time(&self) -> Duration {
        self.shared.lock().remaining(Instant::now())
    }

    /// Tear the timer down. Equivalent to dropping it.
    pub fn destroy(self) {}
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

/// Collects configuration, callbacks and the event source for an
/// [`IdleTimer`].
pub struct IdleTimerBuilder {
    config: IdleConfig,
    source: Option<Arc<dyn EventSource>>,
    on_idle: Callback,
    on_active: Callback,
    on_action: Callback,
}

impl IdleTimerBuilder {
    pub fn new(config: IdleConfig) -> Self {
        Self {
            config,
            source: None,
            on_idle: noop(),
            on_active: noop(),
            on_action: noop(),
        }
    }

    /// Without a source the timer still runs, but no events ever arrive.
    pub fn source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn on_idle<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&ActivityEvent>) + Send + Sync + 'static,
    {
        self.on_idle = Arc::new(callback);
        self
    }

    pub fn on_active<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&ActivityEvent>) + Send + Sync + 'static,
    {
        self.on_active = Arc::new(callback);
        self
    }

    pub fn on_action<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&ActivityEvent>) + Send + Sync + 'static,
    {
        self.on_action = Arc::new(callback);
        self
    }

    /// Validate the configuration and start the timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<IdleTimer> {
        let config = self.config;
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| IdleError::NoRuntime)?;

        let on_action = Arc::new(CallbackCell::new(self.on_action));
        let actions = ActionPipeline::new(
            config.debounce(),
            config.throttle(),
            runtime.clone(),
            on_action.clone(),
        );
        let handlers = Handlers {
            on_idle: CallbackCell::new(self.on_idle),
            on_active: CallbackCell::new(self.on_active),
            on_action,
        };
        let source = self.source;

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let listener: Listener = {
                let weak = weak.clone();
                Arc::new(move |event: &ActivityEvent| {
                    if let Some(shared) = weak.upgrade() {
                        shared.handle_event(event);
                    }
                })
            };
            let on_fire: FireFn = {
                let weak = weak.clone();
                Arc::new(move |generation: u64| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_deadline(generation);
                    }
                })
            };

            let clock = Clock::new();
            let now = Instant::now();
            Shared {
                session: Mutex::new(Session {
                    timeout: config.timeout(),
                    stop_on_idle: config.stop_on_idle,
                    idle: false,
                    session_start: now,
                    last_active_at: None,
                    last_idle_at: None,
                    accumulated_idle: Duration::ZERO,
                    pending_remaining: None,
                    last_pointer: None,
                    events_gate: Throttle::new(config.events_throttle()),
                    first_load: true,
                    torn_down: false,
                    deadline: Deadline::new(runtime, on_fire),
                    binding: Binding::new(
                        source,
                        config.events.clone(),
                        config.listener_options(),
                        listener,
                    ),
                }),
                handlers,
                actions,
                clock,
            }
        });

        shared.apply_timeout(config.timeout());
        if config.start_on_mount {
            shared.lock().reset(Instant::now());
        }
        info!(
            "Idle timer started: timeout={:?}, events={}, start_on_mount={}, stop_on_idle={}",
            config.timeout(),
            config.events.len(),
            config.start_on_mount,
            config.stop_on_idle
        );

        Ok(IdleTimer { shared })
    }
}

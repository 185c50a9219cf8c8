//! Event sources the idle timer binds to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

use super::event::{ActivityEvent, EventKind};

/// Callback registered with an [`EventSource`].
pub type Listener = Arc<dyn Fn(&ActivityEvent) + Send + Sync>;

/// Identifier returned by [`EventSource::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registration flags passed through to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Run during the capture phase, ahead of bubble-phase listeners.
    pub capture: bool,
    /// The listener promises not to cancel the event.
    pub passive: bool,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            capture: true,
            passive: true,
        }
    }
}

/// Something that delivers activity events to registered listeners.
pub trait EventSource: Send + Sync {
    fn add_listener(
        &self,
        kind: &EventKind,
        listener: Listener,
        options: ListenerOptions,
    ) -> ListenerId;

    /// Removing an unknown id is a no-op.
    fn remove_listener(&self, id: ListenerId);
}

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
    options: ListenerOptions,
}

/// In-process event source with synchronous dispatch.
///
/// Listeners run on the dispatching thread, in registration order, with
/// capture-phase listeners ahead of the rest. No lock is held while a
/// listener runs, so listeners may register or remove listeners.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every listener registered for its kind.
    pub fn dispatch(&self, event: &ActivityEvent) {
        let listeners: Vec<Listener> = {
            let registrations = self
                .registrations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let matching = registrations.iter().filter(|r| r.kind == event.kind);
            let (capture, bubble): (Vec<_>, Vec<_>) = matching.partition(|r| r.options.capture);
            capture
                .into_iter()
                .chain(bubble)
                .map(|r| r.listener.clone())
                .collect()
        };

        trace!("Dispatching {} to {} listener(s)", event.kind, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of live registrations.
    pub fn listener_count(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Options of every registration for `kind`.
    pub fn listener_options(&self, kind: &EventKind) -> Vec<ListenerOptions> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| &r.kind == kind)
            .map(|r| r.options)
            .collect()
    }
}

impl EventSource for EventBus {
    fn add_listener(
        &self,
        kind: &EventKind,
        listener: Listener,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                kind: kind.clone(),
                listener,
                options,
            });
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.id != id);
    }
}

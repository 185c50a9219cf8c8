//! Attaches the timer's event handler to an event source.

use std::sync::Arc;
use tracing::debug;

use super::event::EventKind;
use super::source::{EventSource, Listener, ListenerId, ListenerOptions};

/// Owns the subscriptions of one handler to one source.
///
/// Binding is guarded so repeated calls never double-subscribe. Without a
/// source every call is a no-op and the binding never reports bound.
pub(crate) struct Binding {
    source: Option<Arc<dyn EventSource>>,
    events: Vec<EventKind>,
    options: ListenerOptions,
    listener: Listener,
    ids: Vec<ListenerId>,
    bound: bool,
}

impl Binding {
    pub(crate) fn new(
        source: Option<Arc<dyn EventSource>>,
        events: Vec<EventKind>,
        options: ListenerOptions,
        listener: Listener,
    ) -> Self {
        Self {
            source,
            events,
            options,
            listener,
            ids: Vec::new(),
            bound: false,
        }
    }

    pub(crate) fn bind(&mut self) {
        if self.bound {
            return;
        }
        let Some(source) = &self.source else {
            return;
        };
        self.ids = self
            .events
            .iter()
            .map(|kind| source.add_listener(kind, self.listener.clone(), self.options))
            .collect();
        self.bound = true;
        debug!("Bound {} event kind(s)", self.ids.len());
    }

    pub(crate) fn unbind(&mut self) {
        if !self.bound {
            return;
        }
        if let Some(source) = &self.source {
            for id in self.ids.drain(..) {
                source.remove_listener(id);
            }
        }
        self.bound = false;
        debug!("Unbound event handler");
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.bound
    }
}

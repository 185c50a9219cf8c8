//! Replaceable user callbacks.

use std::sync::{Arc, PoisonError, RwLock};

use super::event::ActivityEvent;

/// User callback. The event is `None` when a deadline triggered the call.
pub type Callback = Arc<dyn Fn(Option<&ActivityEvent>) + Send + Sync>;

pub(crate) fn noop() -> Callback {
    Arc::new(|_: Option<&ActivityEvent>| {})
}

/// Holds the current callback so it can be swapped while timers that will
/// eventually invoke it stay armed.
pub(crate) struct CallbackCell {
    current: RwLock<Callback>,
}

impl CallbackCell {
    pub(crate) fn new(callback: Callback) -> Self {
        Self {
            current: RwLock::new(callback),
        }
    }

    pub(crate) fn replace(&self, callback: Callback) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Invoke the current callback. The lock is released before the call, so
    /// the callback may replace itself.
    pub(crate) fn invoke(&self, event: Option<&ActivityEvent>) {
        let callback = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        callback(event);
    }
}

/// The three hooks a timer reports through.
pub(crate) struct Handlers {
    pub(crate) on_idle: CallbackCell,
    pub(crate) on_active: CallbackCell,
    pub(crate) on_action: Arc<CallbackCell>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn replaced_callback_receives_later_calls() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (f, s) = (first.clone(), second.clone());

        let cell = CallbackCell::new(Arc::new(move |_: Option<&ActivityEvent>| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        cell.invoke(None);
        cell.replace(Arc::new(move |_: Option<&ActivityEvent>| {
            s.fetch_add(1, Ordering::SeqCst);
        }));
        cell.invoke(Some(&ActivityEvent::key_down()));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_can_replace_itself() {
        let cell = Arc::new(CallbackCell::new(noop()));
        let hits = Arc::new(AtomicUsize::new(0));
        let (cell_ref, hits_ref) = (cell.clone(), hits.clone());
        cell.replace(Arc::new(move |_: Option<&ActivityEvent>| {
            let hits = hits_ref.clone();
            cell_ref.replace(Arc::new(move |_: Option<&ActivityEvent>| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        cell.invoke(None);
        cell.invoke(None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

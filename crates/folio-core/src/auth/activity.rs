//! Process-wide target for user-activity events.
//!
//! Input sources (terminal, GUI shell) dispatch `ActivityKind`s here;
//! the session manager listens only while a session is authenticated.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

/// User-interaction signals that count as "still active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    PointerDown,
    KeyPress,
    Scroll,
    TouchStart,
}

impl ActivityKind {
    /// The qualifying activity set.
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::PointerDown,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PointerMove => "pointermove",
            ActivityKind::PointerDown => "pointerdown",
            ActivityKind::KeyPress => "keypress",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touchstart",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(ActivityKind) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kinds: Vec<ActivityKind>,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

/// Cheap-to-clone handle; all clones share one listener registry.
#[derive(Clone, Default)]
pub struct ActivityTarget {
    registry: Arc<Registry>,
}

impl ActivityTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, kinds: &[ActivityKind], callback: F) -> ListenerId
    where
        F: Fn(ActivityKind) + Send + Sync + 'static,
    {
        let id = ListenerId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.lock();
        listeners.push(Listener {
            id,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
        trace!(listener = id.0, count = listeners.len(), "Activity listener added");
        id
    }

    /// Returns false if the listener was already gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        let removed = listeners.len() != before;
        if removed {
            trace!(listener = id.0, count = listeners.len(), "Activity listener removed");
        }
        removed
    }

    /// Deliver an event to every listener registered for `kind`, in
    /// registration order. Returns how many listeners were invoked.
    pub fn dispatch(&self, kind: ActivityKind) -> usize {
        // Callbacks run outside the lock so they may add or remove listeners
        let callbacks: Vec<Callback> = self
            .lock()
            .iter()
            .filter(|l| l.kinds.contains(&kind))
            .map(|l| Arc::clone(&l.callback))
            .collect();

        for callback in &callbacks {
            callback(kind);
        }
        callbacks.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ActivityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityTarget")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_dispatch_only_matching_kinds() {
        let target = ActivityTarget::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        target.add_listener(&[ActivityKind::KeyPress], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(target.dispatch(ActivityKind::KeyPress), 1);
        assert_eq!(target.dispatch(ActivityKind::Scroll), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener() {
        let target = ActivityTarget::new();
        let id = target.add_listener(&ActivityKind::ALL, |_| {});
        assert_eq!(target.listener_count(), 1);

        assert!(target.remove_listener(id));
        assert!(!target.remove_listener(id));
        assert_eq!(target.dispatch(ActivityKind::PointerMove), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let target = ActivityTarget::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let inner_target = target.clone();
        let inner_slot = Arc::clone(&slot);
        let id = target.add_listener(&ActivityKind::ALL, move |_| {
            if let Some(id) = inner_slot.lock().unwrap().take() {
                inner_target.remove_listener(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(target.dispatch(ActivityKind::Scroll), 1);
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn test_kind_names() {
        let names: Vec<_> = ActivityKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            ["pointermove", "pointerdown", "keypress", "scroll", "touchstart"]
        );
    }
}

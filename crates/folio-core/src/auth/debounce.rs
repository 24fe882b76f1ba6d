//! Timer-coalescing primitive.
//!
//! Each `call()` cancels the pending invocation and schedules a new one
//! `delay` later, so only the last call of a burst runs the action.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type Action = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Pending {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    runtime: Handle,
    delay: Duration,
    action: Action,
    pending: Mutex<Pending>,
}

/// Timers run on the runtime passed to `new`, so `call()` works from any
/// thread, including ones outside Tokio.
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    pub fn new<F>(runtime: Handle, delay: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                runtime,
                delay,
                action: Arc::new(action),
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    pub fn call(&self) {
        let mut pending = self.inner.lock();
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
        let generation = pending.generation;

        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.delay;
        pending.handle = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            Inner::fire(weak, generation);
        }));
    }

    /// Drop any pending invocation without running it.
    pub fn cancel(&self) {
        let mut pending = self.inner.lock();
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }
        pending.generation += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().handle.is_some()
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(weak: Weak<Inner>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            let mut pending = inner.lock();
            // Superseded by a later call() or cancel()
            if pending.generation != generation {
                return;
            }
            pending.handle = None;
        }
        (inner.action)();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.lock().handle.take() {
            handle.abort();
        }
    }
}

//! Session lifecycle: token, expiration and the idle-timeout watchdog.
//!
//! The manager is the only writer of the persisted token/expiration pair.
//! Consumers read `is_authenticated()` or subscribe to changes; they never
//! touch the store directly.
//!
//! Watchdog states:
//! - `Disarmed`: no timer, only while logged out
//! - `Armed`: one pending timer whose deadline equals the persisted expiration
//!
//! Activity events (debounced) push the deadline out by a full inactivity
//! timeout measured from the last event of the burst.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::activity::{ActivityKind, ActivityTarget, ListenerId};
use super::debounce::Debouncer;
use super::store::SessionStore;
use crate::clock::Clock;

/// Idle period after which the session is forcibly logged out.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Quiet period before a burst of activity extends the session.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key for the absolute expiration (epoch ms, as a string)
pub const EXPIRATION_KEY: &str = "tokenExpiration";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub inactivity_timeout: Duration,
    pub debounce_delay: Duration,
    pub token_key: String,
    pub expiration_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: INACTIVITY_TIMEOUT,
            debounce_delay: DEBOUNCE_DELAY,
            token_key: TOKEN_KEY.to_string(),
            expiration_key: EXPIRATION_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Armed { deadline_ms: i64 },
    Disarmed,
}

struct Watchdog {
    generation: u64,
    deadline_ms: i64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    authenticated: bool,
    watchdog: Option<Watchdog>,
    generation: u64,
    listener: Option<ListenerId>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    activity: ActivityTarget,
    config: SessionConfig,
    runtime: Handle,
    state: Mutex<State>,
    status: watch::Sender<bool>,
    last_activity_ms: AtomicI64,
    debounced_reset: Debouncer,
    weak_self: Weak<Inner>,
}

/// Cheap-to-clone handle to the process-wide session state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build the manager and restore any persisted session.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime; the watchdog and the
    /// debounced reset are Tokio tasks.
    pub fn new(
        store: Arc<dyn SessionStore>,
        activity: ActivityTarget,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let runtime = Handle::current();
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let reset_target = weak.clone();
            let debounced_reset =
                Debouncer::new(runtime.clone(), config.debounce_delay, move || {
                    if let Some(inner) = reset_target.upgrade() {
                        inner.reset_expiration();
                    }
                });
            let (status, _) = watch::channel(false);

            Inner {
                store,
                clock,
                activity,
                config,
                runtime,
                state: Mutex::new(State::default()),
                status,
                last_activity_ms: AtomicI64::new(0),
                debounced_reset,
                weak_self: weak.clone(),
            }
        });
        inner.initialize();
        Self { inner }
    }

    /// Record a credential already accepted by the auth endpoint and start
    /// a full-length session.
    pub fn login(&self, token: &str) {
        self.inner.login(token);
    }

    /// End the session. Safe to call when already logged out.
    pub fn logout(&self) {
        let mut state = self.inner.lock();
        self.inner.clear_session(&mut state);
    }

    pub fn is_authenticated(&self) -> bool {
        *self.inner.status.borrow()
    }

    /// Receiver notified whenever the authentication flag changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.status.subscribe()
    }

    /// Bearer token for outbound requests, or `None` when logged out.
    /// An elapsed expiration found here logs the session out.
    pub fn token(&self) -> Option<String> {
        if !self.check_expiration() {
            return None;
        }
        self.inner.read_token()
    }

    /// Re-validate the persisted session. Returns whether it is still valid;
    /// an elapsed or missing expiration forces a logout.
    pub fn check_expiration(&self) -> bool {
        let mut state = self.inner.lock();
        if !state.authenticated {
            return false;
        }
        let now = self.inner.clock.now_ms();
        let has_token = self.inner.read_token().is_some();
        match self.inner.persisted_expiration() {
            Some(expires_at) if has_token && now < expires_at => true,
            Some(expires_at) if has_token => {
                info!(expired_ms_ago = now - expires_at, "Session expired while in use");
                self.inner.clear_session(&mut state);
                false
            }
            _ => {
                warn!(has_token, "Persisted session incomplete while in use");
                self.inner.clear_session(&mut state);
                false
            }
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_authenticated() {
            return None;
        }
        self.inner
            .persisted_expiration()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Time left before the watchdog fires.
    pub fn remaining(&self) -> Option<Duration> {
        match self.watchdog() {
            WatchdogState::Armed { deadline_ms } => {
                let left = deadline_ms - self.inner.clock.now_ms();
                Some(Duration::from_millis(left.max(0) as u64))
            }
            WatchdogState::Disarmed => None,
        }
    }

    pub fn watchdog(&self) -> WatchdogState {
        match self.inner.lock().watchdog {
            Some(ref w) => WatchdogState::Armed {
                deadline_ms: w.deadline_ms,
            },
            None => WatchdogState::Disarmed,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self) {
        let stored_token = self.read(&self.config.token_key);
        let token = stored_token.as_deref().filter(|t| !t.is_empty());
        let raw_expiration = self.read(&self.config.expiration_key);
        let now = self.clock.now_ms();

        match (token, raw_expiration) {
            (Some(_), Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(expires_at) if now < expires_at => {
                    let remaining = Duration::from_millis((expires_at - now) as u64);
                    let mut state = self.lock();
                    state.authenticated = true;
                    self.arm_watchdog(&mut state, expires_at, remaining);
                    self.subscribe_activity(&mut state);
                    self.publish(true);
                    info!(remaining_secs = remaining.as_secs(), "Restored persisted session");
                }
                Ok(expires_at) => {
                    info!(expired_ms_ago = now - expires_at, "Persisted session has expired");
                    self.clear_session(&mut self.lock());
                }
                Err(e) => {
                    warn!(value = %raw, error = %e, "Unparsable session expiration");
                    self.clear_session(&mut self.lock());
                }
            },
            (None, None) if stored_token.is_none() => debug!("No persisted session"),
            (token, expiration) => {
                warn!(
                    has_token = token.is_some(),
                    has_expiration = expiration.is_some(),
                    "Incomplete persisted session"
                );
                self.clear_session(&mut self.lock());
            }
        }
    }

    fn login(&self, token: &str) {
        if token.is_empty() {
            warn!("Login with an empty token ignored");
            return;
        }
        let mut state = self.lock();
        self.write(&self.config.token_key, token);

        let timeout = self.config.inactivity_timeout;
        let expires_at = self.clock.now_ms().saturating_add(self.timeout_ms());
        self.write(&self.config.expiration_key, &expires_at.to_string());
        self.arm_watchdog(&mut state, expires_at, timeout);

        state.authenticated = true;
        self.subscribe_activity(&mut state);
        self.publish(true);
        info!(expires_at, "Logged in");
    }

    /// Debounced activity handler. Persists the new expiration and re-arms
    /// the watchdog together, under the state lock.
    fn reset_expiration(&self) {
        let mut state = self.lock();
        if !state.authenticated {
            debug!("Activity reset after logout ignored");
            return;
        }

        let now = self.clock.now_ms();
        let last_activity = self.last_activity_ms.load(Ordering::SeqCst);
        let from = if last_activity > 0 { last_activity.min(now) } else { now };

        let expires_at = from.saturating_add(self.timeout_ms());
        if expires_at <= now {
            info!("Activity arrived after the session deadline");
            self.clear_session(&mut state);
            return;
        }

        self.write(&self.config.expiration_key, &expires_at.to_string());
        self.arm_watchdog(&mut state, expires_at, Duration::from_millis((expires_at - now) as u64));
        debug!(expires_at, "Session extended by activity");
    }

    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        match state.watchdog {
            Some(ref w) if w.generation == generation => {}
            _ => {
                trace!(generation, "Stale watchdog fired, ignoring");
                return;
            }
        }
        info!("Session idle timeout elapsed, logging out");
        self.clear_session(&mut state);
    }

    /// Replace any armed timer with one firing `after` from now.
    fn arm_watchdog(&self, state: &mut State, deadline_ms: i64, after: Duration) {
        if let Some(old) = state.watchdog.take() {
            old.handle.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        let weak = self.weak_self.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(generation);
            }
        });

        state.watchdog = Some(Watchdog {
            generation,
            deadline_ms,
            handle,
        });
        trace!(generation, deadline_ms, "Watchdog armed");
    }

    fn disarm_watchdog(&self, state: &mut State) {
        if let Some(old) = state.watchdog.take() {
            old.handle.abort();
            trace!(generation = old.generation, "Watchdog disarmed");
        }
    }

    fn subscribe_activity(&self, state: &mut State) {
        if state.listener.is_some() {
            return;
        }
        let weak = self.weak_self.clone();
        let id = self.activity.add_listener(&ActivityKind::ALL, move |kind| {
            if let Some(inner) = weak.upgrade() {
                trace!(%kind, "Activity");
                inner
                    .last_activity_ms
                    .store(inner.clock.now_ms(), Ordering::SeqCst);
                inner.debounced_reset.call();
            }
        });
        state.listener = Some(id);
    }

    fn unsubscribe_activity(&self, state: &mut State) {
        if let Some(id) = state.listener.take() {
            self.activity.remove_listener(id);
        }
    }

    fn clear_session(&self, state: &mut State) {
        self.disarm_watchdog(state);
        self.debounced_reset.cancel();
        self.unsubscribe_activity(state);

        self.remove(&self.config.token_key);
        self.remove(&self.config.expiration_key);
        self.last_activity_ms.store(0, Ordering::SeqCst);

        let was_authenticated = std::mem::replace(&mut state.authenticated, false);
        self.publish(false);
        if was_authenticated {
            info!("Logged out");
        }
    }

    fn publish(&self, authenticated: bool) {
        self.status.send_if_modified(|current| {
            if *current == authenticated {
                false
            } else {
                *current = authenticated;
                true
            }
        });
    }

    fn timeout_ms(&self) -> i64 {
        i64::try_from(self.config.inactivity_timeout.as_millis()).unwrap_or(i64::MAX)
    }

    /// Stored token, with an empty value treated as absent.
    fn read_token(&self) -> Option<String> {
        self.read(&self.config.token_key).filter(|t| !t.is_empty())
    }

    fn persisted_expiration(&self) -> Option<i64> {
        self.read(&self.config.expiration_key)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
    }

    // Storage failures never escape; reads fail closed.

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read session storage");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "Failed to write session storage");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "Failed to clear session storage");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(watchdog) = state.watchdog.take() {
            watchdog.handle.abort();
        }
        if let Some(id) = state.listener.take() {
            self.activity.remove_listener(id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Authentication module for managing the admin session.
//!
//! This module provides:
//! - `SessionManager`: token + expiration with a rolling idle-timeout watchdog
//! - `SessionStore`: persisted key-value storage (memory, file, OS keychain)
//! - `ActivityTarget`: where input sources report user activity
//! - `Debouncer`: coalesces activity bursts into one deadline extension
//!
//! Sessions expire after 30 minutes without qualifying activity.

pub mod activity;
pub mod debounce;
pub mod manager;
pub mod store;

pub use activity::{ActivityKind, ActivityTarget, ListenerId};
pub use debounce::Debouncer;
pub use manager::{SessionConfig, SessionManager, WatchdogState};
pub use store::{FileStore, KeyringStore, MemoryStore, SessionStore, StorageError};

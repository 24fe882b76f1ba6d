//! Core library for folio-admin.
//!
//! - `auth`: session lifecycle (token, expiration, idle-timeout watchdog)
//! - `api`: REST client for the project catalog API
//! - `models`: project, contact and user payloads
//! - `config`: persisted application configuration
//! - `clock`: wall-clock sources used for expiration timestamps

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{ActivityKind, ActivityTarget, SessionConfig, SessionManager};
pub use clock::{Clock, RuntimeClock, SystemClock};
pub use config::Config;

//! REST API client module for the project catalog service.
//!
//! This module provides the `ApiClient` for signing in, managing project
//! listings and reviewing contact-form submissions.
//!
//! Authenticated requests carry the session's bearer token; the client
//! never reads persisted storage itself.

pub mod client;
pub mod error;

pub use client::{ApiClient, UploadResult};
pub use error::ApiError;

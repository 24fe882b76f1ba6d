//! Data models for the project catalog API.
//!
//! - `Project` and its parts: listings shown on the public site
//! - `NewProject`, `ProjectUpdate`: upload and edit submissions
//! - `ContactMessage`: visitor contact-form submissions
//! - `AdminUser`: the signed-in staff account
//! - `DashboardOverview`: summary counts for the landing page

pub mod contact;
pub mod project;

pub use contact::{AdminUser, ContactMessage};
pub use project::{
    DashboardOverview, FieldError, ImageUpload, NewProject, PriceRange, Project, ProjectImage,
    ProjectLocation, ProjectStatus, ProjectType, ProjectUpdate,
};

//! Project listings as returned by, and submitted to, the catalog API.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Window for the "recent uploads" dashboard count.
const RECENT_UPLOAD_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ProjectStatus {
    #[default]
    Planning,
    #[serde(rename = "Under Construction")]
    UnderConstruction,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "Planning",
            ProjectStatus::UnderConstruction => "Under Construction",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "On Hold",
            ProjectStatus::Cancelled => "Cancelled",
            ProjectStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ProjectType {
    Residential,
    Commercial,
    #[serde(rename = "Mixed-Use")]
    MixedUse,
    Industrial,
    #[serde(other)]
    Unknown,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Residential => "Residential",
            ProjectType::Commercial => "Commercial",
            ProjectType::MixedUse => "Mixed-Use",
            ProjectType::Industrial => "Industrial",
            ProjectType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProjectLocation {
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl ProjectLocation {
    /// Format the location as a single line.
    pub fn formatted(&self) -> String {
        let mut line = [self.address.as_str(), self.city.as_str(), self.state.as_str()]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        if let Some(ref zip) = self.zip_code {
            if !zip.is_empty() {
                line.push(' ');
                line.push_str(zip);
            }
        }
        line
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn display(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("${:.0} - ${:.0}", min, max),
            (Some(min), None) => format!("from ${:.0}", min),
            (None, Some(max)) => format!("up to ${:.0}", max),
            (None, None) => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProjectImage {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

impl ProjectImage {
    /// Absolute URL for the image. The API may return Windows-style
    /// relative paths.
    pub fn resolved_url(&self, api_base_url: &str) -> String {
        let path = self.url.replace('\\', "/");
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}/{}", api_base_url.trim_end_matches('/'), path.trim_start_matches('/'))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub project_type: Option<ProjectType>,
    #[serde(default)]
    pub location: ProjectLocation,
    #[serde(default)]
    pub images: Vec<ProjectImage>,
    #[serde(default)]
    pub features: Vec<String>,
    pub price_range: Option<PriceRange>,
    pub total_units: Option<u32>,
    pub estimated_completion_date: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_recent(&self, now: DateTime<Utc>) -> bool {
        self.created_at
            .map(|created| created > now - Duration::hours(RECENT_UPLOAD_HOURS))
            .unwrap_or(false)
    }
}

/// Summary cards on the dashboard landing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DashboardOverview {
    pub total_projects: usize,
    pub recent_uploads: usize,
}

impl DashboardOverview {
    pub fn from_projects(projects: &[Project], now: DateTime<Utc>) -> Self {
        Self {
            total_projects: projects.len(),
            recent_uploads: projects.iter().filter(|p| p.is_recent(now)).count(),
        }
    }
}

// ============================================================================
// Submissions
// ============================================================================

/// Image file to attach to a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    pub path: PathBuf,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Upload form for a new project listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub project_type: Option<ProjectType>,
    #[serde(default)]
    pub estimated_completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_units: Option<u32>,
    #[serde(default)]
    pub price_min: Option<f64>,
    #[serde(default)]
    pub price_max: Option<f64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl NewProject {
    /// Client-side checks mirrored from the upload form. The API still
    /// performs its own validation.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let required = [
            ("name", &self.name),
            ("description", &self.description),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(FieldError {
                    field,
                    message: "is required".to_string(),
                });
            }
        }
        match self.project_type {
            None | Some(ProjectType::Unknown) => errors.push(FieldError {
                field: "projectType",
                message: "is required".to_string(),
            }),
            Some(_) => {}
        }
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                errors.push(FieldError {
                    field: "priceRange",
                    message: format!("minimum {} exceeds maximum {}", min, max),
                });
            }
        }
        for price in [self.price_min, self.price_max].into_iter().flatten() {
            if price < 0.0 {
                errors.push(FieldError {
                    field: "priceRange",
                    message: "prices cannot be negative".to_string(),
                });
                break;
            }
        }
        errors
    }

    /// Non-empty features, trimmed.
    pub fn cleaned_features(&self) -> Vec<&str> {
        self.features
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// Partial update for an existing project; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ProjectLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_units: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.project_type.is_none()
            && self.location.is_none()
            && self.price_range.is_none()
            && self.total_units.is_none()
            && self.features.is_none()
    }
}

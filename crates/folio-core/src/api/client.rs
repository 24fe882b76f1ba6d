//! API client for the project catalog REST API.
//!
//! This module provides the `ApiClient` struct for signing in and making
//! authenticated requests for projects and contact messages.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::SessionManager;
use crate::models::{
    AdminUser, ContactMessage, DashboardOverview, NewProject, Project, ProjectUpdate,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum concurrent delete requests for bulk contact removal.
const MAX_CONCURRENT_DELETES: usize = 5;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// The login endpoint has returned the token both at the top level and
/// inside `data`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: Option<String>,
}

impl LoginResponse {
    fn into_token(self) -> Option<String> {
        self.token
            .or_else(|| self.data.and_then(|d| d.token))
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a project upload.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub message: Option<String>,
    pub project: Option<Project>,
}

/// Image bytes read up front so a rate-limited upload can be rebuilt.
struct PreparedImage {
    file_name: String,
    mime: &'static str,
    bytes: Vec<u8>,
    caption: Option<String>,
}

/// API client for the catalog service.
/// Clone is cheap - reqwest::Client and SessionManager are both Arc inside.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionManager) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Authentication =====

    /// Exchange credentials for a token and start a session with it.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        let url = self.url("/api/v1/auth/login");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .context("Failed to send sign-in request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // A 401 here means bad credentials, not an expired session
            return Err(match ApiError::from_status(status, &body) {
                ApiError::Unauthorized => ApiError::AccessDenied("invalid email or password".to_string()),
                other => other,
            }
            .into());
        }

        let login: LoginResponse = response.json().await.context("Failed to parse sign-in response")?;
        let token = login
            .into_token()
            .ok_or_else(|| ApiError::InvalidResponse("sign-in response had no token".to_string()))?;

        self.session.login(&token);
        info!(email, "Signed in");
        Ok(())
    }

    /// Fetch the signed-in staff account
    pub async fn me(&self) -> Result<AdminUser> {
        self.get_data("/api/v1/auth/me")
            .await?
            .ok_or_else(|| ApiError::InvalidResponse("missing user data".to_string()).into())
    }

    // ===== Projects =====

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.get_data("/api/v1/projects").await?.unwrap_or_default())
    }

    /// Summary counts for the dashboard landing page
    pub async fn overview(&self) -> Result<DashboardOverview> {
        let projects = self.list_projects().await?;
        Ok(DashboardOverview::from_projects(&projects, Utc::now()))
    }

    /// Validate and upload a new project listing as multipart form data.
    pub async fn create_project(&self, project: &NewProject) -> Result<UploadResult> {
        let errors = project.validate();
        if !errors.is_empty() {
            let summary = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::Validation(summary).into());
        }

        let images = project
            .images
            .iter()
            .map(|image| {
                let bytes = std::fs::read(&image.path)
                    .with_context(|| format!("Failed to read image {}", image.path.display()))?;
                Ok(PreparedImage {
                    file_name: image
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "image".to_string()),
                    mime: mime_for(&image.path),
                    bytes,
                    caption: image.caption.clone().filter(|c| !c.is_empty()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let url = self.url("/api/v1/projects/create");
        let response = self
            .send("POST", &url, |client| {
                Ok(client.post(&url).multipart(project_form(project, &images)?))
            })
            .await?;

        let envelope: Envelope<Project> = response
            .json()
            .await
            .context("Failed to parse upload response")?;
        info!(name = %project.name, images = images.len(), "Project uploaded");
        Ok(UploadResult {
            message: envelope.message,
            project: envelope.data,
        })
    }

    /// Apply a partial update. An update with no fields set is rejected
    /// without a request.
    pub async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<Option<Project>> {
        if update.is_empty() {
            return Err(ApiError::Validation("no fields to update".to_string()).into());
        }
        let url = self.url(&format!("/api/v1/projects/{}", id));
        let response = self
            .send("PUT", &url, |client| Ok(client.put(&url).json(update)))
            .await?;
        let envelope: Envelope<Project> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))?;
        info!(id, "Project updated");
        Ok(envelope.data)
    }

    pub async fn delete_project(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/v1/projects/{}", id)).await?;
        info!(id, "Project deleted");
        Ok(())
    }

    // ===== Contact messages =====

    pub async fn list_contacts(&self) -> Result<Vec<ContactMessage>> {
        Ok(self.get_data("/api/v1/contact").await?.unwrap_or_default())
    }

    pub async fn delete_contact(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/v1/contact/{}", id)).await?;
        debug!(id, "Contact message deleted");
        Ok(())
    }

    /// Delete several messages concurrently. Results come back per id, in
    /// completion order.
    pub async fn delete_contacts(&self, ids: &[String]) -> Vec<(String, Result<()>)> {
        stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let result = self.delete_contact(&id).await;
                (id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_DELETES)
            .collect()
            .await
    }

    // ===== Request plumbing =====

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        let response = self.send("GET", &url, |client| Ok(client.get(&url))).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))?;
        Ok(envelope.data)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.send("DELETE", &url, |client| Ok(client.delete(&url)))
            .await?;
        Ok(())
    }

    /// Send an authenticated request, backing off on 429. `build` is called
    /// once per attempt.
    async fn send<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<RequestBuilder>,
    {
        let token = self.session.token().ok_or(ApiError::NotAuthenticated)?;
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build(&self.client)?
                .bearer_auth(&token)
                .send()
                .await
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match self.check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Ok(Some) on success, Ok(None) when rate limited, Err otherwise.
    /// A 401 ends the local session.
    async fn check_response_for_retry(&self, response: Response) -> Result<Option<Response>> {
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status.as_u16() == 429 {
            return Ok(None);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ApiError::from_status(status, &body);
        if matches!(error, ApiError::Unauthorized) {
            warn!("API rejected the session token, logging out");
            self.session.logout();
        }
        Err(error.into())
    }
}

fn project_form(project: &NewProject, images: &[PreparedImage]) -> Result<Form> {
    let mut form = Form::new()
        .text("name", project.name.clone())
        .text("description", project.description.clone())
        .text("location[address]", project.address.clone())
        .text("location[city]", project.city.clone())
        .text("location[state]", project.state.clone())
        .text("status", project.status.as_str());

    if let Some(ref zip) = project.zip_code {
        if !zip.is_empty() {
            form = form.text("location[zipCode]", zip.clone());
        }
    }
    if let Some(project_type) = project.project_type {
        form = form.text("projectType", project_type.as_str());
    }
    if let Some(date) = project.estimated_completion_date {
        form = form.text("estimatedCompletionDate", date.format("%Y-%m-%d").to_string());
    }
    if let Some(units) = project.total_units {
        form = form.text("totalUnits", units.to_string());
    }
    if let Some(min) = project.price_min {
        form = form.text("priceRange[min]", min.to_string());
    }
    if let Some(max) = project.price_max {
        form = form.text("priceRange[max]", max.to_string());
    }
    for feature in project.cleaned_features() {
        form = form.text("features[]", feature.to_string());
    }
    for image in images {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime)?;
        form = form.part("images", part);
        if let Some(ref caption) = image.caption {
            form = form.text("imageCaptions[]", caption.clone());
        }
    }
    Ok(form)
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

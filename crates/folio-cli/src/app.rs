//! Command execution for the admin console.
//!
//! `App` wires the configuration, the process-wide `SessionManager` and
//! the API client together. Catalog commands are guarded on
//! `is_authenticated()` the way the dashboard's protected routes were.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use folio_core::api::ApiError;
use folio_core::auth::{FileStore, KeyringStore, SessionStore};
use folio_core::config::{StoreBackend, APP_NAME};
use folio_core::models::{NewProject, ProjectUpdate};
use folio_core::{ActivityKind, ActivityTarget, ApiClient, Config, SessionManager, SystemClock};
use tracing::{debug, info};

use crate::cli::Command;
use crate::format::{format_phone, format_remaining, truncate};

/// Extra wait past the debounce delay so the reset lands before exit
const ACTIVITY_SETTLE_MARGIN_MS: u64 = 50;

pub struct App {
    pub config: Config,
    pub activity: ActivityTarget,
    pub session: SessionManager,
    pub api: ApiClient,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match config.store {
            StoreBackend::File => Arc::new(FileStore::new(config.cache_dir()?)),
            StoreBackend::Keyring => Arc::new(KeyringStore::new(APP_NAME)),
        };
        let activity = ActivityTarget::new();
        let session = SessionManager::new(
            store,
            activity.clone(),
            Arc::new(SystemClock),
            config.session_config(),
        );
        let api = ApiClient::new(config.api_base_url.clone(), session.clone())?;
        debug!(authenticated = session.is_authenticated(), "Session initialized");

        Ok(Self {
            config,
            activity,
            session,
            api,
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        if command.requires_session() {
            self.require_session()?;
            self.touch();
        }

        let result = match command {
            Command::Login { email } => self.login(email).await,
            Command::Token { token } => {
                self.session.login(&token);
                self.print_status();
                Ok(())
            }
            Command::Logout => {
                self.session.logout();
                println!("Signed out.");
                Ok(())
            }
            Command::Status => {
                self.print_status();
                Ok(())
            }
            Command::Watch => crate::watch::run(&self.session, &self.activity).await,
            Command::Overview => self.overview().await,
            Command::Projects => self.projects().await,
            Command::Upload { file } => self.upload(&file).await,
            Command::EditProject { id, file } => self.edit_project(&id, &file).await,
            Command::DeleteProject { id } => {
                self.api.delete_project(&id).await?;
                println!("Deleted project {}", id);
                Ok(())
            }
            Command::Contacts => self.contacts().await,
            Command::DeleteContacts { ids } => self.delete_contacts(&ids).await,
        };

        let result = result.map_err(|e| self.explain(e));
        self.settle_activity().await;
        result
    }

    /// Route guard for catalog commands.
    fn require_session(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            bail!("Not signed in. Run `folio-admin login` first.")
        }
    }

    /// A command invocation is user activity.
    fn touch(&self) {
        self.activity.dispatch(ActivityKind::KeyPress);
    }

    /// Give a pending debounced extension time to persist before exit.
    async fn settle_activity(&self) {
        if !self.session.is_authenticated() {
            return;
        }
        let wait = self.session.config().debounce_delay
            + Duration::from_millis(ACTIVITY_SETTLE_MARGIN_MS);
        tokio::time::sleep(wait).await;
    }

    fn explain(&self, err: anyhow::Error) -> anyhow::Error {
        let needs_sign_in = err
            .downcast_ref::<ApiError>()
            .map(ApiError::requires_sign_in)
            .unwrap_or(false);
        if needs_sign_in {
            err.context("Session expired. Run `folio-admin login` to sign in again.")
        } else {
            err
        }
    }

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = rpassword::prompt_password(format!("Password for {}: ", email))?;

        self.api.sign_in(&email, &password).await?;

        if self.config.last_email.as_deref() != Some(email.as_str()) {
            self.config.last_email = Some(email.clone());
            self.config.save().context("Failed to save config")?;
        }
        info!(email = %email, "Login complete");

        match self.api.me().await {
            Ok(user) => println!("Signed in as {}.", user.display_name()),
            Err(e) => {
                debug!(error = %e, "Could not fetch account details");
                println!("Signed in.");
            }
        }
        self.print_status();
        Ok(())
    }

    fn print_status(&self) {
        if !self.session.check_expiration() {
            println!("No active session.");
            return;
        }
        let remaining = self
            .session
            .remaining()
            .map(format_remaining)
            .unwrap_or_else(|| "?".to_string());
        match self.session.expires_at() {
            Some(at) => println!(
                "Session active: expires in {} (at {})",
                remaining,
                at.with_timezone(&chrono::Local).format("%H:%M:%S")
            ),
            None => println!("Session active: expires in {}", remaining),
        }
    }

    async fn overview(&self) -> Result<()> {
        let overview = self.api.overview().await?;
        println!("Total projects:  {}", overview.total_projects);
        println!("Recent uploads:  {} (last 24h)", overview.recent_uploads);
        Ok(())
    }

    async fn projects(&self) -> Result<()> {
        let projects = self.api.list_projects().await?;
        if projects.is_empty() {
            println!("No projects.");
            return Ok(());
        }
        println!(
            "{:<24}  {:<28}  {:<18}  {:<12}  {}",
            "ID", "NAME", "STATUS", "TYPE", "LOCATION"
        );
        for p in &projects {
            println!(
                "{:<24}  {:<28}  {:<18}  {:<12}  {}",
                p.id,
                truncate(&p.name, 28),
                p.status,
                p.project_type.map(|t| t.as_str()).unwrap_or("-"),
                truncate(&p.location.formatted(), 40)
            );
        }
        println!("\n{} project(s)", projects.len());
        Ok(())
    }

    async fn upload(&self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut project: NewProject = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse project file {}", path.display()))?;

        // Image paths are relative to the project file
        if let Some(dir) = path.parent() {
            for image in &mut project.images {
                if image.path.is_relative() {
                    image.path = dir.join(&image.path);
                }
            }
        }

        let result = self.api.create_project(&project).await?;
        println!(
            "{}",
            result
                .message
                .unwrap_or_else(|| "Project uploaded.".to_string())
        );
        if let Some(created) = result.project {
            println!("New project id: {}", created.id);
        }
        Ok(())
    }

    async fn edit_project(&self, id: &str, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let update: ProjectUpdate = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse update file {}", path.display()))?;

        match self.api.update_project(id, &update).await? {
            Some(project) => println!(
                "Updated {} ({}, {})",
                project.name,
                project.status,
                project.location.formatted()
            ),
            None => println!("Updated project {}", id),
        }
        Ok(())
    }

    async fn contacts(&self) -> Result<()> {
        let contacts = self.api.list_contacts().await?;
        if contacts.is_empty() {
            println!("No contact messages.");
            return Ok(());
        }
        for c in &contacts {
            println!("{}  {}", c.id, c.received_display());
            println!("  From:    {} <{}>", c.name, c.email);
            if let Some(ref phone) = c.phone {
                println!("  Phone:   {}", format_phone(phone));
            }
            println!("  Subject: {}", truncate(&c.subject, 70));
            println!("  {}", truncate(&c.message.replace('\n', " "), 100));
            println!();
        }
        println!("{} message(s)", contacts.len());
        Ok(())
    }

    async fn delete_contacts(&self, ids: &[String]) -> Result<()> {
        let results = self.api.delete_contacts(ids).await;
        let mut failed = 0;
        for (id, result) in results {
            match result {
                Ok(()) => println!("Deleted {}", id),
                Err(e) => {
                    failed += 1;
                    eprintln!("Failed to delete {}: {}", id, e);
                }
            }
        }
        if failed > 0 {
            bail!("{} of {} deletions failed", failed, ids.len());
        }
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    use std::io::{self, Write};

    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("No value entered");
    }
    Ok(value)
}

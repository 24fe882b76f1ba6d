//! Command-line interface definitions for folio-admin.
//!
//! ```bash
//! folio-admin login staff@example.com
//! folio-admin projects
//! folio-admin edit-project 66a1f0c2e4b0a1b2c3d4e5f6 changes.json
//! folio-admin -v watch
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Terminal admin console for the project catalog.
///
/// Sessions end after 30 minutes without activity; every command and any
/// input in `watch` counts as activity.
#[derive(Debug, Parser)]
#[command(name = "folio-admin")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        /// Account email (defaults to the last one used)
        email: Option<String>,
    },
    /// Start a session with an already-issued token
    Token { token: String },
    /// End the current session
    Logout,
    /// Show whether a session is active and for how long
    Status,
    /// Live session view; input keeps the session alive
    Watch,
    /// Project totals and uploads in the last 24 hours
    Overview,
    /// List project listings
    Projects,
    /// Upload a new project described by a JSON file
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Apply a partial update from a JSON file to an existing project
    EditProject {
        id: String,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Delete a project listing
    DeleteProject { id: String },
    /// List contact-form messages
    Contacts,
    /// Delete one or more contact messages
    #[command(alias = "delete-contact")]
    DeleteContacts {
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
    },
}

impl Command {
    /// Commands that need an authenticated session before running
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Command::Overview
                | Command::Projects
                | Command::Upload { .. }
                | Command::EditProject { .. }
                | Command::DeleteProject { .. }
                | Command::Contacts
                | Command::DeleteContacts { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("folio-admin").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&["login"]).unwrap().command, Command::Login { email: None });
        assert_eq!(
            parse(&["login", "staff@example.com"]).unwrap().command,
            Command::Login {
                email: Some("staff@example.com".to_string())
            }
        );
        assert_eq!(
            parse(&["token", "abc"]).unwrap().command,
            Command::Token {
                token: "abc".to_string()
            }
        );
        assert_eq!(
            parse(&["edit-project", "p1", "changes.json"]).unwrap().command,
            Command::EditProject {
                id: "p1".to_string(),
                file: PathBuf::from("changes.json")
            }
        );
        assert_eq!(
            parse(&["delete-contact", "a", "b"]).unwrap().command,
            Command::DeleteContacts {
                ids: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = parse(&["status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.command, Command::Status);
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["token"]).is_err());
        assert!(parse(&["logout", "now"]).is_err());
        assert!(parse(&["delete-contacts"]).is_err());
        assert!(parse(&["edit-project", "p1"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn test_guarded_commands() {
        assert!(Command::Projects.requires_session());
        assert!(Command::DeleteContacts { ids: vec![] }.requires_session());
        assert!(Command::EditProject {
            id: "p1".to_string(),
            file: PathBuf::from("x.json")
        }
        .requires_session());
        assert!(!Command::Status.requires_session());
        assert!(!Command::Watch.requires_session());
        assert!(!Command::Logout.requires_session());
    }
}

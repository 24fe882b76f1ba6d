//! folio-admin - terminal admin console for the project catalog.
//!
//! Signs staff in, keeps an idle-timeout session, and manages project
//! listings and contact-form messages through the catalog REST API.

mod app;
mod cli;
mod format;
mod watch;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use folio_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use cli::{Cli, Command};

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "folio-admin.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a daily file in the cache directory; stderr output is skipped
/// for `watch`, where raw mode owns the terminal.
fn init_tracing(log_dir: Option<&Path>, to_stderr: bool, verbose: u8) -> Option<WorkerGuard> {
    // RUST_LOG wins over -v (e.g., RUST_LOG=debug)
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    let stderr_layer = to_stderr.then(|| fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = Config::load()?;
    let log_dir = config.cache_dir().ok();
    if let Some(ref dir) = log_dir {
        let _ = std::fs::create_dir_all(dir);
    }
    let _log_guard = init_tracing(
        log_dir.as_deref(),
        cli.command != Command::Watch,
        cli.verbose,
    );
    info!(api = %config.api_base_url, "folio-admin starting");

    let mut app = App::new(config)?;
    app.run(cli.command).await
}

//! CLI command implementations
//!
//! Each command loads the config, installs logging, and opens the store
//! (recovery then legacy migration) before doing its own work.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::http_server::HttpServer;
use crate::observability::{init_logging, Event};
use crate::service::{RecordEngine, RequestContext, VersionedRecordService};
use crate::storage::{versions_path, MigrationReport, VersionStore};

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Start { config } => start(&config),
        Command::Migrate { config } => migrate(&config),
        Command::History { config, id } => history(&config, id),
    }
}

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    init_logging(&config.log_level, config.log_format);
    info!(
        event = %Event::ConfigLoaded,
        path = %config_path.display(),
        data_dir = %config.data_dir,
        log_format = %config.log_format,
        "configuration loaded"
    );
    Ok(config)
}

fn open_engine(config: &Config) -> CliResult<(RecordEngine, MigrationReport)> {
    RecordEngine::open(config.data_path())
        .map_err(|e| CliError::boot_failed(format!("failed to open store: {}", e)))
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Initialize a new data directory
///
/// Creates the directory layout and an empty version log. Fails if a log
/// is already present.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let data_dir = config.data_path();

    if versions_path(data_dir).exists() {
        return Err(CliError::AlreadyInitialized(config.data_dir.clone()));
    }

    VersionStore::open(data_dir)?;

    write_response(&json!({"initialized": true, "data_dir": config.data_dir}))
}

/// Open the store and serve HTTP until Ctrl-C
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    info!(event = %Event::BootStart, "starting");

    let (engine, report) = open_engine(&config)?;
    let (records, versions) = engine.store().counts()?;
    info!(
        event = %Event::BootComplete,
        records,
        versions,
        migrated = report.records_migrated,
        "store ready"
    );

    let server = HttpServer::new(config.http.clone(), Arc::new(engine));

    runtime()?.block_on(async {
        server
            .start(shutdown_signal())
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Run bootstrap and migration, then report what happened
pub fn migrate(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let (_engine, report) = open_engine(&config)?;
    write_response(&report)
}

/// Print the version history of one record
pub fn history(config_path: &Path, id: i64) -> CliResult<()> {
    let config = load_config(config_path)?;
    let (engine, _report) = open_engine(&config)?;

    let ctx = RequestContext::new();
    let versions = runtime()?.block_on(engine.list_versions(&ctx, id))?;
    write_response(&versions)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(event = %Event::ShutdownStart, "shutdown requested"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("timetravel.json");
        let data_dir = dir.path().join("data-root");
        std::fs::write(
            &path,
            json!({"data_dir": data_dir.to_string_lossy()}).to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        init(&config).unwrap();
        assert!(versions_path(&dir.path().join("data-root")).exists());

        let err = init(&config).unwrap_err();
        assert_eq!(err.code_str(), "TT_CLI_ALREADY_INITIALIZED");
    }

    #[test]
    fn test_history_of_unknown_record_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        let err = history(&config, 42).unwrap_err();
        assert_eq!(err.code_str(), "TT_CLI_REQUEST_FAILED");
    }

    #[test]
    fn test_migrate_on_fresh_dir_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        migrate(&config).unwrap();
    }
}

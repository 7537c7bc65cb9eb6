use std::error::Error;
use std::path::Path;

use tracing::info;

use storyqa::config::Settings;
use storyqa::inference::QaEngine;
use storyqa::server::ApiServer;

/// Main entry point for the Story QA service
///
/// Loads settings, initializes logging, loads the model and tokenizer
/// artifacts, and starts the inference server. A failure in any of these
/// steps is fatal: the process exits before the listening socket is bound,
/// so the service can never look healthy with missing assets.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Load settings first
    let settings = Settings::new()?;

    // Initialize the subscriber first, before any file operations
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        // Use log file path from settings, or default to "logs"
        settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs")),
        "storyqa",
    );

    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // Disable ANSI colors for cleaner log files
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::new(&settings.logging.level))
        .init();

    info!("Story QA service starting up...");

    let log_path = settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs"));
    std::fs::create_dir_all(log_path)?;
    let full_log_path = std::fs::canonicalize(log_path)?;
    info!("Log directory: {}", full_log_path.display());
    info!("Logging initialized");

    info!("Settings loaded");

    // Load the model and tokenizer before accepting any traffic.
    let engine = QaEngine::load(&settings)?;

    let server = ApiServer::new(engine, settings.server.host.clone(), settings.server.port);
    server.start().await?;

    Ok(())
}

use anyhow::Result;
use std::fs;
use std::path::Path;
use chrono::Local;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global tracing subscriber, writing to a timestamped file
///
/// The filter comes from `RUST_LOG`; without it only errors are recorded.
///
/// # Arguments
/// * `log_dir` - Directory for log files, created if missing
///
/// # Returns
/// * `Result<String>` - Path of the log file
pub fn init_logger(log_dir: &str) -> Result<String> {
    if !Path::new(log_dir).exists() {
        fs::create_dir_all(log_dir)?;
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_file = format!("{}/url_sifter_{}.log", log_dir, timestamp);

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_ansi(false)
        .with_writer(fs::File::create(&log_file)?)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!("Logger initialized: {}", log_file);

    Ok(log_file)
}

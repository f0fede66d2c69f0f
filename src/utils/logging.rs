use color_eyre::eyre::{Context, Result};
use lazy_static::lazy_static;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{PROJECT_NAME, get_data_dir};

lazy_static! {
    pub static ref LOG_ENV: String = format!("{}_LOG_LEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Log to `<data_dir>/typeahead.log`; the terminal belongs to the UI.
///
/// The filter comes from `RUST_LOG`, then `TYPEAHEAD_LOG_LEVEL`, and defaults
/// to `info` for this crate.
pub fn init() -> Result<()> {
    let directory = get_data_dir();
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("Error creating data dir {}", directory.display()))?;
    let log_path = directory.join(LOG_FILE.clone());
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Error creating log file {}", log_path.display()))?;

    let directive = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.clone()))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")));
    let env_filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter `{directive}`"))?;

    let file_subscriber = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);
    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}

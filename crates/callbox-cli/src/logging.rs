use std::str::FromStr;

use anyhow::{anyhow, Result};
use callbox_core::LoggingSettings;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
}

impl LoggingConfig {
    /// Build from the `[logging]` section, with an optional level override
    pub fn from_settings(settings: &LoggingSettings, level_override: Option<&str>) -> Result<Self> {
        let level = parse_log_level(level_override.unwrap_or(&settings.level))?;
        Ok(Self {
            level,
            json: settings.json,
            file_info: level >= Level::DEBUG,
        })
    }
}

/// Install the global subscriber
///
/// Logs go to stderr; stdout belongs to the call screen.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| anyhow!("Invalid log level: {level}"))
}

//! Logging setup for applications embedding the coordinator
//!
//! The library itself only emits `tracing` events under the `classlive_core`
//! target; installing a subscriber is left to the binary. [`setup_logging`]
//! is the one-call way to do it. The coordinator can be turned up on its own
//! while the HTTP stack used for credential fetches stays at `warn`.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;

/// Target every coordinator event is recorded under
pub const CORE_TARGET: &str = "classlive_core";

/// Crates whose request-level chatter is capped at `warn`
const TRANSPORT_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

/// How the binary wants coordinator logs rendered
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level for everything
    pub level: Level,
    /// Level for the coordinator itself, `level` when unset
    pub core_level: Option<Level>,
    /// Keep credential HTTP traffic at `warn` regardless of `level`
    pub quiet_transport: bool,
    /// One JSON object per line on stdout
    pub json: bool,
    /// Application name included in the welcome line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            core_level: None,
            quiet_transport: true,
            json: false,
            app_name: "classlive".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Log the coordinator at `level` independently of the default
    pub fn with_core_level(mut self, level: Level) -> Self {
        self.core_level = Some(level);
        self
    }

    /// Let HTTP transport crates log at the default level
    pub fn with_transport_logs(mut self) -> Self {
        self.quiet_transport = false;
        self
    }

    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![level_directive(self.level).to_string()];
        if let Some(core) = self.core_level {
            directives.push(format!("{}={}", CORE_TARGET, level_directive(core)));
        }
        if self.quiet_transport && self.level > Level::WARN {
            directives.extend(TRANSPORT_TARGETS.iter().map(|target| format!("{}=warn", target)));
        }
        directives.join(",")
    }
}

fn level_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Install the global subscriber
///
/// A set `RUST_LOG` replaces the configured directives entirely. Calling this
/// twice returns an error instead of panicking.
pub fn setup_logging(config: LoggingConfig) -> Result<(), ConfigError> {
    let directives = config.filter_directives();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&directives).map_err(|e| ConfigError::Logging {
            message: format!("invalid filter '{}': {}", directives, e),
        })?,
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(config.core_level.is_some());

    let installed = if config.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })?;

    log_welcome(&config.app_name, crate::VERSION);
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    Level::from_str(level).map_err(|_| ConfigError::invalid(format!("Invalid log level: {}", level)))
}

fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_default_directives_quiet_transport() {
        let config = LoggingConfig::default();
        assert_eq!(
            config.filter_directives(),
            "info,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"
        );
    }

    #[test]
    fn test_core_level_is_scoped_to_coordinator_target() {
        let config = LoggingConfig::new(Level::WARN, "demo").with_core_level(Level::DEBUG);
        assert_eq!(config.filter_directives(), "warn,classlive_core=debug");
    }

    #[test]
    fn test_transport_logs_follow_default_level() {
        let config = LoggingConfig::new(Level::TRACE, "demo")
            .with_core_level(Level::TRACE)
            .with_transport_logs()
            .with_json();
        assert!(config.json);
        assert_eq!(config.filter_directives(), "trace,classlive_core=trace");
        assert!(EnvFilter::try_new(config.filter_directives()).is_ok());
    }
}

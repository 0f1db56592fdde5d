//! Command-line definition

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use classlive_core::logging::{parse_log_level, setup_logging, LoggingConfig};
use classlive_core::{LiveSessionConfig, SessionId};

use crate::commands;

#[derive(Parser, Debug)]
#[command(author, version, about = "Live class session demo", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "CLASSLIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log level for the coordinator alone, defaults to --log-level
    #[arg(long, global = true)]
    core_log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join a session, print its events and leave again
    Join(JoinArgs),
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Session id to join
    #[arg(long, conflicts_with = "class", required_unless_present = "class")]
    pub session: Option<String>,

    /// Class schedule id; joins `class_<id>`
    #[arg(long)]
    pub class: Option<u64>,

    /// Our participant id
    #[arg(short, long)]
    pub participant: String,

    /// Do not open the microphone
    #[arg(long)]
    pub no_audio: bool,

    /// Do not open the camera
    #[arg(long)]
    pub no_video: bool,

    /// Simulate the user refusing device access
    #[arg(long)]
    pub deny_devices: bool,

    /// Leave after this many seconds (0 waits for Ctrl+C)
    #[arg(long, default_value = "0")]
    pub seconds: u64,
}

impl JoinArgs {
    pub fn session_id(&self) -> Result<SessionId> {
        match (&self.session, self.class) {
            (Some(session), _) => Ok(SessionId::new(session.clone())),
            (None, Some(class)) => Ok(SessionId::for_class(class)),
            (None, None) => anyhow::bail!("either --session or --class is required"),
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        // Also logs the welcome line
        setup_logging(self.logging()?)?;

        let config = LiveSessionConfig::load(self.config.as_deref())
            .context("loading configuration")?;

        match self.command {
            Command::Join(args) => commands::join::execute(args, config).await,
        }
    }

    fn logging(&self) -> Result<LoggingConfig> {
        let level = parse_log_level(&self.log_level)?;
        let mut logging = LoggingConfig::new(level, "classlive");
        if let Some(core) = &self.core_log_level {
            logging = logging.with_core_level(parse_log_level(core)?);
        }
        if self.json_logs {
            logging = logging.with_json();
        }
        Ok(logging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_core_log_level_flag() {
        let cli = Cli::parse_from([
            "classlive",
            "--log-level",
            "warn",
            "--core-log-level",
            "debug",
            "join",
            "--class",
            "42",
            "-p",
            "instructor-1",
        ]);
        let logging = cli.logging().unwrap();
        assert_eq!(logging.level, Level::WARN);
        assert_eq!(logging.core_level, Some(Level::DEBUG));
        assert_eq!(logging.filter_directives(), "warn,classlive_core=debug");
        assert_eq!(logging.app_name, "classlive");
    }

    #[test]
    fn test_invalid_core_log_level_is_rejected() {
        let cli = Cli::parse_from([
            "classlive",
            "--core-log-level",
            "chatty",
            "join",
            "--session",
            "room-1",
            "-p",
            "instructor-1",
        ]);
        assert!(cli.logging().is_err());
    }
}

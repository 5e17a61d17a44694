use std::path::PathBuf;

use clap::Parser;
use relay_observe::{LoggerConfig, LoggerFormat, LoggerLevel, LoggerTimeZone};

/// Pulls jobs from a queue and runs them one at a time under supervision.
#[derive(Parser, Debug)]
#[command(name = "relay-workerd", version)]
pub struct Args {
    /// Worker configuration document (YAML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Log filter directives, e.g. `info` or `relay_core=debug,info`
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: LoggerLevel,

    /// text | json | journald
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: LoggerFormat,

    /// utc | local
    #[arg(long = "log-tz", default_value = "utc")]
    pub log_tz: LoggerTimeZone,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Args {
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            tz: self.log_tz,
            use_color: !self.no_color,
            ..Default::default()
        }
    }
}

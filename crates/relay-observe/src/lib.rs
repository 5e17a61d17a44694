//! Logging setup for relay processes.
//!
//! Everything in the workspace logs through `tracing`; this crate decides where it goes.
mod config;
pub use config::LoggerConfig;

mod error;
pub use error::{LoggerError, LoggerResult};

mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod timer;
pub use timer::{LoggerTimeZone, LoggerTimer};

mod install;

/// Install the global tracing subscriber described by `cfg`.
///
/// Call this once, early in `main()`. With [`LoggerTimeZone::Local`] it must run before any
/// other thread is spawned (including the tokio runtime), otherwise the local offset cannot be
/// detected and timestamps fall back to UTC.
///
/// # Examples
/// ```rust
/// use relay_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).expect("logger");
/// tracing::info!("ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    let timer = LoggerTimer::for_zone(cfg.tz);
    match cfg.format {
        LoggerFormat::Text => install::text(cfg, timer),
        LoggerFormat::Json => install::json(cfg, timer),
        LoggerFormat::Journald => install::journald(cfg),
    }
}

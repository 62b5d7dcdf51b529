//! Logging setup
//!
//! Uses a log4rs YAML file when one is present, otherwise writes to a plain
//! log file. Worker threads tag their lines with the probe name and worker
//! index through the MDC (`probe`, `worker`).

use crate::config::LoggingConfig;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;
use thiserror::Error;

/// Line format for the built-in configuration
pub const LOG_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {l} {T} [{X(probe)(-)}/{X(worker)(-)}] {M}: {m}{n}";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to load log config {path}: {message}")]
    ConfigFile { path: String, message: String },

    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid logging configuration: {0}")]
    Config(String),

    #[error("logger already initialised: {0}")]
    AlreadySet(#[from] log::SetLoggerError),
}

fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Debug)
}

/// Build the programmatic configuration: one file appender, quiet AWS/HTTP stack
pub fn build_config(config: &LoggingConfig) -> Result<Config, LoggingError> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&config.log_file)
        .map_err(|source| LoggingError::LogFile {
            path: config.log_file.clone(),
            source,
        })?;

    Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .logger(Logger::builder().build("aws_config", LevelFilter::Warn))
        .logger(Logger::builder().build("aws_smithy_runtime", LevelFilter::Warn))
        .logger(Logger::builder().build("hyper", LevelFilter::Warn))
        .build(Root::builder().appender("logfile").build(parse_level(&config.level)))
        .map_err(|e| LoggingError::Config(e.to_string()))
}

/// Initialise the global logger
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    if let Some(path) = config.config_file.as_deref().filter(|path| Path::new(path).exists()) {
        return log4rs::init_file(path, Default::default()).map_err(|e| LoggingError::ConfigFile {
            path: path.to_string(),
            message: e.to_string(),
        });
    }

    log4rs::init_config(build_config(config)?)?;
    Ok(())
}

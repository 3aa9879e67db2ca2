//! Logger initialisation and the logging macros used across the workspace.
//!
//! Components log through `utxopool_core::{trace, debug, info, warn, error}`, which forward
//! to the [`log`](::log) facade. The binary embedding the components decides where records
//! go by calling [`init_logger`] once at startup.

mod appender;
mod consts;
mod logger;

pub use consts::{DEFAULT_LOGGER_ENV, ERR_LOG_FILE_NAME, LOG_FILE_NAME};

use self::{
    appender::AppenderSpec,
    consts::{CONSOLE_APPENDER, ERR_LOG_FILE_APPENDER, LOG_FILE_APPENDER},
    logger::Builder,
};
use ::log::LevelFilter;
use log4rs::config::{Config, Root};
use thiserror::Error;

#[doc(hidden)]
pub use ::log as __log;

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => ( $crate::log::__log::trace!($($t)*) )
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => ( $crate::log::__log::debug!($($t)*) )
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => ( $crate::log::__log::info!($($t)*) )
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => ( $crate::log::__log::warn!($($t)*) )
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => ( $crate::log::__log::error!($($t)*) )
}

#[derive(Clone, Debug, Error)]
pub enum LogError {
    #[error("log appender error: {0}")]
    Appender(String),

    #[error("logger configuration error: {0}")]
    Config(String),

    #[error("logger initialization error: {0}")]
    Init(String),
}

/// Installs the global logger.
///
/// Records are written to the console and, when `log_dir` is provided, to a rolling
/// [`LOG_FILE_NAME`] plus a warnings-and-above [`ERR_LOG_FILE_NAME`] in that directory.
/// `filters` is a `RUST_LOG`-style expression applied after the `RUST_LOG` environment
/// variable itself, so it takes precedence. The root level defaults to `info`.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<(), LogError> {
    let filters = Builder::new().root_level(LevelFilter::Info).parse_env(DEFAULT_LOGGER_ENV).parse_expression(filters).build();

    let mut appenders = vec![AppenderSpec::console(CONSOLE_APPENDER, None)];
    if let Some(log_dir) = log_dir {
        appenders.push(AppenderSpec::roller(LOG_FILE_APPENDER, None, log_dir, LOG_FILE_NAME)?);
        appenders.push(AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), log_dir, ERR_LOG_FILE_NAME)?);
    }
    let names = appenders.iter().map(|x| x.name).collect::<Vec<_>>();

    let config = Config::builder()
        .appenders(appenders.into_iter().map(|x| x.appender()))
        .loggers(filters.loggers())
        .build(Root::builder().appenders(names).build(filters.root_level))
        .map_err(|err| LogError::Config(err.to_string()))?;
    log4rs::init_config(config).map_err(|err| LogError::Init(err.to_string()))?;

    for spec in filters.rejected.iter() {
        warn!("Ignoring invalid logging spec '{}'", spec);
    }
    Ok(())
}

/// Console-only logger for tests and tools. A logger installed earlier wins.
pub fn try_init_logger(filters: &str) {
    let _ = init_logger(None, filters);
}

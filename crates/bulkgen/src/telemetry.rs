//! Logging setup for the binary.
//!
//! `log` macro calls from the store and database layers are bridged into
//! `tracing` so they carry the scheduler's job and row spans. The bridge is
//! installed by `try_init` through `tracing-subscriber`'s `tracing-log`
//! feature; installing it by hand as well makes initialization fail.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" | "jsonl" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Builds the filter: `RUST_LOG` when set, else `default_directive` with
/// noisy HTTP internals held at `warn`.
pub fn build_env_filter(default_directive: &str) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = format!("{},hyper=warn,hyper_util=warn,reqwest=warn,h2=warn", default_directive);
    EnvFilter::try_new(&directives).map_err(|e| ConfigError::Validation {
        message: format!("invalid log filter '{}': {}", directives, e),
    })
}

/// Installs the global subscriber and the `log` bridge. Call once, from `main`.
pub fn init_logging(default_directive: &str, format: LogFormat) -> Result<(), ConfigError> {
    let filter = build_env_filter(default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };

    result.map_err(|e| ConfigError::Validation {
        message: format!("failed to install log subscriber: {}", e),
    })
}

//! Configuration types for logging.

use std::env;
use std::str::FromStr;

/// Env var selecting the log format.
pub const LOG_FORMAT_ENV: &str = "REPLIKV_LOG_FORMAT";
/// Env var adding source file and line to each event.
pub const LOG_LOCATION_ENV: &str = "REPLIKV_LOG_LOCATION";
/// Env var adding the thread id to each event.
pub const LOG_THREAD_IDS_ENV: &str = "REPLIKV_LOG_THREAD_IDS";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for structured logging (ELK, Loki).
    Json,
    /// Human-readable pretty format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::default(),
        })
    }
}

/// Configuration for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    log_format: LogFormat,
    /// Filter directives (e.g., "info", "debug,openraft=warn").
    log_filter: String,
    include_location: bool,
    include_thread_ids: bool,
}

impl TracingConfig {
    /// Create configuration from environment variables.
    ///
    /// `REPLIKV_LOG_FORMAT` picks the format; without it, pretty output is
    /// used on a terminal and compact output otherwise. `RUST_LOG` overrides
    /// `default_filter`. `REPLIKV_LOG_LOCATION` and `REPLIKV_LOG_THREAD_IDS`
    /// take "true" or "1".
    pub fn from_env(default_filter: &str) -> Self {
        let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
        Self::from_lookup(default_filter, is_terminal, |name| env::var(name).ok())
    }

    /// Build the configuration from `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(
        default_filter: &str,
        is_terminal: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let log_format = lookup(LOG_FORMAT_ENV)
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or(if is_terminal {
                LogFormat::Pretty
            } else {
                LogFormat::Compact
            });

        let flag = |name: &str| lookup(name).is_some_and(|s| s == "true" || s == "1");

        Self {
            log_format,
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| default_filter.to_string()),
            include_location: flag(LOG_LOCATION_ENV),
            include_thread_ids: flag(LOG_THREAD_IDS_ENV),
        }
    }

    /// Get the log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Get the log filter.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Check if source location should be included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Check if thread IDs should be included.
    pub fn include_thread_ids(&self) -> bool {
        self.include_thread_ids
    }
}

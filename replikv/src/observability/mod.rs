//! Logging setup for the replikv binary.
//!
//! Logging format is controlled via the `REPLIKV_LOG_FORMAT` env var:
//! - `json` - Structured JSON output (for ELK/Loki)
//! - `pretty` - Human-readable output (default for TTY)
//! - `compact` - Compact single-line format (default otherwise)
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the `-v` count.
//! `REPLIKV_LOG_LOCATION=1` adds file and line, `REPLIKV_LOG_THREAD_IDS=1`
//! adds thread ids.
//!
//! # Example
//!
//! ```ignore
//! use replikv::observability::{TracingConfig, init_tracing};
//!
//! init_tracing(TracingConfig::from_env("info,openraft=warn"))?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LOG_FORMAT_ENV, LOG_LOCATION_ENV, LOG_THREAD_IDS_ENV, LogFormat, TracingConfig};
pub use tracing_setup::init_tracing;

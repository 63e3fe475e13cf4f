//! Relay Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Relay crates:
//! - Application configuration (server URL, connection tuning, chat behaviour)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Protocol constants

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{RelayError, RelayResult};
pub use logging::init_logging;

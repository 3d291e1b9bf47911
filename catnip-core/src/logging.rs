//! Logging and tracing initialization for Catnip.
//!
//! Catnip logs through `tracing`; nothing is printed until a subscriber is
//! installed. Call one of these functions once, before building the `App`.
//!
//! ```rust,no_run
//! use catnip_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CatnipError> {
//!     init_logging();
//!
//!     App::new().listen(8000).await
//! }
//! ```
//!
//! The level is controlled by `RUST_LOG`:
//!
//! ```bash
//! RUST_LOG=debug cargo run
//! RUST_LOG=catnip_core=debug,tower_http=debug cargo run
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// Initialize logging with sensible defaults (`info` unless `RUST_LOG` says
/// otherwise).
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging with a specific default level.
///
/// `RUST_LOG` still takes precedence when set.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize pretty-formatted logging (recommended for development).
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_pretty() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(true),
        )
        .init();
}

/// Initialize JSON-formatted logging (recommended for production).
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Initialize logging in the format named by [`Config::log_format`].
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_from_config(config: &Config) {
    match config.log_format {
        LogFormat::Text => init_logging(),
        LogFormat::Pretty => init_logging_pretty(),
        LogFormat::Json => init_logging_json(),
    }
}

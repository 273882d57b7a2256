//! Logging setup
//!
//! This module provides logging configuration.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{DenseNetError, Result};

/// Setup logging with the specified level; `RUST_LOG` takes precedence
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn setup_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| DenseNetError::InvalidConfig(format!("invalid log level {:?}: {}", level, e)))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .try_init()
        .ok();

    Ok(())
}

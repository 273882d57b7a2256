//! Utility Functions
//!
//! Configuration, logging and file helpers.

mod config;
mod io;
mod logging;

pub use config::{Config, DataConfig, LoggingConfig, OutputConfig};
pub use io::{ensure_parent_dir, load_json, save_json};
pub use logging::setup_logging;

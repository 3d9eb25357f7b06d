//! # Logging Setup
//!
//! Logging goes through the `log` facade, backed by `env_logger`. The
//! bridge runs unattended, so set `RUST_LOG` to taste; protocol-level
//! chatter sits at debug, checksum trouble at warn.

/// Initializes the logger with the `env_logger` crate.
pub fn init_logger() {
    env_logger::init();
}

/// Logs an info message.
pub fn log_info(message: &str) {
    log::info!("{message}");
}

/// Logs an error message.
pub fn log_error(message: &str) {
    log::error!("{message}");
}

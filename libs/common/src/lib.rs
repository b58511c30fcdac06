//! Shared service plumbing for the GridWatch workspace
//!
//! Carries the pieces every service needs regardless of what it does:
//! logging setup on the tracing stack and POSIX-friendly shutdown waiting.

pub mod logging;
pub mod shutdown;

pub use logging::{init_with_config, set_log_level, LogConfig};
pub use shutdown::wait_for_signal;

//! CLI command handlers.

pub mod config;
pub mod send;
pub mod watch;

//! CLI commands module for pidguard.

pub mod app;
pub mod commands;
pub mod context;

pub use app::{Cli, Commands, ConfigAction};
pub use context::Context;

//! Configuration management module.

pub mod paths;
pub mod schema;
pub mod validation;

pub use paths::{
    CONFIG_ENV, DEFAULT_PID_DIR, PIDDIR_ENV, PIDFILE_ENV, PathError, PathResolver, PathSources,
    Paths, program_name,
};
pub use schema::{Config, ConfigError, LoggingConfig, PidFileConfig};
pub use validation::{ValidationError, ValidationResult, ValidationWarning, validate_config};

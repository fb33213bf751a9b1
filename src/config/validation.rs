use std::path::Path;

use crate::config::schema::Config;
use crate::pidfile::options::{SignalNameError, parse_signal};

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

pub fn validate_config(config: &Config) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    validate_log_level(&config.logging.level, &mut errors);
    validate_signals(&config.pidfile.signals, &mut errors, &mut warnings);

    if config.pidfile.path.is_some() && config.pidfile.dir.is_some() {
        warnings.push(ValidationWarning {
            field: "pidfile.dir".to_string(),
            message: "pidfile.path is set; pidfile.dir is ignored".to_string(),
        });
    }

    validate_file_parent_path(
        "pidfile.path",
        config.pidfile.path.as_deref(),
        &mut errors,
        &mut warnings,
    );
    if let Some(dir) = config.pidfile.dir.as_deref() {
        validate_dir_path("pidfile.dir", dir, &mut errors);
    }
    validate_file_parent_path(
        "logging.file",
        config.logging.file.as_deref(),
        &mut errors,
        &mut warnings,
    );

    if config.pidfile.overwrite_existing && config.pidfile.unlink_others {
        warnings.push(ValidationWarning {
            field: "pidfile.unlink_others".to_string(),
            message: "overwrite_existing and unlink_others together let two instances remove each other's PID file".to_string(),
        });
    }

    ValidationResult { errors, warnings }
}

fn validate_signals(
    names: &[String],
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if names.is_empty() {
        warnings.push(ValidationWarning {
            field: "pidfile.signals".to_string(),
            message: "No signals configured; the PID file is only removed on normal exit"
                .to_string(),
        });
        return;
    }

    let mut seen = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let field = format!("pidfile.signals[{index}]");
        match parse_signal(name) {
            Ok(signal) if seen.contains(&signal) => warnings.push(ValidationWarning {
                field,
                message: format!("Duplicate signal: {}", signal.as_str()),
            }),
            Ok(signal) => seen.push(signal),
            Err(SignalNameError::Unknown(name)) => errors.push(ValidationError {
                field,
                message: format!("Unknown signal: {name}"),
                suggestion: Some("Use a name such as INT, TERM, HUP or QUIT".to_string()),
            }),
            Err(SignalNameError::Uncatchable(name)) => errors.push(ValidationError {
                field,
                message: format!("Signal {name} cannot be intercepted"),
                suggestion: Some("Remove it from pidfile.signals".to_string()),
            }),
        }
    }
}

fn validate_log_level(level: &str, errors: &mut Vec<ValidationError>) {
    let level = level.trim().to_lowercase();
    let valid = ["trace", "debug", "info", "warn", "error"];
    if !valid.iter().any(|value| *value == level) {
        errors.push(ValidationError {
            field: "logging.level".to_string(),
            message: format!("Invalid log level: {level}"),
            suggestion: Some(format!("Valid levels: {}", valid.join(", "))),
        });
    }
}

// The PID directory is canonicalized at startup, so it must already exist.
fn validate_dir_path(field: &str, path: &Path, errors: &mut Vec<ValidationError>) {
    if !path.exists() {
        errors.push(ValidationError {
            field: field.to_string(),
            message: format!("Directory does not exist: {}", path.display()),
            suggestion: Some("Create the directory or update the path".to_string()),
        });
    } else if !path.is_dir() {
        errors.push(ValidationError {
            field: field.to_string(),
            message: format!("Path is not a directory: {}", path.display()),
            suggestion: None,
        });
    }
}

fn validate_file_parent_path(
    field: &str,
    path: Option<&Path>,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let Some(path) = path else {
        return;
    };

    if path.exists() && path.is_dir() {
        errors.push(ValidationError {
            field: field.to_string(),
            message: format!(
                "Expected a file path but found a directory: {}",
                path.display()
            ),
            suggestion: None,
        });
        return;
    }

    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.exists() => {}
        Some(parent) => warnings.push(ValidationWarning {
            field: field.to_string(),
            message: format!("Parent directory does not exist: {}", parent.display()),
        }),
        None => errors.push(ValidationError {
            field: field.to_string(),
            message: "Invalid file path".to_string(),
            suggestion: Some("Update the path to a valid file location".to_string()),
        }),
    }
}

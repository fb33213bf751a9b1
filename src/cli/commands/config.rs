use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cli::Context;
use crate::config::{Paths, validate_config};

pub async fn handle_init(force: bool, custom_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = custom_path.unwrap_or_else(Paths::config_file);

    if config_path.exists() && !force && !confirm_overwrite(&config_path)? {
        println!("Aborted.");
        return Ok(());
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, generate_default_config_toml())?;
    set_file_permissions(&config_path);

    println!("Config created at {}", config_path.display());
    Ok(())
}

pub async fn handle_show(ctx: &Context) -> anyhow::Result<()> {
    println!("# {}", ctx.config_path.display());
    match ctx.resolver().resolve() {
        Ok(path) => println!("# resolved pidfile: {}", path.display()),
        Err(err) => println!("# resolved pidfile: <error: {err}>"),
    }
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}

pub async fn handle_validate(ctx: &Context) -> anyhow::Result<()> {
    let result = validate_config(&ctx.config);

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.field, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.field, error.message);
        if let Some(suggestion) = &error.suggestion {
            println!("  hint: {suggestion}");
        }
    }

    if result.is_valid() {
        println!("Configuration valid: {}", ctx.config_path.display());
        Ok(())
    } else {
        anyhow::bail!(
            "configuration has {} error(s): {}",
            result.errors.len(),
            ctx.config_path.display()
        )
    }
}

fn confirm_overwrite(path: &Path) -> anyhow::Result<bool> {
    print!(
        "Config already exists at {}. Overwrite? [y/N] ",
        path.display()
    );
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let response = input.trim();
    Ok(response.eq_ignore_ascii_case("y") || response.eq_ignore_ascii_case("yes"))
}

fn set_file_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
            eprintln!("Warning: failed to set config file permissions: {err}");
        }
    }
}

fn generate_default_config_toml() -> String {
    r#"# pidguard configuration file

# PID file location and policy
[pidfile]
# Explicit PID file path, used verbatim (overrides `dir`; env: PIDFILE)
# path = "/var/run/mydaemon.pid"
# Directory for <program>.pid; must exist (env: PIDDIR)
dir = "/var/run"
# Replace an existing PID file on startup instead of refusing to start
overwrite_existing = false
# On release, treat a missing or unreadable PID file as already released
overcome_adversity = false
# On release, remove the PID file even if it records another process
unlink_others = false
# Signals that remove the PID file and terminate the process
signals = ["INT", "TERM"]

# Log output
[logging]
# Log level: trace, debug, info, warn, error
level = "info"
# Emit JSON lines
json = false
# Optional: also append logs to a file
# file = "/var/log/pidguard.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_default_template_parses_and_validates() {
        let config: Config = toml::from_str(&generate_default_config_toml()).unwrap();
        assert_eq!(config.pidfile.dir, Some(PathBuf::from("/var/run")));
        assert_eq!(config.pidfile.signals, vec!["INT", "TERM"]);
        assert!(config.pidfile.options().is_ok());
    }

    #[tokio::test]
    async fn test_init_writes_template() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        handle_init(true, Some(path.clone())).await.unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, generate_default_config_toml());
    }
}

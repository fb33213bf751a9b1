use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Directory used for `<dir>/<program>.pid` when neither `PIDDIR` nor the
/// config file names one.
pub const DEFAULT_PID_DIR: &str = "/var/run";

/// Explicit PID file path, used verbatim.
pub const PIDFILE_ENV: &str = "PIDFILE";
/// Directory for the default PID file name.
pub const PIDDIR_ENV: &str = "PIDDIR";
/// Config file location override.
pub const CONFIG_ENV: &str = "PIDGUARD_CONFIG";

/// Platform-specific path resolution for pidguard.
pub struct Paths;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Failed to canonicalize PID directory {path}: {source}")]
    Canonicalize { path: PathBuf, source: io::Error },

    #[error("PID directory {path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("Program name is empty; cannot derive a PID file name")]
    EmptyProgramName,
}

/// Inputs to PID path resolution, highest precedence first when merged with
/// [`PathSources::or`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSources {
    pub pid_file: Option<PathBuf>,
    pub pid_dir: Option<PathBuf>,
    pub program_name: Option<String>,
}

impl PathSources {
    /// Reads `PIDFILE` and `PIDDIR`. Empty values count as unset.
    pub fn from_env() -> Self {
        Self {
            pid_file: non_empty_var(PIDFILE_ENV).map(PathBuf::from),
            pid_dir: non_empty_var(PIDDIR_ENV).map(PathBuf::from),
            program_name: None,
        }
    }

    /// Fills every unset field from `fallback`.
    pub fn or(self, fallback: PathSources) -> Self {
        Self {
            pid_file: self.pid_file.or(fallback.pid_file),
            pid_dir: self.pid_dir.or(fallback.pid_dir),
            program_name: self.program_name.or(fallback.program_name),
        }
    }
}

fn non_empty_var(key: &str) -> Option<OsString> {
    env::var_os(key).filter(|value| !value.is_empty())
}

/// Resolves the PID file path once and hands out the cached result afterwards.
#[derive(Debug)]
pub struct PathResolver {
    sources: PathSources,
    resolved: OnceLock<PathBuf>,
}

impl PathResolver {
    pub fn new(sources: PathSources) -> Self {
        Self {
            sources,
            resolved: OnceLock::new(),
        }
    }

    pub fn sources(&self) -> &PathSources {
        &self.sources
    }

    /// Returns the PID file path.
    /// - Override: `pid_file` is returned verbatim.
    /// - Otherwise: `<canonical pid_dir>/<program_name>.pid`, with `pid_dir`
    ///   defaulting to [`DEFAULT_PID_DIR`] and `program_name` to [`program_name`].
    ///
    /// Later calls return the first successful result even if the directory
    /// has since moved or disappeared.
    pub fn resolve(&self) -> Result<PathBuf, PathError> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.clone());
        }
        let path = compose(&self.sources)?;
        Ok(self.resolved.get_or_init(|| path).clone())
    }
}

fn compose(sources: &PathSources) -> Result<PathBuf, PathError> {
    if let Some(path) = &sources.pid_file {
        return Ok(path.clone());
    }

    let dir = sources
        .pid_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_DIR));
    let canonical = fs::canonicalize(&dir).map_err(|source| PathError::Canonicalize {
        path: dir.clone(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(PathError::NotADirectory { path: canonical });
    }

    let name = sources.program_name.clone().unwrap_or_else(program_name);
    if name.is_empty() {
        return Err(PathError::EmptyProgramName);
    }
    Ok(canonical.join(format!("{name}.pid")))
}

/// Base name of the running program (`argv[0]`), or the crate name when the
/// host gives us nothing usable.
pub fn program_name() -> String {
    env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

static PROCESS_RESOLVER: OnceLock<PathResolver> = OnceLock::new();

impl Paths {
    /// Process-wide PID file path built from `PIDFILE` / `PIDDIR`.
    /// The environment is read on the first call only.
    pub fn pid_file() -> Result<PathBuf, PathError> {
        PROCESS_RESOLVER
            .get_or_init(|| PathResolver::new(PathSources::from_env()))
            .resolve()
    }

    /// Returns the configuration directory path.
    /// - Linux: ~/.config/pidguard/
    /// - macOS: ~/Library/Application Support/pidguard/
    /// - Override: PIDGUARD_CONFIG env var (directory derived from file path)
    pub fn config_dir() -> PathBuf {
        if let Some(path) = non_empty_var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            return path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or(path);
        }

        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("pidguard")
    }

    /// Returns the full config file path.
    pub fn config_file() -> PathBuf {
        if let Some(path) = non_empty_var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ENV_LOCK;

    fn set_env_var(key: &str, value: impl AsRef<std::ffi::OsStr>) {
        unsafe {
            env::set_var(key, value);
        }
    }

    fn remove_env_var(key: &str) {
        unsafe {
            env::remove_var(key);
        }
    }

    fn sources_in(dir: &Path, name: &str) -> PathSources {
        PathSources {
            pid_file: None,
            pid_dir: Some(dir.to_path_buf()),
            program_name: Some(name.to_string()),
        }
    }

    #[test]
    fn test_override_is_used_verbatim() {
        let resolver = PathResolver::new(PathSources {
            pid_file: Some(PathBuf::from("relative/../odd.pid")),
            pid_dir: Some(PathBuf::from("/does/not/exist")),
            program_name: None,
        });
        assert_eq!(resolver.resolve().unwrap(), PathBuf::from("relative/../odd.pid"));
    }

    #[test]
    fn test_composes_dir_and_program_name() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(sources_in(temp.path(), "worker"));

        let expected = fs::canonicalize(temp.path()).unwrap().join("worker.pid");
        assert_eq!(resolver.resolve().unwrap(), expected);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinked_dir_is_canonicalized() {
        let temp = tempfile::tempdir().unwrap();
        let real = temp.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let resolver = PathResolver::new(sources_in(&link, "worker"));
        let resolved = resolver.resolve().unwrap();
        assert_eq!(resolved, fs::canonicalize(&real).unwrap().join("worker.pid"));
    }

    #[test]
    fn test_missing_dir_fails() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("missing");
        let resolver = PathResolver::new(sources_in(&missing, "worker"));

        match resolver.resolve().unwrap_err() {
            PathError::Canonicalize { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_file_as_dir_fails() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, "x").unwrap();
        let resolver = PathResolver::new(sources_in(&file, "worker"));

        assert!(matches!(
            resolver.resolve().unwrap_err(),
            PathError::NotADirectory { .. }
        ));
    }

    #[test]
    fn test_empty_program_name_fails() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(sources_in(temp.path(), ""));
        assert!(matches!(
            resolver.resolve().unwrap_err(),
            PathError::EmptyProgramName
        ));
    }

    #[test]
    fn test_resolution_is_memoized() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("run");
        fs::create_dir(&dir).unwrap();
        let resolver = PathResolver::new(sources_in(&dir, "worker"));

        let first = resolver.resolve().unwrap();
        fs::remove_dir(&dir).unwrap();
        let second = resolver.resolve().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sources_or_prefers_self() {
        let high = PathSources {
            pid_file: None,
            pid_dir: Some(PathBuf::from("/high")),
            program_name: None,
        };
        let low = PathSources {
            pid_file: Some(PathBuf::from("/low.pid")),
            pid_dir: Some(PathBuf::from("/low")),
            program_name: Some("low".to_string()),
        };
        let merged = high.or(low);
        assert_eq!(merged.pid_file, Some(PathBuf::from("/low.pid")));
        assert_eq!(merged.pid_dir, Some(PathBuf::from("/high")));
        assert_eq!(merged.program_name.as_deref(), Some("low"));
    }

    #[test]
    fn test_sources_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        set_env_var(PIDFILE_ENV, "/tmp/explicit.pid");
        set_env_var(PIDDIR_ENV, "");

        let sources = PathSources::from_env();
        assert_eq!(sources.pid_file, Some(PathBuf::from("/tmp/explicit.pid")));
        assert_eq!(sources.pid_dir, None);

        remove_env_var(PIDFILE_ENV);
        remove_env_var(PIDDIR_ENV);
    }

    #[test]
    fn test_program_name_is_not_empty() {
        let name = program_name();
        assert!(!name.is_empty());
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_env_override_config_file() {
        let _lock = ENV_LOCK.lock().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("config.toml");

        set_env_var(CONFIG_ENV, &config_path);
        assert_eq!(Paths::config_file(), config_path);
        assert_eq!(Paths::config_dir(), temp.path());
        remove_env_var(CONFIG_ENV);
    }

    #[test]
    fn test_default_config_file_name() {
        let _lock = ENV_LOCK.lock().unwrap();
        remove_env_var(CONFIG_ENV);

        let config_file = Paths::config_file();
        assert!(config_file.ends_with("pidguard/config.toml"));
    }
}

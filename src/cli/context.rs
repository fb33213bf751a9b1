use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::app::Cli;
use crate::config::{Config, PathResolver, PathSources, Paths};

/// Settings shared by every command: the loaded config file and the PID path
/// sources merged as flag/env > config file > defaults.
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub sources: PathSources,
}

impl Context {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(Paths::config_file);
        let config = Config::load(&config_path).context("failed to load configuration")?;
        let flags = PathSources {
            pid_file: cli.pid_file.clone(),
            pid_dir: cli.pid_dir.clone(),
            program_name: cli.name.clone(),
        };
        Ok(Self {
            sources: flags.or(config.pidfile.path_sources()),
            config_path,
            config,
        })
    }

    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(self.sources.clone())
    }
}

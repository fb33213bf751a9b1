use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub log_file: Option<PathBuf>,
    pub log_to_stderr: bool,
    pub json_format: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_file: None,
            log_to_stderr: true,
            json_format: false,
        }
    }
}

impl TracingConfig {
    /// Build from the `[logging]` section; `debug` forces debug level and
    /// `json` forces JSON output.
    pub fn from_logging(logging: &LoggingConfig, debug: bool, json: bool) -> Self {
        let level = if debug {
            Level::DEBUG
        } else {
            logging.level.trim().parse().unwrap_or(Level::INFO)
        };
        Self {
            level,
            log_file: logging.file.clone(),
            log_to_stderr: true,
            json_format: json || logging.json,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to open log file {path}: {source}")]
    LogFileOpen { path: PathBuf, source: io::Error },

    #[error("Tracing subscriber already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Flushes the log file when dropped.
#[derive(Debug)]
pub struct TracingGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            if let Ok(mut handle) = file.lock() {
                let _ = handle.flush();
            }
        }
    }
}

struct FileWriter {
    file: Arc<Mutex<File>>,
}

impl io::Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file mutex poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file mutex poisoned"))?;
        guard.flush()
    }
}

#[derive(Clone)]
struct FileMakeWriter {
    file: Arc<Mutex<File>>,
}

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter {
            file: Arc::clone(&self.file),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(writer: W, json: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Install the global subscriber. Global rather than scoped so that the
/// signal listener thread and the exit hook log through it too.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TracingError> {
    let env_filter = resolve_env_filter(config);

    let file = match &config.log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| TracingError::LogFileOpen {
                    path: path.clone(),
                    source,
                })?;
            Some(Arc::new(Mutex::new(file)))
        }
        None => None,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.log_to_stderr {
        layers.push(fmt_layer(std::io::stderr, config.json_format));
    }
    if let Some(file_ref) = &file {
        let writer = FileMakeWriter {
            file: Arc::clone(file_ref),
        };
        layers.push(fmt_layer(writer, config.json_format));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(TracingGuard { file })
}

fn resolve_env_filter(config: &TracingConfig) -> EnvFilter {
    if config.level == Level::DEBUG {
        EnvFilter::new(Level::DEBUG.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
    }
}

//! PID file guard: acquire on startup, release on signal or exit.

pub mod error;
pub mod guard;
pub mod hooks;
pub mod options;
pub mod process;
pub mod signals;

pub use error::PidFileError;
pub use guard::{GuardState, PidFileGuard, read_pid};
pub use options::{DEFAULT_SIGNALS, PidFileOptions, SignalNameError, parse_signal, parse_signals};

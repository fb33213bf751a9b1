use std::path::PathBuf;

use clap::Parser;

/// PID file guard for daemons
#[derive(Parser, Debug)]
#[command(name = "pidguard", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "PIDGUARD_CONFIG")]
    pub config: Option<PathBuf>,
    /// Explicit PID file path (used verbatim)
    #[arg(long, global = true, env = "PIDFILE")]
    pub pid_file: Option<PathBuf>,
    /// Directory for <name>.pid
    #[arg(long, global = true, env = "PIDDIR")]
    pub pid_dir: Option<PathBuf>,
    /// Program name for the default PID file name
    #[arg(long, global = true)]
    pub name: Option<String>,
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
    /// Log as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Write the PID file and hold it until a signal arrives
    Hold {
        /// Replace an existing PID file
        #[arg(long)]
        overwrite_existing: bool,
        /// Treat a missing or unreadable PID file as released
        #[arg(long)]
        overcome_adversity: bool,
        /// Remove the PID file even if another PID is recorded
        #[arg(long)]
        unlink_others: bool,
        /// Signal to intercept, repeatable (replaces configured signals)
        #[arg(short, long = "signal", value_name = "SIG")]
        signals: Vec<String>,
        /// Exit normally after this many milliseconds
        #[arg(long, value_name = "MS")]
        exit_after_ms: Option<u64>,
    },
    /// Print the resolved PID file path
    Path,
    /// Show which process holds the PID file
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send a signal to the process recorded in the PID file
    Stop {
        /// Signal to send
        #[arg(short, long, default_value = "TERM")]
        signal: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize configuration file
    Init {
        /// Overwrite without asking
        #[arg(long)]
        force: bool,
    },
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate,
}

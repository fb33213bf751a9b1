#[cfg(not(unix))]
compile_error!("pidguard relies on Unix signals and access(2); only Unix-like targets are supported");

pub mod cli;
pub mod config;
pub mod pidfile;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

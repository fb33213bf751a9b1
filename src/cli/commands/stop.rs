use anyhow::Context as _;
use tracing::info;

use crate::cli::Context;
use crate::pidfile::process::send_signal;
use crate::pidfile::{parse_signal, read_pid};

pub async fn handle_stop(ctx: &Context, signal: &str) -> anyhow::Result<()> {
    let signal = parse_signal(signal)?;
    let path = ctx.resolver().resolve()?;
    let pid = read_pid(&path)?;

    send_signal(pid, signal)
        .with_context(|| format!("failed to send {} to PID {pid}", signal.as_str()))?;
    info!(pid = pid, signal = %signal, path = %path.display(), "Signal sent");
    println!("Sent {} to PID {}", signal.as_str(), pid);
    Ok(())
}

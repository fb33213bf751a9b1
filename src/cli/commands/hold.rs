use std::time::Duration;

use anyhow::Context as _;
use tracing::info;

use crate::cli::Context;
use crate::pidfile::{PidFileGuard, PidFileOptions, parse_signals};

#[derive(Debug, Clone, Default)]
pub struct HoldArgs {
    pub overwrite_existing: bool,
    pub overcome_adversity: bool,
    pub unlink_others: bool,
    pub signals: Vec<String>,
    pub exit_after: Option<Duration>,
}

/// Config file policy with command-line switches layered on top.
pub fn resolve_options(ctx: &Context, args: &HoldArgs) -> anyhow::Result<PidFileOptions> {
    let mut options = ctx
        .config
        .pidfile
        .options()
        .context("invalid pidfile.signals in configuration")?;
    options.overwrite_existing |= args.overwrite_existing;
    options.overcome_adversity |= args.overcome_adversity;
    options.unlink_others |= args.unlink_others;
    if !args.signals.is_empty() {
        options.signals = parse_signals(&args.signals).context("invalid --signal")?;
    }
    Ok(options)
}

pub async fn handle_hold(ctx: &Context, args: HoldArgs) -> anyhow::Result<()> {
    let options = resolve_options(ctx, &args)?;
    let guard = PidFileGuard::from_resolver(&ctx.resolver())?;
    guard.acquire(&options)?;

    let signals: Vec<&str> = options.signals.iter().map(|sig| sig.as_str()).collect();
    info!(
        pid = std::process::id(),
        path = %guard.path().display(),
        signals = ?signals,
        "Holding PID file"
    );
    println!("Holding {} (PID {})", guard.path().display(), std::process::id());

    match args.exit_after {
        Some(delay) => {
            tokio::time::sleep(delay).await;
            info!("Hold period elapsed; exiting");
        }
        None => std::future::pending::<()>().await,
    }
    Ok(())
}

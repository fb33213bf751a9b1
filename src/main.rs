use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;

use pidguard::cli::commands::{config, hold, path, status, stop};
use pidguard::cli::{Cli, Commands, ConfigAction, Context};
use pidguard::telemetry::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None => {
            println!("pidguard - PID file guard for daemons");
            println!("Use --help to see available commands");
            return Ok(());
        }
        // Must work even when the existing config file is broken.
        Some(Commands::Config {
            action: ConfigAction::Init { force },
        }) => return config::handle_init(*force, cli.config.clone()).await,
        Some(_) => {}
    }

    let ctx = Context::load(&cli)?;
    let tracing_config = TracingConfig::from_logging(&ctx.config.logging, cli.debug, cli.json_logs);
    let _tracing = init_tracing(&tracing_config).context("failed to initialize logging")?;

    match cli.command {
        Some(Commands::Hold {
            overwrite_existing,
            overcome_adversity,
            unlink_others,
            signals,
            exit_after_ms,
        }) => {
            let args = hold::HoldArgs {
                overwrite_existing,
                overcome_adversity,
                unlink_others,
                signals,
                exit_after: exit_after_ms.map(Duration::from_millis),
            };
            hold::handle_hold(&ctx, args).await
        }
        Some(Commands::Path) => path::handle_path(&ctx).await,
        Some(Commands::Status { json }) => status::handle_status(&ctx, json).await,
        Some(Commands::Stop { signal }) => stop::handle_stop(&ctx, &signal).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => config::handle_show(&ctx).await,
            ConfigAction::Validate => config::handle_validate(&ctx).await,
            ConfigAction::Init { force } => config::handle_init(force, Some(ctx.config_path.clone())).await,
        },
        None => Ok(()),
    }
}

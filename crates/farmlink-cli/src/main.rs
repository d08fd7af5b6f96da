//! Farmlink CLI entry point.
//!
//! Binary name: `farmlink`
//!
//! Parses arguments, sets up tracing, wires the adapters, then dispatches to
//! the command handler. Engine errors are reported with their user-facing
//! copy; the technical detail goes to the log.

mod cli;
mod state;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use farmlink_observe::LogFormat;
use farmlink_types::error::{Presentation, SyncError};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,farmlink=debug",
        _ => "trace",
    };
    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Pretty };
    if let Err(e) = farmlink_observe::init_tracing(filter, format, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    farmlink_observe::shutdown_tracing();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "farmlink", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let json = cli.json;

    match &cli.command {
        Commands::Chat { action } => cli::chat::run(&state, cli.user_id()?, action, json).await,
        Commands::Offer(args) => cli::offer::run(&state, cli.user_id()?, args, json).await,
        Commands::Approvals { action } => {
            cli::approvals::run(&state, cli.user_id()?, action, json).await
        }
        Commands::Image { action } => cli::image::run(&state, action, json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}

fn report(err: &anyhow::Error) {
    let Some(sync) = err.downcast_ref::<SyncError>() else {
        eprintln!("  {} {err:#}", console::style("✗").red().bold());
        return;
    };

    tracing::debug!(error = %sync, "command failed");
    match sync.presentation() {
        Presentation::Silent => {}
        Presentation::Inline => {
            eprintln!("  {} {}", console::style("!").yellow().bold(), sync.user_message());
        }
        Presentation::BlockingAlert | Presentation::DismissibleNotice => {
            eprintln!("  {} {}", console::style("✗").red().bold(), sync.user_message());
        }
    }
}

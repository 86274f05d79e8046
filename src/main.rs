use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

mod cli;
mod config;
mod engine;
mod models;
mod ops;
mod paths;
mod transport;

#[cfg(test)]
mod test_utils;

use cli::Args;
use engine::{resolve_targets, Dispatcher};
use transport::rest::RestDirectory;
use transport::EndpointDirectory;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    runtime.block_on(async {
        tokio::select! {
            result = run(&args) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Keyboard interrupt received.");
                // In-flight jobs are abandoned, not cancelled.
                std::process::exit(0);
            }
        }
    })
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Resolve the targets, dispatch one job per eligible endpoint, and block on
/// the collection barrier.
async fn run(args: &Args) -> Result<()> {
    let operation = args.operation.kind();

    let profile = config::load_profile(args.creds.as_deref(), &args.profile)?;
    let directory: Arc<dyn EndpointDirectory> = Arc::new(RestDirectory::connect(&profile)?);

    // Process-wide prerequisites abort before any endpoint work.
    operation.init_check()?;

    let output_root = paths::output_root(&args.profile);
    paths::ensure_output_dirs(&output_root, operation.subdir())?;

    info!(
        "Starting {} triage dispatch, output root {}",
        operation.subdir(),
        output_root.display()
    );

    let targets = resolve_targets(directory.as_ref(), &args.selector()).await?;
    let resolved = targets.len();

    let mut dispatcher = Dispatcher::new(directory, operation, output_root, args.nics);
    for (sensor, identifier) in targets {
        dispatcher.dispatch(sensor, &identifier);
    }

    info!(
        "Submitted {} job(s) for {} resolved target(s)",
        dispatcher.submitted(),
        resolved
    );

    dispatcher.wait_all().await;
    Ok(())
}

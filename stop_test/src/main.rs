use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use harness_core::prelude::ShutdownHandle;
use stop_test::{
    resolve_server_path, time_takes, PassOutcome, RunRecord, StopTestCli, Sweep, SweepConfig,
    SweepRange, USAGE,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let cli = StopTestCli::parse();
    let Some(range) = cli.range.as_deref() else {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    };
    let range = range
        .parse::<SweepRange>()
        .with_context(|| format!("Invalid range '{range}'"))?;
    let server_path = resolve_server_path(&cli.server_path)?;
    let config = SweepConfig::from_cli(&cli, range, server_path);
    log::debug!("Sweep config: {config:?}");

    let shutdown_handle = start_shutdown_listener();
    let mut listener = shutdown_handle.new_listener();
    let sweep = Sweep::new(config, shutdown_handle);

    println!("Test will take ~{} seconds", time_takes(&range));

    loop {
        match sweep.run_pass().await {
            Ok(PassOutcome::Completed(records)) => {
                print_records(&records)?;
                if !sweep.config().repeat || range.is_empty() || listener.should_shutdown() {
                    return Ok(ExitCode::SUCCESS);
                }
                log::info!("Starting again from {}", range.low());
            }
            Ok(PassOutcome::Interrupted(records)) => {
                print_records(&records)?;
                return Ok(ExitCode::SUCCESS);
            }
            Err(e) => {
                log::error!("{:?}", anyhow::Error::from(e));
                return Ok(ExitCode::FAILURE);
            }
        }
    }
}

fn start_shutdown_listener() -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    handle
}

fn print_records(records: &[RunRecord]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(records).context("Could not serialise run records")?;
    println!("{json}");
    Ok(())
}

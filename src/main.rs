mod cli;
mod config;
mod error;
mod output;
mod pipeline;
mod providers;
mod trace;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting pipeline-lens");

    let status = cli::run_until_interrupted(cli.execute(), tokio::signal::ctrl_c()).await?;
    Ok(ExitCode::from(status))
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pj - pool jobs CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod daemon_process;
mod env;
mod output;
mod poll;

use output::OutputFormat;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use commands::{check, lifecycle, status};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pj",
    version,
    about = "pj - job-queue worker supervisor"
)]
struct Cli {
    /// Config file
    #[arg(
        short = 'c',
        long = "config",
        env = "PJ_CONFIG",
        default_value = "pj.toml",
        global = true
    )]
    config: PathBuf,

    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the master and its worker pools
    Start {
        /// Run in the foreground (useful for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Drain workers and stop the master
    Stop,
    /// Stop the master if running, then start it
    Restart,
    /// Start the master unless it is already running
    Revive,
    /// Show the master's status report
    Status,
    /// Validate the config file
    Check,
}

pub(crate) fn cli_command() -> clap::Command {
    Cli::command()
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(1);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// thiserror variants often repeat their source in the top-level message;
/// the "Caused by" chain is only rendered when it adds something.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;
    let config = cli.config;

    let Some(command) = cli.command else {
        cli_command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Start { foreground } => lifecycle::start(&config, foreground, format).await,
        Commands::Stop => lifecycle::stop(&config, format).await,
        Commands::Restart => lifecycle::restart(&config, format).await,
        Commands::Revive => lifecycle::revive(&config, format).await,
        Commands::Status => status::status(&config, format).await,
        Commands::Check => check::check(&config, format),
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

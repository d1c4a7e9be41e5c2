// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pj daemon (pjd)
//!
//! Runs in one of two modes:
//! - Master: `pjd [-c CONFIG]`, supervises a worker pool per topic
//! - Worker: `pjd worker`, started by the master with its spec in the
//!   environment; consumes one topic until told to stop

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use pj_core::{Config, SystemClock};
use pj_daemon::lifecycle::{self, LifecycleError, MasterTimers, Registries};
use pj_daemon::logging::{setup_logging, write_startup_error, write_startup_marker};
use pj_daemon::master::{spawn_signal_forwarder, Master, MasterEvent, ProcessSpawner};
use pj_daemon::pidfile::PidFileError;
use pj_daemon::worker::WorkerSpec;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, Instrument};

enum Mode {
    Master { config: PathBuf },
    Worker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mode = match parse_args(std::env::args().skip(1)) {
        Ok(Some(mode)) => mode,
        Ok(None) => return Ok(()),
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("Usage: pjd [-c CONFIG] | pjd worker | pjd --help");
            std::process::exit(1);
        }
    };

    match mode {
        Mode::Master { config } => run_master(config).await,
        Mode::Worker => run_worker().await,
    }
}

/// `Ok(None)` means an info flag was handled.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Mode>, String> {
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("pjd {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(None);
            }
            "worker" => return Ok(Some(Mode::Worker)),
            "-c" | "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }
    Ok(Some(Mode::Master {
        config: config.unwrap_or_else(pj_daemon::env::config_path),
    }))
}

fn print_help() {
    println!("pjd {}", env!("CARGO_PKG_VERSION"));
    println!("pj daemon - supervises job-queue worker processes");
    println!();
    println!("USAGE:");
    println!("    pjd [-c CONFIG]");
    println!();
    println!("The daemon is typically started by the `pj` CLI. Stop it with");
    println!("`pj stop` (SIGUSR1); SIGUSR2 rewrites the status file.");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config     Config file (default: $PJ_CONFIG or ./pj.toml)");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

async fn run_master(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&config_path)?;
    let log_dir = config.log_dir();
    let pid = std::process::id();

    // Written before tracing is up so the CLI can find this attempt
    write_startup_marker(&log_dir, pid)?;
    let log_guard = setup_logging(&log_dir, &config.log)?;

    let span = info_span!("master", pid, process = %format!("master:{}", config.process.name));
    async move {
        info!(config = %config_path.display(), "starting master");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut master = match start(&config, pid, tx).await {
            Ok(master) => master,
            Err(e) => {
                write_startup_error(&log_dir, &e);
                error!("Failed to start master: {e}");
                if let LifecycleError::PidFile(PidFileError::AlreadyRunning(other)) = &e {
                    eprintln!("pjd is already running (pid {other})");
                }
                drop(log_guard);
                return Err(e.into());
            }
        };

        lifecycle::run_master(&mut master, &mut rx, MasterTimers::from_env()).await;
        info!("master exited");
        drop(log_guard);
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .instrument(span)
    .await
}

async fn start(
    config: &Config,
    pid: u32,
    tx: mpsc::UnboundedSender<MasterEvent>,
) -> Result<Master<ProcessSpawner, SystemClock>, LifecycleError> {
    let spawner = ProcessSpawner::new(tx.clone())?;
    spawn_signal_forwarder(tx)?;
    lifecycle::startup(config, pid, &Registries::builtin(), spawner).await
}

async fn run_worker() -> Result<(), Box<dyn std::error::Error>> {
    let spec = WorkerSpec::from_env().map_err(LifecycleError::Spec)?;
    let log_dir = spec.log.dir.clone().unwrap_or_else(|| spec.paths.data_dir.join("logs"));
    let _log_guard = setup_logging(&log_dir, &spec.log)?;
    let pid = std::process::id();

    let span = info_span!("worker", pid, topic = %spec.topic, process = %spec.process_label());
    let result = lifecycle::run_worker(&spec, pid, &Registries::builtin())
        .instrument(span)
        .await;
    if let Err(e) = &result {
        error!(pid, topic = %spec.topic, error = %e, "worker failed");
    }
    Ok(result?)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

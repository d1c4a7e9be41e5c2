// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control events consumed by the master loop.

use std::io;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterEvent {
    /// Drain workers and shut down
    Stop,
    /// Rewrite the status report now
    RefreshStatus,
    /// A worker process terminated
    ChildExited { pid: u32, code: Option<i32> },
}

/// Forward SIGUSR1/SIGTERM/SIGINT as [`MasterEvent::Stop`] and SIGUSR2 as
/// [`MasterEvent::RefreshStatus`]. The task ends once the receiver is gone.
pub fn spawn_signal_forwarder(
    tx: mpsc::UnboundedSender<MasterEvent>,
) -> io::Result<JoinHandle<()>> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = usr1.recv() => {
                    info!("received SIGUSR1");
                    MasterEvent::Stop
                }
                _ = term.recv() => {
                    info!("received SIGTERM");
                    MasterEvent::Stop
                }
                _ = int.recv() => {
                    info!("received SIGINT");
                    MasterEvent::Stop
                }
                _ = usr2.recv() => MasterEvent::RefreshStatus,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    }))
}

//! timer-daemon: background daemon for natural-language timers
//!
//! This daemon provides:
//! - Free-text timer commands ("set a 5 minute timer for tea")
//! - Repeating audible alerts when timers complete, bounded by a timeout
//! - Regimens: named sequences of timers run back to back
//! - IPC server for clients, plus an interactive console on a terminal

mod alert;
mod command;
mod config;
mod dispatch;
mod events;
mod ipc;
mod lifecycle;
mod output;
mod persist;
mod regimen;
mod timer;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alert::{default_device, AlertEngine, SettingsStore};
use crate::config::Config;
use crate::dispatch::Router;
use crate::events::DaemonEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::output::{EventOutput, OutputSink};
use crate::regimen::{RegimenSequencer, RegimenStore};
use crate::timer::TimerRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they stay apart from console output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "timer-daemon starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.data_dir, ?config.socket_path, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    // Components -> console and IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<DaemonEvent>(256);
    // Timer registry -> router
    let (completion_tx, completion_rx) = mpsc::channel(32);

    let output: Arc<dyn OutputSink> = Arc::new(EventOutput::new(event_tx.clone()));

    let timers = TimerRegistry::new(completion_tx, config.timer_tick, Some(Arc::clone(&output)));

    let tone = default_device(config.tone_command.as_deref());
    let alerts = AlertEngine::new(
        SettingsStore::load(&config.settings_path),
        tone,
        Some(Arc::clone(&output)),
    );

    let regimens = RegimenSequencer::new(
        RegimenStore::new(&config.regimens_path),
        Arc::new(timers.clone()),
        config.regimen_advance_delay,
        Some(Arc::clone(&output)),
    );

    let router = Router::new(timers, alerts.clone(), regimens, Some(output));

    let server = Server::new(&config.socket_path, router.clone(), event_tx.clone())?;

    let interactive = std::io::stdin().is_terminal();

    info!(interactive, "daemon initialized, entering main loop");

    tokio::select! {
        // Route completions to alerts and regimens
        _ = router.run(completion_rx, event_tx.clone()) => {
            info!("completion router exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = console(&router, event_tx.subscribe()), if interactive => {
            info!("console closed");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    alerts.stop_all_alerts().await;
    server.shutdown().await;

    info!("timer-daemon stopped");

    if interactive {
        // A pending stdin read would otherwise hold up runtime teardown.
        std::process::exit(0);
    }
    Ok(())
}

/// Read commands from the terminal and print daemon output until `exit`
async fn console(router: &Router, mut events: broadcast::Receiver<DaemonEvent>) {
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DaemonEvent::Output { message }) => println!("{}", message),
                Ok(DaemonEvent::TimerCompleted { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "console output lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("Timer assistant ready. Type 'help' for examples or 'exit' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("exit") {
                    break;
                }
                router.handle_text(line).await;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(?e, "failed to read from stdin");
                break;
            }
        }
    }

    printer.abort();
}

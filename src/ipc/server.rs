//! Unix domain socket server for IPC
//!
//! Provides request-response communication and pushes daemon events to
//! subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Handled, Router};
use crate::events::DaemonEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted frame body
const MAX_FRAME: usize = 1024 * 1024;

type Writer = Arc<Mutex<OwnedWriteHalf>>;

/// Event forwarding task of one subscribed client; aborted when the client
/// handler ends or is dropped
#[derive(Default)]
struct Forwarder(Option<JoinHandle<()>>);

impl Forwarder {
    fn is_running(&self) -> bool {
        self.0.is_some()
    }

    fn start(&mut self, events: broadcast::Receiver<DaemonEvent>, writer: Writer) {
        self.0 = Some(tokio::spawn(forward_events(events, writer)));
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared by every client handler
struct ServerState {
    router: Router,
    event_tx: broadcast::Sender<DaemonEvent>,
    start_time: Instant,
}

impl Server {
    /// Bind the socket; clients drive `router` and may subscribe to `event_tx`
    pub fn new(
        socket_path: &Path,
        router: Router,
        event_tx: broadcast::Sender<DaemonEvent>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state: Arc::new(ServerState {
                router,
                event_tx,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer: Writer = Arc::new(Mutex::new(writer));
        let mut forwarder = Forwarder::default();

        while let Some(frame) = read_frame(&mut reader).await? {
            let request: Request = match serde_json::from_slice(&frame) {
                Ok(request) => request,
                Err(e) => {
                    warn!(?e, "failed to parse request");
                    let response = Response::Error {
                        code: "bad_request".to_string(),
                        message: e.to_string(),
                    };
                    send_message(&writer, &response).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            let (response, subscribe) = Self::process_request(request, &state).await;
            send_message(&writer, &response).await?;

            if subscribe && !forwarder.is_running() {
                debug!("client subscribed to notifications");
                forwarder.start(state.event_tx.subscribe(), Arc::clone(&writer));
            }
        }

        debug!("client disconnected");
        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, state: &ServerState) -> (Response, bool) {
        let router = &state.router;

        match request {
            Request::Ping => (Response::Pong, false),

            Request::Command { text } => {
                let response = match router.handle_text(&text).await {
                    Handled::Help => Response::Command {
                        understood: true,
                        command: None,
                    },
                    Handled::Executed(command) => Response::Command {
                        understood: true,
                        command: Some(command),
                    },
                    Handled::NotUnderstood => Response::Command {
                        understood: false,
                        command: None,
                    },
                };
                (response, false)
            }

            Request::GetAudioSettings => {
                let settings = router.alerts().get_audio_settings().await;
                (Response::AudioSettings(settings), false)
            }

            Request::SetAudioSettings(update) => {
                let settings = router.alerts().set_audio_settings(&update).await;
                info!(?settings, "audio settings changed via IPC");
                (Response::AudioSettings(settings), false)
            }

            Request::TestBeep => {
                router.alerts().test_beep().await;
                (Response::Ok, false)
            }

            Request::StopAlerts => {
                router.alerts().stop_all_alerts().await;
                (Response::Ok, false)
            }

            Request::CreateRegimen { name, segments } => {
                let name = name.trim();
                if name.is_empty() {
                    let response = Response::Error {
                        code: "invalid_regimen".to_string(),
                        message: "regimen name must not be empty".to_string(),
                    };
                    return (response, false);
                }
                router.regimens().create_regimen(name, segments).await;
                (Response::Ok, false)
            }

            Request::ListRegimens => {
                let regimens = router.regimens().regimen_table().await;
                (Response::Regimens { regimens }, false)
            }

            Request::DeleteRegimen { name } => {
                if router.regimens().delete_regimen(&name).await {
                    (Response::Ok, false)
                } else {
                    let response = Response::Error {
                        code: "not_found".to_string(),
                        message: format!("Regimen '{}' not found", name),
                    };
                    (response, false)
                }
            }

            Request::StopRegimen => {
                router.regimens().stop_regimen().await;
                (Response::Ok, false)
            }

            Request::GetStatus => {
                let regimen_status = router.regimens().regimen_status().await;
                let status = DaemonStatus {
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    active_timers: router.timers().len().await,
                    active_alerts: router.alerts().active_alerts().await,
                    active_regimen: regimen_status.as_ref().map(|run| run.name.clone()),
                    regimen_status,
                    ..DaemonStatus::default()
                };
                (Response::Status(status), false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Read one length-prefixed frame; `None` when the client hung up
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        warn!(len, "message too large, disconnecting");
        return Ok(None);
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Send a length-prefixed JSON message
async fn send_message<T: serde::Serialize>(writer: &Writer, msg: &T) -> Result<()> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = u32::try_from(msg_bytes.len())
        .context("message too large")?
        .to_le_bytes();

    let mut writer = writer.lock().await;
    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

/// Push every daemon event to one subscribed client
async fn forward_events(mut events: broadcast::Receiver<DaemonEvent>, writer: Writer) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = send_message(&writer, &Notification::Event { event }).await {
                    debug!(?e, "subscriber went away");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

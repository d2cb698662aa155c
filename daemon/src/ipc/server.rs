//! Unix domain socket server for IPC
//!
//! Provides request-response communication and pushes daemon events to
//! subscribed clients. Requests that touch daemon state are forwarded into
//! the app loop and answered from there.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::events::{AppEvent, DaemonEvent};

use super::protocol::{Notification, Request, Response};

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    context: ClientContext,
    shutdown_tx: broadcast::Sender<()>,
}

/// What each client handler needs
#[derive(Clone)]
struct ClientContext {
    app_tx: mpsc::Sender<AppEvent>,
    event_tx: broadcast::Sender<DaemonEvent>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        app_tx: mpsc::Sender<AppEvent>,
        event_tx: broadcast::Sender<DaemonEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            context: ClientContext {
                app_tx,
                event_tx,
                start_time: Instant::now(),
            },
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = self.context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, context) => {
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

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

impl ClientContext {
    /// Answer a request, forwarding stateful ones to the app loop
    async fn respond(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Subscribe => Response::Subscribed,
            request => {
                let (reply, reply_rx) = oneshot::channel();
                if self
                    .app_tx
                    .send(AppEvent::Control { request, reply })
                    .await
                    .is_err()
                {
                    return Response::error("unavailable", "daemon is shutting down");
                }

                match reply_rx.await {
                    Ok(Response::Status(mut status)) => {
                        status.uptime_secs = self.start_time.elapsed().as_secs();
                        Response::Status(status)
                    }
                    Ok(response) => response,
                    Err(_) => Response::error("unavailable", "request was dropped"),
                }
            }
        }
    }
}

/// Handle a single client connection
async fn handle_client<S>(stream: S, context: ClientContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    // Frames are read on their own task so a partially read frame is never
    // dropped by the select below
    let (request_tx, mut request_rx) = mpsc::channel::<Request>(8);
    let read_task = tokio::spawn(async move {
        loop {
            match read_frame::<_, Request>(&mut reader).await {
                Ok(Some(request)) => {
                    debug!(?request, "received request");
                    if request_tx.send(request).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(?e, "invalid client message, disconnecting");
                    break;
                }
            }
        }
    });

    let mut events: Option<broadcast::Receiver<DaemonEvent>> = None;

    let result = loop {
        tokio::select! {
            request = request_rx.recv() => {
                let Some(request) = request else {
                    break Ok(());
                };

                if matches!(request, Request::Subscribe) && events.is_none() {
                    events = Some(context.event_tx.subscribe());
                    debug!("client subscribed to events");
                }

                let response = context.respond(request).await;
                if let Err(e) = write_frame(&mut writer, &response).await {
                    break Err(e);
                }
            }
            event = next_event(&mut events) => match event {
                Ok(event) => {
                    if let Err(e) = write_frame(&mut writer, &Notification::Event { event }).await {
                        break Err(e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    events = None;
                }
            }
        }
    };

    read_task.abort();
    result
}

/// Next event for a subscribed client; never resolves when unsubscribed
async fn next_event(
    events: &mut Option<broadcast::Receiver<DaemonEvent>>,
) -> Result<DaemonEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read one length-prefixed JSON message. Returns `None` on clean EOF.
async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        bail!("message too large: {len} bytes");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;

    let message = serde_json::from_slice(&msg_buf).context("failed to parse message")?;
    Ok(Some(message))
}

/// Send a length-prefixed JSON message
async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(message)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}

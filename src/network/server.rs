//! TCP server accepting producer and consumer connections.
//!
//! Every connection starts with a `hello` line naming its role. A producer
//! connection then becomes a `SourceSession` fed by the remaining lines; a
//! consumer connection is registered with the hub and receives one JSON line
//! per message until either side goes away.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::wire::{to_line, ClientMessage, PeerRole, ServerMessage};
use super::NetworkError;
use crate::hub::{ConsumerSink, HubError, HubMessage};
use crate::session::{FrameReceiver, InboundFrame, SessionContext, SessionError, SourceSession};

/// Frames read from newline-delimited JSON.
pub struct LineFrameReceiver<R> {
    lines: Lines<R>,
}

impl<R> LineFrameReceiver<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(lines: Lines<R>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl<R> FrameReceiver for LineFrameReceiver<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, SessionError> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(e) => return Err(SessionError::Receive(e.to_string())),
            };
            if line.trim().is_empty() {
                continue;
            }

            return match serde_json::from_str::<ClientMessage>(&line) {
                Ok(ClientMessage::Frame(frame)) => frame
                    .into_frame()
                    .map(Some)
                    .map_err(|e| SessionError::MalformedFrame(e.to_string())),
                Ok(ClientMessage::Hello { .. }) => {
                    Err(SessionError::MalformedFrame("unexpected hello".to_string()))
                }
                Err(e) => Err(SessionError::MalformedFrame(e.to_string())),
            };
        }
    }
}

/// Consumer sink writing JSON lines to a TCP socket.
pub struct TcpSink {
    writer: Mutex<OwnedWriteHalf>,
    // Dropped with the sink, which resolves the paired receiver.
    _closed: oneshot::Sender<()>,
}

impl TcpSink {
    /// The sink plus a receiver that resolves once the hub lets go of it.
    pub fn pair(writer: OwnedWriteHalf) -> (Self, oneshot::Receiver<()>) {
        let (closed_tx, closed_rx) = oneshot::channel();
        let sink = Self {
            writer: Mutex::new(writer),
            _closed: closed_tx,
        };
        (sink, closed_rx)
    }
}

#[async_trait]
impl ConsumerSink for TcpSink {
    async fn send(&self, message: &HubMessage) -> Result<(), HubError> {
        let line = to_line(&ServerMessage::from(message))
            .map_err(|e| HubError::SendFailed(e.to_string()))?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| HubError::SendFailed(e.to_string()))
    }
}

pub struct VitalsServer {
    context: SessionContext,
    shutdown_tx: broadcast::Sender<()>,
}

impl VitalsServer {
    pub fn new(context: SessionContext) -> Result<Arc<Self>, NetworkError> {
        context.pipeline.validate()?;
        context.session.validate()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Arc::new(Self {
            context,
            shutdown_tx,
        }))
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Bind `addr` and serve until `shutdown` is called.
    pub async fn listen(self: Arc<Self>, addr: String) -> Result<(), NetworkError> {
        let listener = TcpListener::bind(&addr).await?;
        log::info!("Listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until `shutdown` is
    /// called, then wait for every connection task to finish.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), NetworkError> {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut connections: Vec<JoinHandle<()>> = Vec::new();

        loop {
            let (socket, peer_addr) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted?,
            };
            connections.retain(|handle| !handle.is_finished());

            let server = self.clone();
            // Subscribed before the task starts so no shutdown is missed.
            let connection_shutdown = self.shutdown_tx.subscribe();
            connections.push(tokio::spawn(async move {
                if let Err(e) = server
                    .handle_connection(socket, peer_addr, connection_shutdown)
                    .await
                {
                    log::warn!("Connection from {} ended with error: {}", peer_addr, e);
                }
            }));
        }

        log::info!("Shutting down, waiting for {} connection(s)", connections.len());
        futures_util::future::join_all(connections).await;
        Ok(())
    }

    /// Stop accepting, close every session and drop every consumer.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.context.hub.shutdown().await;
    }

    async fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NetworkError> {
        let connection_id = Uuid::new_v4();
        let (read_half, write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let hello = tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            hello = tokio::time::timeout(self.context.session.idle_timeout, lines.next_line()) => hello,
        };
        let hello =
            hello.map_err(|_| NetworkError::Protocol("no hello before idle timeout".to_string()))??;
        let role = match hello {
            Some(line) => match serde_json::from_str::<ClientMessage>(&line)? {
                ClientMessage::Hello { role } => role,
                ClientMessage::Frame(_) => {
                    return Err(NetworkError::Protocol("expected hello, got frame".to_string()))
                }
            },
            None => return Ok(()),
        };
        log::info!("Connection {} from {} as {:?}", connection_id, peer_addr, role);

        match role {
            PeerRole::Producer => {
                let mut session = SourceSession::new(connection_id, &self.context)?;
                let mut receiver = LineFrameReceiver::new(lines);
                let report = session.run(&mut receiver, Some(shutdown)).await;
                match report {
                    Ok(report) => log::info!(
                        "Producer {} done after {} frame(s): {}",
                        connection_id,
                        report.frames_processed,
                        report.close_reason
                    ),
                    Err(e) => log::warn!("Producer {} closed: {}", connection_id, e),
                }
            }
            PeerRole::Consumer => {
                let hub = &self.context.hub;
                let (sink, mut closed) = TcpSink::pair(write_half);
                hub.register_consumer(connection_id, Arc::new(sink)).await?;

                // Consumers have nothing to say; reading only detects the hang-up.
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = &mut closed => {
                            log::info!("Consumer {} dropped by the hub", connection_id);
                            break;
                        }
                        line = lines.next_line() => match line {
                            Ok(Some(_)) => continue,
                            Ok(None) | Err(_) => break,
                        },
                    }
                }
                hub.unregister(connection_id).await;
                log::info!("Consumer {} disconnected", connection_id);
            }
        }
        Ok(())
    }
}

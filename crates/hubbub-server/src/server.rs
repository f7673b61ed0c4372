//! Core server: accepts connections and wires them to the dispatcher.
//!
//! Each accepted connection gets a reader task (decode + enqueue only) and a
//! writer task (sole consumer of the connection's outbound channel). All
//! routing and state mutation lives in the dispatcher task.

use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, Event};
use crate::store::JsonStore;
use crate::transport::{self, WebSocketConnection};
use futures_util::{SinkExt, StreamExt};
use hubbub_core::codec;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// The hubbub server instance.
pub struct ChatServer {
    config: ServerConfig,
}

impl ChatServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves. On shutdown the accept loop stops,
    /// the dispatcher drains everything already queued, and connections are
    /// closed before returning.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> hubbub_core::RelayResult<()> {
        let store = JsonStore::open(&self.config.data_dir)?;

        let (event_tx, event_rx) = mpsc::channel::<Event>(256);
        let dispatcher = tokio::spawn(Dispatcher::new(store, event_rx).run());

        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port)
            .parse()
            .map_err(|e| hubbub_core::RelayError::Other(format!("invalid address: {e}")))?;
        let mut incoming = transport::start_listener(addr, self.config.path.clone()).await?;
        let idle_timeout = Duration::from_secs(self.config.idle_timeout);

        info!(
            port = self.config.port,
            path = %self.config.path,
            data_dir = %self.config.data_dir.display(),
            "hubbub-server ready"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                Some(conn) = incoming.recv() => {
                    let events = event_tx.clone();
                    tokio::spawn(async move {
                        handle_connection(conn, events, idle_timeout).await;
                    });
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        // Queued events drain in arrival order before the Shutdown marker.
        if event_tx.send(Event::Shutdown).await.is_err() {
            warn!("dispatcher already stopped");
        }
        drop(event_tx);
        if let Err(e) = dispatcher.await {
            error!(error = %e, "dispatcher task failed");
        }

        Ok(())
    }
}

/// Per-connection plumbing: register with the dispatcher, then pump frames.
async fn handle_connection(
    conn: WebSocketConnection,
    events: mpsc::Sender<Event>,
    idle_timeout: Duration,
) {
    let remote = conn.remote_addr;
    let (mut sink, mut stream) = conn.ws_stream.split();

    let (peer_tx, mut peer_rx) = mpsc::channel(64);
    let (ack_tx, ack_rx) = oneshot::channel();
    if events
        .send(Event::Connected {
            tx: peer_tx,
            ack: ack_tx,
        })
        .await
        .is_err()
    {
        return;
    }
    let Ok(id) = ack_rx.await else { return };
    info!(conn_id = id, remote = %remote, "connection established");

    // Writer task: sole owner of the sink half. Ends when the dispatcher
    // drops the outbound sender or the socket write fails, closing the
    // socket either way.
    tokio::spawn(async move {
        while let Some(msg) = peer_rx.recv().await {
            let text = match codec::encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!(conn_id = id, error = %e, "outbound encode failed");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(conn_id = id, error = %e, "write failed, closing socket");
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader loop: decode and enqueue, nothing else.
    loop {
        let frame = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Err(_) => {
                info!(conn_id = id, "idle timeout, closing connection");
                break;
            }
            Ok(None) => {
                debug!(conn_id = id, "peer closed connection");
                break;
            }
            Ok(Some(Err(e))) => {
                debug!(conn_id = id, error = %e, "read error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match codec::decode(&text) {
                Ok(msg) => {
                    if events.send(Event::Inbound { id, msg }).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(conn_id = id, error = %e, "malformed message, closing connection");
                    break;
                }
            },
            Message::Close(_) => {
                debug!(conn_id = id, "close frame received");
                break;
            }
            // Binary, ping and pong frames carry no chat payload.
            _ => {}
        }
    }

    let _ = events.send(Event::Disconnected { id }).await;
}

//! WebSocket listener using tokio-tungstenite.
//!
//! Accepts TCP connections, performs the HTTP upgrade, and yields accepted
//! connections through a channel. Only the configured endpoint path is
//! upgraded; anything else is answered with 404 during the handshake.

use hubbub_core::{RelayError, RelayResult};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    /// The WebSocket stream (split into sink + stream in usage).
    pub ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    /// Remote address.
    pub remote_addr: SocketAddr,
}

/// Start the WebSocket listener.
///
/// Returns a receiver that yields accepted connections. Handshake failures
/// are logged and abandoned without affecting other connections.
pub async fn start_listener(
    bind_addr: SocketAddr,
    path: String,
) -> RelayResult<mpsc::Receiver<WebSocketConnection>> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| RelayError::Transport(format!("bind {bind_addr} failed: {e}")))?;

    info!(addr = %bind_addr, path = %path, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    let path = path.clone();
                    tokio::spawn(async move {
                        match accept_at_path(stream, &path).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    Ok(rx)
}

/// Upgrade a TCP stream, rejecting requests for any other path.
async fn accept_at_path(
    stream: TcpStream,
    path: &str,
) -> Result<tokio_tungstenite::WebSocketStream<TcpStream>, tokio_tungstenite::tungstenite::Error> {
    let expected = path.to_string();
    let callback = move |req: &Request, resp: Response| {
        if req.uri().path() == expected {
            Ok(resp)
        } else {
            let mut not_found = ErrorResponse::new(Some("no websocket endpoint here".into()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Err(not_found)
        }
    };
    tokio_tungstenite::accept_hdr_async(stream, callback).await
}

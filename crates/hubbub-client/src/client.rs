//! WebSocket chat client.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hubbub_core::{codec, ChatMessage, RelayError, RelayResult};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected chat client, ready to be split into send/receive halves.
pub struct ChatClient {
    ws: WsStream,
}

impl ChatClient {
    /// Connect to `server` (host:port) at the given WebSocket `path`.
    pub async fn connect(server: &str, path: &str) -> RelayResult<Self> {
        let url = server_url(server, path);
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| RelayError::Transport(format!("connect {url} failed: {e}")))?;
        debug!(url = %url, "connected");
        Ok(Self { ws })
    }

    /// Split into independent send and receive halves so reading and
    /// writing can live on separate tasks.
    pub fn split(self) -> (ChatSender, ChatReceiver) {
        let (sink, stream) = self.ws.split();
        (ChatSender { sink }, ChatReceiver { stream })
    }
}

/// Send half: builds and writes wire messages.
pub struct ChatSender {
    sink: SplitSink<WsStream, Message>,
}

impl ChatSender {
    /// Send any prebuilt message.
    pub async fn send(&mut self, msg: &ChatMessage) -> RelayResult<()> {
        let text = codec::encode(msg)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| RelayError::Transport(format!("send failed: {e}")))
    }

    /// Authenticate an existing account.
    pub async fn login(&mut self, username: &str, password: &str) -> RelayResult<()> {
        self.send(&ChatMessage::login(username, password)).await
    }

    /// Create an account; the server hashes the password.
    pub async fn register(&mut self, username: &str, password: &str) -> RelayResult<()> {
        self.send(&ChatMessage::register(username, password)).await
    }

    /// Chat to everyone else in the room.
    pub async fn room_chat(&mut self, username: &str, text: &str) -> RelayResult<()> {
        self.send(&ChatMessage::room_chat(username, text)).await
    }

    /// Direct message to one user.
    pub async fn dm(&mut self, username: &str, receiver: &str, text: &str) -> RelayResult<()> {
        self.send(&ChatMessage::dm(username, receiver, text)).await
    }

    /// Announce departure and let the server tear the connection down.
    pub async fn exit(&mut self, username: &str) -> RelayResult<()> {
        self.send(&ChatMessage::exit(username)).await?;
        let _ = self.sink.close().await;
        Ok(())
    }
}

/// Receive half: yields decoded messages until the server closes.
pub struct ChatReceiver {
    stream: SplitStream<WsStream>,
}

impl ChatReceiver {
    /// Next chat message, or `None` once the connection is closed.
    /// Non-text frames are skipped; malformed payloads are errors.
    pub async fn next(&mut self) -> RelayResult<Option<ChatMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return codec::decode(&text).map(Some),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(RelayError::Transport(format!("receive failed: {e}")))
                }
            }
        }
    }
}

/// Build a `ws://` URL from a host:port and an endpoint path.
fn server_url(server: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("ws://{server}{path}")
    } else {
        format!("ws://{server}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::server_url;

    #[test]
    fn url_joins_host_and_path() {
        assert_eq!(server_url("localhost:8080", "/ws"), "ws://localhost:8080/ws");
        assert_eq!(server_url("example.net:9000", "chat"), "ws://example.net:9000/chat");
    }
}

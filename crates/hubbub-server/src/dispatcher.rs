//! Message dispatcher: the single consumer that classifies and routes every
//! inbound message.
//!
//! All registry mutation, transcript appends, and outbound sends happen on
//! this one task, in queue arrival order. That gives a total order over all
//! events server-wide and keeps every outbound channel single-writer.

use crate::auth::{self, RegisterOutcome};
use crate::registry::ConnectionRegistry;
use crate::store::JsonStore;
use chrono::Utc;
use hubbub_core::{ChatMessage, MessageKind};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events flowing from reader tasks (and the accept loop) into the dispatcher.
pub enum Event {
    /// A connection finished its WebSocket handshake. The dispatcher
    /// registers it and acks with the assigned connection id.
    Connected {
        tx: mpsc::Sender<ChatMessage>,
        ack: oneshot::Sender<u64>,
    },
    /// A decoded message from connection `id`.
    Inbound { id: u64, msg: ChatMessage },
    /// Connection `id`'s reader ended (close, read error, idle timeout).
    Disconnected { id: u64 },
    /// Stop after draining everything queued ahead of this event.
    Shutdown,
}

/// Single-consumer routing engine over the shared inbound queue.
pub struct Dispatcher {
    registry: ConnectionRegistry,
    store: JsonStore,
    rx: mpsc::Receiver<Event>,
}

impl Dispatcher {
    pub fn new(store: JsonStore, rx: mpsc::Receiver<Event>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            store,
            rx,
        }
    }

    /// Drain the queue until it closes or a `Shutdown` event arrives.
    /// Messages queued ahead of the shutdown are still processed in order.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            match event {
                Event::Connected { tx, ack } => {
                    let id = self.registry.register(tx);
                    let _ = ack.send(id);
                }
                Event::Inbound { id, msg } => self.handle_inbound(id, msg).await,
                Event::Disconnected { id } => self.registry.unregister(id),
                Event::Shutdown => break,
            }
        }
        info!(
            live = self.registry.len(),
            transcript = self.store.transcript().len(),
            "dispatcher stopped"
        );
    }

    /// Process one inbound message: stamp, persist, route.
    async fn handle_inbound(&mut self, id: u64, mut msg: ChatMessage) {
        msg.timestamp = Some(Utc::now());

        // Persist before routing. LOGIN/REGISTER carry a credential in
        // `text`; the transcript record gets that field cleared.
        let mut record = msg.clone();
        if matches!(record.kind, MessageKind::Login | MessageKind::Register) {
            record.text.clear();
        }
        if let Err(e) = self.store.append(record) {
            error!(conn_id = id, error = %e, "transcript append failed, message not routed");
            self.send_to(
                id,
                ChatMessage::broadcast("Message could not be saved; try again."),
            )
            .await;
            return;
        }

        match msg.kind {
            MessageKind::Login => self.handle_login(id, msg).await,
            MessageKind::Register => self.handle_register(id, msg).await,
            MessageKind::RoomChat => self.handle_room_chat(id, msg).await,
            MessageKind::Dm => self.handle_dm(id, msg).await,
            MessageKind::Exit => self.handle_exit(id, msg).await,
            MessageKind::Broadcast => {
                // Server-originated only; a client sending it is a protocol
                // violation, answered but never routed.
                warn!(conn_id = id, "client attempted to send BROADCAST");
                self.send_to(
                    id,
                    ChatMessage::broadcast("BROADCAST messages cannot be sent by clients."),
                )
                .await;
            }
        }
    }

    async fn handle_login(&mut self, id: u64, msg: ChatMessage) {
        let username = msg.username.clone();
        if auth::login(&self.store, &username, &msg.text) {
            self.registry.bind_username(&username, id);
            info!(conn_id = id, username = %username, "login ok");
            self.send_to(
                id,
                ChatMessage::reply(MessageKind::Login, &username, "Login successful!"),
            )
            .await;
            self.broadcast_except(
                id,
                ChatMessage::broadcast(format!("@{username} has joined the chat!")),
            )
            .await;
        } else {
            info!(conn_id = id, username = %username, "login invalid, closing connection");
            self.send_to(
                id,
                ChatMessage::reply(MessageKind::Login, &username, "Login invalid!"),
            )
            .await;
            // Login failure is fatal to the connection, not retried.
            self.registry.unregister(id);
        }
    }

    async fn handle_register(&mut self, id: u64, msg: ChatMessage) {
        let username = msg.username.clone();
        match auth::register(&mut self.store, &username, &msg.text) {
            Ok(RegisterOutcome::Created) => {
                self.registry.bind_username(&username, id);
                info!(conn_id = id, username = %username, "account registered");
                self.send_to(
                    id,
                    ChatMessage::reply(MessageKind::Register, &username, "Account registered!"),
                )
                .await;
                self.broadcast_except(
                    id,
                    ChatMessage::broadcast(format!("@{username} has joined the chat!")),
                )
                .await;
            }
            Ok(RegisterOutcome::AlreadyExists) => {
                info!(conn_id = id, username = %username, "duplicate registration rejected");
                self.send_to(
                    id,
                    ChatMessage::reply(
                        MessageKind::Register,
                        &username,
                        "Username already taken!",
                    ),
                )
                .await;
            }
            Err(e) => {
                error!(conn_id = id, username = %username, error = %e, "registration not persisted");
                self.send_to(
                    id,
                    ChatMessage::broadcast("Registration could not be saved; try again."),
                )
                .await;
            }
        }
    }

    async fn handle_room_chat(&mut self, id: u64, msg: ChatMessage) {
        if self.registry.username_of(id).is_none() {
            self.send_to(
                id,
                ChatMessage::broadcast("You must log in before chatting."),
            )
            .await;
            return;
        }
        debug!(conn_id = id, username = %msg.username, "room chat");
        // Delivered verbatim to everyone but the sender; no echo.
        self.broadcast_except(id, msg).await;
    }

    async fn handle_dm(&mut self, id: u64, msg: ChatMessage) {
        if self.registry.username_of(id).is_none() {
            self.send_to(
                id,
                ChatMessage::broadcast("You must log in before chatting."),
            )
            .await;
            return;
        }
        let Some(receiver) = msg.receiver.clone() else {
            self.send_to(id, ChatMessage::broadcast("DM is missing a receiver."))
                .await;
            return;
        };
        match self.registry.lookup_by_username(&receiver) {
            Some(target) => {
                debug!(conn_id = id, from = %msg.username, to = %receiver, "dm");
                self.send_to(target, msg).await;
            }
            None => {
                debug!(conn_id = id, to = %receiver, "dm receiver not online");
                self.send_to(
                    id,
                    ChatMessage::broadcast(format!("Could not deliver DM: @{receiver} is not online.")),
                )
                .await;
            }
        }
    }

    async fn handle_exit(&mut self, id: u64, msg: ChatMessage) {
        info!(conn_id = id, username = %msg.username, "leaving chat");
        if let Some(name) = self.registry.username_of(id).map(str::to_string) {
            self.registry.unbind_username(&name);
        }
        self.registry.unregister(id);
        self.broadcast_except(
            id,
            ChatMessage::broadcast(format!("@{} has left the chat!", msg.username)),
        )
        .await;
    }

    /// Send to one peer. A failed send means the peer's writer task died;
    /// that peer alone is closed and unregistered.
    async fn send_to(&mut self, id: u64, mut msg: ChatMessage) -> bool {
        if msg.timestamp.is_none() {
            msg.timestamp = Some(Utc::now());
        }
        let Some(tx) = self.registry.sender(id) else {
            return false;
        };
        if tx.send(msg).await.is_ok() {
            true
        } else {
            warn!(conn_id = id, "peer unreachable, dropping connection");
            self.registry.unregister(id);
            false
        }
    }

    /// Deliver to every live connection except `except`. Write failures are
    /// isolated per peer: the failing connection is dropped and delivery
    /// continues for the rest.
    async fn broadcast_except(&mut self, except: u64, mut msg: ChatMessage) {
        if msg.timestamp.is_none() {
            msg.timestamp = Some(Utc::now());
        }
        let mut failed = Vec::new();
        for id in self.registry.live_ids() {
            if id == except {
                continue;
            }
            let Some(tx) = self.registry.sender(id) else {
                continue;
            };
            if tx.send(msg.clone()).await.is_err() {
                failed.push(id);
            }
        }
        for id in failed {
            warn!(conn_id = id, "peer unreachable during broadcast, dropping connection");
            self.registry.unregister(id);
        }
    }
}

//! Per-connection event handling and room fan-out
//!
//! The router turns inbound client events into registry mutations and
//! outbound notifications. Every notification is tagged with a [`FanOut`]
//! target, resolved against the registry while its lock is held, and handed
//! to an [`Outbox`] one recipient at a time. Because resolution and enqueueing
//! happen under the same lock as the mutation, all recipients observe the
//! notifications of one join or leave in the same order.

use crate::error::ChatError;
use crate::profanity::ProfanityFilter;
use crate::session_registry::SessionRegistry;
use chat_shared::{
    generate_location_message, generate_message, location_url, ClientEvent, ConnectionId,
    Coordinates, ServerPacket, ADMIN_NAME, WELCOME_TEXT,
};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fire-and-forget delivery of a packet to one connection
///
/// Implementations must not block and must swallow per-recipient failures so
/// one unreachable peer never affects the others.
pub trait Outbox: Send + Sync {
    fn deliver(&self, to: ConnectionId, packet: &ServerPacket);
}

/// Who should receive an outbound notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOut {
    /// Only this connection
    Connection(ConnectionId),
    /// Every member of the room except one connection
    RoomExcept { room: String, except: ConnectionId },
    /// Every member of the room
    Room(String),
}

impl FanOut {
    /// Resolves the target into recipients, in room join order
    pub fn recipients(&self, registry: &SessionRegistry) -> Vec<ConnectionId> {
        match self {
            FanOut::Connection(id) => vec![*id],
            FanOut::RoomExcept { room, except } => registry
                .member_ids(room)
                .into_iter()
                .filter(|id| id != except)
                .collect(),
            FanOut::Room(room) => registry.member_ids(room),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected without a session
    Connected,
    /// Bound to a session in the registry
    Joined,
    /// Terminal; further events are ignored
    Disconnected,
}

/// State machine for one client connection
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: ConnectionState::Connected,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Outcome of one event: `None` means nothing is acknowledged
pub type Ack = Option<Result<(), ChatError>>;

/// Applies client events to the shared registry and emits notifications
pub struct EventRouter<O: Outbox> {
    registry: Arc<RwLock<SessionRegistry>>,
    filter: Box<dyn ProfanityFilter>,
    outbox: O,
}

impl<O: Outbox> EventRouter<O> {
    pub fn new(
        registry: Arc<RwLock<SessionRegistry>>,
        filter: Box<dyn ProfanityFilter>,
        outbox: O,
    ) -> Self {
        Self {
            registry,
            filter,
            outbox,
        }
    }

    pub fn registry(&self) -> &Arc<RwLock<SessionRegistry>> {
        &self.registry
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    /// Dispatches one inbound event for a connection
    ///
    /// The returned value is what the transport sends back to the originator,
    /// after every notification produced by the event has been enqueued.
    pub async fn handle(&self, connection: &mut Connection, event: ClientEvent) -> Ack {
        match event {
            ClientEvent::Join { username, room } => self.join(connection, &username, &room).await,
            ClientEvent::SendMessage { text } => self.send_message(connection, &text).await,
            ClientEvent::SendLocation { coords } => self.send_location(connection, coords).await,
            ClientEvent::Disconnect => {
                self.disconnect(connection).await;
                None
            }
        }
    }

    async fn join(&self, connection: &mut Connection, username: &str, room: &str) -> Ack {
        match connection.state {
            ConnectionState::Connected => {}
            ConnectionState::Joined => {
                debug!("Connection {} tried to join twice", connection.id);
                return Some(Err(ChatError::AlreadyJoined));
            }
            ConnectionState::Disconnected => return None,
        }

        let mut registry = self.registry.write().await;
        let session = match registry.add_user(connection.id, username, room) {
            Ok(session) => session,
            Err(e) => {
                debug!("Join rejected for connection {}: {}", connection.id, e.code());
                return Some(Err(e));
            }
        };
        connection.state = ConnectionState::Joined;

        self.emit(
            &registry,
            FanOut::Connection(session.id),
            ServerPacket::Message(generate_message(ADMIN_NAME, WELCOME_TEXT)),
        );
        self.emit(
            &registry,
            FanOut::RoomExcept {
                room: session.room.clone(),
                except: session.id,
            },
            ServerPacket::Message(generate_message(
                ADMIN_NAME,
                &format!("{} has joined!", session.username),
            )),
        );
        let roster = registry.roster(&session.room);
        self.emit(&registry, FanOut::Room(session.room), ServerPacket::RoomData(roster));

        Some(Ok(()))
    }

    async fn send_message(&self, connection: &Connection, text: &str) -> Ack {
        match connection.state {
            ConnectionState::Joined => {}
            ConnectionState::Connected => return Some(Err(ChatError::NotJoined)),
            ConnectionState::Disconnected => return None,
        }

        let registry = self.registry.read().await;
        let session = match registry.get_user(connection.id) {
            Some(session) => session,
            None => {
                debug!("Dropping message from stale connection {}", connection.id);
                return None;
            }
        };

        if self.filter.is_profane(text) {
            debug!("Rejected profane message from {}", session.username);
            return Some(Err(ChatError::Profanity));
        }

        debug!("{} -> {}: {}", session.username, session.room, text);
        self.emit(
            &registry,
            FanOut::Room(session.room.clone()),
            ServerPacket::Message(generate_message(&session.username, text)),
        );

        Some(Ok(()))
    }

    async fn send_location(&self, connection: &Connection, coords: Coordinates) -> Ack {
        match connection.state {
            ConnectionState::Joined => {}
            ConnectionState::Connected => return Some(Err(ChatError::NotJoined)),
            ConnectionState::Disconnected => return None,
        }

        let registry = self.registry.read().await;
        let session = match registry.get_user(connection.id) {
            Some(session) => session,
            None => {
                debug!("Dropping location from stale connection {}", connection.id);
                return None;
            }
        };

        let url = location_url(&coords);
        self.emit(
            &registry,
            FanOut::Room(session.room.clone()),
            ServerPacket::LocationMessage(generate_location_message(&session.username, &url)),
        );

        Some(Ok(()))
    }

    /// Ends the connection's session; safe to call any number of times
    pub async fn disconnect(&self, connection: &mut Connection) {
        if connection.state == ConnectionState::Disconnected {
            return;
        }
        connection.state = ConnectionState::Disconnected;

        let mut registry = self.registry.write().await;
        let Some(session) = registry.remove_user(connection.id) else {
            info!("Connection {} closed without joining", connection.id);
            return;
        };

        self.emit(
            &registry,
            FanOut::Room(session.room.clone()),
            ServerPacket::Message(generate_message(
                ADMIN_NAME,
                &format!("{} has left", session.username),
            )),
        );
        let roster = registry.roster(&session.room);
        self.emit(&registry, FanOut::Room(session.room), ServerPacket::RoomData(roster));
    }

    fn emit(&self, registry: &SessionRegistry, target: FanOut, packet: ServerPacket) {
        for id in target.recipients(registry) {
            self.outbox.deliver(id, &packet);
        }
    }
}

//! Server network layer handling WebSocket connections and frame routing

use crate::profanity::ProfanityFilter;
use crate::router::{Connection, EventRouter, Outbox};
use crate::session_registry::SessionRegistry;
use chat_shared::{ClientEvent, CodecError, ConnectionId, Request, ServerPacket, WireFormat};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::RwLock as PeerLock;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;

/// How long connection tasks get to wind down before they are aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Outbound queue and negotiated encoding of one connected peer
#[derive(Debug)]
struct Peer {
    sender: mpsc::UnboundedSender<Message>,
    format: WireFormat,
}

/// Table of live WebSocket peers; the transport side of [`Outbox`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionHub {
    peers: Arc<PeerLock<HashMap<ConnectionId, Peer>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId, sender: mpsc::UnboundedSender<Message>) {
        self.peers.write().insert(
            id,
            Peer {
                sender,
                format: WireFormat::Json,
            },
        );
    }

    /// Drops the peer's queue so its writer task can finish
    pub fn unregister(&self, id: ConnectionId) {
        self.peers.write().remove(&id);
    }

    /// Replies to a peer follow the format of the last frame it sent
    pub fn set_format(&self, id: ConnectionId, format: WireFormat) {
        if let Some(peer) = self.peers.write().get_mut(&id) {
            peer.format = format;
        }
    }

    /// Drops every outbound queue, closing all writer tasks
    pub fn clear(&self) {
        self.peers.write().clear();
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

/// Encodes a packet into the frame type matching the peer's format
pub fn encode_frame(packet: &ServerPacket, format: WireFormat) -> Result<Message, CodecError> {
    match format {
        WireFormat::Json => Ok(Message::text(format.encode_text(packet)?)),
        WireFormat::Bincode => Ok(Message::binary(format.encode(packet)?)),
    }
}

/// Decodes an inbound frame; `Ok(None)` for frames that carry no request
pub fn decode_frame(message: &Message) -> Result<Option<(Request, WireFormat)>, CodecError> {
    match message {
        Message::Text(text) => {
            let request = WireFormat::Json.decode(text.as_bytes())?;
            Ok(Some((request, WireFormat::Json)))
        }
        Message::Binary(data) => {
            let request = WireFormat::Bincode.decode(data)?;
            Ok(Some((request, WireFormat::Bincode)))
        }
        _ => Ok(None),
    }
}

impl Outbox for ConnectionHub {
    fn deliver(&self, to: ConnectionId, packet: &ServerPacket) {
        let peers = self.peers.read();
        let Some(peer) = peers.get(&to) else {
            debug!("Dropping packet for departed connection {}", to);
            return;
        };

        match encode_frame(packet, peer.format) {
            Ok(frame) => {
                if peer.sender.send(frame).is_err() {
                    debug!("Outbound queue closed for connection {}", to);
                }
            }
            Err(e) => error!("Failed to encode packet for connection {}: {}", to, e),
        }
    }
}

/// Chat server owning the listener, the session registry and the router
pub struct Server {
    listener: TcpListener,
    router: Arc<EventRouter<ConnectionHub>>,
    hub: ConnectionHub,
    next_connection_id: AtomicU32,
    shutdown: watch::Sender<bool>,
}

/// Hands out connection ids from 1 upwards; `None` once the id space is spent
fn allocate_connection_id(counter: &AtomicU32) -> Option<ConnectionId> {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
        .ok()
}

impl Server {
    /// Binds the listener and creates an empty registry
    pub async fn bind(addr: &str, filter: Box<dyn ProfanityFilter>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server is up on {}", listener.local_addr()?);

        let hub = ConnectionHub::new();
        let registry = Arc::new(RwLock::new(SessionRegistry::new()));
        let router = Arc::new(EventRouter::new(registry, filter, hub.clone()));
        let (shutdown, _) = watch::channel(false);

        Ok(Server {
            listener,
            router,
            hub,
            next_connection_id: AtomicU32::new(1),
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<RwLock<SessionRegistry>> {
        Arc::clone(self.router.registry())
    }

    /// Accepts connections until the listener fails permanently
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then closes every
    /// connection and clears the registry
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> std::io::Result<()> {
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(&mut connections, stream, addr),
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {},

                _ = &mut shutdown => break,
            }
        }

        info!("Server shutting down, closing {} connections", connections.len());
        self.shutdown.send_replace(true);

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Aborting {} connections that did not close in time", connections.len());
            connections.abort_all();
            self.hub.clear();
        }

        let dropped = self.router.registry().write().await.clear();
        info!("Server stopped, dropped {} sessions", dropped);
        Ok(())
    }

    fn spawn_connection(
        &self,
        connections: &mut JoinSet<()>,
        stream: TcpStream,
        addr: SocketAddr,
    ) {
        let Some(id) = allocate_connection_id(&self.next_connection_id) else {
            error!("Connection ids exhausted, refusing {}", addr);
            return;
        };
        let router = Arc::clone(&self.router);
        let hub = self.hub.clone();
        let shutdown = self.shutdown.subscribe();

        connections.spawn(async move {
            handle_connection(stream, addr, id, router, hub, shutdown).await;
        });
    }
}

/// Drives one WebSocket connection from handshake to disconnect
///
/// A writer task drains the peer's queue into the socket while this task
/// reads frames and feeds them to the router. Any way out of the read loop,
/// server shutdown included, ends in exactly one router disconnect.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    router: Arc<EventRouter<ConnectionHub>>,
    hub: ConnectionHub,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    info!("New WebSocket connection {} from {}", id, addr);

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    hub.register(id, tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(frame).await {
                debug!("Failed to write to connection {}: {}", id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut connection = Connection::new(id);

    loop {
        let frame = tokio::select! {
            frame = source.next() => frame,
            _ = shutdown.changed() => {
                debug!("Closing connection {} for shutdown", id);
                break;
            }
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                debug!("Read error on connection {}: {}", id, e);
                break;
            }
            None => break,
        };

        if frame.is_close() {
            break;
        }

        let (request, format) = match decode_frame(&frame) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to decode frame from connection {}: {}", id, e);
                continue;
            }
        };
        hub.set_format(id, format);

        let leaving = request.event == ClientEvent::Disconnect;
        let ack = router.handle(&mut connection, request.event).await;

        if let (Some(ack_id), Some(result)) = (request.ack, ack) {
            let reply = ServerPacket::Ack {
                id: ack_id,
                error: result.err().map(|e| e.to_string()),
            };
            hub.deliver(id, &reply);
        }

        if leaving {
            break;
        }
    }

    router.disconnect(&mut connection).await;
    hub.unregister(id);
    let _ = writer.await;
    info!("Connection {} from {} closed", id, addr);
}

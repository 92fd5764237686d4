use chat_shared::{ClientEvent, CodecError, Coordinates, Request, ServerPacket, WireFormat};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("connection closed by server")]
    Closed,
}

/// WebSocket connection to a chat server
pub struct ChatClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    format: WireFormat,
    next_ack: u32,
}

impl ChatClient {
    pub async fn connect(url: &str, format: WireFormat) -> Result<Self, ClientError> {
        let (stream, _) = connect_async(url).await?;
        info!("Connected to {} using {:?} frames", url, format);

        Ok(ChatClient {
            stream,
            format,
            next_ack: 1,
        })
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Sends an event that expects an acknowledgment; returns its ack id
    pub async fn send(&mut self, event: ClientEvent) -> Result<u32, ClientError> {
        let id = self.next_ack;
        self.next_ack = self.next_ack.wrapping_add(1);

        self.send_request(&Request::new(id, event)).await?;
        Ok(id)
    }

    pub async fn send_request(&mut self, request: &Request) -> Result<(), ClientError> {
        let frame = match self.format {
            WireFormat::Json => Message::text(self.format.encode_text(request)?),
            WireFormat::Bincode => Message::binary(self.format.encode(request)?),
        };
        self.stream.send(frame).await?;
        Ok(())
    }

    pub async fn join(&mut self, username: &str, room: &str) -> Result<u32, ClientError> {
        self.send(ClientEvent::Join {
            username: username.to_string(),
            room: room.to_string(),
        })
        .await
    }

    pub async fn send_message(&mut self, text: &str) -> Result<u32, ClientError> {
        self.send(ClientEvent::SendMessage {
            text: text.to_string(),
        })
        .await
    }

    pub async fn send_location(&mut self, coords: Coordinates) -> Result<u32, ClientError> {
        self.send(ClientEvent::SendLocation { coords }).await
    }

    /// Next packet from the server, or `None` once the connection is closed
    pub async fn next_packet(&mut self) -> Result<Option<ServerPacket>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(WireFormat::Json.decode(text.as_bytes())?)),
                Message::Binary(data) => return Ok(Some(WireFormat::Bincode.decode(&data)?)),
                Message::Close(_) => return Ok(None),
                other => debug!("Ignoring control frame {:?}", other),
            }
        }
        Ok(None)
    }

    /// Reads until the acknowledgment for `id` arrives
    ///
    /// Returns the acknowledgment outcome together with every other packet
    /// received while waiting, in arrival order.
    pub async fn wait_for_ack(
        &mut self,
        id: u32,
    ) -> Result<(Result<(), String>, Vec<ServerPacket>), ClientError> {
        let mut received = Vec::new();

        loop {
            match self.next_packet().await? {
                Some(ServerPacket::Ack { id: ack, error }) if ack == id => {
                    return Ok((error.map_or(Ok(()), Err), received));
                }
                Some(packet) => received.push(packet),
                None => return Err(ClientError::Closed),
            }
        }
    }

    /// Announces the disconnect and closes the socket
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.send_request(&Request::fire_and_forget(ClientEvent::Disconnect))
            .await?;
        // The server may close first; a failed close handshake is not an error here
        let _ = self.stream.close(None).await;
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const ADMIN_NAME: &str = "Admin";
pub const DEFAULT_PORT: u16 = 3000;
pub const WELCOME_TEXT: &str = "Welcome to the chat!";

/// Transport-assigned identifier of a single client connection
pub type ConnectionId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Events a client can raise against the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientEvent {
    Join { username: String, room: String },
    SendMessage { text: String },
    SendLocation { coords: Coordinates },
    Disconnect,
}

/// Inbound frame. When `ack` is set the server answers with `ServerPacket::Ack`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Request {
    pub ack: Option<u32>,
    pub event: ClientEvent,
}

impl Request {
    pub fn new(ack: u32, event: ClientEvent) -> Self {
        Self {
            ack: Some(ack),
            event,
        }
    }

    pub fn fire_and_forget(event: ClientEvent) -> Self {
        Self { ack: None, event }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ServerPacket {
    Message(ChatMessage),
    LocationMessage(LocationMessage),
    RoomData(RoomData),
    Ack { id: u32, error: Option<String> },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationMessage {
    pub sender: String,
    pub url: String,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RosterEntry {
    pub id: ConnectionId,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomData {
    pub room: String,
    pub users: Vec<RosterEntry>,
}

impl RoomData {
    pub fn usernames(&self) -> Vec<&str> {
        self.users.iter().map(|u| u.username.as_str()).collect()
    }
}

// Current wall-clock time in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

pub fn generate_message(sender: &str, text: &str) -> ChatMessage {
    ChatMessage {
        sender: sender.to_string(),
        text: text.to_string(),
        timestamp: get_timestamp(),
    }
}

pub fn generate_location_message(sender: &str, url: &str) -> LocationMessage {
    LocationMessage {
        sender: sender.to_string(),
        url: url.to_string(),
        timestamp: get_timestamp(),
    }
}

pub fn location_url(coords: &Coordinates) -> String {
    format!(
        "https://google.com/maps?q={},{}",
        coords.latitude, coords.longitude
    )
}

/// Frame encoding used on a WebSocket: text frames carry JSON, binary frames bincode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Bincode,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary frame: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("JSON frame is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl WireFormat {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            WireFormat::Json => Ok(serde_json::to_vec(value)?),
            WireFormat::Bincode => Ok(bincode::serialize(value)?),
        }
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T, CodecError> {
        match self {
            WireFormat::Json => Ok(serde_json::from_slice(data)?),
            WireFormat::Bincode => Ok(bincode::deserialize(data)?),
        }
    }

    /// Encodes for a text frame. Only valid for `Json`; bincode output is
    /// rejected as non UTF-8.
    pub fn encode_text<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(String::from_utf8(self.encode(value)?)?)
    }
}

//! # Chat Client Library
//!
//! Terminal client for the room-scoped chat relay. The library half is what
//! the binary and the workspace integration tests drive.
//!
//! ### Input Module (`input`)
//! Parses typed lines into chat events: plain text becomes a message,
//! `/location <lat> <lng>` shares a position, `/help` and `/quit` control the
//! session.
//!
//! ### Network Module (`network`)
//! `ChatClient` wraps the WebSocket connection:
//! - JSON text frames or bincode binary frames
//! - Acknowledgment ids for every request that expects a reply
//! - Waiting on a specific acknowledgment while buffering other traffic
//!
//! ### Rendering Module (`rendering`)
//! Formats server packets as terminal lines with a 12-hour UTC clock.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chat_client::network::ChatClient;
//! use chat_shared::WireFormat;
//!
//! # async fn demo() -> Result<(), chat_client::network::ClientError> {
//! let mut client = ChatClient::connect("ws://127.0.0.1:3000", WireFormat::Json).await?;
//! let ack = client.join("alice", "general").await?;
//! let (outcome, _welcome) = client.wait_for_ack(ack).await?;
//! assert!(outcome.is_ok());
//!
//! client.send_message("hello").await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod input;
pub mod network;
pub mod rendering;

//! # Chat Relay Server Library
//!
//! This library provides the server side of a room-scoped, real-time chat
//! relay. Clients connect over WebSocket, join a named room under a display
//! name, exchange text and location messages with that room, and are told
//! whenever someone joins or leaves.
//!
//! ## Module Organization
//!
//! ### Session Registry Module (`session_registry`)
//! The single piece of shared mutable state:
//! - Active sessions keyed by connection identifier
//! - Room index listing members of each room in join order
//! - Per-room username uniqueness after trimming and case-folding
//!
//! ### Router Module (`router`)
//! Per-connection state machine (`Connected` → `Joined` → `Disconnected`):
//! - Validates `join`, `sendMessage`, `sendLocation` and `disconnect`
//! - Tags each notification with a fan-out target and resolves it while the
//!   registry lock is held
//! - Returns the acknowledgment for the originating connection
//!
//! ### Network Module (`network`)
//! WebSocket transport:
//! - Accept loop assigning connection identifiers
//! - Per-connection reader and writer tasks
//! - JSON text frames and bincode binary frames
//!
//! ### Profanity Module (`profanity`)
//! Word-list filter consulted before chat messages are broadcast.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chat_server::network::Server;
//! use chat_server::profanity::WordListFilter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:3000", Box::new(WordListFilter::new())).await?;
//!
//!     // Runs until Ctrl+C, then drops every session
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Delivery Semantics
//!
//! Outbound notifications are fire-and-forget. Each peer has its own unbounded
//! queue drained by a dedicated writer task, so a slow or vanished peer never
//! holds up delivery to the rest of its room. Nothing is persisted: the
//! registry lives only as long as the server.

pub mod error;
pub mod network;
pub mod profanity;
pub mod router;
pub mod session_registry;

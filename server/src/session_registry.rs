//! Session tracking and room membership for the chat server
//!
//! This module owns the only shared mutable state of the relay:
//! - The table of active sessions keyed by connection identifier
//! - The room index grouping those sessions by room in join order
//! - Username uniqueness within each room
//!
//! Both tables are mutated together inside `&mut self` calls, so any holder
//! of the registry lock sees them in agreement.

use crate::error::ChatError;
use chat_shared::{ConnectionId, RoomData, RosterEntry};
use log::info;
use std::collections::HashMap;

/// A joined connection bound to a display name and a room
///
/// Sessions are immutable once created: changing name or room means
/// disconnecting and joining again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Connection identifier assigned by the transport
    pub id: ConnectionId,
    /// Display name, trimmed but with its original casing
    pub username: String,
    /// Normalized room name
    pub room: String,
}

/// Comparison key for usernames: trimmed and lower-cased
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Canonical room name: trimmed and lower-cased
pub fn normalize_room(room: &str) -> String {
    room.trim().to_lowercase()
}

/// In-memory registry of sessions with an embedded room index
///
/// The room index maps each non-empty room to its members' connection ids
/// in the order they joined. A room whose last member leaves is dropped
/// from the index rather than kept as an empty list.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Active sessions indexed by connection id
    sessions: HashMap<ConnectionId, Session>,
    /// Room name to member ids, oldest first
    rooms: HashMap<String, Vec<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and inserts a new session
    ///
    /// Fails with `Validation` when the username or room is blank, with
    /// `DuplicateName` when the room already has a member whose normalized
    /// name matches, and with `AlreadyJoined` when the connection already
    /// holds a session. On success the session is appended to its room.
    pub fn add_user(
        &mut self,
        id: ConnectionId,
        username: &str,
        room: &str,
    ) -> Result<Session, ChatError> {
        let username = username.trim();
        let room = normalize_room(room);

        if username.is_empty() || room.is_empty() {
            return Err(ChatError::Validation);
        }

        if self.sessions.contains_key(&id) {
            return Err(ChatError::AlreadyJoined);
        }

        let name_key = normalize_username(username);
        let taken = self
            .rooms
            .get(&room)
            .into_iter()
            .flatten()
            .filter_map(|member| self.sessions.get(member))
            .any(|session| normalize_username(&session.username) == name_key);

        if taken {
            return Err(ChatError::DuplicateName);
        }

        let session = Session {
            id,
            username: username.to_string(),
            room: room.clone(),
        };

        info!("{} joined room {} on connection {}", username, room, id);
        self.sessions.insert(id, session.clone());
        self.rooms.entry(room).or_default().push(id);

        Ok(session)
    }

    /// Removes the session bound to a connection
    ///
    /// Returns `None` for ids that were never added or are already gone.
    /// Drops the room from the index when it becomes empty.
    pub fn remove_user(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;

        if let Some(members) = self.rooms.get_mut(&session.room) {
            members.retain(|member| *member != id);
            if members.is_empty() {
                self.rooms.remove(&session.room);
            }
        }

        info!("{} left room {}", session.username, session.room);
        Some(session)
    }

    pub fn get_user(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Members of a room in join order; empty for unknown rooms
    pub fn get_users_in_room(&self, room: &str) -> Vec<Session> {
        self.rooms
            .get(&normalize_room(room))
            .into_iter()
            .flatten()
            .filter_map(|id| self.sessions.get(id))
            .cloned()
            .collect()
    }

    /// Member ids of a room in join order
    pub fn member_ids(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(&normalize_room(room))
            .cloned()
            .unwrap_or_default()
    }

    /// Roster payload for a room
    pub fn roster(&self, room: &str) -> RoomData {
        RoomData {
            room: normalize_room(room),
            users: self
                .get_users_in_room(room)
                .into_iter()
                .map(|session| RosterEntry {
                    id: session.id,
                    username: session.username,
                })
                .collect(),
        }
    }

    /// Returns the number of active sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns the number of rooms with at least one member
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drops every session, returning how many were active
    pub fn clear(&mut self) -> usize {
        let dropped = self.sessions.len();
        self.sessions.clear();
        self.rooms.clear();
        dropped
    }
}

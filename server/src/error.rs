//! Errors reported back to the connection that raised an event.
//!
//! None of these are fatal and none are broadcast: the router hands them to
//! the transport, which sends them only through the originator's acknowledgment.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Username or room empty after trimming.
    #[error("Username and room are required!")]
    Validation,

    /// Another session in the target room already uses this name.
    #[error("Username is in use!")]
    DuplicateName,

    /// Message rejected by the profanity filter.
    #[error("Profanity is not allowed!")]
    Profanity,

    /// A second join on a connection that already holds a session.
    #[error("Already joined a room")]
    AlreadyJoined,

    /// Message or location sent before a successful join.
    #[error("Join a room first")]
    NotJoined,
}

impl ChatError {
    /// Machine-readable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::DuplicateName => "duplicate_name",
            Self::Profanity => "profanity",
            Self::AlreadyJoined => "already_joined",
            Self::NotJoined => "not_joined",
        }
    }
}

//! Turns terminal input lines into chat commands

use chat_shared::{ClientEvent, Coordinates};
use thiserror::Error;

pub const HELP_TEXT: &str = "Commands:
  <text>                 send a message to the room
  /location <lat> <lng>  share a location
  /help                  show this help
  /quit                  leave the room and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event(ClientEvent),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("unknown command: {0} (try /help)")]
    UnknownCommand(String),
}

/// Parses one line typed by the user
///
/// Blank lines yield `Ok(None)`. Anything not starting with `/` is a chat
/// message sent verbatim.
pub fn parse_line(line: &str) -> Result<Option<Command>, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Event(ClientEvent::SendMessage {
            text: line.trim_end_matches(['\r', '\n']).to_string(),
        })));
    };

    let mut parts = rest.split_whitespace();
    match parts.next().unwrap_or_default() {
        "quit" | "exit" => Ok(Some(Command::Quit)),
        "help" => Ok(Some(Command::Help)),
        "location" | "loc" => {
            let usage = "/location <latitude> <longitude>";
            let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(InputError::Usage(usage));
            };
            let coords = Coordinates {
                latitude: parse_coordinate(lat, 90.0)?,
                longitude: parse_coordinate(lng, 180.0)?,
            };
            Ok(Some(Command::Event(ClientEvent::SendLocation { coords })))
        }
        other => Err(InputError::UnknownCommand(format!("/{}", other))),
    }
}

fn parse_coordinate(value: &str, limit: f64) -> Result<f64, InputError> {
    match value.trim_end_matches(',').parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Ok(v),
        _ => Err(InputError::InvalidCoordinate(value.to_string())),
    }
}

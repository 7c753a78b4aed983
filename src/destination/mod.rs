//! Destination normalization
//!
//! Maps the raw `chatId` value from an upload form (or the configured default)
//! onto the identifier Telegram expects: a numeric chat id such as `-100123`
//! or an `@username` handle.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Destination errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("Chat ID cannot be empty")]
    EmptyDestination,

    #[error("Invalid username format. Username cannot be empty")]
    EmptyUsername,
}

/// A normalized Telegram destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Numeric chat id (digits with optional `-`)
    ChatId(String),
    /// `@`-prefixed username handle
    Username(String),
}

impl Destination {
    /// Normalize a raw destination string.
    ///
    /// Surrounding whitespace is dropped, repeated leading `@` collapse to a
    /// single one, and anything that is not purely digits and `-` is treated
    /// as a username and gets an `@` prefix.
    pub fn normalize(raw: &str) -> Result<Self, DestinationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DestinationError::EmptyDestination);
        }

        if trimmed.starts_with('@') {
            let username = trimmed.trim_start_matches('@').trim();
            if username.is_empty() {
                return Err(DestinationError::EmptyUsername);
            }
            return Ok(Destination::Username(format!("@{}", username)));
        }

        if trimmed.chars().all(|c| c.is_ascii_digit() || c == '-') {
            Ok(Destination::ChatId(trimmed.to_string()))
        } else {
            Ok(Destination::Username(format!("@{}", trimmed)))
        }
    }

    /// The value sent as `chat_id` to the Bot API
    pub fn as_str(&self) -> &str {
        match self {
            Destination::ChatId(id) => id,
            Destination::Username(name) => name,
        }
    }

    pub fn is_username(&self) -> bool {
        matches!(self, Destination::Username(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

//! Screen names claimed by connected clients.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::error::{DomainError, DomainResult};

/// Maximum length of a screen name in bytes.
pub const MAX_SCREEN_NAME_LEN: usize = 64;

/// A validated, human-readable identifier a client claims before chatting.
///
/// Names are non-empty, at most [`MAX_SCREEN_NAME_LEN`] bytes, and contain no
/// whitespace. The whitespace rule keeps every name addressable by the
/// space-delimited `PM <name> <body>` command and unambiguous inside the
/// space-joined `GET_USERS` roster.
///
/// Uniqueness is not a property of the value itself; it is enforced by the
/// server's registry at claim time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenName(String);

impl ScreenName {
    /// Validates a candidate name as read from the client.
    ///
    /// A single trailing `\r` (telnet-style line ending) is not part of the name
    /// and must be stripped by the caller's line decoder before this is called.
    pub fn parse(candidate: &str) -> DomainResult<Self> {
        if candidate.is_empty() {
            return Err(DomainError::EmptyName);
        }
        if candidate.len() > MAX_SCREEN_NAME_LEN {
            return Err(DomainError::NameTooLong {
                len: candidate.len(),
                max: MAX_SCREEN_NAME_LEN,
            });
        }
        if candidate.chars().any(char::is_whitespace) {
            return Err(DomainError::NameContainsWhitespace {
                name: candidate.to_string(),
            });
        }
        Ok(Self(candidate.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ScreenName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Borrow<str> for ScreenName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ScreenName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

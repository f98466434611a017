//! Protocol decoding errors.

use chat_core::DomainError;
use thiserror::Error;

/// Errors produced when decoding a server line.
///
/// Client lines never fail to decode: anything that is not a recognized
/// command is chat text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("Missing payload for {tag}")]
    MissingPayload { tag: &'static str },

    #[error("Malformed {tag} payload: {payload:?}")]
    MalformedPayload { tag: &'static str, payload: String },

    #[error("Invalid screen name: {0}")]
    InvalidName(#[from] DomainError),
}

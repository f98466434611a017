//! Server→client protocol lines.

use std::fmt;

use chat_core::ScreenName;

use crate::error::ProtocolError;
use crate::tag::Tag;

/// Marker placed after the sender's name on privately delivered messages.
const PRIVATE_MARKER: &str = " (private)";

/// A line sent from the server to a client.
///
/// Rendering via [`fmt::Display`] produces the line without its terminating
/// newline; the writer appends `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// `SUBMIT_NAME`
    SubmitName,

    /// `NAME_ACCEPTED`
    NameAccepted,

    /// `MESSAGE <from>: <body>`
    Chat { from: ScreenName, body: String },

    /// `MESSAGE [<text>]`
    Notice(String),

    /// `MESSAGE <from> (private): <body>`
    Private { from: ScreenName, body: String },

    /// `GET_USERS <name> <name> ...`
    Roster(Vec<ScreenName>),
}

impl ServerLine {
    /// Creates a chat line attributed to `from`.
    pub fn chat(from: &ScreenName, body: impl Into<String>) -> Self {
        Self::Chat {
            from: from.clone(),
            body: body.into(),
        }
    }

    /// Creates a privately delivered message from `from`.
    pub fn private(from: &ScreenName, body: impl Into<String>) -> Self {
        Self::Private {
            from: from.clone(),
            body: body.into(),
        }
    }

    /// Creates a system notice.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice(text.into())
    }

    /// Notice broadcast when a client completes name negotiation.
    pub fn entered(name: &ScreenName) -> Self {
        Self::Notice(format!("{name} entered the room"))
    }

    /// Notice broadcast when a client says `GOODBYE`.
    pub fn left(name: &ScreenName) -> Self {
        Self::Notice(format!("{name} left the room"))
    }

    /// Creates a roster response from any collection of names.
    pub fn roster<I>(names: I) -> Self
    where
        I: IntoIterator<Item = ScreenName>,
    {
        Self::Roster(names.into_iter().collect())
    }

    /// Returns the tag that opens this line.
    pub fn tag(&self) -> Tag {
        match self {
            Self::SubmitName => Tag::SubmitName,
            Self::NameAccepted => Tag::NameAccepted,
            Self::Chat { .. } | Self::Notice(_) | Self::Private { .. } => Tag::Message,
            Self::Roster(_) => Tag::GetUsers,
        }
    }

    /// Decodes a server line, as a client would.
    ///
    /// The input must not include the line terminator.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line.is_empty() {
            return Err(ProtocolError::EmptyLine);
        }

        let (word, payload) = match line.split_once(' ') {
            Some((word, payload)) => (word, Some(payload)),
            None => (line, None),
        };

        match Tag::from_wire(word) {
            Some(Tag::SubmitName) if payload.is_none() => Ok(Self::SubmitName),
            Some(Tag::NameAccepted) if payload.is_none() => Ok(Self::NameAccepted),
            Some(tag @ (Tag::SubmitName | Tag::NameAccepted)) => {
                Err(ProtocolError::MalformedPayload {
                    tag: tag.as_str(),
                    payload: payload.unwrap_or_default().to_string(),
                })
            }
            Some(Tag::Message) => {
                let payload = payload.ok_or(ProtocolError::MissingPayload {
                    tag: Tag::Message.as_str(),
                })?;
                parse_message_payload(payload)
            }
            Some(Tag::GetUsers) => {
                let names = payload
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(ScreenName::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Roster(names))
            }
            Some(Tag::Goodbye | Tag::Pm) | None => Err(ProtocolError::UnknownTag(word.to_string())),
        }
    }
}

fn parse_message_payload(payload: &str) -> Result<ServerLine, ProtocolError> {
    if let Some(text) = payload
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return Ok(ServerLine::Notice(text.to_string()));
    }

    let (head, body) = payload
        .split_once(": ")
        .ok_or_else(|| ProtocolError::MalformedPayload {
            tag: Tag::Message.as_str(),
            payload: payload.to_string(),
        })?;

    match head.strip_suffix(PRIVATE_MARKER) {
        Some(from) => Ok(ServerLine::Private {
            from: ScreenName::parse(from)?,
            body: body.to_string(),
        }),
        None => Ok(ServerLine::Chat {
            from: ScreenName::parse(head)?,
            body: body.to_string(),
        }),
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        match self {
            Self::SubmitName | Self::NameAccepted => write!(f, "{tag}"),
            Self::Chat { from, body } => write!(f, "{tag} {from}: {body}"),
            Self::Notice(text) => write!(f, "{tag} [{text}]"),
            Self::Private { from, body } => write!(f, "{tag} {from}{PRIVATE_MARKER}: {body}"),
            Self::Roster(names) => {
                write!(f, "{tag}")?;
                for name in names {
                    write!(f, " {name}")?;
                }
                Ok(())
            }
        }
    }
}

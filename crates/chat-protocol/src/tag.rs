//! Protocol tags.

use std::fmt;

/// The fixed words that open a protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// server→client: request a screen name
    SubmitName,
    /// server→client: the submitted name was claimed
    NameAccepted,
    /// server→client: chat line, system notice or private message
    Message,
    /// client→server: graceful disconnect
    Goodbye,
    /// client→server: private message
    Pm,
    /// both directions: roster request / roster response
    GetUsers,
}

impl Tag {
    pub const ALL: [Tag; 6] = [
        Tag::SubmitName,
        Tag::NameAccepted,
        Tag::Message,
        Tag::Goodbye,
        Tag::Pm,
        Tag::GetUsers,
    ];

    /// Returns the on-wire spelling of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::SubmitName => "SUBMIT_NAME",
            Tag::NameAccepted => "NAME_ACCEPTED",
            Tag::Message => "MESSAGE",
            Tag::Goodbye => "GOODBYE",
            Tag::Pm => "PM",
            Tag::GetUsers => "GET_USERS",
        }
    }

    /// Looks up a tag by its exact on-wire spelling.
    pub fn from_wire(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == word)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

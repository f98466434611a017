//! Decoding client→server lines.
//!
//! Client lines never fail to decode. A line is checked against the command
//! forms in a fixed order and anything that matches none of them is chat:
//!
//! 1. exactly `GOODBYE`
//! 2. `PM <target> <body>` (target is the first space-delimited word)
//! 3. any line beginning with `GET_USERS`
//! 4. everything else, including a bare `PM` or `PM <target>` with no body

use crate::tag::Tag;

/// A decoded line from an active client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Graceful disconnect request.
    Goodbye,

    /// Private message for one named recipient.
    ///
    /// `target` is kept as raw text: a target that is not a valid screen
    /// name simply never resolves to a recipient.
    Private { target: String, body: String },

    /// Roster request.
    ListUsers,

    /// Plain chat text to broadcast.
    Chat(String),
}

impl ClientCommand {
    /// Decodes one line (without its terminator).
    pub fn parse(line: &str) -> Self {
        if line == Tag::Goodbye.as_str() {
            return Self::Goodbye;
        }

        if let Some((target, body)) = line
            .strip_prefix(Tag::Pm.as_str())
            .and_then(|rest| rest.strip_prefix(' '))
            .and_then(|rest| rest.split_once(' '))
        {
            if !target.is_empty() {
                return Self::Private {
                    target: target.to_string(),
                    body: body.to_string(),
                };
            }
        }

        if line.starts_with(Tag::GetUsers.as_str()) {
            return Self::ListUsers;
        }

        Self::Chat(line.to_string())
    }
}

/// Strips a trailing `\n` and then a trailing `\r` from a raw line.
///
/// Works on bytes so a line can be measured before it is decoded.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goodbye_must_match_exactly() {
        assert_eq!(ClientCommand::parse("GOODBYE"), ClientCommand::Goodbye);
        assert_eq!(
            ClientCommand::parse("GOODBYE everyone"),
            ClientCommand::Chat("GOODBYE everyone".to_string())
        );
        assert_eq!(
            ClientCommand::parse("goodbye"),
            ClientCommand::Chat("goodbye".to_string())
        );
    }

    #[test]
    fn test_private_message() {
        assert_eq!(
            ClientCommand::parse("PM bob hello there"),
            ClientCommand::Private {
                target: "bob".to_string(),
                body: "hello there".to_string(),
            }
        );
    }

    #[test]
    fn test_private_message_with_empty_body() {
        assert_eq!(
            ClientCommand::parse("PM bob "),
            ClientCommand::Private {
                target: "bob".to_string(),
                body: String::new(),
            }
        );
    }

    #[test]
    fn test_incomplete_pm_is_chat() {
        for line in ["PM", "PM bob", "PM  hello", "PMbob hi"] {
            assert_eq!(
                ClientCommand::parse(line),
                ClientCommand::Chat(line.to_string()),
                "line {line:?}"
            );
        }
    }

    #[test]
    fn test_get_users_prefix() {
        assert_eq!(ClientCommand::parse("GET_USERS"), ClientCommand::ListUsers);
        assert_eq!(ClientCommand::parse("GET_USERS now"), ClientCommand::ListUsers);
    }

    #[test]
    fn test_everything_else_is_chat() {
        assert_eq!(
            ClientCommand::parse("hello world"),
            ClientCommand::Chat("hello world".to_string())
        );
        assert_eq!(ClientCommand::parse(""), ClientCommand::Chat(String::new()));
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"hi\r\n"), b"hi");
        assert_eq!(strip_line_ending(b"hi\n"), b"hi");
        assert_eq!(strip_line_ending(b"hi"), b"hi");
        assert_eq!(strip_line_ending(b"hi\r"), b"hi");
        assert_eq!(strip_line_ending(b"\n"), b"");
        assert_eq!(strip_line_ending(b"caf\xe9\n"), b"caf\xe9");
    }
}

//! Chat Protocol - Line-oriented wire protocol
//!
//! Every message is one UTF-8 text line terminated by `\n`; bytes from a
//! client that are not valid UTF-8 are decoded lossily. Server lines
//! start with a tag (`SUBMIT_NAME`, `NAME_ACCEPTED`, `MESSAGE`, `GET_USERS`);
//! client lines are free text, optionally starting with a command tag
//! (`GOODBYE`, `PM`, `GET_USERS`).
//!
//! - `message` - server→client lines ([`ServerLine`])
//! - `parse` - client→server commands ([`ClientCommand`])

pub mod error;
pub mod message;
pub mod parse;
pub mod tag;

pub use error::ProtocolError;
pub use message::ServerLine;
pub use parse::{strip_line_ending, ClientCommand};
pub use tag::Tag;

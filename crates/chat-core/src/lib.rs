//! Chat Core - Shared domain types for the simplechat server
//!
//! This crate provides the identity types shared between the wire
//! protocol (chat-protocol) and the server (chatd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod client;
pub mod error;
pub mod name;

pub use client::ClientId;
pub use error::{DomainError, DomainResult};
pub use name::{ScreenName, MAX_SCREEN_NAME_LEN};

//! Chat Daemon - Name registry, sessions and broadcast server
//!
//! This crate provides the server side of simplechat:
//! - `registry` - Registry actor owning the screen name → outbound channel table
//! - `dispatch` - Broadcast, private delivery and roster listing on top of the registry
//! - `outbound` - Bounded per-client queues and the writer task draining them
//! - `server` - TCP listener and the per-connection session state machine
//! - `config` - Server configuration (defaults, TOML file, overrides)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         chatd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   ChatServer    │     │       RegistryActor         │    │
//! │  │  (TcpListener)  │     │ (name → outbound channel)   │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │ accept                      │ claim/release     │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐    │
//! │  │    Session      │────▶│        Dispatcher           │    │
//! │  │  (per client)   │     │ (broadcast / PM / roster)   │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │ own replies                 │ try_send          │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │   bounded outbound queue → writer task → socket     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod dispatch;
pub mod outbound;
pub mod registry;
pub mod server;

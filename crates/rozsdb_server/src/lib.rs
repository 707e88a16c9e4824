//! # RozsDB Server
//!
//! TCP front end for the RozsDB engine.
//!
//! This crate provides:
//! - Length-prefixed JSON framing ([`protocol`])
//! - Per-connection address checks and per-request credential checks
//! - Dispatch of `connection`, `insertorupdate`, `find`, `findall`,
//!   `findbyid`, `delete` and `close` to the engine
//!
//! # Connection lifecycle
//!
//! 1. The peer address is checked against the allow list. A rejected peer
//!    receives one error envelope and the socket is closed.
//! 2. If the client limit is reached the peer receives `Server is full`
//!    and the socket is closed.
//! 3. Otherwise frames are read and answered in order until the peer
//!    disconnects or sends a malformed frame.
//!
//! Failed authentication or authorization answers with an error envelope
//! and keeps the connection open.
//!
//! # Payloads
//!
//! Documents travel as base64 of their compressed frame. Multi-document
//! replies are formatted as `[b64, b64, ...]`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
pub mod protocol;
mod server;

pub use auth::{Authorizer, IpAllowList, IpGate, Permission, UserPermission, UserRegistry};
pub use config::{ServerConfig, ServerSettings, DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler, CLOSED, CONNECTED, DELETED};
pub use protocol::{Action, Request, Response, Status};
pub use server::RozsServer;

//! Rallypoint Channels - Chat Transports
//!
//! This crate provides the two messaging subsystems that share the chat UI:
//! - Real-time: one WebSocket per session with an explicit connection state
//!   machine and reconnect policy, pumping frames into the core router
//! - Polling: the legacy request/response chat path (its own wire model,
//!   periodic wholesale refresh)
//!
//! Both hide behind the [`ChatTransport`] trait and are routed per group by
//! a [`ChatSession`] — one explicit owner per authenticated user, no
//! module-level globals.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod polling;
pub mod realtime;
pub mod session;
pub mod transport;

pub use config::{PollingConfig, RealtimeConfig, ReconnectConfig};
pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use polling::{GroupChatApi, HttpGroupChatApi, PolledGroup, PolledMessage, PollingChannel};
pub use realtime::RealtimeChannel;
pub use session::ChatSession;
pub use transport::{ChatTransport, SendOutcome, TransportEvent, TransportKind};

//! Rallypoint Core - Group Messaging Model and Routing
//!
//! This crate holds the transport-independent heart of the Rallypoint
//! coordination chat:
//! - Model: messages and groups, as they appear on every surface
//! - Protocol: the socket wire format (chat payloads vs. control frames)
//! - Router: append-only message log with a broadcast subscriber set
//! - Registry: the client-side catalog of chat groups
//! - Compose: the shared compose buffer that typing and dictation write to
//!
//! Transports (real-time socket, legacy polling) live in
//! `rallypoint-channels` and plug in through the [`FrameSink`] seam.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compose;
pub mod error;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod transport;

pub use compose::ComposeBuffer;
pub use error::{Error, Result};
pub use model::{ChatMessage, Group};
pub use protocol::{ControlFrame, Frame};
pub use registry::GroupRegistry;
pub use router::MessageRouter;
pub use transport::FrameSink;

//! The common face of the two chat subsystems.
//!
//! Real-time and polling model groups and messages independently; callers
//! should not have to know which one serves a given group. This trait is the
//! seam that makes that true.

use async_trait::async_trait;
use tokio::sync::broadcast;

use rallypoint_core::ChatMessage;

use crate::error::Result;

/// Which messaging subsystem serves a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Socket delivery through the router
    Realtime,
    /// Legacy request/response with periodic refresh
    Polling,
}

impl TransportKind {
    /// String form for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Polling => "polling",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a send attempt under at-most-once semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to an open transport (or accepted by the backend)
    Sent,
    /// Dropped: transport not open, or nothing to send
    Dropped,
}

/// Event fanned out to UI subscribers by either channel.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Real-time delivery appended one message (polling send echoes too)
    Message(ChatMessage),
    /// Polling refresh replaced a group's snapshot
    Refreshed {
        /// Group whose snapshot changed
        group_id: String,
    },
    /// Local, dismissible failure; the channel keeps running
    Error {
        /// Human-readable description
        detail: String,
    },
}

/// A chat subsystem, as seen by UI code.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Which subsystem this is.
    fn kind(&self) -> TransportKind;

    /// Send a message into a group.
    ///
    /// Whitespace-only text is never transmitted ([`SendOutcome::Dropped`]).
    async fn send(&self, group_id: &str, sender: &str, text: &str) -> Result<SendOutcome>;

    /// Subscribe to this channel's events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// The current thread view for a group, in display order.
    async fn messages(&self, group_id: &str) -> Vec<ChatMessage>;
}

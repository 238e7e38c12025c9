//! Transport seam used by the router and registry.

use async_trait::async_trait;

/// Outbound frame sink with at-most-once semantics.
///
/// Implementations transmit only while the underlying transport is open;
/// otherwise the payload is dropped and `false` is returned. Nothing is
/// queued and no error is raised — coordination messages are best-effort,
/// an accepted product trade-off recorded in DESIGN.md.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Attempt to transmit a serialized frame.
    ///
    /// Returns `true` if the payload was handed to an open transport.
    async fn send_frame(&self, payload: String) -> bool;

    /// Whether the transport is currently open.
    fn is_open(&self) -> bool;
}

//! MessageRouter - typed inbound routing and the in-memory message log.
//!
//! The router turns raw socket payloads into typed frames, keeps one
//! append-only log for the whole session, and fans delivered messages out to
//! a broadcast subscriber set so independently mounted views never fight
//! over a single callback slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::model::ChatMessage;
use crate::protocol::{ControlFrame, Frame};
use crate::transport::FrameSink;

/// Default broadcast capacity; slow subscribers lag rather than block.
const DEFAULT_CAPACITY: usize = 256;

/// Routes inbound frames and holds the session-wide message log.
///
/// The log is never partitioned physically by group — thread views filter it
/// at read time with [`MessageRouter::messages_for`]. It only grows; nothing
/// in this core edits or deletes a delivered message.
pub struct MessageRouter {
    sink: Arc<dyn FrameSink>,
    log: RwLock<Vec<ChatMessage>>,
    events: broadcast::Sender<ChatMessage>,
    malformed: AtomicU64,
}

impl MessageRouter {
    /// Create a router sending through the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self::with_capacity(sink, DEFAULT_CAPACITY)
    }

    /// Create a router with an explicit subscriber buffer capacity.
    #[must_use]
    pub fn with_capacity(sink: Arc<dyn FrameSink>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            sink,
            log: RwLock::new(Vec::new()),
            events,
            malformed: AtomicU64::new(0),
        }
    }

    /// Subscribe to delivered messages.
    ///
    /// Every subscriber gets an independent copy of each delivery; a
    /// subscriber that falls behind by more than the buffer capacity
    /// observes a lag, not a stall of the router.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.events.subscribe()
    }

    /// Ingest one raw inbound payload.
    ///
    /// Chat frames are appended to the log and fanned out. Control frames
    /// are handed back to the caller (the registry owns their semantics).
    /// Malformed payloads are logged, counted, and discarded — the receive
    /// loop must never die on a bad frame.
    pub fn ingest(&self, raw: &str) -> Option<ControlFrame> {
        match Frame::parse(raw) {
            Ok(Frame::Chat(msg)) => {
                self.deliver(msg);
                None
            }
            Ok(Frame::Control(ctl)) => Some(ctl),
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!("discarding inbound frame: {e}");
                None
            }
        }
    }

    /// Append a delivered message and notify subscribers.
    ///
    /// This is the only way messages enter the log; the send path performs
    /// no optimistic append (messages materialize only once the transport
    /// echoes them back through the inbound path).
    pub fn deliver(&self, message: ChatMessage) {
        if let Ok(mut log) = self.log.write() {
            log.push(message.clone());
        }
        // send() errs only when there are no subscribers, which is fine
        let _ = self.events.send(message);
    }

    /// Build and transmit a chat message.
    ///
    /// Whitespace-only text is a no-op: nothing is transmitted. Returns
    /// whether a frame was handed to an open transport; `false` means the
    /// message was dropped (at-most-once, fire-and-forget).
    pub async fn send_chat_message(&self, group_id: &str, sender: &str, text: &str) -> bool {
        if text.trim().is_empty() {
            debug!(group_id, "ignoring empty chat message");
            return false;
        }

        let message = ChatMessage::new(group_id, sender, text);
        let payload = match Frame::Chat(message).encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("chat frame encode failed: {e}");
                return false;
            }
        };

        self.sink.send_frame(payload).await
    }

    /// Thread view: all delivered messages for one group, in receipt order.
    #[must_use]
    pub fn messages_for(&self, group_id: &str) -> Vec<ChatMessage> {
        self.log
            .read()
            .map(|log| {
                log.iter()
                    .filter(|m| m.group_id == group_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total delivered messages across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    /// Whether nothing has been delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many inbound frames were discarded as malformed.
    #[must_use]
    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink that records payloads and reports an open transport.
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send_frame(&self, payload: String) -> bool {
            self.sent.lock().unwrap().push(payload);
            true
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    fn chat_raw(sender: &str, group: &str, text: &str, ts: &str) -> String {
        format!(
            r#"{{"sender":"{sender}","text":"{text}","groupId":"{group}","timestamp":"{ts}"}}"#
        )
    }

    #[tokio::test]
    async fn test_log_order_is_receipt_order_not_timestamp_order() {
        let router = MessageRouter::new(RecordingSink::new());

        // Deliberately out of timestamp order.
        router.ingest(&chat_raw("a", "grp-1", "second", "2026-08-07T12:05:00Z"));
        router.ingest(&chat_raw("b", "grp-1", "first", "2026-08-07T12:00:00Z"));
        router.ingest(&chat_raw("c", "grp-1", "third", "2026-08-07T12:10:00Z"));

        let texts: Vec<String> = router
            .messages_for("grp-1")
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["second", "first", "third"]);
    }

    #[tokio::test]
    async fn test_send_does_not_append_locally() {
        let sink = RecordingSink::new();
        let router = MessageRouter::new(sink.clone());

        assert!(router.send_chat_message("grp-1", "cmdr-1", "hi").await);

        // Transmitted, but the log stays empty until the server echoes it.
        assert_eq!(sink.sent().len(), 1);
        assert!(router.messages_for("grp-1").is_empty());
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_send_transmits_nothing() {
        let sink = RecordingSink::new();
        let router = MessageRouter::new(sink.clone());

        assert!(!router.send_chat_message("grp-1", "cmdr-1", "   ").await);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_counted_and_discarded() {
        let router = MessageRouter::new(RecordingSink::new());

        assert!(router.ingest("{garbage").is_none());
        assert!(router.ingest(r#"{"sender":"x"}"#).is_none());
        assert_eq!(router.malformed_count(), 2);
        assert!(router.is_empty());

        // The router still works afterwards.
        router.ingest(&chat_raw("a", "grp-1", "ok", "2026-08-07T12:00:00Z"));
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn test_control_frames_are_handed_back() {
        let router = MessageRouter::new(RecordingSink::new());
        let ctl = router
            .ingest(r#"{"type":"joinGroup","groupId":"grp-9","members":["a","b"]}"#)
            .expect("control frame");
        let ControlFrame::JoinGroup { group_id, members } = ctl;
        assert_eq!(group_id, "grp-9");
        assert_eq!(members.len(), 2);
        // Control frames never enter the message log.
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive_delivery() {
        let router = MessageRouter::new(RecordingSink::new());
        let mut rx1 = router.subscribe();
        let mut rx2 = router.subscribe();
        assert_eq!(router.subscriber_count(), 2);

        router.deliver(ChatMessage::new("grp-1", "a", "fan out"));

        assert_eq!(rx1.recv().await.unwrap().text, "fan out");
        assert_eq!(rx2.recv().await.unwrap().text, "fan out");
    }

    #[tokio::test]
    async fn test_messages_for_filters_by_group() {
        let router = MessageRouter::new(RecordingSink::new());
        router.deliver(ChatMessage::new("grp-1", "a", "one"));
        router.deliver(ChatMessage::new("grp-2", "b", "two"));
        router.deliver(ChatMessage::new("grp-1", "c", "three"));

        assert_eq!(router.messages_for("grp-1").len(), 2);
        assert_eq!(router.messages_for("grp-2").len(), 1);
        assert!(router.messages_for("grp-3").is_empty());
    }
}

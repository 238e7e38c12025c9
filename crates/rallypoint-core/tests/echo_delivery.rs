//! End-to-end routing through a captured transport.
//!
//! Exercises the server-echo delivery model: a sent message reaches the log
//! only after the transport hands the same payload back through the inbound
//! path, and group announcements created on one side register on the other.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rallypoint_core::{ControlFrame, FrameSink, GroupRegistry, MessageRouter};

/// Captures outbound payloads so the test can play the server's role.
struct CapturingSink {
    sent: Mutex<Vec<String>>,
}

impl CapturingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl FrameSink for CapturingSink {
    async fn send_frame(&self, payload: String) -> bool {
        self.sent.lock().unwrap().push(payload);
        true
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_message_materializes_only_after_echo() {
    let sink = CapturingSink::new();
    let router = MessageRouter::new(sink.clone());

    assert!(router.send_chat_message("grp-bridge", "cmdr-1", "hold").await);
    assert!(router.messages_for("grp-bridge").is_empty());

    // Server echoes the frame back.
    for payload in sink.drain() {
        assert!(router.ingest(&payload).is_none());
    }

    let thread = router.messages_for("grp-bridge");
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].sender, "cmdr-1");
    assert_eq!(thread[0].text, "hold");
}

#[tokio::test]
async fn test_group_created_here_registers_there() {
    let sink = CapturingSink::new();
    let creator_registry = GroupRegistry::new(sink.clone());

    let remote_sink = CapturingSink::new();
    let remote_router = MessageRouter::new(remote_sink.clone());
    let remote_registry = GroupRegistry::new(remote_sink);

    let id = creator_registry
        .create_group("Evac West", "cmdr-1", vec!["resp-2".to_string()])
        .await
        .unwrap();

    // Relay the announcement to the remote peer.
    for payload in sink.drain() {
        if let Some(ControlFrame::JoinGroup { group_id, members }) = remote_router.ingest(&payload)
        {
            remote_registry.apply_remote(&group_id, members);
        }
    }

    let group = remote_registry.get(&id).expect("announced group");
    assert_eq!(group.members, vec!["cmdr-1", "resp-2"]);

    // A relayed duplicate must not create a second entry.
    creator_registry.apply_remote(&id, vec!["cmdr-1".to_string()]);
    assert_eq!(creator_registry.len(), 1);
}

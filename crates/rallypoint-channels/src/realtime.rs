//! Real-time chat channel: socket frames in, router deliveries out.
//!
//! Owns the pump between a [`Connection`] and the core router/registry, and
//! adapts the router's broadcast into [`TransportEvent`]s so the UI can
//! subscribe to either channel the same way.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use rallypoint_core::{ChatMessage, ControlFrame, GroupRegistry, MessageRouter};

use crate::connection::Connection;
use crate::error::Result;
use crate::transport::{ChatTransport, SendOutcome, TransportEvent, TransportKind};

/// Socket-backed chat channel.
pub struct RealtimeChannel {
    connection: Arc<Connection>,
    router: Arc<MessageRouter>,
    registry: Arc<GroupRegistry>,
    events: broadcast::Sender<TransportEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RealtimeChannel {
    /// Wire a channel over an existing connection, router, and registry.
    #[must_use]
    pub fn new(
        connection: Arc<Connection>,
        router: Arc<MessageRouter>,
        registry: Arc<GroupRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            connection,
            router,
            registry,
            events,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Connect the socket and start pumping frames.
    pub fn start(&self, user_id: &str) -> Result<()> {
        let inbound = self.connection.connect(user_id)?;

        let pump = tokio::spawn(pump_frames(
            inbound,
            Arc::clone(&self.router),
            Arc::clone(&self.registry),
        ));

        // Adapt router deliveries into transport events.
        let mut deliveries = self.router.subscribe();
        let events = self.events.clone();
        let forward = tokio::spawn(async move {
            loop {
                match deliveries.recv().await {
                    Ok(message) => {
                        let _ = events.send(TransportEvent::Message(message));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "transport event forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(pump);
        tasks.push(forward);
        Ok(())
    }

    /// The connection this channel runs over.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Close the socket and detach the pumps.
    pub fn close(&self) {
        self.connection.close();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("realtime channel closed");
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Feed raw socket payloads into the router; control frames go to the
/// registry. Malformed frames are already logged and dropped by the router.
async fn pump_frames(
    mut inbound: mpsc::Receiver<String>,
    router: Arc<MessageRouter>,
    registry: Arc<GroupRegistry>,
) {
    while let Some(raw) = inbound.recv().await {
        if let Some(ControlFrame::JoinGroup { group_id, members }) = router.ingest(&raw) {
            registry.apply_remote(&group_id, members);
        }
    }
    debug!("inbound frame pump finished");
}

#[async_trait]
impl ChatTransport for RealtimeChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Realtime
    }

    async fn send(&self, group_id: &str, sender: &str, text: &str) -> Result<SendOutcome> {
        if self.router.send_chat_message(group_id, sender, text).await {
            Ok(SendOutcome::Sent)
        } else {
            Ok(SendOutcome::Dropped)
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    async fn messages(&self, group_id: &str) -> Vec<ChatMessage> {
        self.router.messages_for(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rallypoint_core::FrameSink;

    struct NullSink;

    #[async_trait]
    impl FrameSink for NullSink {
        async fn send_frame(&self, _payload: String) -> bool {
            false
        }

        fn is_open(&self) -> bool {
            false
        }
    }

    fn core_pair() -> (Arc<MessageRouter>, Arc<GroupRegistry>) {
        let sink: Arc<dyn FrameSink> = Arc::new(NullSink);
        (
            Arc::new(MessageRouter::new(Arc::clone(&sink))),
            Arc::new(GroupRegistry::new(sink)),
        )
    }

    #[tokio::test]
    async fn test_pump_routes_chat_and_control_frames() {
        let (router, registry) = core_pair();
        let (tx, rx) = mpsc::channel(8);

        let pump = tokio::spawn(pump_frames(rx, Arc::clone(&router), Arc::clone(&registry)));

        tx.send(
            r#"{"sender":"a","text":"inbound","groupId":"grp-1","timestamp":"2026-08-07T12:00:00Z"}"#
                .to_string(),
        )
        .await
        .unwrap();
        tx.send(r#"{"type":"joinGroup","groupId":"grp-new","members":["a","b"]}"#.to_string())
            .await
            .unwrap();
        tx.send("{broken".to_string()).await.unwrap();
        drop(tx);
        pump.await.unwrap();

        assert_eq!(router.messages_for("grp-1").len(), 1);
        assert!(registry.contains("grp-new"));
        assert_eq!(router.malformed_count(), 1);
    }

    #[tokio::test]
    async fn test_events_mirror_router_deliveries() {
        let (router, registry) = core_pair();
        let connection = Arc::new(Connection::new(
            crate::config::RealtimeConfig::default().with_endpoint("ws://127.0.0.1:9"),
        ));
        let channel = RealtimeChannel::new(connection, Arc::clone(&router), registry);
        channel.start("cmdr-1").unwrap();

        let mut events = channel.subscribe();
        router.deliver(ChatMessage::new("grp-1", "a", "mirrored"));

        match events.recv().await.unwrap() {
            TransportEvent::Message(msg) => assert_eq!(msg.text, "mirrored"),
            other => panic!("expected message event, got: {other:?}"),
        }
        channel.close();
    }

    #[tokio::test]
    async fn test_send_through_closed_socket_is_dropped() {
        let (router, registry) = core_pair();
        let connection = Arc::new(Connection::new(crate::config::RealtimeConfig::default()));
        let channel = RealtimeChannel::new(connection, router, registry);

        let outcome = channel.send("grp-1", "cmdr-1", "anyone there").await.unwrap();
        assert_eq!(outcome, SendOutcome::Dropped);
    }
}

//! ChatSession - the explicit owner of one user's messaging state.
//!
//! The session is constructed once per authenticated user, owns the registry
//! and both channels, and is passed down to whatever consumes them — no
//! module-level globals anywhere in the stack. Groups are routed
//! to a subsystem through a per-group table; callers never care which one is
//! in play.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::info;

use rallypoint_core::{ChatMessage, GroupRegistry};

use crate::error::Result;
use crate::polling::PollingChannel;
use crate::realtime::RealtimeChannel;
use crate::transport::{ChatTransport, SendOutcome, TransportEvent, TransportKind};

/// One user's chat session.
pub struct ChatSession {
    user_id: String,
    registry: Arc<GroupRegistry>,
    realtime: Arc<RealtimeChannel>,
    polling: Arc<PollingChannel>,
    routes: RwLock<HashMap<String, TransportKind>>,
}

impl ChatSession {
    /// Assemble a session from its parts.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        registry: Arc<GroupRegistry>,
        realtime: Arc<RealtimeChannel>,
        polling: Arc<PollingChannel>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            registry,
            realtime,
            polling,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// The authenticated user this session belongs to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The group catalog.
    #[must_use]
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    /// Connect the real-time channel.
    pub fn connect(&self) -> Result<()> {
        self.realtime.start(&self.user_id)
    }

    /// Tear the session down: socket closed, polling stopped.
    pub fn close(&self) {
        self.realtime.close();
        self.polling.clear_selection();
        info!(user_id = %self.user_id, "chat session closed");
    }

    /// Route a group to a subsystem. Unrouted groups default to real-time.
    pub fn route_group(&self, group_id: &str, kind: TransportKind) {
        if let Ok(mut routes) = self.routes.write() {
            routes.insert(group_id.to_string(), kind);
        }
        info!(group_id, transport = %kind, "group routed");
    }

    /// Which subsystem serves a group.
    #[must_use]
    pub fn kind_for(&self, group_id: &str) -> TransportKind {
        self.routes
            .read()
            .ok()
            .and_then(|routes| routes.get(group_id).copied())
            .unwrap_or(TransportKind::Realtime)
    }

    /// The transport serving a group.
    #[must_use]
    pub fn transport_for(&self, group_id: &str) -> Arc<dyn ChatTransport> {
        match self.kind_for(group_id) {
            TransportKind::Realtime => Arc::clone(&self.realtime) as Arc<dyn ChatTransport>,
            TransportKind::Polling => Arc::clone(&self.polling) as Arc<dyn ChatTransport>,
        }
    }

    /// Put a group on screen.
    ///
    /// Realtime groups need nothing (selection is pure client state);
    /// polling groups start their refresh loop, cancelling the previous one.
    pub fn select_group(&self, group_id: &str) {
        if self.kind_for(group_id) == TransportKind::Polling {
            self.polling.select_group(group_id);
        }
    }

    /// Send into a group through whichever subsystem serves it.
    pub async fn send(&self, group_id: &str, text: &str) -> Result<SendOutcome> {
        self.transport_for(group_id)
            .send(group_id, &self.user_id, text)
            .await
    }

    /// Thread view for a group.
    pub async fn messages(&self, group_id: &str) -> Vec<ChatMessage> {
        self.transport_for(group_id).messages(group_id).await
    }

    /// Subscribe to one subsystem's events.
    #[must_use]
    pub fn subscribe(&self, kind: TransportKind) -> broadcast::Receiver<TransportEvent> {
        match kind {
            TransportKind::Realtime => self.realtime.subscribe(),
            TransportKind::Polling => self.polling.subscribe(),
        }
    }

    /// Create a group in the registry and announce it over the socket.
    pub async fn create_group(
        &self,
        name: impl Into<String>,
        members: Vec<String>,
    ) -> Result<String> {
        let id = self
            .registry
            .create_group(name, &self.user_id, members)
            .await?;
        Ok(id)
    }
}

//! Legacy polling chat channel.
//!
//! A separate messaging subsystem that predates the socket path: its own
//! group/message wire model, plain request/response, and a periodic
//! wholesale refresh of whichever group is on screen. It shares UI chrome
//! with the real-time path only through [`ChatTransport`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rallypoint_core::ChatMessage;

use crate::config::PollingConfig;
use crate::error::Result;
use crate::transport::{ChatTransport, SendOutcome, TransportEvent, TransportKind};

#[cfg(test)]
use mockall::automock;

/// A member as the legacy backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolledMember {
    /// Responder id
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
}

/// Preview of the latest message in a polled group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    /// Message body
    pub text: String,
    /// Sender display name
    pub sender_name: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A group as the legacy backend models it.
///
/// Deliberately distinct from [`rallypoint_core::Group`]: the two chat
/// subsystems model groups independently and ids are not interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledGroup {
    /// Backend group id
    pub id: String,
    /// Display name
    pub name: String,
    /// Creator user id
    pub created_by: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Member records
    pub members: Vec<PolledMember>,
    /// Latest message preview, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
}

/// A message as the legacy backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolledMessage {
    /// Backend message id
    pub message_id: String,
    /// Sender user id
    pub sender_user_id: String,
    /// Message body
    pub content: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl PolledMessage {
    /// Map to the display type shared with the real-time path.
    #[must_use]
    pub fn into_chat(self, group_id: &str) -> ChatMessage {
        ChatMessage {
            sender: self.sender_user_id,
            text: self.content,
            group_id: group_id.to_string(),
            timestamp: self.created_at,
        }
    }
}

/// REST surface of the legacy chat backend (external collaborator).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GroupChatApi: Send + Sync {
    /// List the caller's chat groups.
    async fn list_groups(&self) -> Result<Vec<PolledGroup>>;

    /// Fetch a group's full message history.
    async fn fetch_messages(&self, group_id: &str) -> Result<Vec<PolledMessage>>;

    /// Create a message; the backend echoes the stored record.
    async fn post_message(&self, group_id: &str, content: &str) -> Result<PolledMessage>;
}

/// `reqwest`-backed implementation of [`GroupChatApi`].
pub struct HttpGroupChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGroupChatApi {
    /// Build a client against the configured backend.
    pub fn new(config: &PollingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl GroupChatApi for HttpGroupChatApi {
    async fn list_groups(&self) -> Result<Vec<PolledGroup>> {
        let groups = self
            .client
            .get(self.url("/chat/groups"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(groups)
    }

    async fn fetch_messages(&self, group_id: &str) -> Result<Vec<PolledMessage>> {
        let messages = self
            .client
            .get(self.url(&format!("/chat/groups/{group_id}/messages")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }

    async fn post_message(&self, group_id: &str, content: &str) -> Result<PolledMessage> {
        let message = self
            .client
            .post(self.url(&format!("/chat/groups/{group_id}/messages")))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(message)
    }
}

struct ActivePoll {
    group_id: String,
    cancel: CancellationToken,
    _worker: JoinHandle<()>,
}

/// Polling chat channel.
///
/// Selecting a group fetches its history immediately and then refreshes it
/// wholesale on a fixed period until the selection changes or the channel is
/// torn down. Switching groups cancels the previous worker *before* the new
/// one starts, so exactly one periodic fetch is ever alive.
pub struct PollingChannel {
    api: Arc<dyn GroupChatApi>,
    interval: Duration,
    events: broadcast::Sender<TransportEvent>,
    snapshots: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
    active: Mutex<Option<ActivePoll>>,
}

impl PollingChannel {
    /// Create a channel over the given backend.
    #[must_use]
    pub fn new(api: Arc<dyn GroupChatApi>, config: &PollingConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            api,
            interval: config.poll_interval(),
            events,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            active: Mutex::new(None),
        }
    }

    /// List the caller's legacy chat groups.
    pub async fn list_groups(&self) -> Result<Vec<PolledGroup>> {
        self.api.list_groups().await
    }

    /// The currently polled group, if any.
    #[must_use]
    pub fn selected_group(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|a| a.group_id.clone())
    }

    /// Select the group on screen, replacing any previous poll worker.
    pub fn select_group(&self, group_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            previous.cancel.cancel();
            debug!(group_id = %previous.group_id, "poll worker cancelled");
        }

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(poll_loop(
            Arc::clone(&self.api),
            group_id.to_string(),
            self.interval,
            Arc::clone(&self.snapshots),
            self.events.clone(),
            cancel.clone(),
        ));
        info!(group_id, "polling group");

        *active = Some(ActivePoll {
            group_id: group_id.to_string(),
            cancel,
            _worker: worker,
        });
    }

    /// Stop polling entirely (view teardown).
    pub fn clear_selection(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            previous.cancel.cancel();
            debug!(group_id = %previous.group_id, "poll worker cancelled");
        }
    }
}

impl Drop for PollingChannel {
    fn drop(&mut self) {
        self.clear_selection();
    }
}

/// Fetch immediately, then on every tick until cancelled. A failed fetch is
/// surfaced as a dismissible error and does not stop the next tick.
async fn poll_loop(
    api: Arc<dyn GroupChatApi>,
    group_id: String,
    interval: Duration,
    snapshots: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
    events: broadcast::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        match api.fetch_messages(&group_id).await {
            Ok(messages) => {
                let mapped: Vec<ChatMessage> = messages
                    .into_iter()
                    .map(|m| m.into_chat(&group_id))
                    .collect();
                if let Ok(mut snapshots) = snapshots.write() {
                    snapshots.insert(group_id.clone(), mapped);
                }
                let _ = events.send(TransportEvent::Refreshed {
                    group_id: group_id.clone(),
                });
            }
            Err(e) => {
                warn!(group_id = %group_id, "history fetch failed: {e}");
                let _ = events.send(TransportEvent::Error {
                    detail: format!("failed to load messages: {e}"),
                });
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            () = sleep(interval) => {}
        }
    }
}

#[async_trait]
impl ChatTransport for PollingChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn send(&self, group_id: &str, sender: &str, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            debug!(group_id, "ignoring empty chat message");
            return Ok(SendOutcome::Dropped);
        }
        let _ = sender; // the backend attributes the message from credentials

        // Create-and-append: unlike the socket path, the POST echo is
        // appended locally right away.
        let echoed = self.api.post_message(group_id, text).await?;
        let message = echoed.into_chat(group_id);
        if let Ok(mut snapshots) = self.snapshots.write() {
            snapshots
                .entry(group_id.to_string())
                .or_default()
                .push(message.clone());
        }
        let _ = self.events.send(TransportEvent::Message(message));
        Ok(SendOutcome::Sent)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    async fn messages(&self, group_id: &str) -> Vec<ChatMessage> {
        self.snapshots
            .read()
            .map(|s| s.get(group_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

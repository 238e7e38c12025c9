//! GroupRegistry - client-side catalog of chat groups.
//!
//! Holds the selectable groups for one session: a seeded set plus groups
//! created at UI action time. Creation announces a `joinGroup` control frame
//! over the transport; selection itself is pure client state in the
//! real-time path and triggers no network call.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::Group;
use crate::protocol::Frame;
use crate::transport::FrameSink;

/// Client-side group catalog.
pub struct GroupRegistry {
    sink: Arc<dyn FrameSink>,
    groups: RwLock<Vec<Group>>,
}

impl GroupRegistry {
    /// Create an empty registry announcing over the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            groups: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry pre-populated with seed groups.
    ///
    /// Seeds stand in for previously known groups; duplicate seed ids keep
    /// the first occurrence.
    #[must_use]
    pub fn with_seeds(sink: Arc<dyn FrameSink>, seeds: Vec<Group>) -> Self {
        let registry = Self::new(sink);
        if let Ok(mut groups) = registry.groups.write() {
            for seed in seeds {
                if !groups.iter().any(|g| g.id == seed.id) {
                    groups.push(seed);
                }
            }
        }
        registry
    }

    /// The default seed set.
    #[must_use]
    pub fn default_seeds() -> Vec<Group> {
        vec![
            Group::new(
                "grp-bridge",
                "North Bridge Sector",
                vec!["Responder-07".to_string(), "Team Lead".to_string()],
            ),
            Group::new(
                "grp-supply",
                "Supply Convoy",
                vec!["Responder-03".to_string(), "Logistics".to_string()],
            ),
        ]
    }

    /// All known groups, registry order.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.groups
            .read()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    /// Look up a group by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Group> {
        self.groups
            .read()
            .ok()
            .and_then(|g| g.iter().find(|g| g.id == id).cloned())
    }

    /// Whether a group id is known.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of known groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a client-local group and announce it over the socket.
    ///
    /// The id is generated (`grp-<millis>`), the creator is prepended to the
    /// member list, and the announcement is fire-and-forget: if the
    /// transport is closed the frame is dropped and nobody else joins — the
    /// caller is not told. Returns the new group id.
    pub async fn create_group(
        &self,
        name: impl Into<String>,
        creator: &str,
        members: Vec<String>,
    ) -> Result<String> {
        self.create_group_with_id(Group::local_id(), name, creator, members)
            .await
    }

    /// Create a group with an externally supplied id.
    ///
    /// Rejects ids already present in the registry.
    pub async fn create_group_with_id(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        creator: &str,
        members: Vec<String>,
    ) -> Result<String> {
        let id = id.into();

        let mut all_members = vec![creator.to_string()];
        all_members.extend(members.into_iter().filter(|m| m != creator));

        {
            let mut groups = self
                .groups
                .write()
                .map_err(|_| Error::Internal("group registry lock poisoned".to_string()))?;
            if groups.iter().any(|g| g.id == id) {
                return Err(Error::DuplicateGroup(id));
            }
            groups.push(Group::new(id.clone(), name, all_members.clone()));
        }
        info!(group_id = %id, members = all_members.len(), "group created");

        match Frame::join_group(id.clone(), all_members).encode() {
            Ok(payload) => {
                if !self.sink.send_frame(payload).await {
                    debug!(group_id = %id, "joinGroup announcement dropped (transport closed)");
                }
            }
            Err(e) => debug!("joinGroup encode failed: {e}"),
        }

        Ok(id)
    }

    /// Apply a remote `joinGroup` announcement.
    ///
    /// Re-announcing an existing id must not create a duplicate entry;
    /// returns whether a new group was added.
    pub fn apply_remote(&self, group_id: &str, members: Vec<String>) -> bool {
        let Ok(mut groups) = self.groups.write() else {
            return false;
        };
        if groups.iter().any(|g| g.id == group_id) {
            debug!(group_id, "ignoring joinGroup for known group");
            return false;
        }
        let name = format!("Response Group {}", groups.len() + 1);
        groups.push(Group::new(group_id, name, members));
        info!(group_id, "group announced remotely");
        true
    }
}

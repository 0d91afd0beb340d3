use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use crate::events::Participant;

/// Identity of a connected peer plus the meeting it belongs to.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub meeting_id: String,
    pub user_id: String,
    pub user_name: String,
}

/// In-memory meeting membership: meeting -> connection set, plus
/// connection -> identity. Both maps live behind one mutex so a join or
/// leave mutates them atomically; a connection id is in at most one
/// meeting's set at any time. No I/O happens here.
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    meetings: HashMap<String, HashSet<String>>,
    peers: HashMap<String, PeerEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Adds a connection to a meeting, creating the meeting entry on first
    /// join. Idempotent for the same meeting; a connection already in a
    /// different meeting is moved out of it first.
    pub fn join(&self, connection_id: &str, meeting_id: &str, user_id: &str, user_name: &str) {
        let mut inner = self.inner.lock();

        let prev_meeting = inner
            .peers
            .get(connection_id)
            .filter(|prev| prev.meeting_id != meeting_id)
            .map(|prev| prev.meeting_id.clone());
        if let Some(prev_meeting) = prev_meeting {
            Self::remove_member(&mut inner, &prev_meeting, connection_id);
        }

        inner
            .meetings
            .entry(meeting_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        inner.peers.insert(
            connection_id.to_string(),
            PeerEntry {
                meeting_id: meeting_id.to_string(),
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
            },
        );

        debug!(%connection_id, %meeting_id, %user_id, "registry join");
    }

    /// Every other connection currently in the meeting, excluding the
    /// caller. De-duplicated by construction (set membership).
    pub fn list_others(&self, connection_id: &str, meeting_id: &str) -> Vec<Participant> {
        let inner = self.inner.lock();
        let Some(members) = inner.meetings.get(meeting_id) else {
            return Vec::new();
        };

        members
            .iter()
            .filter(|cid| cid.as_str() != connection_id)
            .filter_map(|cid| {
                inner.peers.get(cid).map(|entry| Participant {
                    connection_id: cid.clone(),
                    user_id: entry.user_id.clone(),
                    user_name: entry.user_name.clone(),
                })
            })
            .collect()
    }

    /// Removes a connection from its meeting and from the identity map,
    /// deleting the meeting entry when its set becomes empty. Safe to call
    /// twice; the second call returns `None`.
    pub fn leave(&self, connection_id: &str) -> Option<(String, Participant)> {
        let mut inner = self.inner.lock();
        let entry = inner.peers.remove(connection_id)?;
        let meeting_id = entry.meeting_id.clone();
        Self::remove_member(&mut inner, &meeting_id, connection_id);

        debug!(%connection_id, %meeting_id, "registry leave");

        Some((
            meeting_id,
            Participant {
                connection_id: connection_id.to_string(),
                user_id: entry.user_id,
                user_name: entry.user_name,
            },
        ))
    }

    /// Looks up a connection's identity and meeting.
    pub fn find(&self, connection_id: &str) -> Option<PeerEntry> {
        self.inner.lock().peers.get(connection_id).cloned()
    }

    pub fn meeting_size(&self, meeting_id: &str) -> usize {
        self.inner
            .lock()
            .meetings
            .get(meeting_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().peers.len()
    }

    fn remove_member(inner: &mut RegistryInner, meeting_id: &str, connection_id: &str) {
        if let Some(members) = inner.meetings.get_mut(meeting_id) {
            members.remove(connection_id);
            if members.is_empty() {
                inner.meetings.remove(meeting_id);
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use huddle_config::IceSettings;
use tracing::{debug, info};

use crate::events::{ClientEvent, IceServer, ServerEvent};
use crate::registry::ConnectionRegistry;

/// Outbound half of the signaling transport. The relay pushes every
/// message through this seam so the state machine runs without a real
/// WebSocket in tests.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send(&self, connection_id: &str, event: &ServerEvent);
}

/// Lifecycle of one connection. Absent from the map = never joined.
/// `Left` is terminal; the same connection cannot join again.
#[derive(Debug, Clone, PartialEq)]
enum ConnectionPhase {
    Joined(String),
    Left,
}

/// Consumes connection-scoped signaling events, mutates the registry and
/// emits targeted or broadcast messages. Every operation is
/// fire-and-forget from the caller's perspective: invalid events and
/// unknown targets are dropped, never surfaced.
pub struct SignalingRelay {
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn SignalSink>,
    phases: DashMap<String, ConnectionPhase>,
    ice_servers: Vec<IceServer>,
}

impl SignalingRelay {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn SignalSink>,
        ice: &IceSettings,
    ) -> Self {
        Self {
            registry,
            sink,
            phases: DashMap::new(),
            ice_servers: build_ice_servers(ice),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Dispatches one inbound event for a connection.
    pub async fn handle(&self, connection_id: &str, event: ClientEvent) {
        match event {
            ClientEvent::JoinMeeting {
                meeting_id,
                user_id,
                user_name,
            } => {
                self.join_meeting(connection_id, &meeting_id, &user_id, &user_name)
                    .await;
            }
            ClientEvent::Offer {
                sdp,
                target_connection_id,
            } => {
                let from = connection_id.to_string();
                self.relay_to_target(
                    connection_id,
                    &target_connection_id,
                    ServerEvent::Offer {
                        sdp,
                        from_connection_id: from,
                    },
                )
                .await;
            }
            ClientEvent::Answer {
                sdp,
                target_connection_id,
            } => {
                let from = connection_id.to_string();
                self.relay_to_target(
                    connection_id,
                    &target_connection_id,
                    ServerEvent::Answer {
                        sdp,
                        from_connection_id: from,
                    },
                )
                .await;
            }
            ClientEvent::IceCandidate {
                candidate,
                target_connection_id,
            } => {
                let from = connection_id.to_string();
                self.relay_to_target(
                    connection_id,
                    &target_connection_id,
                    ServerEvent::IceCandidate {
                        candidate,
                        from_connection_id: from,
                    },
                )
                .await;
            }
            ClientEvent::ToggleAudio { enabled } => {
                self.broadcast_from(
                    connection_id,
                    ServerEvent::UserAudioToggle {
                        connection_id: connection_id.to_string(),
                        enabled,
                    },
                )
                .await;
            }
            ClientEvent::ToggleVideo { enabled } => {
                self.broadcast_from(
                    connection_id,
                    ServerEvent::UserVideoToggle {
                        connection_id: connection_id.to_string(),
                        enabled,
                    },
                )
                .await;
            }
            ClientEvent::StartScreenShare => {
                self.broadcast_from(
                    connection_id,
                    ServerEvent::UserStartedScreenShare {
                        connection_id: connection_id.to_string(),
                    },
                )
                .await;
            }
            ClientEvent::StopScreenShare => {
                self.broadcast_from(
                    connection_id,
                    ServerEvent::UserStoppedScreenShare {
                        connection_id: connection_id.to_string(),
                    },
                )
                .await;
            }
            ClientEvent::LeaveMeeting => {
                if self.joined_meeting(connection_id).is_some() {
                    self.cleanup(connection_id).await;
                    self.phases
                        .insert(connection_id.to_string(), ConnectionPhase::Left);
                }
            }
        }
    }

    /// Transport-level close. Shares the cleanup path with `leave-meeting`
    /// and additionally forgets the connection's phase. Redundant
    /// disconnects are no-ops.
    pub async fn disconnect(&self, connection_id: &str) {
        self.cleanup(connection_id).await;
        self.phases.remove(connection_id);
    }

    async fn join_meeting(
        &self,
        connection_id: &str,
        meeting_id: &str,
        user_id: &str,
        user_name: &str,
    ) {
        if self.phases.contains_key(connection_id) {
            debug!(%connection_id, %meeting_id, "join on non-fresh connection dropped");
            return;
        }

        self.registry
            .join(connection_id, meeting_id, user_id, user_name);
        self.phases.insert(
            connection_id.to_string(),
            ConnectionPhase::Joined(meeting_id.to_string()),
        );

        let others = self.registry.list_others(connection_id, meeting_id);
        info!(%connection_id, %meeting_id, peers = others.len(), "peer joined meeting");

        self.sink
            .send(
                connection_id,
                &ServerEvent::ExistingParticipants(others.clone()),
            )
            .await;
        self.sink
            .send(
                connection_id,
                &ServerEvent::IceServers {
                    ice_servers: self.ice_servers.clone(),
                },
            )
            .await;

        let joined = ServerEvent::UserJoined {
            connection_id: connection_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
        };
        for peer in &others {
            self.sink.send(&peer.connection_id, &joined).await;
        }
    }

    /// Point-to-point relay for offer/answer/ice-candidate. The target
    /// must exist and sit in the sender's meeting; anything else is
    /// dropped silently (best-effort).
    async fn relay_to_target(&self, connection_id: &str, target: &str, event: ServerEvent) {
        let Some(meeting_id) = self.joined_meeting(connection_id) else {
            debug!(%connection_id, "relay from unjoined connection dropped");
            return;
        };

        match self.registry.find(target) {
            Some(entry) if entry.meeting_id == meeting_id => {
                self.sink.send(target, &event).await;
            }
            _ => {
                debug!(%connection_id, %target, "relay target unknown or outside meeting");
            }
        }
    }

    /// Broadcast to every other member of the sender's meeting.
    async fn broadcast_from(&self, connection_id: &str, event: ServerEvent) {
        let Some(meeting_id) = self.joined_meeting(connection_id) else {
            debug!(%connection_id, "broadcast from unjoined connection dropped");
            return;
        };

        for peer in self.registry.list_others(connection_id, &meeting_id) {
            self.sink.send(&peer.connection_id, &event).await;
        }
    }

    /// Single cleanup transition for leave-meeting and disconnect.
    /// Broadcasts `user-left` only when the registry actually removed
    /// something, so a second call stays silent.
    async fn cleanup(&self, connection_id: &str) {
        let others = match self.registry.find(connection_id) {
            Some(entry) => self.registry.list_others(connection_id, &entry.meeting_id),
            None => Vec::new(),
        };

        let Some((meeting_id, removed)) = self.registry.leave(connection_id) else {
            return;
        };

        info!(%connection_id, %meeting_id, "peer left meeting");

        let left = ServerEvent::UserLeft {
            connection_id: removed.connection_id,
            user_id: removed.user_id,
            user_name: removed.user_name,
        };
        for peer in &others {
            self.sink.send(&peer.connection_id, &left).await;
        }
    }

    fn joined_meeting(&self, connection_id: &str) -> Option<String> {
        match self.phases.get(connection_id).map(|p| p.clone()) {
            Some(ConnectionPhase::Joined(meeting_id)) => Some(meeting_id),
            _ => None,
        }
    }
}

fn build_ice_servers(ice: &IceSettings) -> Vec<IceServer> {
    let mut servers = Vec::new();
    if !ice.stun_urls.is_empty() {
        servers.push(IceServer {
            urls: ice.stun_urls.clone(),
            username: None,
            credential: None,
        });
    }
    if let Some(ref turn_url) = ice.turn_url {
        servers.push(IceServer {
            urls: vec![turn_url.clone()],
            username: ice.turn_username.clone(),
            credential: ice.turn_password.clone(),
        });
    }
    servers
}

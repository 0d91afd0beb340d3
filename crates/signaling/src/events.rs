use serde::{Deserialize, Serialize};

/// One meeting member as seen by other peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: String,
    pub user_id: String,
    pub user_name: String,
}

/// An RTCIceServer entry handed to joining peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Inbound signaling events, one WebSocket frame each:
/// `{"type": "<event-name>", "data": {...}}`.
///
/// The sender's connection id is never part of the payload. The relay
/// stamps it from the connection the frame arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinMeeting {
        meeting_id: String,
        user_id: String,
        user_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Offer {
        sdp: String,
        target_connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        sdp: String,
        target_connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        candidate: serde_json::Value,
        target_connection_id: String,
    },
    ToggleAudio {
        enabled: bool,
    },
    ToggleVideo {
        enabled: bool,
    },
    StartScreenShare,
    StopScreenShare,
    LeaveMeeting,
}

/// Outbound signaling events, targeted at a single connection or
/// broadcast to the rest of a meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    ExistingParticipants(Vec<Participant>),
    #[serde(rename_all = "camelCase")]
    IceServers {
        ice_servers: Vec<IceServer>,
    },
    #[serde(rename_all = "camelCase")]
    UserJoined {
        connection_id: String,
        user_id: String,
        user_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Offer {
        sdp: String,
        from_connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        sdp: String,
        from_connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        candidate: serde_json::Value,
        from_connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserAudioToggle {
        connection_id: String,
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    UserVideoToggle {
        connection_id: String,
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    UserStartedScreenShare {
        connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserStoppedScreenShare {
        connection_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        connection_id: String,
        user_id: String,
        user_name: String,
    },
}

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::room::{AssignmentView, PlayerView, RoomView, RoundResultView, VoteView};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from an already encoded payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Channel the stream is attached to (`room:<CODE>`).
    pub channel: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever a room row is committed (phase, round, featured player).
pub struct RoomUpdatedEvent(pub RoomView);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when players join, re-join or their scores change.
pub struct PlayersUpdatedEvent {
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a new impersonation cycle is created.
pub struct AssignmentsUpdatedEvent {
    pub round_number: u32,
    pub assignments: Vec<AssignmentView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the wheel picked the next featured player.
pub struct WheelSpinEvent {
    pub hotseat_player_id: Uuid,
    pub hotseat_history: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player submitted or changed a vote.
pub struct VoteSubmittedEvent {
    pub round_number: u32,
    pub voter_id: Uuid,
    pub votes_cast: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Full vote list of the current round.
pub struct VotesUpdatedEvent {
    pub round_number: u32,
    pub votes: Vec<VoteView>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast once per resolved round.
pub struct RoundResultEvent(pub RoundResultView);

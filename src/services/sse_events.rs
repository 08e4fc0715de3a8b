use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{AssignmentEntity, PlayerEntity, RoomEntity},
    dto::{
        room::{AssignmentView, RoomView, RoundResultView, VoteView, player_views},
        sse::{
            AssignmentsUpdatedEvent, PlayersUpdatedEvent, RoomUpdatedEvent, RoundResultEvent,
            ServerEvent, VoteSubmittedEvent, VotesUpdatedEvent, WheelSpinEvent,
        },
    },
    state::{RoomHub, SharedState},
};

pub const EVENT_ROOM_UPDATED: &str = "room_updated";
pub const EVENT_PLAYERS_UPDATED: &str = "players_updated";
pub const EVENT_ASSIGNMENTS_UPDATED: &str = "assignments_updated";
pub const EVENT_WHEEL_SPIN: &str = "wheel_spin";
pub const EVENT_VOTE_SUBMITTED: &str = "vote_submitted";
pub const EVENT_VOTES_UPDATED: &str = "votes_updated";
pub const EVENT_ROUND_RESULT: &str = "round_result";

/// Broadcast the committed room row.
pub fn broadcast_room_updated(state: &SharedState, room: &RoomEntity) {
    let payload = RoomUpdatedEvent(RoomView::from(room));
    send_room_event(state, &room.code, EVENT_ROOM_UPDATED, &payload);
}

/// Broadcast the player list, ordered by join time.
pub fn broadcast_players_updated(state: &SharedState, code: &str, players: &[PlayerEntity]) {
    let payload = PlayersUpdatedEvent {
        players: player_views(players),
    };
    send_room_event(state, code, EVENT_PLAYERS_UPDATED, &payload);
}

/// Broadcast a freshly created impersonation cycle.
pub fn broadcast_assignments_updated(
    state: &SharedState,
    code: &str,
    round_number: u32,
    assignments: &[AssignmentEntity],
) {
    let payload = AssignmentsUpdatedEvent {
        round_number,
        assignments: assignments.iter().map(AssignmentView::from).collect(),
    };
    send_room_event(state, code, EVENT_ASSIGNMENTS_UPDATED, &payload);
}

/// Broadcast the featured player picked by the wheel.
pub fn broadcast_wheel_spin(state: &SharedState, room: &RoomEntity, hotseat_player_id: Uuid) {
    let payload = WheelSpinEvent {
        hotseat_player_id,
        hotseat_history: room.hotseat_history.clone(),
    };
    send_room_event(state, &room.code, EVENT_WHEEL_SPIN, &payload);
}

/// Broadcast that `voter_id` cast or changed a vote, followed by the full vote list.
pub fn broadcast_votes(
    state: &SharedState,
    code: &str,
    round_number: u32,
    voter_id: Uuid,
    votes: Vec<VoteView>,
) {
    let submitted = VoteSubmittedEvent {
        round_number,
        voter_id,
        votes_cast: votes.len(),
    };
    send_room_event(state, code, EVENT_VOTE_SUBMITTED, &submitted);

    let updated = VotesUpdatedEvent {
        round_number,
        votes,
    };
    send_room_event(state, code, EVENT_VOTES_UPDATED, &updated);
}

/// Broadcast the result of a resolved round.
pub fn broadcast_round_result(state: &SharedState, code: &str, result: &RoundResultView) {
    let payload = RoundResultEvent(result.clone());
    send_room_event(state, code, EVENT_ROUND_RESULT, &payload);
}

fn send_room_event(state: &SharedState, code: &str, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(server_event) => state
            .hub()
            .publish(&RoomHub::channel_name(code), server_event),
        Err(err) => warn!(room = %code, event, error = %err, "failed to serialize room SSE payload"),
    }
}

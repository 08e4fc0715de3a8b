//! Mode-agnostic entry points for in-game actions.
//!
//! Each operation takes the room gate, loads the room, checks the caller and
//! dispatches to the service of the room's mode.

use crate::{
    dto::room::{
        AdvanceRequest, RoomSnapshot, SessionRequest, SpinResponse, StartRequest, VoteRequest,
        VoteResponse,
    },
    error::ServiceError,
    services::{
        hotseat_service, imposter_service,
        room_service::{load_room, normalize_code, require_host, require_player},
    },
    state::{SharedState, room::GameMode},
};

/// Start the game (hotseat) or a round (deduction). Host only.
pub async fn start(
    state: &SharedState,
    code: &str,
    request: StartRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let _gate = state.lock_room(&code).await;

    let room = load_room(store.as_ref(), &code).await?;
    require_host(store.as_ref(), &room, &request.session_id).await?;

    match room.mode {
        GameMode::Hotseat => hotseat_service::start_game(state, store.as_ref(), room).await,
        GameMode::Imposter => {
            imposter_service::start_round(state, store.as_ref(), room, request.topic.as_deref())
                .await
        }
    }
}

/// Spin the wheel for the next featured player. Host only, hotseat rooms only.
pub async fn spin(
    state: &SharedState,
    code: &str,
    request: SessionRequest,
) -> Result<SpinResponse, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let _gate = state.lock_room(&code).await;

    let room = load_room(store.as_ref(), &code).await?;
    require_host(store.as_ref(), &room, &request.session_id).await?;

    hotseat_service::spin(state, store.as_ref(), room).await
}

/// Move the room to its next phase. Host only.
pub async fn advance(
    state: &SharedState,
    code: &str,
    request: AdvanceRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let _gate = state.lock_room(&code).await;

    let room = load_room(store.as_ref(), &code).await?;
    require_host(store.as_ref(), &room, &request.session_id).await?;

    let to = request.to.as_deref();
    match room.mode {
        GameMode::Hotseat => hotseat_service::advance(state, store.as_ref(), room, to).await,
        GameMode::Imposter => imposter_service::advance(state, store.as_ref(), room, to).await,
    }
}

/// Submit or replace the caller's vote for the current round.
pub async fn vote(
    state: &SharedState,
    code: &str,
    request: VoteRequest,
) -> Result<VoteResponse, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let _gate = state.lock_room(&code).await;

    let room = load_room(store.as_ref(), &code).await?;
    let voter = require_player(store.as_ref(), &room, &request.session_id).await?;

    match room.mode {
        GameMode::Hotseat => {
            hotseat_service::submit_vote(
                state,
                store.as_ref(),
                room,
                voter,
                request.target_player_id,
            )
            .await
        }
        GameMode::Imposter => {
            imposter_service::submit_vote(
                state,
                store.as_ref(),
                room,
                voter,
                request.target_player_id,
            )
            .await
        }
    }
}

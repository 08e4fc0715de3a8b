use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::room::{
        AdvanceRequest, CreateRoomRequest, JoinRoomRequest, RoomSessionResponse, RoomSnapshot,
        SecretView, SessionQuery, SessionRequest, SpinResponse, StartRequest, VoteRequest,
        VoteResponse,
    },
    error::AppError,
    services::{game_service, room_service},
    state::SharedState,
};

/// Routes handling rooms and in-game actions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/start", post(start))
        .route("/rooms/{code}/spin", post(spin))
        .route("/rooms/{code}/advance", post(advance))
        .route("/rooms/{code}/vote", post(vote))
        .route("/rooms/{code}/secret", get(secret))
}

/// Open a room; the caller becomes its host.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSessionResponse),
        (status = 400, description = "Invalid display name or session"),
        (status = 409, description = "No free room code could be allocated")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomSessionResponse>, AppError> {
    payload.validate()?;
    let created = room_service::create_room(&state, payload).await?;
    Ok(Json(created))
}

/// Current room snapshot with the derived round result when one applies.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = room_service::room_snapshot(&state, &code).await?;
    Ok(Json(snapshot))
}

/// Join a room in its lobby, or refresh the caller's row on re-join.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined", body = RoomSessionResponse),
        (status = 400, description = "Game already started or room full"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<RoomSessionResponse>, AppError> {
    payload.validate()?;
    let joined = room_service::join_room(&state, &code, payload).await?;
    Ok(Json(joined))
}

/// Start the game (hotseat) or a round (imposter).
#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "game",
    params(("code" = String, Path, description = "Room code")),
    request_body = StartRequest,
    responses(
        (status = 200, description = "Started", body = RoomSnapshot),
        (status = 400, description = "Wrong phase, player count or topic"),
        (status = 403, description = "Caller is not the host")
    )
)]
pub async fn start(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<StartRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    payload.validate()?;
    let snapshot = game_service::start(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Spin the wheel for the next hotseat player.
#[utoipa::path(
    post,
    path = "/rooms/{code}/spin",
    tag = "game",
    params(("code" = String, Path, description = "Room code")),
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Featured player selected", body = SpinResponse),
        (status = 400, description = "Wrong phase or no eligible player"),
        (status = 403, description = "Caller is not the host")
    )
)]
pub async fn spin(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<SpinResponse>, AppError> {
    payload.validate()?;
    let spun = game_service::spin(&state, &code, payload).await?;
    Ok(Json(spun))
}

/// Advance the room to its next phase.
#[utoipa::path(
    post,
    path = "/rooms/{code}/advance",
    tag = "game",
    params(("code" = String, Path, description = "Room code")),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Phase advanced", body = RoomSnapshot),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Room changed concurrently; retry")
    )
)]
pub async fn advance(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<AdvanceRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    payload.validate()?;
    let snapshot = game_service::advance(&state, &code, payload).await?;
    Ok(Json(snapshot))
}

/// Submit or replace the caller's vote.
#[utoipa::path(
    post,
    path = "/rooms/{code}/vote",
    tag = "game",
    params(("code" = String, Path, description = "Room code")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 400, description = "Not voting, self vote or unknown target"),
        (status = 404, description = "Room or player not found")
    )
)]
pub async fn vote(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    payload.validate()?;
    let recorded = game_service::vote(&state, &code, payload).await?;
    Ok(Json(recorded))
}

/// Private role and secret word of the caller.
#[utoipa::path(
    get,
    path = "/rooms/{code}/secret",
    tag = "game",
    params(("code" = String, Path, description = "Room code"), SessionQuery),
    responses(
        (status = 200, description = "Caller's private view", body = SecretView),
        (status = 404, description = "Room or player not found")
    )
)]
pub async fn secret(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SecretView>, AppError> {
    query.validate()?;
    let view = room_service::secret_view(&state, &code, &query.session_id).await?;
    Ok(Json(view))
}

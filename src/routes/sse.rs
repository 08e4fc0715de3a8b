use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Room SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found")
    )
)]
/// Stream the events of one room to a connected client.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (subscription, handshake) = sse_service::subscribe_room(&state, &code).await?;
    Ok(sse_service::to_sse_stream(subscription, handshake))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/events", get(room_stream))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the party rooms backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::room_stream,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::start,
        crate::routes::rooms::spin,
        crate::routes::rooms::advance,
        crate::routes::rooms::vote,
        crate::routes::rooms::secret,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::health::StorageHealth,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::StartRequest,
            crate::dto::room::SessionRequest,
            crate::dto::room::AdvanceRequest,
            crate::dto::room::VoteRequest,
            crate::dto::room::RoomSessionResponse,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::SpinResponse,
            crate::dto::room::VoteResponse,
            crate::dto::room::SecretView,
            crate::dto::room::RoundResultView,
            crate::dto::sse::Handshake,
            crate::dto::sse::RoomUpdatedEvent,
            crate::dto::sse::PlayersUpdatedEvent,
            crate::dto::sse::AssignmentsUpdatedEvent,
            crate::dto::sse::WheelSpinEvent,
            crate::dto::sse::VoteSubmittedEvent,
            crate::dto::sse::VotesUpdatedEvent,
            crate::dto::sse::RoundResultEvent,
            crate::state::room::GameMode,
            crate::state::room::Role,
            crate::state::room::Winner,
            crate::state::hotseat::HotseatPhase,
            crate::state::imposter::ImposterPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room creation, joining and snapshots"),
        (name = "game", description = "Host actions, votes and private views"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_room_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/rooms",
            "/rooms/{code}",
            "/rooms/{code}/join",
            "/rooms/{code}/start",
            "/rooms/{code}/spin",
            "/rooms/{code}/advance",
            "/rooms/{code}/vote",
            "/rooms/{code}/secret",
            "/rooms/{code}/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

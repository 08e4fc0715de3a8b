/// OpenAPI documentation generation.
pub mod documentation;
/// Mode-agnostic entry points for in-game actions.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Hotseat mode orchestration.
pub mod hotseat_service;
/// Deduction mode orchestration and round resolution.
pub mod imposter_service;
/// Room creation, joining and read projections.
pub mod room_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming for room subscribers.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;

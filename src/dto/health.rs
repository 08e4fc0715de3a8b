use serde::Serialize;
use utoipa::ToSchema;

/// Overall verdict of `/healthcheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Rooms can be created and played.
    Ok,
    /// No room store is usable; room requests fail with 503.
    Degraded,
}

/// State of the room store as seen by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageHealth {
    /// A store has been installed at least once.
    pub installed: bool,
    /// The last round trip to the store succeeded.
    pub reachable: bool,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether rooms are playable.
    pub status: HealthStatus,
    /// Detail behind the verdict.
    pub storage: StorageHealth,
    /// Rooms with at least one live event stream.
    pub live_rooms: usize,
}

impl HealthResponse {
    /// Derive the verdict from the store state: rooms are playable only while
    /// the store is installed, reachable and not flagged degraded.
    pub fn from_storage(storage: StorageHealth, degraded: bool, live_rooms: usize) -> Self {
        let status = if degraded || !storage.installed || !storage.reachable {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };
        Self {
            status,
            storage,
            live_rooms,
        }
    }
}

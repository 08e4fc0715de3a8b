use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageHealth},
    state::SharedState,
};

/// Probe the room store and summarize whether rooms are playable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.room_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => StorageHealth {
                installed: true,
                reachable: true,
            },
            Err(err) => {
                warn!(error = %err, "room store health check failed");
                StorageHealth {
                    installed: true,
                    reachable: false,
                }
            }
        },
        None => {
            warn!("no room store installed (degraded mode)");
            StorageHealth {
                installed: false,
                reachable: false,
            }
        }
    };

    HealthResponse::from_storage(storage, state.is_degraded(), state.hub().channel_count())
}

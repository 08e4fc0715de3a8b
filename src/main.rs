//! party-rooms-back binary entrypoint wiring REST, SSE and the room store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use party_rooms_back::{
    config::AppConfig,
    dao::room_store::InMemoryRoomStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    install_room_store(&app_state).await;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Run the MongoDB supervisor when `MONGO_URI` is set, otherwise keep rooms in memory.
#[cfg(feature = "mongo-store")]
async fn install_room_store(state: &SharedState) {
    use party_rooms_back::{
        dao::{
            room_store::{
                RoomStore,
                mongodb::{MongoConfig, MongoRoomStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    if env::var_os("MONGO_URI").is_none() {
        use_in_memory_store(state).await;
        return;
    }

    let config = match MongoConfig::from_env().await {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "invalid MongoDB configuration; falling back to in-memory rooms");
            use_in_memory_store(state).await;
            return;
        }
    };

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let config = config.clone();
        async move {
            let store = MongoRoomStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store))
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
async fn install_room_store(state: &SharedState) {
    use_in_memory_store(state).await;
}

async fn use_in_memory_store(state: &SharedState) {
    info!("rooms are kept in memory");
    state.set_room_store(Arc::new(InMemoryRoomStore::new())).await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

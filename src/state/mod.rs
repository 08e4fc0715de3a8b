pub mod hotseat;
pub mod hub;
pub mod imposter;
pub mod room;
pub mod state_machine;
pub mod transitions;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};

use crate::{config::AppConfig, dao::room_store::RoomStore, error::ServiceError};

pub use self::hub::{RoomHub, RoomSubscription};

pub type SharedState = Arc<AppState>;

type RoomGates = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Events buffered per SSE subscriber before it starts lagging.
const ROOM_CHANNEL_CAPACITY: usize = 64;

/// Central application state storing the storage handle, fan-out hub and per-room gates.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    hub: Arc<RoomHub>,
    room_gates: RoomGates,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            hub: Arc::new(RoomHub::new(ROOM_CHANNEL_CAPACITY)),
            room_gates: Arc::new(DashMap::new()),
            degraded: degraded_tx,
            config,
        })
    }

    /// Build a state with `store` already installed.
    pub async fn with_store(config: AppConfig, store: Arc<dyn RoomStore>) -> SharedState {
        let state = Self::new(config);
        state.set_room_store(store).await;
        state
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Room store usable for a request, failing while storage is degraded.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Per-room broadcast hub.
    pub fn hub(&self) -> &Arc<RoomHub> {
        &self.hub
    }

    /// Settings the state was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serialize mutating operations on one room within this process.
    ///
    /// Storage-level compare-and-swap still guards against writers in other
    /// processes; the gate keeps commit order equal to broadcast order.
    pub async fn lock_room(&self, code: &str) -> RoomGate {
        let gate = self
            .room_gates
            .entry(code.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        RoomGate {
            guard: Some(gate.lock_owned().await),
            gates: Arc::clone(&self.room_gates),
            code: code.to_owned(),
        }
    }

    /// Number of rooms with a held or awaited gate.
    pub fn room_gate_count(&self) -> usize {
        self.room_gates.len()
    }
}

/// Held gate of one room; dropping it releases the room and forgets the gate
/// once nobody else holds or waits on it.
pub struct RoomGate {
    guard: Option<OwnedMutexGuard<()>>,
    gates: RoomGates,
    code: String,
}

impl Drop for RoomGate {
    fn drop(&mut self) {
        // release first; an idle gate is then referenced by the map alone
        drop(self.guard.take());
        self.gates
            .remove_if(&self.code, |_, gate| Arc::strong_count(gate) == 1);
    }
}

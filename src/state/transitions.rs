use std::{fmt, time::SystemTime};

use tracing::{debug, error, info, warn};

use crate::{
    dao::{models::RoomEntity, room_store::RoomStore},
    error::ServiceError,
    services::sse_events::broadcast_room_updated,
    state::{SharedState, state_machine::Plan},
};

/// Apply `plan` to `room`, let `update` adjust mode-specific fields, then
/// compare-and-swap the row against the version the plan was computed from.
///
/// Returns `None` when another writer committed first; nothing was written.
pub async fn commit_transition<P, E, F>(
    store: &dyn RoomStore,
    mut room: RoomEntity,
    plan: &Plan<P, E>,
    update: F,
) -> Result<Option<RoomEntity>, ServiceError>
where
    P: fmt::Display,
    E: fmt::Debug,
    F: FnOnce(&mut RoomEntity),
{
    room.phase = plan.to.to_string();
    room.version = plan.version_next;
    room.updated_at = SystemTime::now();
    update(&mut room);

    if store
        .compare_and_swap_room(room.clone(), plan.version)
        .await?
    {
        info!(
            room = %room.code,
            from = %plan.from,
            to = %plan.to,
            event = ?plan.event,
            version = room.version,
            "room transition committed"
        );
        Ok(Some(room))
    } else {
        debug!(
            room = %room.code,
            expected_version = plan.version,
            event = ?plan.event,
            "room transition lost a concurrent update"
        );
        Ok(None)
    }
}

/// Commit a planned transition, then broadcast the resulting room.
///
/// Losing the compare-and-swap surfaces as [`ServiceError::Conflict`].
pub async fn run_transition_with_broadcast<P, E, F>(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    plan: &Plan<P, E>,
    update: F,
) -> Result<RoomEntity, ServiceError>
where
    P: fmt::Display,
    E: fmt::Debug,
    F: FnOnce(&mut RoomEntity),
{
    let Some(room) = commit_transition(store, room, plan, update).await? else {
        return Err(ServiceError::Conflict(
            "room was modified concurrently".into(),
        ));
    };
    broadcast_room_updated(state, &room);
    Ok(room)
}

/// Undo a committed transition whose dependent write failed.
///
/// `previous` is written back under a fresh version so the row still only
/// moves forward in version order, then broadcast so subscribers that saw the
/// committed phase follow the room back. Failures are logged, never returned:
/// the caller is already reporting the original error.
pub async fn rollback_transition(
    state: &SharedState,
    store: &dyn RoomStore,
    committed: &RoomEntity,
    previous: RoomEntity,
) {
    let mut restored = previous;
    restored.version = committed.version + 1;
    restored.updated_at = SystemTime::now();

    match store
        .compare_and_swap_room(restored.clone(), committed.version)
        .await
    {
        Ok(true) => {
            warn!(
                room = %restored.code,
                phase = %restored.phase,
                "rolled back room transition after a failed write"
            );
            broadcast_room_updated(state, &restored);
        }
        Ok(false) => warn!(
            room = %restored.code,
            "room changed before rollback; leaving it as is"
        ),
        Err(err) => error!(room = %restored.code, error = %err, "room rollback failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::InMemoryRoomStore,
        state::{
            AppState, RoomHub,
            hotseat::{HotseatEvent, HotseatGraph, HotseatPhase},
            room::GameMode,
            state_machine::PhaseMachine,
        },
    };

    fn lobby_room() -> RoomEntity {
        let now = SystemTime::now();
        RoomEntity {
            id: Uuid::new_v4(),
            code: "QWERTY".into(),
            host_player_id: Uuid::new_v4(),
            mode: GameMode::Hotseat,
            phase: "LOBBY".into(),
            round_number: 1,
            version: 0,
            topic: None,
            secret_word: None,
            hotseat_player_id: None,
            hotseat_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn commit_bumps_version_and_applies_update() {
        let store = InMemoryRoomStore::new();
        let room = lobby_room();
        store.insert_room(room.clone()).await.unwrap();

        let plan = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Lobby, 0)
            .plan(HotseatEvent::StartGame)
            .unwrap();
        let committed = commit_transition(&store, room, &plan, |room| room.round_number = 1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(committed.phase, "ASSIGNMENT");
        assert_eq!(committed.version, 1);
        let stored = store
            .find_room_by_code("QWERTY".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, committed);
    }

    #[tokio::test]
    async fn stale_plan_loses_and_writes_nothing() {
        let store = InMemoryRoomStore::new();
        let room = lobby_room();
        store.insert_room(room.clone()).await.unwrap();

        let plan = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Lobby, 0)
            .plan(HotseatEvent::StartGame)
            .unwrap();
        assert!(
            commit_transition(&store, room.clone(), &plan, |_| {})
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            commit_transition(&store, room, &plan, |_| {})
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn broadcast_follows_the_commit() {
        let store = Arc::new(InMemoryRoomStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let room = lobby_room();
        store.insert_room(room.clone()).await.unwrap();
        let mut subscription = state.hub().subscribe(&RoomHub::channel_name(&room.code));

        let plan = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Lobby, 0)
            .plan(HotseatEvent::StartGame)
            .unwrap();
        run_transition_with_broadcast(&state, store.as_ref(), room.clone(), &plan, |_| {})
            .await
            .unwrap();

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("room_updated"));
        assert!(event.data.contains("\"ASSIGNMENT\""));

        let err = run_transition_with_broadcast(&state, store.as_ref(), room, &plan, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn rollback_restores_previous_phase_under_a_newer_version() {
        let store = Arc::new(InMemoryRoomStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let room = lobby_room();
        store.insert_room(room.clone()).await.unwrap();
        let mut subscription = state.hub().subscribe(&RoomHub::channel_name(&room.code));

        let plan = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Lobby, 0)
            .plan(HotseatEvent::StartGame)
            .unwrap();
        let committed =
            run_transition_with_broadcast(&state, store.as_ref(), room.clone(), &plan, |_| {})
                .await
                .unwrap();
        rollback_transition(&state, store.as_ref(), &committed, room).await;

        let forward = subscription.recv().await.unwrap();
        assert!(forward.data.contains("\"ASSIGNMENT\""));
        let back = subscription.recv().await.unwrap();
        assert_eq!(back.event.as_deref(), Some("room_updated"));
        assert!(back.data.contains("\"LOBBY\""));

        let stored = store
            .find_room_by_code("QWERTY".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.phase, "LOBBY");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn stale_rollback_neither_writes_nor_broadcasts() {
        let store = Arc::new(InMemoryRoomStore::new());
        let state = AppState::with_store(AppConfig::default(), store.clone()).await;
        let room = lobby_room();
        store.insert_room(room.clone()).await.unwrap();

        let plan = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Lobby, 0)
            .plan(HotseatEvent::StartGame)
            .unwrap();
        let committed = commit_transition(store.as_ref(), room.clone(), &plan, |_| {})
            .await
            .unwrap()
            .unwrap();
        let mut newer = committed.clone();
        newer.version += 1;
        assert!(store.compare_and_swap_room(newer, committed.version).await.unwrap());

        let mut subscription = state.hub().subscribe(&RoomHub::channel_name(&room.code));
        rollback_transition(&state, store.as_ref(), &committed, room).await;

        let stored = store
            .find_room_by_code("QWERTY".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.phase, "ASSIGNMENT");
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), subscription.recv())
                .await
                .is_err()
        );
    }
}

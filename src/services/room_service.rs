use std::time::SystemTime;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    config::GameRules,
    dao::{
        models::{
            AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
        },
        room_store::RoomStore,
    },
    dto::room::{
        AssignmentView, CreateRoomRequest, HotseatResultView, HotseatVoteView, ImposterResultView,
        ImposterVoteView, JoinRoomRequest, PlayerView, RoomSessionResponse, RoomSnapshot,
        RoomView, RoundResultView, SecretView, VoteView, player_views,
    },
    engine::{
        assignment::active_assignments,
        resolution::{resolve_hotseat_round, resolve_imposter_round},
        room_code::generate_room_code,
    },
    error::ServiceError,
    services::sse_events::broadcast_players_updated,
    state::{
        SharedState,
        hotseat::HotseatPhase,
        imposter::ImposterPhase,
        room::{GameMode, Role, RoomPhase},
    },
};

/// Round counter of a freshly created room.
const INITIAL_ROUND: u32 = 1;

/// Open a room and register the caller as its host.
///
/// Codes are retried on collision. When the host row cannot be written the
/// room is deleted again so no hostless room is left behind.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomSessionResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let rules = &state.config().rules;
    let CreateRoomRequest {
        display_name,
        session_id,
        mode,
    } = request;

    let now = SystemTime::now();
    let host_id = Uuid::new_v4();

    let mut allocated = None;
    for attempt in 1..=rules.room_code_attempts {
        let code = generate_room_code(&mut rand::rng(), rules.room_code_length);
        let room = RoomEntity {
            id: Uuid::new_v4(),
            code,
            host_player_id: host_id,
            mode,
            phase: RoomPhase::initial(mode).as_str().to_owned(),
            round_number: INITIAL_ROUND,
            version: 0,
            topic: None,
            secret_word: None,
            hotseat_player_id: None,
            hotseat_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        match store.insert_room(room.clone()).await {
            Ok(()) => {
                allocated = Some(room);
                break;
            }
            Err(err) if err.is_conflict() => {
                debug!(attempt, code = %room.code, "room code already taken; retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let Some(room) = allocated else {
        return Err(ServiceError::Conflict(format!(
            "could not allocate a room code after {} attempts",
            rules.room_code_attempts
        )));
    };

    let host = PlayerEntity {
        id: host_id,
        room_id: room.id,
        display_name: display_name.trim().to_owned(),
        is_host: true,
        session_id,
        score: 0,
        role: None,
        is_alive: None,
        joined_at: now,
        last_seen_at: now,
    };

    if let Err(err) = store.insert_player(host.clone()).await {
        match store.delete_room(room.id).await {
            Ok(_) => debug!(room = %room.code, "rolled back room after host insert failed"),
            Err(delete_err) => {
                error!(room = %room.code, error = %delete_err, "failed to roll back room")
            }
        }
        return Err(err.into());
    }

    info!(room = %room.code, mode = ?room.mode, host = %host.id, "room created");

    let player = PlayerView::from(&host);
    Ok(RoomSessionResponse {
        room: RoomView::from(&room),
        players: vec![player.clone()],
        player,
    })
}

/// Enter a room still in its lobby, or refresh the caller's row when the
/// session already belongs to it.
pub async fn join_room(
    state: &SharedState,
    code: &str,
    request: JoinRoomRequest,
) -> Result<RoomSessionResponse, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let _gate = state.lock_room(&code).await;

    let room = load_room(store.as_ref(), &code).await?;
    if !RoomPhase::of(&room)?.is_lobby() {
        return Err(ServiceError::InvalidState("Game has already started".into()));
    }

    let JoinRoomRequest {
        display_name,
        session_id,
    } = request;
    let display_name = display_name.trim().to_owned();
    let now = SystemTime::now();

    let players = store.list_players(room.id).await?;
    let existing = players.iter().find(|p| p.session_id == session_id);

    let player = match existing {
        Some(existing) => refresh_player(store.as_ref(), existing.id, display_name, now).await?,
        None => {
            let max_players = state.config().rules.max_players;
            if players.len() >= max_players {
                return Err(ServiceError::InvalidState(format!(
                    "Room is full ({max_players} players)"
                )));
            }

            let player = PlayerEntity {
                id: Uuid::new_v4(),
                room_id: room.id,
                display_name: display_name.clone(),
                is_host: false,
                session_id: session_id.clone(),
                score: 0,
                role: None,
                is_alive: None,
                joined_at: now,
                last_seen_at: now,
            };

            match store.insert_player(player.clone()).await {
                Ok(()) => player,
                Err(err) if err.is_conflict() => {
                    // another request registered this session first
                    let Some(winner) = store
                        .find_player_by_session(room.id, session_id)
                        .await?
                    else {
                        return Err(err.into());
                    };
                    refresh_player(store.as_ref(), winner.id, display_name, now).await?
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    let players = store.list_players(room.id).await?;
    broadcast_players_updated(state, &room.code, &players);
    info!(room = %room.code, player = %player.id, "player joined");

    Ok(RoomSessionResponse {
        room: RoomView::from(&room),
        player: PlayerView::from(&player),
        players: player_views(&players),
    })
}

/// Current state of a room as every client should see it.
pub async fn room_snapshot(state: &SharedState, code: &str) -> Result<RoomSnapshot, ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(store.as_ref(), &normalize_code(code)).await?;
    build_snapshot(store.as_ref(), room).await
}

/// Role, topic and (for civilians) the secret word of the calling player.
pub async fn secret_view(
    state: &SharedState,
    code: &str,
    session_id: &str,
) -> Result<SecretView, ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(store.as_ref(), &normalize_code(code)).await?;
    let player = require_player(store.as_ref(), &room, session_id).await?;

    if room.mode != GameMode::Imposter {
        return Err(ServiceError::InvalidState(
            "Secret words only exist in imposter rooms".into(),
        ));
    }

    let secret_word = match player.role {
        Some(Role::Civilian) => room.secret_word.clone(),
        Some(Role::Imposter) | None => None,
    };

    Ok(SecretView {
        player_id: player.id,
        role: player.role,
        topic: player.role.and(room.topic.clone()),
        secret_word,
    })
}

/// Codes are case-insensitive for callers and stored upper case.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub(crate) async fn load_room(store: &dyn RoomStore, code: &str) -> Result<RoomEntity, ServiceError> {
    store
        .find_room_by_code(code.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound("Room not found".into()))
}

/// Player of `room` identified by `session_id`.
pub(crate) async fn require_player(
    store: &dyn RoomStore,
    room: &RoomEntity,
    session_id: &str,
) -> Result<PlayerEntity, ServiceError> {
    store
        .find_player_by_session(room.id, session_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound("Player not found in this room".into()))
}

/// Like [`require_player`], additionally requiring the player to own the room.
pub(crate) async fn require_host(
    store: &dyn RoomStore,
    room: &RoomEntity,
    session_id: &str,
) -> Result<PlayerEntity, ServiceError> {
    let player = require_player(store, room, session_id).await?;
    if player.id != room.host_player_id {
        return Err(ServiceError::Forbidden(
            "Only the host can perform this action".into(),
        ));
    }
    Ok(player)
}

/// Assemble the snapshot of `room`, deriving the round result when the phase shows one.
pub(crate) async fn build_snapshot(
    store: &dyn RoomStore,
    room: RoomEntity,
) -> Result<RoomSnapshot, ServiceError> {
    let phase = RoomPhase::of(&room)?;
    let players = store.list_players(room.id).await?;

    let (votes, assignments, round_result) = match room.mode {
        GameMode::Hotseat => {
            let assignments = active_assignments(
                &store.list_assignments(room.id).await?,
                room.round_number,
            );
            let votes = store
                .list_hotseat_votes(room.id, room.round_number)
                .await?;
            let round_result = match phase {
                RoomPhase::Hotseat(
                    HotseatPhase::Reveal | HotseatPhase::Scoreboard | HotseatPhase::Complete,
                ) => hotseat_round_result(&room, &assignments, &votes)?,
                _ => None,
            };
            (
                votes
                    .iter()
                    .map(|v| VoteView::Hotseat(HotseatVoteView::from(v)))
                    .collect(),
                assignments.iter().map(AssignmentView::from).collect(),
                round_result,
            )
        }
        GameMode::Imposter => {
            let votes = store
                .list_imposter_votes(room.id, room.round_number)
                .await?;
            let round_result = match phase {
                RoomPhase::Imposter(ImposterPhase::Reveal | ImposterPhase::GameOver) => {
                    Some(imposter_round_result(&room, &players, &votes)?)
                }
                _ => None,
            };
            (imposter_vote_views(&votes), Vec::new(), round_result)
        }
    };

    Ok(RoomSnapshot {
        room: RoomView::from(&room),
        players: player_views(&players),
        votes,
        assignments,
        round_result,
    })
}

/// Graded result of the current hotseat turn, `None` before anyone was featured.
pub(crate) fn hotseat_round_result(
    room: &RoomEntity,
    assignments: &[AssignmentEntity],
    votes: &[HotseatVoteEntity],
) -> Result<Option<RoundResultView>, ServiceError> {
    let Some(hotseat_player_id) = room.hotseat_player_id else {
        return Ok(None);
    };
    let outcome = resolve_hotseat_round(hotseat_player_id, assignments, votes)?;
    Ok(Some(RoundResultView::Hotseat(HotseatResultView::new(
        room.round_number,
        outcome,
        votes,
    ))))
}

/// Elimination result recomputed from the stored players and votes.
pub(crate) fn imposter_round_result(
    room: &RoomEntity,
    players: &[PlayerEntity],
    votes: &[ImposterVoteEntity],
) -> Result<RoundResultView, ServiceError> {
    let outcome = resolve_imposter_round(players, votes)?;
    Ok(RoundResultView::Imposter(ImposterResultView::new(
        room.round_number,
        outcome,
    )))
}

pub(crate) fn imposter_vote_views(votes: &[ImposterVoteEntity]) -> Vec<VoteView> {
    votes
        .iter()
        .map(|v| VoteView::Imposter(ImposterVoteView::from(v)))
        .collect()
}

pub(crate) fn hotseat_vote_views(votes: &[HotseatVoteEntity]) -> Vec<VoteView> {
    votes
        .iter()
        .map(|v| VoteView::Hotseat(HotseatVoteView::from(v)))
        .collect()
}

/// Both modes share the same table size limits.
pub(crate) fn ensure_player_count(rules: &GameRules, count: usize) -> Result<(), ServiceError> {
    if count < rules.min_players {
        return Err(ServiceError::InvalidInput(format!(
            "At least {} players are required to start (currently {count})",
            rules.min_players
        )));
    }
    if count > rules.max_players {
        return Err(ServiceError::InvalidInput(format!(
            "At most {} players can play (currently {count})",
            rules.max_players
        )));
    }
    Ok(())
}

async fn refresh_player(
    store: &dyn RoomStore,
    player_id: Uuid,
    display_name: String,
    now: SystemTime,
) -> Result<PlayerEntity, ServiceError> {
    store
        .update_player_profile(player_id, display_name, now)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Player not found in this room".into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::InMemoryRoomStore,
        state::{AppState, RoomHub},
    };

    async fn state() -> SharedState {
        AppState::with_store(AppConfig::default(), Arc::new(InMemoryRoomStore::new())).await
    }

    fn create(name: &str, session: &str, mode: GameMode) -> CreateRoomRequest {
        CreateRoomRequest {
            display_name: name.into(),
            session_id: session.into(),
            mode,
        }
    }

    fn join(name: &str, session: &str) -> JoinRoomRequest {
        JoinRoomRequest {
            display_name: name.into(),
            session_id: session.into(),
        }
    }

    #[tokio::test]
    async fn create_room_registers_the_host() {
        let state = state().await;
        let created = create_room(&state, create(" Ada ", "s-host", GameMode::Imposter))
            .await
            .unwrap();

        assert_eq!(created.room.code.len(), 6);
        assert_eq!(created.room.phase, "LOBBY");
        assert_eq!(created.room.round_number, 1);
        assert_eq!(created.room.host_player_id, created.player.id);
        assert!(created.player.is_host);
        assert_eq!(created.player.display_name, "Ada");
    }

    #[tokio::test]
    async fn rejoining_with_the_same_session_updates_the_row() {
        let state = state().await;
        let created = create_room(&state, create("Ada", "s-host", GameMode::Hotseat))
            .await
            .unwrap();
        let code = created.room.code.to_lowercase();

        let first = join_room(&state, &code, join("Bob", "s-bob")).await.unwrap();
        let again = join_room(&state, &code, join("Bobby", "s-bob")).await.unwrap();

        assert_eq!(first.player.id, again.player.id);
        assert_eq!(again.player.display_name, "Bobby");
        assert_eq!(again.players.len(), 2);
    }

    #[tokio::test]
    async fn join_unknown_room_is_not_found() {
        let state = state().await;
        let err = join_room(&state, "ZZZZZZ", join("Bob", "s-bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Room not found"));
    }

    #[tokio::test]
    async fn joins_to_unknown_codes_leave_no_gates_behind() {
        let state = state().await;
        for n in 0..16 {
            let code = format!("ZZZZ{n:02}");
            let _ = join_room(&state, &code, join("Bob", "s-bob")).await;
        }
        assert_eq!(state.room_gate_count(), 0);
    }

    #[tokio::test]
    async fn full_rooms_refuse_new_sessions() {
        let mut config = AppConfig::default();
        config.rules.max_players = 2;
        let state = AppState::with_store(config, Arc::new(InMemoryRoomStore::new())).await;
        let created = create_room(&state, create("Ada", "s-host", GameMode::Hotseat))
            .await
            .unwrap();
        let code = created.room.code;

        join_room(&state, &code, join("Bob", "s-bob")).await.unwrap();
        let err = join_room(&state, &code, join("Cy", "s-cy"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        // existing sessions can still come back
        assert!(join_room(&state, &code, join("Bob", "s-bob")).await.is_ok());
    }

    #[tokio::test]
    async fn join_broadcasts_the_player_list() {
        let state = state().await;
        let created = create_room(&state, create("Ada", "s-host", GameMode::Hotseat))
            .await
            .unwrap();
        let mut subscription = state
            .hub()
            .subscribe(&RoomHub::channel_name(&created.room.code));

        join_room(&state, &created.room.code, join("Bob", "s-bob"))
            .await
            .unwrap();

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("players_updated"));
        assert!(event.data.contains("Bob"));
        assert!(!event.data.contains("s-bob"));
    }

    #[tokio::test]
    async fn secret_view_requires_an_imposter_room_member() {
        let state = state().await;
        let created = create_room(&state, create("Ada", "s-host", GameMode::Imposter))
            .await
            .unwrap();

        let err = secret_view(&state, &created.room.code, "stranger")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let view = secret_view(&state, &created.room.code, "s-host")
            .await
            .unwrap();
        assert_eq!(view.role, None);
        assert_eq!(view.secret_word, None);
    }

    #[tokio::test]
    async fn degraded_state_rejects_requests() {
        let state = AppState::new(AppConfig::default());
        let err = room_snapshot(&state, "ABCDEF").await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}

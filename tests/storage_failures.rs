use std::{
    collections::HashSet,
    io,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use party_rooms_back::{
    config::AppConfig,
    dao::{
        models::{
            AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
        },
        room_store::{InMemoryRoomStore, RoomStore},
        storage::{StorageError, StorageResult},
    },
    dto::room::{
        AdvanceRequest, CreateRoomRequest, JoinRoomRequest, SessionRequest, StartRequest,
        VoteRequest,
    },
    error::ServiceError,
    services::{game_service, room_service},
    state::{AppState, RoomHub, SharedState, room::GameMode, room::Role},
};
use uuid::Uuid;

/// Delegates to the in-memory store but fails the named write operations.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemoryRoomStore,
    failing: Arc<Mutex<HashSet<&'static str>>>,
}

impl FlakyStore {
    fn failing(operations: &[&'static str]) -> Self {
        let store = Self::default();
        store
            .failing
            .lock()
            .unwrap()
            .extend(operations.iter().copied());
        store
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn fails(&self, operation: &str) -> bool {
        self.failing.lock().unwrap().contains(operation)
    }
}

fn broken<T: Send + 'static>(what: &str) -> BoxFuture<'static, StorageResult<T>> {
    let err = StorageError::unavailable(
        format!("{what} failed"),
        io::Error::other("connection reset"),
    );
    Box::pin(async move { Err(err) })
}

impl RoomStore for FlakyStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_room(room)
    }
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_room(id)
    }
    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.inner.find_room_by_code(code)
    }
    fn compare_and_swap_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.compare_and_swap_room(room, expected_version)
    }
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_player(player)
    }
    fn update_player_profile(
        &self,
        player_id: Uuid,
        display_name: String,
        last_seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner
            .update_player_profile(player_id, display_name, last_seen_at)
    }
    fn find_player_by_session(
        &self,
        room_id: Uuid,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.find_player_by_session(room_id, session_id)
    }
    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        self.inner.list_players(room_id)
    }
    fn assign_roles(
        &self,
        room_id: Uuid,
        roles: Vec<(Uuid, Role)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if self.fails("assign_roles") {
            return broken("assign_roles");
        }
        self.inner.assign_roles(room_id, roles)
    }
    fn set_player_alive(
        &self,
        player_id: Uuid,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if self.fails("set_player_alive") {
            return broken("set_player_alive");
        }
        self.inner.set_player_alive(player_id, alive)
    }
    fn increment_scores(&self, awards: Vec<(Uuid, u32)>) -> BoxFuture<'static, StorageResult<()>> {
        if self.fails("increment_scores") {
            return broken("increment_scores");
        }
        self.inner.increment_scores(awards)
    }
    fn insert_assignments(
        &self,
        assignments: Vec<AssignmentEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if self.fails("insert_assignments") {
            return broken("insert_assignments");
        }
        self.inner.insert_assignments(assignments)
    }
    fn list_assignments(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AssignmentEntity>>> {
        self.inner.list_assignments(room_id)
    }
    fn upsert_hotseat_vote(
        &self,
        vote: HotseatVoteEntity,
    ) -> BoxFuture<'static, StorageResult<HotseatVoteEntity>> {
        self.inner.upsert_hotseat_vote(vote)
    }
    fn list_hotseat_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<HotseatVoteEntity>>> {
        self.inner.list_hotseat_votes(room_id, round_number)
    }
    fn set_hotseat_vote_correctness(
        &self,
        marks: Vec<(Uuid, Option<bool>)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if self.fails("set_hotseat_vote_correctness") {
            return broken("set_hotseat_vote_correctness");
        }
        self.inner.set_hotseat_vote_correctness(marks)
    }
    fn upsert_imposter_vote(
        &self,
        vote: ImposterVoteEntity,
    ) -> BoxFuture<'static, StorageResult<ImposterVoteEntity>> {
        self.inner.upsert_imposter_vote(vote)
    }
    fn list_imposter_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ImposterVoteEntity>>> {
        self.inner.list_imposter_votes(room_id, round_number)
    }
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

async fn three_player_room(store: FlakyStore, mode: GameMode) -> (SharedState, String) {
    let state = AppState::with_store(AppConfig::default(), Arc::new(store)).await;
    let created = room_service::create_room(
        &state,
        CreateRoomRequest {
            display_name: "Host".into(),
            session_id: "host".into(),
            mode,
        },
    )
    .await
    .unwrap();
    for session in ["p2", "p3"] {
        room_service::join_room(
            &state,
            &created.room.code,
            JoinRoomRequest {
                display_name: session.to_uppercase(),
                session_id: session.into(),
            },
        )
        .await
        .unwrap();
    }
    (state, created.room.code)
}

fn start(session: &str) -> StartRequest {
    StartRequest {
        session_id: session.into(),
        topic: None,
    }
}

async fn advance(state: &SharedState, code: &str) -> Result<String, ServiceError> {
    let snapshot = game_service::advance(
        state,
        code,
        AdvanceRequest {
            session_id: "host".into(),
            to: None,
        },
    )
    .await?;
    Ok(snapshot.room.phase)
}

async fn vote(
    state: &SharedState,
    code: &str,
    session: &str,
    target: Uuid,
) -> Result<party_rooms_back::dto::room::VoteResponse, ServiceError> {
    game_service::vote(
        state,
        code,
        VoteRequest {
            session_id: session.into(),
            target_player_id: target,
        },
    )
    .await
}

type Seat = (String, Uuid);

/// Deduction room moved to VOTING, with its imposter and civilian seats.
async fn deduction_room_voting(store: FlakyStore) -> (SharedState, String, Seat, Vec<Seat>) {
    let (state, code) = three_player_room(store, GameMode::Imposter).await;
    game_service::start(&state, &code, start("host")).await.unwrap();
    assert_eq!(advance(&state, &code).await.unwrap(), "CLUE");
    assert_eq!(advance(&state, &code).await.unwrap(), "VOTING");

    let mut imposter = None;
    let mut civilians = Vec::new();
    for session in ["host", "p2", "p3"] {
        let secret = room_service::secret_view(&state, &code, session).await.unwrap();
        match secret.role {
            Some(Role::Imposter) => imposter = Some((session.to_owned(), secret.player_id)),
            _ => civilians.push((session.to_owned(), secret.player_id)),
        }
    }
    (state, code, imposter.unwrap(), civilians)
}

/// Every civilian accuses the imposter, who answers by accusing the first civilian.
async fn cast_all_votes(
    state: &SharedState,
    code: &str,
    imposter: &Seat,
    civilians: &[Seat],
) -> Result<party_rooms_back::dto::room::VoteResponse, ServiceError> {
    for (session, _) in civilians {
        vote(state, code, session, imposter.1).await.unwrap();
    }
    vote(state, code, &imposter.0, civilians[0].1).await
}

#[tokio::test]
async fn failed_assignment_write_returns_the_room_to_the_lobby() {
    let (state, code) =
        three_player_room(FlakyStore::failing(&["insert_assignments"]), GameMode::Hotseat).await;
    let before = room_service::room_snapshot(&state, &code).await.unwrap();
    let mut subscription = state.hub().subscribe(&RoomHub::channel_name(&code));

    let err = game_service::start(&state, &code, start("host"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let after = room_service::room_snapshot(&state, &code).await.unwrap();
    assert_eq!(after.room.phase, "LOBBY");
    assert!(after.room.version > before.room.version);
    assert!(after.assignments.is_empty());

    let forward = subscription.recv().await.unwrap();
    assert_eq!(forward.event.as_deref(), Some("room_updated"));
    assert!(forward.data.contains("\"ASSIGNMENT\""));
    let back = subscription.recv().await.unwrap();
    assert_eq!(back.event.as_deref(), Some("room_updated"));
    assert!(back.data.contains("\"LOBBY\""));
}

#[tokio::test]
async fn failed_role_write_returns_the_room_to_the_lobby() {
    let (state, code) =
        three_player_room(FlakyStore::failing(&["assign_roles"]), GameMode::Imposter).await;

    let err = game_service::start(&state, &code, start("host"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let after = room_service::room_snapshot(&state, &code).await.unwrap();
    assert_eq!(after.room.phase, "LOBBY");
    assert!(after.room.topic.is_none());
    assert!(after.players.iter().all(|p| p.is_alive.is_none()));
}

#[tokio::test]
async fn failed_elimination_keeps_the_round_open_until_storage_recovers() {
    let store = FlakyStore::failing(&["set_player_alive"]);
    let (state, code, imposter, civilians) = deduction_room_voting(store.clone()).await;

    let err = cast_all_votes(&state, &code, &imposter, &civilians)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let stuck = room_service::room_snapshot(&state, &code).await.unwrap();
    assert_eq!(stuck.room.phase, "VOTING");
    assert_eq!(stuck.votes.len(), 3);
    assert!(stuck.players.iter().all(|p| p.is_alive == Some(true)));
    assert!(stuck.players.iter().all(|p| p.score == 0));

    store.heal();
    let response = vote(&state, &code, &imposter.0, civilians[0].1)
        .await
        .unwrap();
    assert!(response.round_result.is_some());

    let resolved = room_service::room_snapshot(&state, &code).await.unwrap();
    assert_eq!(resolved.room.phase, "GAME_OVER");
    for player in &resolved.players {
        if player.id == imposter.1 {
            assert_eq!(player.is_alive, Some(false));
            assert_eq!(player.score, 0);
        } else {
            assert_eq!(player.is_alive, Some(true));
            assert_eq!(player.score, 1);
        }
    }
}

#[tokio::test]
async fn failed_scoring_revives_the_eliminated_player() {
    let store = FlakyStore::failing(&["increment_scores"]);
    let (state, code, imposter, civilians) = deduction_room_voting(store.clone()).await;
    let mut subscription = state.hub().subscribe(&RoomHub::channel_name(&code));

    let err = cast_all_votes(&state, &code, &imposter, &civilians)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let stuck = room_service::room_snapshot(&state, &code).await.unwrap();
    assert_eq!(stuck.room.phase, "VOTING");
    assert!(stuck.players.iter().all(|p| p.is_alive == Some(true)));
    assert!(stuck.players.iter().all(|p| p.score == 0));

    let mut last_room = None;
    while let Ok(Ok(event)) =
        tokio::time::timeout(std::time::Duration::from_millis(20), subscription.recv()).await
    {
        if event.event.as_deref() == Some("room_updated") {
            last_room = Some(event.data);
        }
    }
    assert!(last_room.unwrap().contains("\"VOTING\""));
}

#[tokio::test]
async fn failed_hotseat_scoring_leaves_guesses_ungraded() {
    let store = FlakyStore::failing(&["increment_scores"]);
    let (state, code) = three_player_room(store.clone(), GameMode::Hotseat).await;
    game_service::start(&state, &code, start("host")).await.unwrap();
    assert_eq!(advance(&state, &code).await.unwrap(), "WHEEL");
    let spin = game_service::spin(
        &state,
        &code,
        SessionRequest {
            session_id: "host".into(),
        },
    )
    .await
    .unwrap();
    let featured = spin.hotseat_player_id;
    assert_eq!(advance(&state, &code).await.unwrap(), "VOTING");

    for session in ["host", "p2", "p3"] {
        let me = room_service::secret_view(&state, &code, session)
            .await
            .unwrap()
            .player_id;
        if me != featured {
            vote(&state, &code, session, featured).await.unwrap();
        }
    }

    let err = advance(&state, &code).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let store_handle = state.require_room_store().await.unwrap();
    let room = store_handle
        .find_room_by_code(code.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(room.phase, "VOTING");
    let votes = store_handle
        .list_hotseat_votes(room.id, room.round_number)
        .await
        .unwrap();
    assert_eq!(votes.len(), 2);
    assert!(votes.iter().all(|v| v.is_correct.is_none()));

    store.heal();
    assert_eq!(advance(&state, &code).await.unwrap(), "REVEAL");
    let votes = store_handle
        .list_hotseat_votes(room.id, room.round_number)
        .await
        .unwrap();
    assert!(votes.iter().all(|v| v.is_correct.is_some()));
}

use std::{
    collections::HashMap,
    sync::Arc,
    time::SystemTime,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RoomStore;
use crate::{
    dao::{
        models::{
            AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
        },
        storage::{StorageError, StorageResult},
    },
    state::room::Role,
};

type VoteKey = (Uuid, u32, Uuid);

/// Process-local [`RoomStore`] used when no database is configured and in tests.
///
/// All tables live behind one lock, so each trait call is atomic with respect
/// to every other call.
#[derive(Clone, Default)]
pub struct InMemoryRoomStore {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<Uuid, RoomEntity>,
    room_codes: HashMap<String, Uuid>,
    // insertion order doubles as join order
    players: IndexMap<Uuid, PlayerEntity>,
    assignments: Vec<AssignmentEntity>,
    hotseat_votes: IndexMap<VoteKey, HotseatVoteEntity>,
    imposter_votes: IndexMap<VoteKey, ImposterVoteEntity>,
}

impl InMemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for InMemoryRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            if guard.room_codes.contains_key(&room.code) {
                return Err(StorageError::conflict(format!(
                    "room code `{}` already exists",
                    room.code
                )));
            }
            guard.room_codes.insert(room.code.clone(), room.id);
            guard.rooms.insert(room.id, room);
            Ok(())
        })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let Some(room) = guard.rooms.remove(&id) else {
                return Ok(false);
            };
            guard.room_codes.remove(&room.code);
            Ok(true)
        })
    }

    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .room_codes
                .get(&code)
                .and_then(|id| guard.rooms.get(id))
                .cloned())
        })
    }

    fn compare_and_swap_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            match guard.rooms.get_mut(&room.id) {
                Some(stored) if stored.version == expected_version => {
                    *stored = room;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let duplicate = guard
                .players
                .values()
                .any(|p| p.room_id == player.room_id && p.session_id == player.session_id);
            if duplicate {
                return Err(StorageError::conflict(format!(
                    "session already joined room `{}`",
                    player.room_id
                )));
            }
            guard.players.insert(player.id, player);
            Ok(())
        })
    }

    fn update_player_profile(
        &self,
        player_id: Uuid,
        display_name: String,
        last_seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            Ok(guard.players.get_mut(&player_id).map(|player| {
                player.display_name = display_name;
                player.last_seen_at = last_seen_at;
                player.clone()
            }))
        })
    }

    fn find_player_by_session(
        &self,
        room_id: Uuid,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .players
                .values()
                .find(|p| p.room_id == room_id && p.session_id == session_id)
                .cloned())
        })
    }

    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            let mut players: Vec<PlayerEntity> = guard
                .players
                .values()
                .filter(|p| p.room_id == room_id)
                .cloned()
                .collect();
            players.sort_by_key(|p| p.joined_at);
            Ok(players)
        })
    }

    fn assign_roles(
        &self,
        room_id: Uuid,
        roles: Vec<(Uuid, Role)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            for (player_id, role) in roles {
                if let Some(player) = guard.players.get_mut(&player_id)
                    && player.room_id == room_id
                {
                    player.role = Some(role);
                    player.is_alive = Some(true);
                }
            }
            Ok(())
        })
    }

    fn set_player_alive(
        &self,
        player_id: Uuid,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            if let Some(player) = guard.players.get_mut(&player_id) {
                player.is_alive = Some(alive);
            }
            Ok(())
        })
    }

    fn increment_scores(&self, awards: Vec<(Uuid, u32)>) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            for (player_id, points) in awards {
                if let Some(player) = guard.players.get_mut(&player_id) {
                    player.score = player.score.saturating_add(points);
                }
            }
            Ok(())
        })
    }

    fn insert_assignments(
        &self,
        assignments: Vec<AssignmentEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let clash = assignments.iter().any(|new| {
                guard.assignments.iter().any(|old| {
                    old.room_id == new.room_id
                        && old.round_number == new.round_number
                        && old.giver_player_id == new.giver_player_id
                })
            });
            if clash {
                return Err(StorageError::conflict("assignment already exists for round"));
            }
            guard.assignments.extend(assignments);
            Ok(())
        })
    }

    fn list_assignments(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AssignmentEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            Ok(guard
                .assignments
                .iter()
                .filter(|a| a.room_id == room_id)
                .cloned()
                .collect())
        })
    }

    fn upsert_hotseat_vote(
        &self,
        vote: HotseatVoteEntity,
    ) -> BoxFuture<'static, StorageResult<HotseatVoteEntity>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let key = (vote.room_id, vote.round_number, vote.guesser_player_id);
            let stored = guard
                .hotseat_votes
                .entry(key)
                .and_modify(|existing| {
                    existing.hotseat_player_id = vote.hotseat_player_id;
                    existing.guessed_target_id = vote.guessed_target_id;
                    existing.is_correct = None;
                    existing.updated_at = vote.updated_at;
                })
                .or_insert_with(|| vote.clone());
            Ok(stored.clone())
        })
    }

    fn list_hotseat_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<HotseatVoteEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            let mut votes: Vec<HotseatVoteEntity> = guard
                .hotseat_votes
                .values()
                .filter(|v| v.room_id == room_id && v.round_number == round_number)
                .cloned()
                .collect();
            votes.sort_by_key(|v| v.created_at);
            Ok(votes)
        })
    }

    fn set_hotseat_vote_correctness(
        &self,
        marks: Vec<(Uuid, Option<bool>)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let marks: HashMap<Uuid, Option<bool>> = marks.into_iter().collect();
            for vote in guard.hotseat_votes.values_mut() {
                if let Some(correct) = marks.get(&vote.id) {
                    vote.is_correct = *correct;
                }
            }
            Ok(())
        })
    }

    fn upsert_imposter_vote(
        &self,
        vote: ImposterVoteEntity,
    ) -> BoxFuture<'static, StorageResult<ImposterVoteEntity>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            let key = (vote.room_id, vote.round_number, vote.voter_id);
            let stored = guard
                .imposter_votes
                .entry(key)
                .and_modify(|existing| {
                    existing.target_id = vote.target_id;
                    existing.updated_at = vote.updated_at;
                })
                .or_insert_with(|| vote.clone());
            Ok(stored.clone())
        })
    }

    fn list_imposter_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ImposterVoteEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let guard = tables.read().await;
            let mut votes: Vec<ImposterVoteEntity> = guard
                .imposter_votes
                .values()
                .filter(|v| v.room_id == room_id && v.round_number == round_number)
                .cloned()
                .collect();
            // stable sort keeps insertion order for equal timestamps
            votes.sort_by_key(|v| v.created_at);
            Ok(votes)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

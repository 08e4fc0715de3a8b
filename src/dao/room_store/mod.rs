pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{
            AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
        },
        storage::StorageResult,
    },
    state::room::Role,
};

pub use memory::InMemoryRoomStore;

/// Abstraction over the persistence layer for rooms, players, assignments and votes.
///
/// Every mutation that can race between concurrent requests is exposed as a
/// single atomic primitive (conditional update, unique insert, upsert or
/// increment) so callers never need read-then-write sequences.
pub trait RoomStore: Send + Sync {
    /// Insert a new room. Fails with a conflict when the code is already taken.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a room, returning whether a row was removed.
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Room with this (normalized) code, if any.
    fn find_room_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Replace the room only when its stored version equals `expected_version`.
    ///
    /// Returns `false` when another writer got there first.
    fn compare_and_swap_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Insert a player. Fails with a conflict when (room, session) already exists.
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Refresh a returning player's display name and last-seen timestamp.
    fn update_player_profile(
        &self,
        player_id: Uuid,
        display_name: String,
        last_seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Player of `room_id` holding `session_id`, if any.
    fn find_player_by_session(
        &self,
        room_id: Uuid,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// List the players of a room ordered by join time.
    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Set the role of each listed player and mark them alive.
    fn assign_roles(
        &self,
        room_id: Uuid,
        roles: Vec<(Uuid, Role)>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Set the liveness flag of a deduction-mode player.
    fn set_player_alive(
        &self,
        player_id: Uuid,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Add points to each listed player, all or nothing.
    ///
    /// On failure no award remains applied, so the caller may retry the whole batch.
    fn increment_scores(&self, awards: Vec<(Uuid, u32)>) -> BoxFuture<'static, StorageResult<()>>;

    /// Store the impersonation cycle of a round.
    fn insert_assignments(
        &self,
        assignments: Vec<AssignmentEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Every assignment of a room, all rounds included.
    fn list_assignments(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AssignmentEntity>>>;

    /// Insert or overwrite the guess of a player for a round.
    ///
    /// An overwrite keeps the original id and `created_at` and clears any
    /// previously computed correctness. Returns the stored row.
    fn upsert_hotseat_vote(
        &self,
        vote: HotseatVoteEntity,
    ) -> BoxFuture<'static, StorageResult<HotseatVoteEntity>>;
    /// List the guesses of a round in first-submission order.
    fn list_hotseat_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<HotseatVoteEntity>>>;
    /// Grade (`Some`) or un-grade (`None`) hotseat votes by id.
    fn set_hotseat_vote_correctness(
        &self,
        marks: Vec<(Uuid, Option<bool>)>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert or overwrite the elimination vote of a player for a round.
    ///
    /// An overwrite keeps the original id and `created_at`. Returns the stored row.
    fn upsert_imposter_vote(
        &self,
        vote: ImposterVoteEntity,
    ) -> BoxFuture<'static, StorageResult<ImposterVoteEntity>>;
    /// List the elimination votes of a round in first-submission order.
    fn list_imposter_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ImposterVoteEntity>>>;

    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

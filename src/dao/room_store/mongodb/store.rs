use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::open_room_database,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoAssignmentDocument, MongoHotseatVoteDocument, MongoImposterVoteDocument,
        MongoPlayerDocument, MongoRoomDocument, MongoVoteSequenceDocument, doc_id,
        vote_sequence_key,
    },
};
use crate::{
    dao::{
        models::{
            AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
        },
        room_store::RoomStore,
        storage::StorageResult,
    },
    state::room::Role,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const PLAYER_COLLECTION_NAME: &str = "players";
const ASSIGNMENT_COLLECTION_NAME: &str = "assignments";
const HOTSEAT_VOTE_COLLECTION_NAME: &str = "hotseat_votes";
const IMPOSTER_VOTE_COLLECTION_NAME: &str = "imposter_votes";
const VOTE_SEQUENCE_COLLECTION_NAME: &str = "vote_sequences";

/// Two concurrent first-time upserts on the same key can both miss and race
/// on insert; the loser sees a duplicate key and retries as an update.
const UPSERT_ATTEMPTS: u32 = 2;

/// MongoDB-backed [`RoomStore`] implementation.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = open_room_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_room_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let unique_indexes: [(&'static str, &'static str, Document); 5] = [
            (ROOM_COLLECTION_NAME, "code", doc! {"code": 1}),
            (
                PLAYER_COLLECTION_NAME,
                "room_id,session_id",
                doc! {"room_id": 1, "session_id": 1},
            ),
            (
                ASSIGNMENT_COLLECTION_NAME,
                "room_id,round_number,giver_player_id",
                doc! {"room_id": 1, "round_number": 1, "giver_player_id": 1},
            ),
            (
                HOTSEAT_VOTE_COLLECTION_NAME,
                "room_id,round_number,guesser_player_id",
                doc! {"room_id": 1, "round_number": 1, "guesser_player_id": 1},
            ),
            (
                IMPOSTER_VOTE_COLLECTION_NAME,
                "room_id,round_number,voter_id",
                doc! {"room_id": 1, "round_number": 1, "voter_id": 1},
            ),
        ];

        for (collection, index, keys) in unique_indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_unique_idx")))
                        .unique(Some(true))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database().await.collection(ROOM_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        self.database().await.collection(PLAYER_COLLECTION_NAME)
    }

    async fn assignments(&self) -> Collection<MongoAssignmentDocument> {
        self.database().await.collection(ASSIGNMENT_COLLECTION_NAME)
    }

    async fn hotseat_votes(&self) -> Collection<MongoHotseatVoteDocument> {
        self.database().await.collection(HOTSEAT_VOTE_COLLECTION_NAME)
    }

    async fn imposter_votes(&self) -> Collection<MongoImposterVoteDocument> {
        self.database().await.collection(IMPOSTER_VOTE_COLLECTION_NAME)
    }

    async fn vote_sequences(&self) -> Collection<MongoVoteSequenceDocument> {
        self.database().await.collection(VOTE_SEQUENCE_COLLECTION_NAME)
    }

    /// Next insertion number for the votes of a round; orders first casts
    /// independently of clock resolution.
    async fn next_vote_seq(
        &self,
        kind: &str,
        room_id: Uuid,
        round_number: u32,
    ) -> MongoResult<i64> {
        let key = vote_sequence_key(kind, room_id, round_number);
        let counter = self
            .vote_sequences()
            .await
            .find_one_and_update(
                doc! {"_id": key.as_str()},
                doc! {"$inc": {"seq": 1_i64}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::VoteSequence {
                key: key.clone(),
                source,
            })?;
        Ok(counter.map_or(1, |counter| counter.seq))
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        self.rooms()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::Duplicate {
                        collection: ROOM_COLLECTION_NAME,
                        source,
                    }
                } else {
                    MongoDaoError::SaveRoom { id, source }
                }
            })?;
        Ok(())
    }

    async fn delete_room(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .rooms()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn find_room_by_code(&self, code: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc! {"code": code.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadRoom { code, source })?;
        Ok(document.map(Into::into))
    }

    async fn compare_and_swap_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> MongoResult<bool> {
        let id = room.id;
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);
        let document: MongoRoomDocument = room.into();
        let result = self
            .rooms()
            .await
            .replace_one(doc! {"_id": id.to_string(), "version": expected}, &document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(result.matched_count == 1)
    }

    async fn insert_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        self.players()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::Duplicate {
                        collection: PLAYER_COLLECTION_NAME,
                        source,
                    }
                } else {
                    MongoDaoError::SavePlayer { id, source }
                }
            })?;
        Ok(())
    }

    async fn update_player_profile(
        &self,
        player_id: Uuid,
        display_name: String,
        last_seen_at: SystemTime,
    ) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one_and_update(
                doc_id(player_id),
                doc! {"$set": {
                    "display_name": display_name,
                    "last_seen_at": DateTime::from_system_time(last_seen_at),
                }},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                id: player_id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn find_player_by_session(
        &self,
        room_id: Uuid,
        session_id: String,
    ) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(doc! {"room_id": room_id.to_string(), "session_id": session_id})
            .await
            .map_err(|source| MongoDaoError::LoadPlayers { room_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_players(&self, room_id: Uuid) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .players()
            .await
            .find(doc! {"room_id": room_id.to_string()})
            .sort(doc! {"joined_at": 1, "_id": 1})
            .await
            .map_err(|source| MongoDaoError::LoadPlayers { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadPlayers { room_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn assign_roles(&self, room_id: Uuid, roles: Vec<(Uuid, Role)>) -> MongoResult<()> {
        let players = self.players().await;
        for (player_id, role) in roles {
            players
                .update_one(
                    doc! {"_id": player_id.to_string(), "room_id": room_id.to_string()},
                    doc! {"$set": {"role": role.as_str(), "is_alive": true}},
                )
                .await
                .map_err(|source| MongoDaoError::SavePlayer {
                    id: player_id,
                    source,
                })?;
        }
        Ok(())
    }

    async fn set_player_alive(&self, player_id: Uuid, alive: bool) -> MongoResult<()> {
        self.players()
            .await
            .update_one(doc_id(player_id), doc! {"$set": {"is_alive": alive}})
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                id: player_id,
                source,
            })?;
        Ok(())
    }

    async fn increment_scores(&self, awards: Vec<(Uuid, u32)>) -> MongoResult<()> {
        let players = self.players().await;
        let mut applied = Vec::with_capacity(awards.len());
        for (player_id, points) in awards {
            let result = players
                .update_one(
                    doc_id(player_id),
                    doc! {"$inc": {"score": i64::from(points)}},
                )
                .await;
            if let Err(source) = result {
                // revert the partial batch; callers retry the whole award list
                for (awarded_id, awarded) in applied {
                    if let Err(err) = players
                        .update_one(
                            doc_id(awarded_id),
                            doc! {"$inc": {"score": -i64::from(awarded)}},
                        )
                        .await
                    {
                        warn!(
                            player_id = %awarded_id,
                            error = %err,
                            "failed to revert score award"
                        );
                    }
                }
                return Err(MongoDaoError::SavePlayer {
                    id: player_id,
                    source,
                });
            }
            applied.push((player_id, points));
        }
        Ok(())
    }

    async fn insert_assignments(&self, assignments: Vec<AssignmentEntity>) -> MongoResult<()> {
        let Some(room_id) = assignments.first().map(|a| a.room_id) else {
            return Ok(());
        };
        let documents: Vec<MongoAssignmentDocument> =
            assignments.into_iter().map(Into::into).collect();
        self.assignments()
            .await
            .insert_many(documents)
            .await
            .map_err(|source| MongoDaoError::SaveAssignments { room_id, source })?;
        Ok(())
    }

    async fn list_assignments(&self, room_id: Uuid) -> MongoResult<Vec<AssignmentEntity>> {
        let documents: Vec<MongoAssignmentDocument> = self
            .assignments()
            .await
            .find(doc! {"room_id": room_id.to_string()})
            .sort(doc! {"round_number": 1})
            .await
            .map_err(|source| MongoDaoError::LoadAssignments { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAssignments { room_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn upsert_hotseat_vote(&self, vote: HotseatVoteEntity) -> MongoResult<HotseatVoteEntity> {
        let room_id = vote.room_id;
        let filter = doc! {
            "room_id": room_id.to_string(),
            "round_number": i64::from(vote.round_number),
            "guesser_player_id": vote.guesser_player_id.to_string(),
        };
        let seq = self
            .next_vote_seq("hotseat", room_id, vote.round_number)
            .await?;
        let update = doc! {
            "$set": {
                "hotseat_player_id": vote.hotseat_player_id.to_string(),
                "guessed_target_id": vote.guessed_target_id.to_string(),
                "is_correct": Bson::Null,
                "updated_at": DateTime::from_system_time(vote.updated_at),
            },
            "$setOnInsert": {
                "_id": vote.id.to_string(),
                "seq": seq,
                "created_at": DateTime::from_system_time(vote.created_at),
            },
        };

        let collection = self.hotseat_votes().await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = collection
                .find_one_and_update(filter.clone(), update.clone())
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await;
            match result {
                Ok(Some(document)) => return Ok(document.into()),
                Ok(None) => return Err(MongoDaoError::VoteVanished { room_id }),
                Err(source) if is_duplicate_key(&source) && attempt < UPSERT_ATTEMPTS => {
                    debug!(%room_id, "hotseat vote upsert raced; retrying");
                }
                Err(source) => return Err(MongoDaoError::SaveVote { room_id, source }),
            }
        }
    }

    async fn list_hotseat_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> MongoResult<Vec<HotseatVoteEntity>> {
        let map_err = |source| MongoDaoError::LoadVotes {
            room_id,
            round_number,
            source,
        };
        let documents: Vec<MongoHotseatVoteDocument> = self
            .hotseat_votes()
            .await
            .find(doc! {"room_id": room_id.to_string(), "round_number": i64::from(round_number)})
            .sort(doc! {"seq": 1, "created_at": 1, "_id": 1})
            .await
            .map_err(map_err)?
            .try_collect()
            .await
            .map_err(map_err)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn set_hotseat_vote_correctness(
        &self,
        marks: Vec<(Uuid, Option<bool>)>,
    ) -> MongoResult<()> {
        let collection = self.hotseat_votes().await;
        for (vote_id, correct) in marks {
            let correct = correct.map_or(Bson::Null, Bson::Boolean);
            collection
                .update_one(doc_id(vote_id), doc! {"$set": {"is_correct": correct}})
                .await
                .map_err(|source| MongoDaoError::GradeVote { id: vote_id, source })?;
        }
        Ok(())
    }

    async fn upsert_imposter_vote(
        &self,
        vote: ImposterVoteEntity,
    ) -> MongoResult<ImposterVoteEntity> {
        let room_id = vote.room_id;
        let filter = doc! {
            "room_id": room_id.to_string(),
            "round_number": i64::from(vote.round_number),
            "voter_id": vote.voter_id.to_string(),
        };
        let seq = self
            .next_vote_seq("imposter", room_id, vote.round_number)
            .await?;
        let update = doc! {
            "$set": {
                "target_id": vote.target_id.to_string(),
                "updated_at": DateTime::from_system_time(vote.updated_at),
            },
            "$setOnInsert": {
                "_id": vote.id.to_string(),
                "seq": seq,
                "created_at": DateTime::from_system_time(vote.created_at),
            },
        };

        let collection = self.imposter_votes().await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = collection
                .find_one_and_update(filter.clone(), update.clone())
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await;
            match result {
                Ok(Some(document)) => return Ok(document.into()),
                Ok(None) => return Err(MongoDaoError::VoteVanished { room_id }),
                Err(source) if is_duplicate_key(&source) && attempt < UPSERT_ATTEMPTS => {
                    debug!(%room_id, "imposter vote upsert raced; retrying");
                }
                Err(source) => return Err(MongoDaoError::SaveVote { room_id, source }),
            }
        }
    }

    async fn list_imposter_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> MongoResult<Vec<ImposterVoteEntity>> {
        let map_err = |source| MongoDaoError::LoadVotes {
            room_id,
            round_number,
            source,
        };
        let documents: Vec<MongoImposterVoteDocument> = self
            .imposter_votes()
            .await
            .find(doc! {"room_id": room_id.to_string(), "round_number": i64::from(round_number)})
            .sort(doc! {"seq": 1, "created_at": 1, "_id": 1})
            .await
            .map_err(map_err)?
            .try_collect()
            .await
            .map_err(map_err)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl RoomStore for MongoRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room(id).await.map_err(Into::into) })
    }

    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room_by_code(code).await.map_err(Into::into) })
    }

    fn compare_and_swap_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap_room(room, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_player(player).await.map_err(Into::into) })
    }

    fn update_player_profile(
        &self,
        player_id: Uuid,
        display_name: String,
        last_seen_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_player_profile(player_id, display_name, last_seen_at)
                .await
                .map_err(Into::into)
        })
    }

    fn find_player_by_session(
        &self,
        room_id: Uuid,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_player_by_session(room_id, session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players(room_id).await.map_err(Into::into) })
    }

    fn assign_roles(
        &self,
        room_id: Uuid,
        roles: Vec<(Uuid, Role)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.assign_roles(room_id, roles).await.map_err(Into::into) })
    }

    fn set_player_alive(
        &self,
        player_id: Uuid,
        alive: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_player_alive(player_id, alive)
                .await
                .map_err(Into::into)
        })
    }

    fn increment_scores(&self, awards: Vec<(Uuid, u32)>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.increment_scores(awards).await.map_err(Into::into) })
    }

    fn insert_assignments(
        &self,
        assignments: Vec<AssignmentEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_assignments(assignments)
                .await
                .map_err(Into::into)
        })
    }

    fn list_assignments(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AssignmentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_assignments(room_id).await.map_err(Into::into) })
    }

    fn upsert_hotseat_vote(
        &self,
        vote: HotseatVoteEntity,
    ) -> BoxFuture<'static, StorageResult<HotseatVoteEntity>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_hotseat_vote(vote).await.map_err(Into::into) })
    }

    fn list_hotseat_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<HotseatVoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_hotseat_votes(room_id, round_number)
                .await
                .map_err(Into::into)
        })
    }

    fn set_hotseat_vote_correctness(
        &self,
        marks: Vec<(Uuid, Option<bool>)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_hotseat_vote_correctness(marks)
                .await
                .map_err(Into::into)
        })
    }

    fn upsert_imposter_vote(
        &self,
        vote: ImposterVoteEntity,
    ) -> BoxFuture<'static, StorageResult<ImposterVoteEntity>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_imposter_vote(vote).await.map_err(Into::into) })
    }

    fn list_imposter_votes(
        &self,
        room_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<ImposterVoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_imposter_votes(room_id, round_number)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

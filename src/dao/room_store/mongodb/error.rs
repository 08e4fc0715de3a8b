use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("duplicate key in collection `{collection}`")]
    Duplicate {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write room `{id}`")]
    SaveRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{code}`")]
    LoadRoom {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write player `{id}`")]
    SavePlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load players of room `{room_id}`")]
    LoadPlayers {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to write assignments of room `{room_id}`")]
    SaveAssignments {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load assignments of room `{room_id}`")]
    LoadAssignments {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to write vote in room `{room_id}`")]
    SaveVote {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load votes of room `{room_id}` round {round_number}")]
    LoadVotes {
        room_id: Uuid,
        round_number: u32,
        #[source]
        source: MongoError,
    },
    #[error("failed to record correctness of vote `{id}`")]
    GradeVote {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to allocate vote sequence `{key}`")]
    VoteSequence {
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("upserted vote in room `{room_id}` could not be read back")]
    VoteVanished { room_id: Uuid },
}

/// Whether the driver error reports a unique index violation.
pub(super) fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

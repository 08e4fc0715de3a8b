use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{
        AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
    },
    state::room::{GameMode, Role},
};

// Identifiers are stored as hyphenated strings so documents stay readable in
// the shell and filters never depend on the UUID binary representation.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub code: String,
    pub host_player_id: String,
    pub mode: GameMode,
    pub phase: String,
    pub round_number: i64,
    pub version: i64,
    pub topic: Option<String>,
    pub secret_word: Option<String>,
    pub hotseat_player_id: Option<String>,
    #[serde(default)]
    pub hotseat_history: Vec<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub display_name: String,
    pub is_host: bool,
    pub session_id: String,
    pub score: i64,
    pub role: Option<Role>,
    pub is_alive: Option<bool>,
    pub joined_at: DateTime,
    pub last_seen_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAssignmentDocument {
    pub room_id: String,
    pub giver_player_id: String,
    pub target_player_id: String,
    pub round_number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHotseatVoteDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub round_number: i64,
    pub hotseat_player_id: String,
    pub guesser_player_id: String,
    pub guessed_target_id: String,
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub seq: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoImposterVoteDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub round_number: i64,
    pub voter_id: String,
    pub target_id: String,
    #[serde(default)]
    pub seq: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Counter handing out insertion sequence numbers to the votes of one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteSequenceDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub seq: i64,
}

/// Key of the sequence counter shared by the votes of a room round.
pub fn vote_sequence_key(kind: &str, room_id: Uuid, round_number: u32) -> String {
    format!("{kind}:{room_id}:{round_number}")
}

/// Filter matching a document by its string `_id`.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Parse a stored identifier, mapping corrupt values to the nil UUID.
fn parse_id(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_default()
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id.to_string(),
            code: value.code,
            host_player_id: value.host_player_id.to_string(),
            mode: value.mode,
            phase: value.phase,
            round_number: i64::from(value.round_number),
            version: i64::try_from(value.version).unwrap_or(i64::MAX),
            topic: value.topic,
            secret_word: value.secret_word,
            hotseat_player_id: value.hotseat_player_id.map(|id| id.to_string()),
            hotseat_history: value
                .hotseat_history
                .iter()
                .map(ToString::to_string)
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: parse_id(&value.id),
            code: value.code,
            host_player_id: parse_id(&value.host_player_id),
            mode: value.mode,
            phase: value.phase,
            round_number: to_u32(value.round_number),
            version: u64::try_from(value.version).unwrap_or_default(),
            topic: value.topic,
            secret_word: value.secret_word,
            hotseat_player_id: value.hotseat_player_id.as_deref().map(parse_id),
            hotseat_history: value.hotseat_history.iter().map(|id| parse_id(id)).collect(),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            room_id: value.room_id.to_string(),
            display_name: value.display_name,
            is_host: value.is_host,
            session_id: value.session_id,
            score: i64::from(value.score),
            role: value.role,
            is_alive: value.is_alive,
            joined_at: DateTime::from_system_time(value.joined_at),
            last_seen_at: DateTime::from_system_time(value.last_seen_at),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: parse_id(&value.id),
            room_id: parse_id(&value.room_id),
            display_name: value.display_name,
            is_host: value.is_host,
            session_id: value.session_id,
            score: to_u32(value.score),
            role: value.role,
            is_alive: value.is_alive,
            joined_at: value.joined_at.to_system_time(),
            last_seen_at: value.last_seen_at.to_system_time(),
        }
    }
}

impl From<AssignmentEntity> for MongoAssignmentDocument {
    fn from(value: AssignmentEntity) -> Self {
        Self {
            room_id: value.room_id.to_string(),
            giver_player_id: value.giver_player_id.to_string(),
            target_player_id: value.target_player_id.to_string(),
            round_number: i64::from(value.round_number),
        }
    }
}

impl From<MongoAssignmentDocument> for AssignmentEntity {
    fn from(value: MongoAssignmentDocument) -> Self {
        Self {
            room_id: parse_id(&value.room_id),
            giver_player_id: parse_id(&value.giver_player_id),
            target_player_id: parse_id(&value.target_player_id),
            round_number: to_u32(value.round_number),
        }
    }
}

impl From<MongoHotseatVoteDocument> for HotseatVoteEntity {
    fn from(value: MongoHotseatVoteDocument) -> Self {
        Self {
            id: parse_id(&value.id),
            room_id: parse_id(&value.room_id),
            round_number: to_u32(value.round_number),
            hotseat_player_id: parse_id(&value.hotseat_player_id),
            guesser_player_id: parse_id(&value.guesser_player_id),
            guessed_target_id: parse_id(&value.guessed_target_id),
            is_correct: value.is_correct,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

impl From<MongoImposterVoteDocument> for ImposterVoteEntity {
    fn from(value: MongoImposterVoteDocument) -> Self {
        Self {
            id: parse_id(&value.id),
            room_id: parse_id(&value.room_id),
            round_number: to_u32(value.round_number),
            voter_id: parse_id(&value.voter_id),
            target_id: parse_id(&value.target_id),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn room_document_preserves_identity_fields() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        let featured = Uuid::new_v4();
        let room = RoomEntity {
            id: Uuid::new_v4(),
            code: "HJKMNP".into(),
            host_player_id: Uuid::new_v4(),
            mode: GameMode::Hotseat,
            phase: "WHEEL".into(),
            round_number: 2,
            version: 7,
            topic: None,
            secret_word: None,
            hotseat_player_id: Some(featured),
            hotseat_history: vec![featured],
            created_at: now,
            updated_at: now,
        };

        let document: MongoRoomDocument = room.clone().into();
        assert_eq!(document.id, room.id.to_string());
        assert_eq!(document.version, 7);

        let back: RoomEntity = document.into();
        assert_eq!(back, room);
    }

    #[test]
    fn vote_sequences_are_scoped_per_mode_room_and_round() {
        let room_id = Uuid::new_v4();
        let key = vote_sequence_key("imposter", room_id, 3);
        assert_eq!(key, format!("imposter:{room_id}:3"));
        assert_ne!(key, vote_sequence_key("imposter", room_id, 4));
        assert_ne!(key, vote_sequence_key("hotseat", room_id, 3));
        assert_ne!(key, vote_sequence_key("imposter", Uuid::new_v4(), 3));
    }

    #[test]
    fn legacy_votes_without_a_sequence_still_decode() {
        let now = DateTime::now();
        let raw = doc! {
            "_id": Uuid::new_v4().to_string(),
            "room_id": Uuid::new_v4().to_string(),
            "round_number": 1_i64,
            "voter_id": Uuid::new_v4().to_string(),
            "target_id": Uuid::new_v4().to_string(),
            "created_at": now,
            "updated_at": now,
        };
        let document: MongoImposterVoteDocument =
            mongodb::bson::deserialize_from_document(raw).expect("decode vote");
        assert_eq!(document.seq, 0);
    }
}

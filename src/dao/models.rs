use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::room::{GameMode, Role};

/// Room row shared by every storage backend.
///
/// The phase is stored as its wire string; the service layer parses it against
/// the room's mode before acting on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Unique short code players type to join.
    pub code: String,
    /// Player that owns the room and may drive transitions.
    pub host_player_id: Uuid,
    /// Game mode, fixed at creation.
    pub mode: GameMode,
    /// Current phase name (mode specific).
    pub phase: String,
    /// Round counter, never decreases.
    pub round_number: u32,
    /// Optimistic concurrency token, bumped on every room write.
    pub version: u64,
    /// Deduction mode topic chosen by the host.
    pub topic: Option<String>,
    /// Deduction mode secret word known to civilians.
    pub secret_word: Option<String>,
    /// Hotseat mode featured player.
    pub hotseat_player_id: Option<Uuid>,
    /// Hotseat mode players already featured, in selection order.
    pub hotseat_history: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last write timestamp.
    pub updated_at: SystemTime,
}

/// Participant row, unique per (room, session token).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Room the player belongs to.
    pub room_id: Uuid,
    /// Name shown to other players (1-20 characters).
    pub display_name: String,
    /// Whether the player owns the room.
    pub is_host: bool,
    /// Opaque client-held token identifying the browser session.
    pub session_id: String,
    /// Cumulative score within the game.
    pub score: u32,
    /// Deduction mode role, absent until a round starts.
    pub role: Option<Role>,
    /// Deduction mode liveness, absent until a round starts.
    pub is_alive: Option<bool>,
    /// Join timestamp, used for ordering.
    pub joined_at: SystemTime,
    /// Last time the session re-joined.
    pub last_seen_at: SystemTime,
}

/// Giver → target edge of the hotseat impersonation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignmentEntity {
    /// Room the assignment belongs to.
    pub room_id: Uuid,
    /// Player doing the impersonation.
    pub giver_player_id: Uuid,
    /// Player being impersonated.
    pub target_player_id: Uuid,
    /// Round in which the cycle was created.
    pub round_number: u32,
}

/// Guess submitted during hotseat voting, unique per (room, round, guesser).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HotseatVoteEntity {
    /// Primary key of the vote.
    pub id: Uuid,
    /// Room the vote belongs to.
    pub room_id: Uuid,
    /// Round the vote was cast in.
    pub round_number: u32,
    /// Player featured when the vote was cast.
    pub hotseat_player_id: Uuid,
    /// Player who guessed.
    pub guesser_player_id: Uuid,
    /// Player the guesser believes was impersonated.
    pub guessed_target_id: Uuid,
    /// Correctness, computed at resolution time.
    pub is_correct: Option<bool>,
    /// First submission timestamp, kept on overwrite.
    pub created_at: SystemTime,
    /// Last overwrite timestamp.
    pub updated_at: SystemTime,
}

/// Elimination vote in the deduction mode, unique per (room, round, voter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImposterVoteEntity {
    /// Primary key of the vote.
    pub id: Uuid,
    /// Room the vote belongs to.
    pub room_id: Uuid,
    /// Round the vote was cast in.
    pub round_number: u32,
    /// Player who voted.
    pub voter_id: Uuid,
    /// Player the voter wants eliminated.
    pub target_id: Uuid,
    /// First submission timestamp, kept on overwrite.
    pub created_at: SystemTime,
    /// Last overwrite timestamp.
    pub updated_at: SystemTime,
}

impl HotseatVoteEntity {
    /// Build a fresh vote row stamped with the current time.
    pub fn new(
        room_id: Uuid,
        round_number: u32,
        hotseat_player_id: Uuid,
        guesser_player_id: Uuid,
        guessed_target_id: Uuid,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            room_id,
            round_number,
            hotseat_player_id,
            guesser_player_id,
            guessed_target_id,
            is_correct: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ImposterVoteEntity {
    /// Build a fresh vote row stamped with the current time.
    pub fn new(room_id: Uuid, round_number: u32, voter_id: Uuid, target_id: Uuid) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            room_id,
            round_number,
            voter_id,
            target_id,
            created_at: now,
            updated_at: now,
        }
    }
}

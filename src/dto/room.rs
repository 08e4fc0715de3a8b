use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity, RoomEntity,
    },
    dto::{format_system_time, validation::validate_display_name},
    engine::resolution::{HotseatRoundOutcome, ImposterRoundOutcome},
    state::room::{GameMode, Role, Winner},
};

/// Payload used to open a new room; the caller becomes its host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
    /// Opaque token the browser keeps to identify itself.
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    /// Game mode, fixed for the lifetime of the room.
    #[serde(default = "default_mode")]
    pub mode: GameMode,
}

fn default_mode() -> GameMode {
    GameMode::Hotseat
}

/// Payload used to enter (or re-enter) a room still in its lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

/// Host request starting the game (hotseat) or a round (deduction).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    /// Deduction mode topic; the configured default is used when omitted.
    #[serde(default)]
    pub topic: Option<String>,
}

/// Host request for a plain session-authenticated action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SessionRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

/// Host request moving the room to its next phase.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdvanceRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    /// Phase the host expects to land in. Rejected when it is not the next one.
    #[serde(default)]
    pub to: Option<String>,
}

/// Vote for the player the caller suspects (deduction) or guesses (hotseat).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VoteRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    pub target_player_id: Uuid,
}

/// Query string of the private secret view.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct SessionQuery {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

/// Public projection of a room. The secret word is never part of it.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomView {
    pub id: Uuid,
    pub code: String,
    pub host_player_id: Uuid,
    pub mode: GameMode,
    pub phase: String,
    pub round_number: u32,
    pub version: u64,
    pub topic: Option<String>,
    pub hotseat_player_id: Option<Uuid>,
    pub hotseat_history: Vec<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&RoomEntity> for RoomView {
    fn from(room: &RoomEntity) -> Self {
        Self {
            id: room.id,
            code: room.code.clone(),
            host_player_id: room.host_player_id,
            mode: room.mode,
            phase: room.phase.clone(),
            round_number: room.round_number,
            version: room.version,
            topic: room.topic.clone(),
            hotseat_player_id: room.hotseat_player_id,
            hotseat_history: room.hotseat_history.clone(),
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

/// Public projection of a player: no session token, no role.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub display_name: String,
    pub is_host: bool,
    pub score: u32,
    /// Present in the deduction mode once a round has started.
    pub is_alive: Option<bool>,
    pub joined_at: String,
}

impl From<&PlayerEntity> for PlayerView {
    fn from(player: &PlayerEntity) -> Self {
        Self {
            id: player.id,
            display_name: player.display_name.clone(),
            is_host: player.is_host,
            score: player.score,
            is_alive: player.is_alive,
            joined_at: format_system_time(player.joined_at),
        }
    }
}

/// Convert a slice of player rows into their public projection.
pub fn player_views(players: &[PlayerEntity]) -> Vec<PlayerView> {
    players.iter().map(PlayerView::from).collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignmentView {
    pub giver_player_id: Uuid,
    pub target_player_id: Uuid,
    pub round_number: u32,
}

impl From<&AssignmentEntity> for AssignmentView {
    fn from(assignment: &AssignmentEntity) -> Self {
        Self {
            giver_player_id: assignment.giver_player_id,
            target_player_id: assignment.target_player_id,
            round_number: assignment.round_number,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HotseatVoteView {
    pub id: Uuid,
    pub round_number: u32,
    pub hotseat_player_id: Uuid,
    pub guesser_player_id: Uuid,
    pub guessed_target_id: Uuid,
    pub is_correct: Option<bool>,
}

impl From<&HotseatVoteEntity> for HotseatVoteView {
    fn from(vote: &HotseatVoteEntity) -> Self {
        Self {
            id: vote.id,
            round_number: vote.round_number,
            hotseat_player_id: vote.hotseat_player_id,
            guesser_player_id: vote.guesser_player_id,
            guessed_target_id: vote.guessed_target_id,
            is_correct: vote.is_correct,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImposterVoteView {
    pub id: Uuid,
    pub round_number: u32,
    pub voter_id: Uuid,
    pub target_id: Uuid,
}

impl From<&ImposterVoteEntity> for ImposterVoteView {
    fn from(vote: &ImposterVoteEntity) -> Self {
        Self {
            id: vote.id,
            round_number: vote.round_number,
            voter_id: vote.voter_id,
            target_id: vote.target_id,
        }
    }
}

/// A vote of either mode.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum VoteView {
    Hotseat(HotseatVoteView),
    Imposter(ImposterVoteView),
}

/// Number of votes a target received.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteCountView {
    pub target_id: Uuid,
    pub count: usize,
}

/// Graded guesses of one hotseat turn.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HotseatResultView {
    pub round_number: u32,
    pub hotseat_player_id: Uuid,
    /// Player the featured player was impersonating.
    pub actual_target_id: Uuid,
    pub correct_voter_ids: Vec<Uuid>,
    pub incorrect_voter_ids: Vec<Uuid>,
    pub votes: Vec<HotseatVoteView>,
}

impl HotseatResultView {
    /// Project an outcome together with the graded vote rows.
    pub fn new(round_number: u32, outcome: HotseatRoundOutcome, votes: &[HotseatVoteEntity]) -> Self {
        let grades: IndexMap<Uuid, bool> = outcome.marks.iter().copied().collect();
        let votes = votes
            .iter()
            .filter(|vote| vote.hotseat_player_id == outcome.hotseat_player_id)
            .map(|vote| {
                let mut view = HotseatVoteView::from(vote);
                view.is_correct = grades.get(&vote.id).copied();
                view
            })
            .collect();

        Self {
            round_number,
            hotseat_player_id: outcome.hotseat_player_id,
            actual_target_id: outcome.actual_target_id,
            correct_voter_ids: outcome.correct_voter_ids,
            incorrect_voter_ids: outcome.incorrect_voter_ids,
            votes,
        }
    }
}

/// Summary of an elimination round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImposterResultView {
    pub round_number: u32,
    pub eliminated_player_id: Uuid,
    pub eliminated_role: Role,
    pub winner: Winner,
    pub imposter_ids: Vec<Uuid>,
    pub correct_voter_ids: Vec<Uuid>,
    pub incorrect_voter_ids: Vec<Uuid>,
    /// Tally in first-vote order.
    pub vote_counts: Vec<VoteCountView>,
}

impl ImposterResultView {
    pub fn new(round_number: u32, outcome: ImposterRoundOutcome) -> Self {
        Self {
            round_number,
            eliminated_player_id: outcome.eliminated_player_id,
            eliminated_role: outcome.eliminated_role,
            winner: outcome.winner,
            imposter_ids: outcome.imposter_ids,
            correct_voter_ids: outcome.correct_voter_ids,
            incorrect_voter_ids: outcome.incorrect_voter_ids,
            vote_counts: outcome
                .vote_counts
                .into_iter()
                .map(|(target_id, count)| VoteCountView { target_id, count })
                .collect(),
        }
    }
}

/// Round result projection, tagged by game mode.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundResultView {
    Hotseat(HotseatResultView),
    Imposter(ImposterResultView),
}

/// Response of create and join: the caller's own row plus the room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSessionResponse {
    pub room: RoomView,
    pub player: PlayerView,
    pub players: Vec<PlayerView>,
}

/// Everything a client needs to render a room.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    pub room: RoomView,
    /// Ordered by join time.
    pub players: Vec<PlayerView>,
    /// Votes of the current round.
    pub votes: Vec<VoteView>,
    /// Active impersonation cycle (hotseat mode).
    pub assignments: Vec<AssignmentView>,
    pub round_result: Option<RoundResultView>,
}

/// Outcome of a wheel spin.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpinResponse {
    pub room: RoomView,
    pub hotseat_player_id: Uuid,
}

/// Outcome of a vote submission.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteResponse {
    pub vote: VoteView,
    /// Votes recorded this round, the caller's included.
    pub votes_cast: usize,
    /// Set when this vote completed the round and triggered its resolution.
    pub round_result: Option<RoundResultView>,
}

/// The caller's private view of a deduction round.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SecretView {
    pub player_id: Uuid,
    pub role: Option<Role>,
    pub topic: Option<String>,
    /// Only civilians see the word.
    pub secret_word: Option<String>,
}

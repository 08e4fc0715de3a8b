use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dao::models::RoomEntity,
    state::{hotseat::HotseatPhase, imposter::ImposterPhase},
};

/// Game mode of a room, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    /// Players take turns answering as the person they were assigned.
    Hotseat,
    /// Social deduction: civilians share a secret word, imposters bluff.
    Imposter,
}

/// Deduction mode role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Knows the secret word.
    Civilian,
    /// Only knows the topic.
    Imposter,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Civilian => "CIVILIAN",
            Role::Imposter => "IMPOSTER",
        }
    }
}

/// Faction that won a deduction round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
    /// An imposter was eliminated.
    Civilians,
    /// A civilian was eliminated.
    Imposters,
}

/// Phase of a room, tagged by the mode whose graph it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Hotseat(HotseatPhase),
    Imposter(ImposterPhase),
}

/// The stored phase string is not part of the room mode's graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("room `{code}` has unknown phase `{phase}` for mode {mode:?}")]
pub struct UnknownPhase {
    pub code: String,
    pub mode: GameMode,
    pub phase: String,
}

impl RoomPhase {
    /// Phase a freshly created room of `mode` starts in.
    pub fn initial(mode: GameMode) -> Self {
        match mode {
            GameMode::Hotseat => RoomPhase::Hotseat(HotseatPhase::Lobby),
            GameMode::Imposter => RoomPhase::Imposter(ImposterPhase::Lobby),
        }
    }

    /// Parse a wire phase name within the graph of `mode`.
    pub fn parse(mode: GameMode, raw: &str) -> Option<Self> {
        match mode {
            GameMode::Hotseat => HotseatPhase::parse(raw).map(RoomPhase::Hotseat),
            GameMode::Imposter => ImposterPhase::parse(raw).map(RoomPhase::Imposter),
        }
    }

    /// Decode the phase stored on a room row.
    pub fn of(room: &RoomEntity) -> Result<Self, UnknownPhase> {
        Self::parse(room.mode, &room.phase).ok_or_else(|| UnknownPhase {
            code: room.code.clone(),
            mode: room.mode,
            phase: room.phase.clone(),
        })
    }

    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            RoomPhase::Hotseat(phase) => phase.as_str(),
            RoomPhase::Imposter(phase) => phase.as_str(),
        }
    }

    /// Whether the room still accepts new players.
    pub fn is_lobby(self) -> bool {
        matches!(
            self,
            RoomPhase::Hotseat(HotseatPhase::Lobby) | RoomPhase::Imposter(ImposterPhase::Lobby)
        )
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_parse_only_within_their_mode() {
        assert_eq!(
            RoomPhase::parse(GameMode::Hotseat, "WHEEL"),
            Some(RoomPhase::Hotseat(HotseatPhase::Wheel))
        );
        assert_eq!(RoomPhase::parse(GameMode::Imposter, "WHEEL"), None);
        assert_eq!(
            RoomPhase::parse(GameMode::Imposter, "SECRET_REVEAL"),
            Some(RoomPhase::Imposter(ImposterPhase::SecretReveal))
        );
        assert_eq!(RoomPhase::parse(GameMode::Hotseat, "lobby"), None);
    }

    #[test]
    fn rooms_start_in_the_lobby() {
        for mode in [GameMode::Hotseat, GameMode::Imposter] {
            let phase = RoomPhase::initial(mode);
            assert!(phase.is_lobby());
            assert_eq!(phase.as_str(), "LOBBY");
        }
    }

    #[test]
    fn enums_use_screaming_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&GameMode::Imposter).unwrap(),
            "\"IMPOSTER\""
        );
        assert_eq!(serde_json::to_string(&Role::Civilian).unwrap(), "\"CIVILIAN\"");
        assert_eq!(
            serde_json::to_string(&Winner::Imposters).unwrap(),
            "\"IMPOSTERS\""
        );
    }
}

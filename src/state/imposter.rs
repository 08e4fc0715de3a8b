use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::state_machine::{PhaseGraph, Route};

/// Phases of the social deduction game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImposterPhase {
    Lobby,
    /// Players privately look at their role and the secret word.
    SecretReveal,
    /// Optional clue-giving round.
    Clue,
    Voting,
    Reveal,
    /// Terminal; reached only by resolving a vote.
    GameOver,
}

impl ImposterPhase {
    /// Every phase in play order.
    pub const ALL: [ImposterPhase; 6] = [
        ImposterPhase::Lobby,
        ImposterPhase::SecretReveal,
        ImposterPhase::Clue,
        ImposterPhase::Voting,
        ImposterPhase::Reveal,
        ImposterPhase::GameOver,
    ];

    /// Wire name of the phase, as stored on the room row.
    pub fn as_str(self) -> &'static str {
        match self {
            ImposterPhase::Lobby => "LOBBY",
            ImposterPhase::SecretReveal => "SECRET_REVEAL",
            ImposterPhase::Clue => "CLUE",
            ImposterPhase::Voting => "VOTING",
            ImposterPhase::Reveal => "REVEAL",
            ImposterPhase::GameOver => "GAME_OVER",
        }
    }

    /// Inverse of [`ImposterPhase::as_str`]; `None` for names outside this graph.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == raw)
    }
}

impl fmt::Display for ImposterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events driving the deduction graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImposterEvent {
    /// Host starts a round (from the lobby or after a reveal).
    StartRound,
    StartClues,
    /// Host opens voting, with or without a clue round first.
    StartVoting,
    /// Votes reached the player count and the round was resolved.
    RoundResolved,
}

impl ImposterEvent {
    /// Every event, used to check the graph exhaustively.
    pub const ALL: [ImposterEvent; 4] = [
        ImposterEvent::StartRound,
        ImposterEvent::StartClues,
        ImposterEvent::StartVoting,
        ImposterEvent::RoundResolved,
    ];

    /// Event a bare host advance towards `to` triggers.
    ///
    /// Entering SECRET_REVEAL needs start-round (roles and word are drawn
    /// there) and REVEAL/GAME_OVER are reached only through resolution.
    pub fn host_advance(to: ImposterPhase) -> Option<Self> {
        match to {
            ImposterPhase::Clue => Some(ImposterEvent::StartClues),
            ImposterPhase::Voting => Some(ImposterEvent::StartVoting),
            ImposterPhase::Lobby
            | ImposterPhase::SecretReveal
            | ImposterPhase::Reveal
            | ImposterPhase::GameOver => None,
        }
    }

    /// Default host advance when no target phase is given.
    pub fn default_advance(from: ImposterPhase) -> Option<Self> {
        match from {
            ImposterPhase::SecretReveal => Some(ImposterEvent::StartClues),
            ImposterPhase::Clue => Some(ImposterEvent::StartVoting),
            _ => None,
        }
    }
}

/// Phase graph of the deduction mode.
///
/// VOTING → REVEAL is part of the adjacency table but no host event takes
/// it; resolution moves VOTING to GAME_OVER outside the table.
#[derive(Debug, Clone, Copy)]
pub struct ImposterGraph;

impl PhaseGraph for ImposterGraph {
    type Phase = ImposterPhase;
    type Event = ImposterEvent;

    const INITIAL: ImposterPhase = ImposterPhase::Lobby;

    fn edges(from: ImposterPhase) -> &'static [ImposterPhase] {
        use ImposterPhase::*;
        match from {
            Lobby => &[SecretReveal],
            SecretReveal => &[Clue, Voting],
            Clue => &[Voting],
            Voting => &[Reveal],
            Reveal => &[SecretReveal],
            GameOver => &[],
        }
    }

    fn route(event: &ImposterEvent) -> Route<ImposterPhase> {
        use ImposterPhase::*;
        let (from, to): (&'static [ImposterPhase], ImposterPhase) = match event {
            ImposterEvent::StartRound => (&[Lobby, Reveal], SecretReveal),
            ImposterEvent::StartClues => (&[SecretReveal], Clue),
            ImposterEvent::StartVoting => (&[SecretReveal, Clue], Voting),
            ImposterEvent::RoundResolved => (&[Voting], GameOver),
        };
        Route { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{PhaseMachine, is_terminal, is_valid_transition, next_phase};

    fn expected(phase: ImposterPhase, event: ImposterEvent) -> Option<ImposterPhase> {
        use ImposterEvent as E;
        use ImposterPhase as P;
        match (phase, event) {
            (P::Lobby | P::Reveal, E::StartRound) => Some(P::SecretReveal),
            (P::SecretReveal, E::StartClues) => Some(P::Clue),
            (P::SecretReveal | P::Clue, E::StartVoting) => Some(P::Voting),
            (P::Voting, E::RoundResolved) => Some(P::GameOver),
            _ => None,
        }
    }

    #[test]
    fn every_phase_event_pair_matches_the_table() {
        for phase in ImposterPhase::ALL {
            for event in ImposterEvent::ALL {
                assert_eq!(
                    next_phase::<ImposterGraph>(phase, &event),
                    expected(phase, event),
                    "{phase} + {event:?}"
                );
            }
        }
    }

    #[test]
    fn host_events_follow_edges_and_resolution_does_not() {
        for event in [
            ImposterEvent::StartRound,
            ImposterEvent::StartClues,
            ImposterEvent::StartVoting,
        ] {
            let route = ImposterGraph::route(&event);
            for from in route.from {
                assert!(is_valid_transition::<ImposterGraph>(*from, route.to));
            }
        }
        assert!(!is_valid_transition::<ImposterGraph>(
            ImposterPhase::Voting,
            ImposterPhase::GameOver
        ));
    }

    #[test]
    fn adjacency_table_is_exact() {
        assert!(is_valid_transition::<ImposterGraph>(
            ImposterPhase::SecretReveal,
            ImposterPhase::Voting
        ));
        assert!(is_valid_transition::<ImposterGraph>(
            ImposterPhase::Voting,
            ImposterPhase::Reveal
        ));
        assert!(is_valid_transition::<ImposterGraph>(
            ImposterPhase::Reveal,
            ImposterPhase::SecretReveal
        ));
        assert!(!is_valid_transition::<ImposterGraph>(
            ImposterPhase::Lobby,
            ImposterPhase::Voting
        ));
        assert!(!is_valid_transition::<ImposterGraph>(
            ImposterPhase::Clue,
            ImposterPhase::SecretReveal
        ));
        assert!(is_terminal::<ImposterGraph>(ImposterPhase::GameOver));
    }

    #[test]
    fn clue_round_is_skippable() {
        let machine = PhaseMachine::<ImposterGraph>::at(ImposterPhase::SecretReveal, 4);
        let plan = machine.plan(ImposterEvent::StartVoting).unwrap();
        assert_eq!(plan.to, ImposterPhase::Voting);
        assert_eq!(plan.version, 4);
    }

    #[test]
    fn host_cannot_advance_into_resolution_phases() {
        assert_eq!(ImposterEvent::host_advance(ImposterPhase::Reveal), None);
        assert_eq!(ImposterEvent::host_advance(ImposterPhase::GameOver), None);
        assert_eq!(ImposterEvent::host_advance(ImposterPhase::SecretReveal), None);
        assert_eq!(
            ImposterEvent::host_advance(ImposterPhase::Voting),
            Some(ImposterEvent::StartVoting)
        );
        assert_eq!(ImposterEvent::default_advance(ImposterPhase::Voting), None);
    }

    #[test]
    fn parse_round_trips_wire_names() {
        for phase in ImposterPhase::ALL {
            assert_eq!(ImposterPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(
            serde_json::to_string(&ImposterPhase::SecretReveal).unwrap(),
            "\"SECRET_REVEAL\""
        );
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::state_machine::{PhaseGraph, Route};

/// Phases of the hotseat guessing game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HotseatPhase {
    /// Waiting for players to join.
    Lobby,
    /// Impersonation cycle is being created.
    Assignment,
    /// Players learn who they impersonate.
    Intro,
    /// Waiting for the host to spin for the next featured player.
    Wheel,
    /// The featured player answers questions in character.
    Hotseat,
    /// Everyone guesses who the featured player impersonates.
    Voting,
    /// Correct answer is shown.
    Reveal,
    /// Scores between rounds.
    Scoreboard,
    /// Every player has been featured.
    Complete,
}

impl HotseatPhase {
    /// Every phase in play order.
    pub const ALL: [HotseatPhase; 9] = [
        HotseatPhase::Lobby,
        HotseatPhase::Assignment,
        HotseatPhase::Intro,
        HotseatPhase::Wheel,
        HotseatPhase::Hotseat,
        HotseatPhase::Voting,
        HotseatPhase::Reveal,
        HotseatPhase::Scoreboard,
        HotseatPhase::Complete,
    ];

    /// Wire name of the phase, as stored on the room row.
    pub fn as_str(self) -> &'static str {
        match self {
            HotseatPhase::Lobby => "LOBBY",
            HotseatPhase::Assignment => "ASSIGNMENT",
            HotseatPhase::Intro => "INTRO",
            HotseatPhase::Wheel => "WHEEL",
            HotseatPhase::Hotseat => "HOTSEAT",
            HotseatPhase::Voting => "VOTING",
            HotseatPhase::Reveal => "REVEAL",
            HotseatPhase::Scoreboard => "SCOREBOARD",
            HotseatPhase::Complete => "COMPLETE",
        }
    }

    /// Inverse of [`HotseatPhase::as_str`]; `None` for names outside this graph.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == raw)
    }
}

impl fmt::Display for HotseatPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events driving the hotseat graph. Each is accepted in exactly one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotseatEvent {
    /// Host leaves the lobby.
    StartGame,
    /// The impersonation cycle is stored.
    AssignmentsCreated,
    /// Host ends the intro.
    IntroComplete,
    /// The wheel picked a featured player.
    WheelSpun,
    /// Host closes the questioning of the featured player.
    HotseatComplete,
    /// Host closes the guesses; grading follows.
    VotingComplete,
    /// Host moves from the reveal to the scoreboard.
    RevealComplete,
    /// Some players have not been featured yet.
    ContinueGame,
    /// Everyone has been featured.
    EndGame,
}

impl HotseatEvent {
    /// Every event, used to check the graph exhaustively.
    pub const ALL: [HotseatEvent; 9] = [
        HotseatEvent::StartGame,
        HotseatEvent::AssignmentsCreated,
        HotseatEvent::IntroComplete,
        HotseatEvent::WheelSpun,
        HotseatEvent::HotseatComplete,
        HotseatEvent::VotingComplete,
        HotseatEvent::RevealComplete,
        HotseatEvent::ContinueGame,
        HotseatEvent::EndGame,
    ];

    /// Event the scoreboard leads to: the rotation is complete once the
    /// featured history covers every player.
    pub fn after_scoreboard(history_len: usize, player_count: usize) -> Self {
        if history_len >= player_count {
            HotseatEvent::EndGame
        } else {
            HotseatEvent::ContinueGame
        }
    }

    /// Event a bare host advance triggers from `from`.
    ///
    /// Lobby, assignment and wheel have dedicated operations (start, internal
    /// creation, spin); the terminal phase has none.
    pub fn host_advance(from: HotseatPhase, history_len: usize, player_count: usize) -> Option<Self> {
        match from {
            HotseatPhase::Intro => Some(HotseatEvent::IntroComplete),
            HotseatPhase::Hotseat => Some(HotseatEvent::HotseatComplete),
            HotseatPhase::Voting => Some(HotseatEvent::VotingComplete),
            HotseatPhase::Reveal => Some(HotseatEvent::RevealComplete),
            HotseatPhase::Scoreboard => Some(Self::after_scoreboard(history_len, player_count)),
            HotseatPhase::Lobby
            | HotseatPhase::Assignment
            | HotseatPhase::Wheel
            | HotseatPhase::Complete => None,
        }
    }
}

/// Phase graph of the hotseat mode.
#[derive(Debug, Clone, Copy)]
pub struct HotseatGraph;

impl PhaseGraph for HotseatGraph {
    type Phase = HotseatPhase;
    type Event = HotseatEvent;

    const INITIAL: HotseatPhase = HotseatPhase::Lobby;

    fn edges(from: HotseatPhase) -> &'static [HotseatPhase] {
        use HotseatPhase::*;
        match from {
            Lobby => &[Assignment],
            Assignment => &[Intro],
            Intro => &[Wheel],
            Wheel => &[Hotseat],
            Hotseat => &[Voting],
            Voting => &[Reveal],
            Reveal => &[Scoreboard],
            Scoreboard => &[Wheel, Complete],
            Complete => &[],
        }
    }

    fn route(event: &HotseatEvent) -> Route<HotseatPhase> {
        use HotseatPhase::*;
        let (from, to): (&'static [HotseatPhase], HotseatPhase) = match event {
            HotseatEvent::StartGame => (&[Lobby], Assignment),
            HotseatEvent::AssignmentsCreated => (&[Assignment], Intro),
            HotseatEvent::IntroComplete => (&[Intro], Wheel),
            HotseatEvent::WheelSpun => (&[Wheel], Hotseat),
            HotseatEvent::HotseatComplete => (&[Hotseat], Voting),
            HotseatEvent::VotingComplete => (&[Voting], Reveal),
            HotseatEvent::RevealComplete => (&[Reveal], Scoreboard),
            HotseatEvent::ContinueGame => (&[Scoreboard], Wheel),
            HotseatEvent::EndGame => (&[Scoreboard], Complete),
        };
        Route { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{
        InvalidTransition, PhaseMachine, is_terminal, is_valid_transition, next_phase,
    };

    fn expected(phase: HotseatPhase, event: HotseatEvent) -> Option<HotseatPhase> {
        use HotseatEvent as E;
        use HotseatPhase as P;
        match (phase, event) {
            (P::Lobby, E::StartGame) => Some(P::Assignment),
            (P::Assignment, E::AssignmentsCreated) => Some(P::Intro),
            (P::Intro, E::IntroComplete) => Some(P::Wheel),
            (P::Wheel, E::WheelSpun) => Some(P::Hotseat),
            (P::Hotseat, E::HotseatComplete) => Some(P::Voting),
            (P::Voting, E::VotingComplete) => Some(P::Reveal),
            (P::Reveal, E::RevealComplete) => Some(P::Scoreboard),
            (P::Scoreboard, E::ContinueGame) => Some(P::Wheel),
            (P::Scoreboard, E::EndGame) => Some(P::Complete),
            _ => None,
        }
    }

    #[test]
    fn every_phase_event_pair_matches_the_table() {
        for phase in HotseatPhase::ALL {
            for event in HotseatEvent::ALL {
                assert_eq!(
                    next_phase::<HotseatGraph>(phase, &event),
                    expected(phase, event),
                    "{phase} + {event:?}"
                );
            }
        }
    }

    #[test]
    fn every_event_follows_an_edge() {
        for event in HotseatEvent::ALL {
            let route = HotseatGraph::route(&event);
            assert_eq!(route.from.len(), 1, "{event:?} must have one source");
            for from in route.from {
                assert!(is_valid_transition::<HotseatGraph>(*from, route.to));
            }
        }
    }

    #[test]
    fn adjacency_table_is_exact() {
        assert!(is_valid_transition::<HotseatGraph>(
            HotseatPhase::Scoreboard,
            HotseatPhase::Wheel
        ));
        assert!(is_valid_transition::<HotseatGraph>(
            HotseatPhase::Scoreboard,
            HotseatPhase::Complete
        ));
        assert!(!is_valid_transition::<HotseatGraph>(
            HotseatPhase::Lobby,
            HotseatPhase::Intro
        ));
        assert!(!is_valid_transition::<HotseatGraph>(
            HotseatPhase::Voting,
            HotseatPhase::Scoreboard
        ));
        assert!(is_terminal::<HotseatGraph>(HotseatPhase::Complete));
        assert!(
            HotseatPhase::ALL
                .into_iter()
                .filter(|p| *p != HotseatPhase::Complete)
                .all(|p| !is_terminal::<HotseatGraph>(p))
        );
    }

    #[test]
    fn full_rotation_through_the_machine() {
        let mut machine = PhaseMachine::<HotseatGraph>::default();
        let steps = [
            HotseatEvent::StartGame,
            HotseatEvent::AssignmentsCreated,
            HotseatEvent::IntroComplete,
            HotseatEvent::WheelSpun,
            HotseatEvent::HotseatComplete,
            HotseatEvent::VotingComplete,
            HotseatEvent::RevealComplete,
            HotseatEvent::EndGame,
        ];
        for event in steps {
            let plan = machine.plan(event).unwrap();
            assert_eq!(plan.version_next, plan.version + 1);
            machine = PhaseMachine::at(plan.to, plan.version_next);
        }
        assert_eq!(machine.phase(), HotseatPhase::Complete);
        assert_eq!(machine.version(), 8);
    }

    #[test]
    fn wrong_phase_is_rejected_not_redirected() {
        let machine = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Wheel, 3);
        let err = machine.plan(HotseatEvent::VotingComplete).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: HotseatPhase::Wheel,
                event: HotseatEvent::VotingComplete
            }
        );
        assert!(err.to_string().contains("WHEEL"));
    }

    #[test]
    fn scoreboard_branch_depends_on_rotation() {
        assert_eq!(HotseatEvent::after_scoreboard(3, 3), HotseatEvent::EndGame);
        assert_eq!(HotseatEvent::after_scoreboard(2, 3), HotseatEvent::ContinueGame);
        assert_eq!(
            next_phase::<HotseatGraph>(
                HotseatPhase::Scoreboard,
                &HotseatEvent::after_scoreboard(3, 3)
            ),
            Some(HotseatPhase::Complete)
        );
        assert_eq!(
            next_phase::<HotseatGraph>(
                HotseatPhase::Scoreboard,
                &HotseatEvent::after_scoreboard(1, 3)
            ),
            Some(HotseatPhase::Wheel)
        );
    }

    #[test]
    fn host_advance_skips_dedicated_operations() {
        assert_eq!(HotseatEvent::host_advance(HotseatPhase::Lobby, 0, 3), None);
        assert_eq!(HotseatEvent::host_advance(HotseatPhase::Wheel, 0, 3), None);
        assert_eq!(HotseatEvent::host_advance(HotseatPhase::Complete, 3, 3), None);
        assert_eq!(
            HotseatEvent::host_advance(HotseatPhase::Voting, 1, 3),
            Some(HotseatEvent::VotingComplete)
        );
    }

    #[test]
    fn parse_round_trips_wire_names() {
        for phase in HotseatPhase::ALL {
            assert_eq!(HotseatPhase::parse(phase.as_str()), Some(phase));
            assert_eq!(
                serde_json::to_string(&phase).unwrap(),
                format!("\"{}\"", phase.as_str())
            );
        }
    }
}

use std::{fmt, marker::PhantomData};

use thiserror::Error;

/// A finite phase graph: an adjacency table plus an event → transition mapping.
///
/// Both game modes instantiate this trait; all control flow lives in the
/// generic functions and [`PhaseMachine`] below.
pub trait PhaseGraph {
    /// Phase type of the graph.
    type Phase: Copy + Eq + fmt::Debug + fmt::Display + 'static;
    /// Events understood by the graph.
    type Event: Clone + PartialEq + fmt::Debug;

    /// Phase of a freshly created room.
    const INITIAL: Self::Phase;

    /// Phases reachable from `from` in one step.
    fn edges(from: Self::Phase) -> &'static [Self::Phase];

    /// Source phase(s) in which `event` is accepted and where it leads.
    fn route(event: &Self::Event) -> Route<Self::Phase>;
}

/// Where an event may be applied and the phase it yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<P: 'static> {
    /// Phases in which the event is accepted.
    pub from: &'static [P],
    /// Destination phase.
    pub to: P,
}

/// Phase reached by applying `event` in `current`, or `None` when the event
/// does not apply there. Never falls back to another phase.
pub fn next_phase<G: PhaseGraph>(current: G::Phase, event: &G::Event) -> Option<G::Phase> {
    let route = G::route(event);
    route.from.contains(&current).then_some(route.to)
}

/// Direct adjacency check, independent of events.
pub fn is_valid_transition<G: PhaseGraph>(from: G::Phase, to: G::Phase) -> bool {
    G::edges(from).contains(&to)
}

/// A phase with no outbound edges.
pub fn is_terminal<G: PhaseGraph>(phase: G::Phase) -> bool {
    G::edges(phase).is_empty()
}

/// Error returned when an event cannot be applied in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from}")]
pub struct InvalidTransition<P: fmt::Debug + fmt::Display, E: fmt::Debug> {
    /// The phase the room was in when the event was received.
    pub from: P,
    /// The rejected event.
    pub event: E,
}

/// A validated transition that still has to be committed to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan<P, E> {
    /// Phase the room is currently in.
    pub from: P,
    /// Phase the room will transition to.
    pub to: P,
    /// Event that triggered this transition.
    pub event: E,
    /// Room version the plan was computed against.
    pub version: u64,
    /// Version number after applying this transition.
    pub version_next: u64,
}

/// Snapshot of one room's position in a phase graph.
///
/// The machine only plans; committing is a compare-and-swap on the room
/// version, so a plan computed from a stale read is rejected by storage.
#[derive(Debug, Clone, Copy)]
pub struct PhaseMachine<G: PhaseGraph> {
    phase: G::Phase,
    version: u64,
    _graph: PhantomData<G>,
}

impl<G: PhaseGraph> Default for PhaseMachine<G> {
    fn default() -> Self {
        Self::at(G::INITIAL, 0)
    }
}

impl<G: PhaseGraph> PhaseMachine<G> {
    /// Machine positioned at `phase` with the room's current `version`.
    pub fn at(phase: G::Phase, version: u64) -> Self {
        Self {
            phase,
            version,
            _graph: PhantomData,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> G::Phase {
        self.phase
    }

    /// Room version the machine was loaded at; plans compare-and-swap against it.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Validate `event` against the current phase and describe the resulting transition.
    pub fn plan(
        &self,
        event: G::Event,
    ) -> Result<Plan<G::Phase, G::Event>, InvalidTransition<G::Phase, G::Event>> {
        match next_phase::<G>(self.phase, &event) {
            Some(to) => Ok(Plan {
                from: self.phase,
                to,
                event,
                version: self.version,
                version_next: self.version + 1,
            }),
            None => Err(InvalidTransition {
                from: self.phase,
                event,
            }),
        }
    }
}

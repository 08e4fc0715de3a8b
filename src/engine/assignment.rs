use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::AssignmentEntity;

/// Error raised when an impersonation cycle cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    /// A cycle needs at least two players so nobody targets themselves.
    #[error("at least 2 players are required to build assignments (got {0})")]
    NotEnoughPlayers(usize),
}

/// Build one giver → target edge per player forming a single cycle.
///
/// The players are shuffled and each shuffled entry targets the next one,
/// wrapping around. This yields exactly one cycle covering every player and
/// never a self-assignment.
pub fn assign_players<R: Rng + ?Sized>(
    rng: &mut R,
    players: &[Uuid],
    room_id: Uuid,
    round_number: u32,
) -> Result<Vec<AssignmentEntity>, AssignmentError> {
    if players.len() < 2 {
        return Err(AssignmentError::NotEnoughPlayers(players.len()));
    }

    let mut order = players.to_vec();
    order.shuffle(rng);

    let n = order.len();
    Ok((0..n)
        .map(|i| AssignmentEntity {
            room_id,
            giver_player_id: order[i],
            target_player_id: order[(i + 1) % n],
            round_number,
        })
        .collect())
}

/// Assignment set in force for `round_number`: the latest round not above it.
pub fn active_assignments(
    assignments: &[AssignmentEntity],
    round_number: u32,
) -> Vec<AssignmentEntity> {
    let Some(active_round) = assignments
        .iter()
        .map(|a| a.round_number)
        .filter(|round| *round <= round_number)
        .max()
    else {
        return Vec::new();
    };

    assignments
        .iter()
        .filter(|a| a.round_number == active_round)
        .cloned()
        .collect()
}

/// Target impersonated by `giver`, if the set contains an edge for them.
pub fn target_of(assignments: &[AssignmentEntity], giver: Uuid) -> Option<Uuid> {
    assignments
        .iter()
        .find(|a| a.giver_player_id == giver)
        .map(|a| a.target_player_id)
}

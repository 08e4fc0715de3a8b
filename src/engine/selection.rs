use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};
use uuid::Uuid;

use crate::state::room::Role;

/// Pick a random player who has not been featured yet.
///
/// `None` means every player already had a turn; callers treat it as the end
/// of the rotation rather than an error. History is not recorded here.
pub fn select_hotseat<R: Rng + ?Sized>(
    rng: &mut R,
    players: &[Uuid],
    history: &[Uuid],
) -> Option<Uuid> {
    let eligible: Vec<Uuid> = players
        .iter()
        .copied()
        .filter(|id| !history.contains(id))
        .collect();
    eligible.choose(rng).copied()
}

/// Number of imposters for a table: one below `threshold` players, two from it on.
pub fn imposter_count(player_count: usize, threshold: usize) -> usize {
    let count = if player_count >= threshold { 2 } else { 1 };
    count.min(player_count)
}

/// Shuffle the players and hand the first `imposters` of them the imposter role.
pub fn assign_roles<R: Rng + ?Sized>(
    rng: &mut R,
    players: &[Uuid],
    imposters: usize,
) -> Vec<(Uuid, Role)> {
    let mut order = players.to_vec();
    order.shuffle(rng);
    order
        .into_iter()
        .enumerate()
        .map(|(index, id)| {
            let role = if index < imposters {
                Role::Imposter
            } else {
                Role::Civilian
            };
            (id, role)
        })
        .collect()
}

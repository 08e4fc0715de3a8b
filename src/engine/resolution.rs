use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{AssignmentEntity, HotseatVoteEntity, ImposterVoteEntity, PlayerEntity},
    engine::assignment::target_of,
    state::room::{Role, Winner},
};

/// Reasons a round cannot be resolved from the stored rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Nobody voted, so there is nobody to eliminate.
    #[error("no votes were cast this round")]
    NoVotes,
    /// A vote points at a player who is not part of the room.
    #[error("player `{0}` is not part of this room")]
    UnknownPlayer(Uuid),
    /// The featured player has no assignment edge for the active round.
    #[error("no assignment found for featured player `{0}`")]
    MissingAssignment(Uuid),
}

/// Count votes per target, keeping targets in the order their first vote was accumulated.
pub fn tally_votes<I>(targets: I) -> IndexMap<Uuid, usize>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut tally = IndexMap::new();
    for target in targets {
        *tally.entry(target).or_insert(0) += 1;
    }
    tally
}

/// Target with the strictly highest count.
///
/// Ties go to the target that appears first in the tally, i.e. the one whose
/// first vote was accumulated earliest.
pub fn select_eliminated(tally: &IndexMap<Uuid, usize>) -> Option<Uuid> {
    let mut best: Option<(Uuid, usize)> = None;
    for (target, count) in tally {
        if best.is_none_or(|(_, top)| *count > top) {
            best = Some((*target, *count));
        }
    }
    best.map(|(target, _)| target)
}

/// Outcome of an elimination round in the deduction mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImposterRoundOutcome {
    /// Most voted player, ties broken by first vote received.
    pub eliminated_player_id: Uuid,
    /// Role the eliminated player held.
    pub eliminated_role: Role,
    pub winner: Winner,
    /// Every imposter of the round, eliminated or not.
    pub imposter_ids: Vec<Uuid>,
    /// Votes received per target, in order of first vote.
    pub vote_counts: IndexMap<Uuid, usize>,
    /// Voters who targeted an imposter, in vote order.
    pub correct_voter_ids: Vec<Uuid>,
    /// Voters who targeted a civilian, in vote order.
    pub incorrect_voter_ids: Vec<Uuid>,
    /// Points to add per player, aggregated.
    pub score_awards: Vec<(Uuid, u32)>,
}

/// Resolve an elimination round from the room's players and the round's votes.
///
/// `votes` must be in first-submission order; that order decides ties.
/// Scoring: +1 per voter who targeted an imposter, and when a civilian is
/// eliminated every imposter gains one point per voter who got it wrong.
pub fn resolve_imposter_round(
    players: &[PlayerEntity],
    votes: &[ImposterVoteEntity],
) -> Result<ImposterRoundOutcome, ResolutionError> {
    let vote_counts = tally_votes(votes.iter().map(|v| v.target_id));
    let eliminated_player_id = select_eliminated(&vote_counts).ok_or(ResolutionError::NoVotes)?;

    let role_of = |id: Uuid| -> Result<Role, ResolutionError> {
        players
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.role.unwrap_or(Role::Civilian))
            .ok_or(ResolutionError::UnknownPlayer(id))
    };

    let eliminated_role = role_of(eliminated_player_id)?;
    let imposter_ids: Vec<Uuid> = players
        .iter()
        .filter(|p| p.role == Some(Role::Imposter))
        .map(|p| p.id)
        .collect();

    let mut correct_voter_ids = Vec::new();
    let mut incorrect_voter_ids = Vec::new();
    for vote in votes {
        if imposter_ids.contains(&vote.target_id) {
            correct_voter_ids.push(vote.voter_id);
        } else {
            incorrect_voter_ids.push(vote.voter_id);
        }
    }

    let mut awards: IndexMap<Uuid, u32> = IndexMap::new();
    for voter in &correct_voter_ids {
        *awards.entry(*voter).or_insert(0) += 1;
    }

    let winner = match eliminated_role {
        Role::Imposter => Winner::Civilians,
        Role::Civilian => {
            let bonus = u32::try_from(incorrect_voter_ids.len()).unwrap_or(u32::MAX);
            if bonus > 0 {
                for imposter in &imposter_ids {
                    *awards.entry(*imposter).or_insert(0) += bonus;
                }
            }
            Winner::Imposters
        }
    };

    Ok(ImposterRoundOutcome {
        eliminated_player_id,
        eliminated_role,
        winner,
        imposter_ids,
        vote_counts,
        correct_voter_ids,
        incorrect_voter_ids,
        score_awards: awards.into_iter().collect(),
    })
}

/// Outcome of a hotseat guessing round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotseatRoundOutcome {
    /// Featured player of the turn.
    pub hotseat_player_id: Uuid,
    /// Player the featured player was impersonating.
    pub actual_target_id: Uuid,
    /// Guessers who named the actual target, in vote order.
    pub correct_voter_ids: Vec<Uuid>,
    /// Guessers who named someone else, in vote order.
    pub incorrect_voter_ids: Vec<Uuid>,
    /// Correctness per vote id, to persist on the vote rows.
    pub marks: Vec<(Uuid, bool)>,
    /// One point per correct guesser.
    pub score_awards: Vec<(Uuid, u32)>,
}

/// Grade every guess of the round against the featured player's assignment.
///
/// Each correct guess earns one point. Nobody is eliminated in this mode.
pub fn resolve_hotseat_round(
    hotseat_player_id: Uuid,
    assignments: &[AssignmentEntity],
    votes: &[HotseatVoteEntity],
) -> Result<HotseatRoundOutcome, ResolutionError> {
    let actual_target_id = target_of(assignments, hotseat_player_id)
        .ok_or(ResolutionError::MissingAssignment(hotseat_player_id))?;

    let mut correct_voter_ids = Vec::new();
    let mut incorrect_voter_ids = Vec::new();
    let mut marks = Vec::with_capacity(votes.len());

    for vote in votes
        .iter()
        .filter(|v| v.hotseat_player_id == hotseat_player_id)
    {
        let correct = vote.guessed_target_id == actual_target_id;
        marks.push((vote.id, correct));
        if correct {
            correct_voter_ids.push(vote.guesser_player_id);
        } else {
            incorrect_voter_ids.push(vote.guesser_player_id);
        }
    }

    let score_awards = correct_voter_ids.iter().map(|id| (*id, 1)).collect();

    Ok(HotseatRoundOutcome {
        hotseat_player_id,
        actual_target_id,
        correct_voter_ids,
        incorrect_voter_ids,
        marks,
        score_awards,
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn player(role: Role) -> PlayerEntity {
        let now = SystemTime::now();
        PlayerEntity {
            id: Uuid::new_v4(),
            room_id: Uuid::nil(),
            display_name: "p".into(),
            is_host: false,
            session_id: Uuid::new_v4().to_string(),
            score: 0,
            role: Some(role),
            is_alive: Some(true),
            joined_at: now,
            last_seen_at: now,
        }
    }

    fn vote(voter: &PlayerEntity, target: &PlayerEntity, offset_ms: u64) -> ImposterVoteEntity {
        let mut vote = ImposterVoteEntity::new(Uuid::nil(), 1, voter.id, target.id);
        vote.created_at = SystemTime::UNIX_EPOCH + Duration::from_millis(offset_ms);
        vote
    }

    fn award(outcome: &ImposterRoundOutcome, id: Uuid) -> u32 {
        outcome
            .score_awards
            .iter()
            .find(|(player, _)| *player == id)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    }

    #[test]
    fn tally_keeps_first_seen_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tally = tally_votes([b, a, b, c, a]);
        let order: Vec<Uuid> = tally.keys().copied().collect();
        assert_eq!(order, vec![b, a, c]);
        assert_eq!(tally[&b], 2);
        assert_eq!(tally[&a], 2);
        assert_eq!(tally[&c], 1);
    }

    #[test]
    fn tie_goes_to_first_accumulated_target() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(select_eliminated(&tally_votes([b, a, a, b])), Some(b));
        assert_eq!(select_eliminated(&tally_votes([a, b, b])), Some(b));
        assert_eq!(select_eliminated(&tally_votes(Vec::<Uuid>::new())), None);
    }

    #[test]
    fn eliminating_the_imposter_lets_civilians_win() {
        let a = player(Role::Civilian);
        let b = player(Role::Civilian);
        let c = player(Role::Imposter);
        let players = vec![a.clone(), b.clone(), c.clone()];
        let votes = vec![vote(&a, &c, 1), vote(&b, &c, 2), vote(&c, &a, 3)];

        let outcome = resolve_imposter_round(&players, &votes).unwrap();

        assert_eq!(outcome.eliminated_player_id, c.id);
        assert_eq!(outcome.eliminated_role, Role::Imposter);
        assert_eq!(outcome.winner, Winner::Civilians);
        assert_eq!(outcome.correct_voter_ids, vec![a.id, b.id]);
        assert_eq!(outcome.incorrect_voter_ids, vec![c.id]);
        assert_eq!(award(&outcome, a.id), 1);
        assert_eq!(award(&outcome, b.id), 1);
        assert_eq!(award(&outcome, c.id), 0);
    }

    #[test]
    fn eliminating_a_civilian_lets_imposters_win_and_score() {
        let a = player(Role::Civilian);
        let b = player(Role::Civilian);
        let c = player(Role::Civilian);
        let d = player(Role::Imposter);
        let players = vec![a.clone(), b.clone(), c.clone(), d.clone()];
        let votes = vec![
            vote(&a, &b, 1),
            vote(&b, &d, 2),
            vote(&c, &b, 3),
            vote(&d, &b, 4),
        ];

        let outcome = resolve_imposter_round(&players, &votes).unwrap();

        assert_eq!(outcome.eliminated_player_id, b.id);
        assert_eq!(outcome.winner, Winner::Imposters);
        assert_eq!(outcome.imposter_ids, vec![d.id]);
        assert_eq!(outcome.correct_voter_ids, vec![b.id]);
        assert_eq!(outcome.incorrect_voter_ids.len(), 3);
        assert_eq!(award(&outcome, b.id), 1);
        assert_eq!(award(&outcome, d.id), 3);
    }

    #[test]
    fn no_votes_cannot_resolve() {
        let players = vec![player(Role::Civilian), player(Role::Imposter)];
        assert_eq!(
            resolve_imposter_round(&players, &[]),
            Err(ResolutionError::NoVotes)
        );
    }

    #[test]
    fn unknown_target_is_rejected() {
        let a = player(Role::Civilian);
        let stranger = player(Role::Civilian);
        let votes = vec![vote(&a, &stranger, 1)];
        assert_eq!(
            resolve_imposter_round(std::slice::from_ref(&a), &votes),
            Err(ResolutionError::UnknownPlayer(stranger.id))
        );
    }

    #[test]
    fn hotseat_guesses_are_graded_against_the_assignment() {
        let (hot, target, g1, g2) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let assignments = vec![AssignmentEntity {
            room_id: Uuid::nil(),
            giver_player_id: hot,
            target_player_id: target,
            round_number: 1,
        }];
        let right = HotseatVoteEntity::new(Uuid::nil(), 1, hot, g1, target);
        let wrong = HotseatVoteEntity::new(Uuid::nil(), 1, hot, g2, g1);

        let outcome =
            resolve_hotseat_round(hot, &assignments, &[right.clone(), wrong.clone()]).unwrap();

        assert_eq!(outcome.actual_target_id, target);
        assert_eq!(outcome.correct_voter_ids, vec![g1]);
        assert_eq!(outcome.incorrect_voter_ids, vec![g2]);
        assert_eq!(outcome.marks, vec![(right.id, true), (wrong.id, false)]);
        assert_eq!(outcome.score_awards, vec![(g1, 1)]);
    }

    #[test]
    fn hotseat_without_assignment_fails() {
        let hot = Uuid::new_v4();
        assert_eq!(
            resolve_hotseat_round(hot, &[], &[]),
            Err(ResolutionError::MissingAssignment(hot))
        );
    }
}

//! Deduction mode: roles and secret words, host advances, votes and the
//! one-shot elimination that ends the game.

use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ImposterVoteEntity, PlayerEntity, RoomEntity},
        room_store::RoomStore,
    },
    dto::room::{
        ImposterResultView, ImposterVoteView, RoomSnapshot, RoundResultView, VoteResponse, VoteView,
    },
    engine::{
        resolution::resolve_imposter_round,
        selection::{assign_roles, imposter_count},
    },
    error::ServiceError,
    services::{
        room_service::{build_snapshot, ensure_player_count, imposter_vote_views},
        sse_events::{
            broadcast_players_updated, broadcast_room_updated, broadcast_round_result,
            broadcast_votes,
        },
    },
    state::{
        SharedState,
        imposter::{ImposterEvent, ImposterGraph, ImposterPhase},
        room::RoomPhase,
        state_machine::PhaseMachine,
        transitions::{commit_transition, rollback_transition, run_transition_with_broadcast},
    },
};

/// Deal roles and draw a secret word, entering SECRET_REVEAL.
///
/// Starting from the lobby keeps the round counter; starting again after a
/// reveal moves it forward.
pub async fn start_round(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    topic: Option<&str>,
) -> Result<RoomSnapshot, ServiceError> {
    let machine = machine_of(&room)?;
    let plan = machine.plan(ImposterEvent::StartRound)?;

    let config = state.config();
    let wanted = topic
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(config.rules.default_topic.as_str());
    let Some((topic, words)) = config.topic(wanted) else {
        return Err(ServiceError::InvalidInput(format!("Unknown topic `{wanted}`")));
    };

    let players = store.list_players(room.id).await?;
    ensure_player_count(&config.rules, players.len())?;
    let ids: Vec<Uuid> = players.iter().map(|p| p.id).collect();

    let (roles, secret_word) = {
        let mut rng = rand::rng();
        let imposters = imposter_count(ids.len(), config.rules.imposter_threshold);
        (assign_roles(&mut rng, &ids, imposters), words.choose(&mut rng).cloned())
    };
    let Some(secret_word) = secret_word else {
        return Err(ServiceError::Internal(format!("topic `{topic}` has no words")));
    };

    let round_number = match machine.phase() {
        ImposterPhase::Reveal => room.round_number + 1,
        _ => room.round_number,
    };
    let topic = topic.to_owned();

    let previous = room.clone();
    let Some(room) = commit_transition(store, room, &plan, |room| {
        room.round_number = round_number;
        room.topic = Some(topic);
        room.secret_word = Some(secret_word);
    })
    .await?
    else {
        return Err(ServiceError::Conflict(
            "room was modified concurrently".into(),
        ));
    };

    if let Err(err) = store.assign_roles(room.id, roles).await {
        rollback_transition(state, store, &room, previous).await;
        return Err(err.into());
    }

    let players = store.list_players(room.id).await?;
    broadcast_players_updated(state, &room.code, &players);
    broadcast_room_updated(state, &room);
    info!(
        room = %room.code,
        round = room.round_number,
        players = players.len(),
        "imposter round started"
    );

    build_snapshot(store, room).await
}

/// Host advance through the clue and voting phases.
///
/// Without `to` the room takes its default next step (SECRET_REVEAL → CLUE →
/// VOTING). With `to` the host may skip the clue round.
pub async fn advance(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    to: Option<&str>,
) -> Result<RoomSnapshot, ServiceError> {
    let machine = machine_of(&room)?;
    let phase = machine.phase();

    let event = match to.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let Some(target) = ImposterPhase::parse(raw) else {
                return Err(ServiceError::InvalidInput(format!("Unknown phase `{raw}`")));
            };
            ImposterEvent::host_advance(target).ok_or_else(|| {
                ServiceError::InvalidState(format!("Cannot advance from {phase} to {target}"))
            })?
        }
        None => ImposterEvent::default_advance(phase).ok_or_else(|| {
            ServiceError::InvalidState(format!("Cannot advance from {phase}"))
        })?,
    };
    let plan = machine.plan(event)?;

    let room = run_transition_with_broadcast(state, store, room, &plan, |_| {}).await?;
    build_snapshot(store, room).await
}

/// Record (or replace) the caller's elimination vote; the vote that makes the
/// count reach the player count resolves the round.
pub async fn submit_vote(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    voter: PlayerEntity,
    target_player_id: Uuid,
) -> Result<VoteResponse, ServiceError> {
    let machine = machine_of(&room)?;
    if machine.phase() != ImposterPhase::Voting {
        return Err(ServiceError::InvalidState(
            "Votes are only accepted during VOTING".into(),
        ));
    }
    if voter.id == target_player_id {
        return Err(ServiceError::InvalidInput(
            "You cannot vote for yourself".into(),
        ));
    }
    if voter.is_alive == Some(false) {
        return Err(ServiceError::InvalidInput(
            "Eliminated players cannot vote".into(),
        ));
    }

    let players = store.list_players(room.id).await?;
    if !players.iter().any(|p| p.id == target_player_id) {
        return Err(ServiceError::InvalidInput(
            "Target player is not in this room".into(),
        ));
    }

    let vote = store
        .upsert_imposter_vote(ImposterVoteEntity::new(
            room.id,
            room.round_number,
            voter.id,
            target_player_id,
        ))
        .await?;

    let votes = store
        .list_imposter_votes(room.id, room.round_number)
        .await?;
    let votes_cast = votes.len();
    broadcast_votes(
        state,
        &room.code,
        room.round_number,
        voter.id,
        imposter_vote_views(&votes),
    );

    let round_result = if votes_cast >= players.len() {
        resolve_round(state, store, room).await?
    } else {
        None
    };

    Ok(VoteResponse {
        vote: VoteView::Imposter(ImposterVoteView::from(&vote)),
        votes_cast,
        round_result,
    })
}

/// Resolve the voting round of `room` at most once.
///
/// The move to GAME_OVER is a compare-and-swap on the version read here.
/// Only the request that wins it eliminates and scores; every other trigger,
/// concurrent or late, returns `None` without writing.
///
/// If elimination or scoring fails the eliminated player is revived and the
/// room returns to VOTING with its votes kept; the next vote resolves again.
pub async fn resolve_round(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
) -> Result<Option<RoundResultView>, ServiceError> {
    let machine = machine_of(&room)?;
    if machine.phase() != ImposterPhase::Voting {
        debug!(room = %room.code, phase = %machine.phase(), "round already resolved");
        return Ok(None);
    }
    let plan = machine.plan(ImposterEvent::RoundResolved)?;

    let players = store.list_players(room.id).await?;
    let votes = store
        .list_imposter_votes(room.id, room.round_number)
        .await?;
    let outcome = resolve_imposter_round(&players, &votes)?;

    let previous = room.clone();
    let Some(room) = commit_transition(store, room, &plan, |_| {}).await? else {
        debug!("round resolution lost to a concurrent request");
        return Ok(None);
    };

    let eliminated = outcome.eliminated_player_id;
    if let Err(err) = store.set_player_alive(eliminated, false).await {
        rollback_transition(state, store, &room, previous).await;
        return Err(err.into());
    }
    if let Err(err) = store.increment_scores(outcome.score_awards.clone()).await {
        if let Err(revive_err) = store.set_player_alive(eliminated, true).await {
            warn!(
                room = %room.code,
                player_id = %eliminated,
                error = %revive_err,
                "failed to revive player"
            );
        }
        rollback_transition(state, store, &room, previous).await;
        return Err(err.into());
    }

    info!(
        room = %room.code,
        round = room.round_number,
        eliminated = %eliminated,
        winner = ?outcome.winner,
        "imposter round resolved"
    );
    let result = RoundResultView::Imposter(ImposterResultView::new(room.round_number, outcome));

    let players = store.list_players(room.id).await?;
    broadcast_players_updated(state, &room.code, &players);
    broadcast_round_result(state, &room.code, &result);
    broadcast_room_updated(state, &room);

    Ok(Some(result))
}

fn machine_of(room: &RoomEntity) -> Result<PhaseMachine<ImposterGraph>, ServiceError> {
    match RoomPhase::of(room)? {
        RoomPhase::Imposter(phase) => Ok(PhaseMachine::at(phase, room.version)),
        RoomPhase::Hotseat(_) => Err(ServiceError::InvalidState(
            "This action is only available in imposter rooms".into(),
        )),
    }
}

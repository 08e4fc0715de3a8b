//! Hotseat mode: impersonation cycle, wheel spins, guessing and scoring.
//!
//! Callers hold the room gate and have already checked host rights where needed.

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{HotseatVoteEntity, PlayerEntity, RoomEntity},
        room_store::RoomStore,
    },
    dto::room::{HotseatVoteView, RoomSnapshot, RoomView, SpinResponse, VoteResponse, VoteView},
    engine::{
        assignment::{active_assignments, assign_players},
        resolution::resolve_hotseat_round,
        selection::select_hotseat,
    },
    error::ServiceError,
    services::{
        room_service::{
            build_snapshot, ensure_player_count, hotseat_round_result, hotseat_vote_views,
        },
        sse_events::{
            broadcast_assignments_updated, broadcast_players_updated, broadcast_room_updated,
            broadcast_round_result, broadcast_votes, broadcast_wheel_spin,
        },
    },
    state::{
        SharedState,
        hotseat::{HotseatEvent, HotseatGraph, HotseatPhase},
        room::RoomPhase,
        state_machine::{PhaseMachine, Plan},
        transitions::{commit_transition, rollback_transition, run_transition_with_broadcast},
    },
};

/// Leave the lobby: build the impersonation cycle and move on to the intro.
pub async fn start_game(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
) -> Result<RoomSnapshot, ServiceError> {
    let machine = machine_of(&room)?;
    let plan = machine.plan(HotseatEvent::StartGame)?;

    let players = store.list_players(room.id).await?;
    ensure_player_count(&state.config().rules, players.len())?;
    let ids: Vec<Uuid> = players.iter().map(|p| p.id).collect();
    let assignments = assign_players(&mut rand::rng(), &ids, room.id, room.round_number)?;

    let previous = room.clone();
    let room = run_transition_with_broadcast(state, store, room, &plan, |_| {}).await?;

    if let Err(err) = store.insert_assignments(assignments.clone()).await {
        rollback_transition(state, store, &room, previous).await;
        return Err(err.into());
    }
    broadcast_assignments_updated(state, &room.code, room.round_number, &assignments);

    let plan = PhaseMachine::<HotseatGraph>::at(HotseatPhase::Assignment, room.version)
        .plan(HotseatEvent::AssignmentsCreated)?;
    let room = run_transition_with_broadcast(state, store, room, &plan, |_| {}).await?;

    info!(room = %room.code, players = ids.len(), "hotseat game started");
    build_snapshot(store, room).await
}

/// Pick the next featured player among those not featured yet.
pub async fn spin(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
) -> Result<SpinResponse, ServiceError> {
    let machine = machine_of(&room)?;
    let plan = machine.plan(HotseatEvent::WheelSpun)?;

    let players = store.list_players(room.id).await?;
    let ids: Vec<Uuid> = players.iter().map(|p| p.id).collect();
    let Some(picked) = select_hotseat(&mut rand::rng(), &ids, &room.hotseat_history) else {
        return Err(ServiceError::InvalidState(
            "No eligible players for hotseat".into(),
        ));
    };

    let Some(room) = commit_transition(store, room, &plan, |room| {
        room.hotseat_player_id = Some(picked);
        room.hotseat_history.push(picked);
    })
    .await?
    else {
        return Err(ServiceError::Conflict(
            "room was modified concurrently".into(),
        ));
    };

    broadcast_wheel_spin(state, &room, picked);
    broadcast_room_updated(state, &room);
    info!(room = %room.code, hotseat = %picked, "wheel spun");

    Ok(SpinResponse {
        room: RoomView::from(&room),
        hotseat_player_id: picked,
    })
}

/// Move to the next phase. Leaving VOTING grades the guesses and awards points.
///
/// `to`, when given, must name the phase the graph leads to.
pub async fn advance(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    to: Option<&str>,
) -> Result<RoomSnapshot, ServiceError> {
    let machine = machine_of(&room)?;
    let phase = machine.phase();

    let players = store.list_players(room.id).await?;
    let Some(event) = HotseatEvent::host_advance(phase, room.hotseat_history.len(), players.len())
    else {
        return Err(ServiceError::InvalidState(format!(
            "Cannot advance from {phase}"
        )));
    };
    let plan = machine.plan(event)?;

    if let Some(requested) = to.map(str::trim).filter(|raw| !raw.is_empty())
        && HotseatPhase::parse(requested) != Some(plan.to)
    {
        return Err(ServiceError::InvalidInput(format!(
            "Cannot advance from {phase} to {requested}; next phase is {}",
            plan.to
        )));
    }

    let room = match event {
        HotseatEvent::VotingComplete => reveal(state, store, room, &plan).await?,
        HotseatEvent::ContinueGame => {
            run_transition_with_broadcast(state, store, room, &plan, |room| {
                room.round_number += 1;
                room.hotseat_player_id = None;
            })
            .await?
        }
        _ => run_transition_with_broadcast(state, store, room, &plan, |_| {}).await?,
    };

    build_snapshot(store, room).await
}

/// Record (or replace) the caller's guess for the featured player.
pub async fn submit_vote(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    guesser: PlayerEntity,
    target_player_id: Uuid,
) -> Result<VoteResponse, ServiceError> {
    let machine = machine_of(&room)?;
    if machine.phase() != HotseatPhase::Voting {
        return Err(ServiceError::InvalidState(
            "Votes are only accepted during VOTING".into(),
        ));
    }

    let hotseat_player_id = room.hotseat_player_id.ok_or_else(|| {
        ServiceError::Internal(format!("room `{}` is voting without a hotseat player", room.code))
    })?;
    if guesser.id == hotseat_player_id {
        return Err(ServiceError::InvalidInput(
            "The hotseat player cannot vote".into(),
        ));
    }

    let players = store.list_players(room.id).await?;
    if !players.iter().any(|p| p.id == target_player_id) {
        return Err(ServiceError::InvalidInput(
            "Target player is not in this room".into(),
        ));
    }

    let vote = store
        .upsert_hotseat_vote(HotseatVoteEntity::new(
            room.id,
            room.round_number,
            hotseat_player_id,
            guesser.id,
            target_player_id,
        ))
        .await?;

    let votes = store
        .list_hotseat_votes(room.id, room.round_number)
        .await?;
    broadcast_votes(
        state,
        &room.code,
        room.round_number,
        guesser.id,
        hotseat_vote_views(&votes),
    );

    Ok(VoteResponse {
        vote: VoteView::Hotseat(HotseatVoteView::from(&vote)),
        votes_cast: votes.len(),
        round_result: None,
    })
}

/// VOTING → REVEAL. The phase is committed before any score moves so that a
/// repeated advance can never grade the same turn twice.
///
/// When grading or scoring fails the grades are cleared and the room goes
/// back to VOTING, so the host can advance again once storage recovers.
async fn reveal(
    state: &SharedState,
    store: &dyn RoomStore,
    room: RoomEntity,
    plan: &Plan<HotseatPhase, HotseatEvent>,
) -> Result<RoomEntity, ServiceError> {
    let hotseat_player_id = room.hotseat_player_id.ok_or_else(|| {
        ServiceError::Internal(format!("room `{}` is voting without a hotseat player", room.code))
    })?;
    let assignments = active_assignments(&store.list_assignments(room.id).await?, room.round_number);
    let votes = store
        .list_hotseat_votes(room.id, room.round_number)
        .await?;
    let outcome = resolve_hotseat_round(hotseat_player_id, &assignments, &votes)?;

    let previous = room.clone();
    let Some(room) = commit_transition(store, room, plan, |_| {}).await? else {
        return Err(ServiceError::Conflict(
            "room was modified concurrently".into(),
        ));
    };

    let marks: Vec<(Uuid, Option<bool>)> = outcome
        .marks
        .iter()
        .map(|(vote_id, correct)| (*vote_id, Some(*correct)))
        .collect();
    let graded = match store.set_hotseat_vote_correctness(marks).await {
        Ok(()) => store.increment_scores(outcome.score_awards.clone()).await,
        Err(err) => Err(err),
    };
    if let Err(err) = graded {
        let cleared = outcome.marks.iter().map(|(vote_id, _)| (*vote_id, None)).collect();
        if let Err(clear_err) = store.set_hotseat_vote_correctness(cleared).await {
            warn!(room = %room.code, error = %clear_err, "failed to clear vote grades");
        }
        rollback_transition(state, store, &room, previous).await;
        return Err(err.into());
    }

    info!(
        room = %room.code,
        round = room.round_number,
        correct = outcome.correct_voter_ids.len(),
        incorrect = outcome.incorrect_voter_ids.len(),
        "hotseat turn resolved"
    );

    let players = store.list_players(room.id).await?;
    broadcast_players_updated(state, &room.code, &players);
    let graded = store
        .list_hotseat_votes(room.id, room.round_number)
        .await?;
    if let Some(result) = hotseat_round_result(&room, &assignments, &graded)? {
        broadcast_round_result(state, &room.code, &result);
    }
    broadcast_room_updated(state, &room);

    Ok(room)
}

fn machine_of(room: &RoomEntity) -> Result<PhaseMachine<HotseatGraph>, ServiceError> {
    match RoomPhase::of(room)? {
        RoomPhase::Hotseat(phase) => Ok(PhaseMachine::at(phase, room.version)),
        RoomPhase::Imposter(_) => Err(ServiceError::InvalidState(
            "This action is only available in hotseat rooms".into(),
        )),
    }
}

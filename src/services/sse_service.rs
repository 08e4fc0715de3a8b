use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::room_service::{load_room, normalize_code},
    state::{RoomHub, RoomSubscription, SharedState},
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the channel of an existing room.
pub async fn subscribe_room(
    state: &SharedState,
    code: &str,
) -> Result<(RoomSubscription, ServerEvent), ServiceError> {
    let code = normalize_code(code);
    let store = state.require_room_store().await?;
    let room = load_room(store.as_ref(), &code).await?;

    let channel = RoomHub::channel_name(&room.code);
    let subscription = state.hub().subscribe(&channel);
    let handshake = ServerEvent::json(
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            channel,
            message: format!("subscribed to room {}", room.code),
            degraded: state.is_degraded(),
        },
    )
    .map_err(|err| ServiceError::Internal(format!("failed to encode handshake: {err}")))?;

    info!(room = %room.code, "room SSE stream connected");
    Ok((subscription, handshake))
}

/// Convert a room subscription into an SSE response, forwarding events and
/// releasing the subscription once the client disconnects.
pub fn to_sse_stream(
    mut subscription: RoomSubscription,
    handshake: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the room channel and pushes into mpsc
    tokio::spawn(async move {
        let channel = subscription.channel().to_owned();
        if tx.send(Ok(to_event(handshake))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = subscription.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            warn!(channel = %channel, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        debug!(channel = %channel, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

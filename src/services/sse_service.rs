use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::{RoomHandle, SharedState},
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe an observer (host display, spectator) to a room's broadcasts.
///
/// The subscription is taken before the handshake is built so no event
/// emitted in between is lost.
pub async fn subscribe_room(
    state: &SharedState,
    code: &str,
) -> Result<(RoomHandle, broadcast::Receiver<ServerEvent>, ServerEvent), ServiceError> {
    let handle = state.registry().resolve(code)?;
    let receiver = handle.subscribe();
    info!(
        code = %handle.code(),
        subscribers = handle.subscriber_count(),
        "SSE observer subscribed"
    );
    let summary = handle.summary().await?;
    let handshake = ServerEvent::json(
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            room: handle.code().to_string(),
            message: format!("subscribed to room {}", handle.code()),
            phase: summary.phase.into(),
        },
    )
    .map_err(|err| ServiceError::Internal(err.to_string()))?;
    Ok((handle, receiver, handshake))
}

/// Convert a room subscription into an SSE response, forwarding untargeted
/// events and stopping once the client disconnects or the room ends.
pub fn to_sse_stream(
    handle: RoomHandle,
    mut receiver: broadcast::Receiver<ServerEvent>,
    handshake: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_sse_event(handshake))).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if !payload.is_visible_to(None) {
                                continue;
                            }
                            if tx.send(Ok(to_sse_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(code = %handle.code(), skipped, "SSE observer lagged; skipping events");
                            continue;
                        }
                    }
                }
            }
        }

        info!(code = %handle.code(), "room SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

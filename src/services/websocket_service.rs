use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        sse::ServerEvent,
        ws::{InboundMessageError, PlayerInboundMessage, PlayerOutboundMessage},
    },
    state::{
        RoomHandle,
        game::PlayerId,
        session::{JoinAccepted, Submission},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Internal error type for player socket handling.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle of one player WebSocket connection to `handle`.
pub async fn handle_socket(handle: RoomHandle, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(code = %handle.code(), error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!(code = %handle.code(), "websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match PlayerInboundMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            debug!(code = %handle.code(), error = %err, "failed to parse or validate join message");
            let _ = reply_invalid(&outbound_tx, &err);
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    // Subscribe before joining so no broadcast emitted after the join is missed.
    let events = handle.subscribe();
    let connection_id = Uuid::new_v4();
    let joined = match inbound {
        PlayerInboundMessage::Join {
            display_name,
            avatar,
            player_id,
        } => {
            handle
                .join(display_name, avatar, player_id, connection_id)
                .await
        }
        PlayerInboundMessage::Reconnect { player_id } => {
            handle.reconnect(player_id, connection_id).await
        }
        _ => {
            debug!(code = %handle.code(), "first message was neither join nor reconnect");
            let _ = send_message_to_websocket(
                &outbound_tx,
                &PlayerOutboundMessage::rejected("join_required", "send join or reconnect first"),
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let accepted = match joined {
        Ok(accepted) => accepted,
        Err(err) => {
            debug!(code = %handle.code(), error = %err, "join rejected");
            let _ = send_message_to_websocket(&outbound_tx, &PlayerOutboundMessage::from(&err));
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };
    let player_id = accepted.player.id;
    info!(
        code = %handle.code(),
        player_id = %player_id,
        rejoined = accepted.rejoined,
        "player connected"
    );

    if send_joined(&outbound_tx, &accepted).is_err() {
        handle.disconnect(player_id, connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let forwarder = spawn_forwarder(handle.clone(), player_id, events, outbound_tx.clone());
    let mut left = false;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match PlayerInboundMessage::from_json_str(&text) {
                Ok(message) => match handle_message(&handle, player_id, message, &outbound_tx).await
                {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Left) => {
                        left = true;
                        let _ = outbound_tx.send(Message::Close(None));
                        break;
                    }
                    Err(SocketError::ConnectionClosed) => {
                        info!(code = %handle.code(), player_id = %player_id, "connection closed while replying, terminating");
                        break;
                    }
                },
                Err(err) => {
                    debug!(code = %handle.code(), player_id = %player_id, error = %err, "failed to parse or validate player message");
                    if reply_invalid(&outbound_tx, &err).is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(code = %handle.code(), player_id = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forwarder.abort();
    if !left {
        // A newer connection of the same player makes this a no-op inside the room.
        handle.disconnect(player_id, connection_id);
    }
    info!(code = %handle.code(), player_id = %player_id, left, "player socket closed");

    finalize(writer_task, outbound_tx).await;
}

enum Flow {
    Continue,
    Left,
}

async fn handle_message(
    handle: &RoomHandle,
    player_id: PlayerId,
    message: PlayerInboundMessage,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<Flow, SocketError> {
    match message {
        PlayerInboundMessage::SubmitAnswer {
            question_id,
            answer,
            client_latency_ms,
        } => {
            let submission = Submission {
                question_id,
                answer,
                client_latency_ms,
            };
            let reply = match handle.submit_answer(player_id, submission).await {
                Ok(receipt) => PlayerOutboundMessage::from(receipt),
                Err(err) => PlayerOutboundMessage::from(&err),
            };
            send_message_to_websocket(tx, &reply)?;
        }
        PlayerInboundMessage::UsePowerUp { kind, target } => {
            let reply = match handle.use_power_up(player_id, kind.into(), target).await {
                Ok(receipt) => PlayerOutboundMessage::from(&receipt),
                Err(err) => PlayerOutboundMessage::from(&err),
            };
            send_message_to_websocket(tx, &reply)?;
        }
        PlayerInboundMessage::Leave => {
            return match handle.leave(player_id).await {
                Ok(()) => {
                    send_message_to_websocket(tx, &PlayerOutboundMessage::Left)?;
                    Ok(Flow::Left)
                }
                Err(err) => {
                    send_message_to_websocket(tx, &PlayerOutboundMessage::from(&err))?;
                    Ok(Flow::Continue)
                }
            };
        }
        PlayerInboundMessage::Join { .. } | PlayerInboundMessage::Reconnect { .. } => {
            debug!(code = %handle.code(), player_id = %player_id, "ignoring duplicate join on an open session");
            send_message_to_websocket(
                tx,
                &PlayerOutboundMessage::rejected(
                    "already_joined",
                    "this connection already joined the room",
                ),
            )?;
        }
        PlayerInboundMessage::Unknown => {
            send_message_to_websocket(
                tx,
                &PlayerOutboundMessage::rejected("unknown_message", "unknown message type"),
            )?;
        }
    }
    Ok(Flow::Continue)
}

/// Forward room broadcasts to the socket in emission order, skipping events
/// addressed to other players.
fn spawn_forwarder(
    handle: RoomHandle,
    player_id: PlayerId,
    mut events: tokio::sync::broadcast::Receiver<ServerEvent>,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if !event.is_visible_to(Some(player_id)) {
                        continue;
                    }
                    if tx.send(Message::Text(event_frame(&event).into())).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(code = %handle.code(), player_id = %player_id, skipped, "player socket lagged; events skipped");
                }
                Err(RecvError::Closed) => {
                    // Room ended: the final events were delivered, close the socket.
                    let _ = tx.send(Message::Close(None));
                    break;
                }
            }
        }
    })
}

/// Wrap a room event as `{"type":"event","event":..,"data":..}`.
fn event_frame(event: &ServerEvent) -> String {
    let name = serde_json::to_string(event.event.as_deref().unwrap_or("message"))
        .unwrap_or_else(|_| "\"message\"".into());
    format!(
        r#"{{"type":"event","event":{name},"data":{}}}"#,
        event.data
    )
}

fn send_joined(
    tx: &mpsc::UnboundedSender<Message>,
    accepted: &JoinAccepted,
) -> Result<(), SocketError> {
    send_message_to_websocket(tx, &PlayerOutboundMessage::from(accepted))
}

fn reply_invalid(
    tx: &mpsc::UnboundedSender<Message>,
    err: &InboundMessageError,
) -> Result<(), SocketError> {
    send_message_to_websocket(tx, &PlayerOutboundMessage::invalid_message(err))
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), SocketError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

async fn finalize(writer_task: JoinHandle<()>, tx: mpsc::UnboundedSender<Message>) {
    drop(tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_embeds_raw_payload() {
        let event = ServerEvent::new(Some("round.progress".into()), r#"{"answered":1}"#.into());
        let frame: serde_json::Value = serde_json::from_str(&event_frame(&event)).unwrap();
        assert_eq!(frame["type"], "event");
        assert_eq!(frame["event"], "round.progress");
        assert_eq!(frame["data"]["answered"], 1);
    }

    #[test]
    fn closed_writer_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let err = send_message_to_websocket(&tx, &PlayerOutboundMessage::Left).unwrap_err();
        assert!(matches!(err, SocketError::ConnectionClosed));
    }
}

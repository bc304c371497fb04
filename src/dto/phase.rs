use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{FinishReason, RoomPhase};

/// Publicly visible room phase exposed to clients (REST/SSE/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoomPhase {
    /// Accepting joins, waiting for the host.
    Waiting,
    /// Short countdown before the first round.
    Countdown,
    /// A round is open for answers.
    RoundActive,
    /// Answer and statistics reveal.
    RoundResults,
    /// Suspended by the host.
    Paused,
    /// Terminal.
    Finished,
}

impl From<RoomPhase> for VisibleRoomPhase {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Waiting => VisibleRoomPhase::Waiting,
            RoomPhase::Countdown => VisibleRoomPhase::Countdown,
            RoomPhase::RoundActive => VisibleRoomPhase::RoundActive,
            RoomPhase::RoundResults => VisibleRoomPhase::RoundResults,
            RoomPhase::Paused(_) => VisibleRoomPhase::Paused,
            RoomPhase::Finished(_) => VisibleRoomPhase::Finished,
        }
    }
}

/// Why a room finished.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleFinishReason {
    /// Every question was played.
    Completed,
    /// The host ended the room.
    HostEnded,
    /// Nobody stayed connected.
    Abandoned,
    /// The room stopped on an internal error.
    Fatal,
}

impl From<FinishReason> for VisibleFinishReason {
    fn from(value: FinishReason) -> Self {
        match value {
            FinishReason::Completed => VisibleFinishReason::Completed,
            FinishReason::HostEnded => VisibleFinishReason::HostEnded,
            FinishReason::Abandoned => VisibleFinishReason::Abandoned,
            FinishReason::Fatal => VisibleFinishReason::Fatal,
        }
    }
}

/// Finish reason carried by a phase, if any.
pub fn finish_reason(phase: RoomPhase) -> Option<VisibleFinishReason> {
    match phase {
        RoomPhase::Finished(reason) => Some(reason.into()),
        _ => None,
    }
}

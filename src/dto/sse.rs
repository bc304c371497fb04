use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::{
        LeaderboardRow, PlayerSummary, PowerUpKindDto, QuestionSnapshot, RoundStatsDto,
        TeamStandingDto,
    },
    phase::{VisibleFinishReason, VisibleRoomPhase},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across room channels (SSE and WebSocket).
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// When set, only this player's connection forwards the event.
    pub target: Option<Uuid>,
}

impl ServerEvent {
    /// Build a raw event addressed to everyone.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self {
            event,
            data,
            target: None,
        }
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self::new(event.into(), serde_json::to_string(payload)?))
    }

    /// Restrict delivery to a single player.
    pub fn for_player(mut self, player_id: Uuid) -> Self {
        self.target = Some(player_id);
        self
    }

    /// Whether a connection owned by `player_id` should forward this event.
    /// Anonymous observers only receive untargeted events.
    pub fn is_visible_to(&self, player_id: Option<Uuid>) -> bool {
        match self.target {
            None => true,
            Some(target) => player_id == Some(target),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an observer when it connects.
pub struct Handshake {
    /// Room the stream belongs to.
    pub room: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Phase at subscription time.
    pub phase: VisibleRoomPhase,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the room phase changes.
pub struct PhaseChangedEvent {
    pub phase: VisibleRoomPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_index: Option<usize>,
    pub total_rounds: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<VisibleFinishReason>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round opens.
pub struct RoundOpenedEvent {
    pub round_index: usize,
    pub total_rounds: usize,
    pub question: QuestionSnapshot,
    pub time_limit_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Periodic countdown of the open round.
pub struct TimeRemainingEvent {
    pub round_index: usize,
    pub remaining_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round closes: the answer and statistics are revealed.
pub struct RoundClosedEvent {
    pub round_index: usize,
    pub question_id: u32,
    pub correct_option: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub stats: RoundStatsDto,
    /// `timer_expired` or `all_answered`.
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Rows whose rank, score or streak moved since the previous broadcast.
pub struct LeaderboardDeltaEvent {
    pub changed: Vec<LeaderboardRow>,
    pub removed: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on join, leave, removal and reconnection.
pub struct PlayerPresenceEvent {
    pub player: PlayerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_count: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player's connection dropped.
pub struct PlayerDisconnectedEvent {
    pub player_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to the answering player only.
pub struct ScoreUpdateEvent {
    pub player_id: Uuid,
    pub correct: bool,
    pub points_earned: u32,
    pub score: u32,
    pub streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
/// How many of the expected players answered the open round.
pub struct RoundProgressEvent {
    pub round_index: usize,
    pub answered: usize,
    pub expected: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player used a power-up.
pub struct PowerUpUsedEvent {
    pub player_id: Uuid,
    pub kind: PowerUpKindDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when extra time lengthened the open round.
pub struct RoundExtendedEvent {
    pub round_index: usize,
    pub remaining_ms: u64,
    pub by: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a frozen player only.
pub struct PlayerFrozenEvent {
    pub player_id: Uuid,
    pub by: Uuid,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Final standings broadcast once the room finished.
pub struct GameFinishedEvent {
    pub reason: VisibleFinishReason,
    pub rounds_played: usize,
    pub total_rounds: usize,
    pub leaderboard: Vec<LeaderboardRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<TeamStandingDto>,
}

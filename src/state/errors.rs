use thiserror::Error;

use crate::state::{
    game::PlayerId,
    power_ups::{InsufficientCount, PowerUpKind},
    state_machine::InvalidTransition,
};

/// Broad family of a room error, telling clients whether to retry or start over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request broke a room rule; nothing changed.
    Rejected,
    /// The room or player does not exist (any more).
    NotFound,
    /// Temporary condition; the client may retry.
    Transient,
    /// Unrecoverable; never retried automatically.
    Fatal,
}

impl ErrorClass {
    /// Stable wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Rejected => "rejected",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        }
    }
}

/// Errors reported synchronously to the caller of a room operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// No room is registered under the code.
    #[error("room not found")]
    RoomNotFound,
    /// The room reached its player limit.
    #[error("room is full")]
    RoomFull,
    /// The room does not accept joins in its current phase.
    #[error("room is not accepting players")]
    RoomNotJoinable,
    /// Another player already uses the display name.
    #[error("display name `{0}` is already taken")]
    NameTaken(String),
    /// The player identity is unknown to the room.
    #[error("player `{0}` not found")]
    PlayerNotFound(PlayerId),
    /// The answer window is closed.
    #[error("round is closed")]
    RoundClosed,
    /// The player already has an accepted answer for this round.
    #[error("answer already submitted for this round")]
    AlreadyAnswered,
    /// No round is open, or the answer targets another question.
    #[error("no matching round is open")]
    NotInRound,
    /// The host paused the round.
    #[error("round is paused")]
    RoundPaused,
    /// The option index does not exist.
    #[error("option {0} does not exist")]
    InvalidAnswer(usize),
    /// An opponent froze the player.
    #[error("player is frozen")]
    Frozen,
    /// The player ran out of lives.
    #[error("player is eliminated")]
    Eliminated,
    /// No unit left of the requested power-up.
    #[error("no `{0}` power-up left")]
    InsufficientCount(PowerUpKind),
    /// The power-up cannot be used right now.
    #[error("power-up not usable now: {0}")]
    NotUsableNow(&'static str),
    /// The caller is not the room host.
    #[error("only the host can do this")]
    NotHost,
    /// Host control not allowed in the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Too few players to start.
    #[error("at least {required} player(s) required, {present} present")]
    NotEnoughPlayers {
        /// Configured minimum.
        required: usize,
        /// Connected players.
        present: usize,
    },
    /// The room's event queue is saturated.
    #[error("room is busy, retry shortly")]
    RoomBusy,
    /// The room stopped while the request was in flight.
    #[error("room has ended")]
    RoomClosed,
}

impl RoomError {
    /// Family of the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            RoomError::RoomNotFound | RoomError::PlayerNotFound(_) | RoomError::RoomClosed => {
                ErrorClass::NotFound
            }
            RoomError::RoomBusy => ErrorClass::Transient,
            _ => ErrorClass::Rejected,
        }
    }

    /// Stable snake_case code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound => "room_not_found",
            RoomError::RoomFull => "room_full",
            RoomError::RoomNotJoinable => "room_not_joinable",
            RoomError::NameTaken(_) => "name_taken",
            RoomError::PlayerNotFound(_) => "player_not_found",
            RoomError::RoundClosed => "round_closed",
            RoomError::AlreadyAnswered => "already_answered",
            RoomError::NotInRound => "not_in_round",
            RoomError::RoundPaused => "round_paused",
            RoomError::InvalidAnswer(_) => "invalid_answer",
            RoomError::Frozen => "frozen",
            RoomError::Eliminated => "eliminated",
            RoomError::InsufficientCount(_) => "insufficient_count",
            RoomError::NotUsableNow(_) => "not_usable_now",
            RoomError::NotHost => "not_host",
            RoomError::InvalidTransition(_) => "invalid_transition",
            RoomError::NotEnoughPlayers { .. } => "not_enough_players",
            RoomError::RoomBusy => "room_busy",
            RoomError::RoomClosed => "room_closed",
        }
    }
}

impl From<InsufficientCount> for RoomError {
    fn from(value: InsufficientCount) -> Self {
        RoomError::InsufficientCount(value.0)
    }
}

/// Creation-time failures of the room registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every generated code collided with a live room.
    #[error("could not allocate a free room code after {attempts} attempts")]
    CodeSpaceExhausted {
        /// Number of codes tried.
        attempts: usize,
    },
    /// The question list cannot drive a room.
    #[error("invalid question list: {0}")]
    InvalidQuestions(String),
}

impl RegistryError {
    /// Registry errors are always fatal for the creation request.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationError;

use crate::{
    dto::{
        common::{OwnPlayerState, PowerUpKindDto, RoomSummaryDto},
        duration_ms,
        validation::validate_display_name,
    },
    state::{
        ErrorClass, RoomError,
        session::{AnswerReceipt, JoinAccepted, PowerUpEffect, PowerUpReceipt},
    },
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// Enter the room. `player_id` reclaims an identity issued earlier.
    Join {
        display_name: String,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default)]
        player_id: Option<Uuid>,
    },
    /// Reattach to a known identity.
    Reconnect { player_id: Uuid },
    /// Answer the open round.
    SubmitAnswer {
        question_id: u32,
        answer: usize,
        #[serde(default)]
        client_latency_ms: Option<u64>,
    },
    /// Spend a power-up; freeze needs a `target`.
    UsePowerUp {
        kind: PowerUpKindDto,
        #[serde(default)]
        target: Option<Uuid>,
    },
    /// Leave the room for good.
    Leave,
    #[serde(other)]
    Unknown,
}

/// Why an inbound frame was refused before reaching the room.
#[derive(Debug, Error)]
pub enum InboundMessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid message: {0}")]
    Invalid(ValidationError),
}

impl PlayerInboundMessage {
    /// Parse a text frame and validate its fields.
    pub fn from_json_str(text: &str) -> Result<Self, InboundMessageError> {
        let message: Self = serde_json::from_str(text)?;
        if let Self::Join { display_name, .. } = &message {
            validate_display_name(display_name).map_err(InboundMessageError::Invalid)?;
        }
        Ok(message)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Direct replies sent to one player connection.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerOutboundMessage {
    /// Join or reconnect accepted.
    Joined {
        rejoined: bool,
        me: OwnPlayerState,
        room: RoomSummaryDto,
    },
    /// Answer recorded.
    AnswerAccepted {
        correct: bool,
        points_earned: u32,
        score: u32,
        streak: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        lives: Option<u32>,
    },
    /// Power-up consumed.
    PowerUpApplied {
        kind: PowerUpKindDto,
        remaining: u32,
        effect: PowerUpEffectDto,
    },
    /// Leave acknowledged; the socket closes afterwards.
    Left,
    /// Request refused.
    Error {
        code: String,
        class: String,
        message: String,
    },
}

#[derive(Debug, Serialize, ToSchema)]
/// Immediate effect of a power-up, as reported to its user.
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum PowerUpEffectDto {
    TimeExtended { remaining_ms: u64 },
    DoublePointsArmed,
    /// Wrong option indices hidden for this player only.
    OptionsEliminated { options: Vec<usize> },
    ShieldArmed,
    Froze { target: Uuid, duration_ms: u64 },
}

impl From<&PowerUpEffect> for PowerUpEffectDto {
    fn from(effect: &PowerUpEffect) -> Self {
        match effect {
            PowerUpEffect::TimeExtended { remaining } => PowerUpEffectDto::TimeExtended {
                remaining_ms: duration_ms(*remaining),
            },
            PowerUpEffect::DoublePointsArmed => PowerUpEffectDto::DoublePointsArmed,
            PowerUpEffect::OptionsEliminated(options) => PowerUpEffectDto::OptionsEliminated {
                options: options.clone(),
            },
            PowerUpEffect::ShieldArmed => PowerUpEffectDto::ShieldArmed,
            PowerUpEffect::Froze { target, duration } => PowerUpEffectDto::Froze {
                target: *target,
                duration_ms: duration_ms(*duration),
            },
        }
    }
}

impl From<&JoinAccepted> for PlayerOutboundMessage {
    fn from(accepted: &JoinAccepted) -> Self {
        PlayerOutboundMessage::Joined {
            rejoined: accepted.rejoined,
            me: (&accepted.player).into(),
            room: (&accepted.room).into(),
        }
    }
}

impl From<AnswerReceipt> for PlayerOutboundMessage {
    fn from(receipt: AnswerReceipt) -> Self {
        PlayerOutboundMessage::AnswerAccepted {
            correct: receipt.correct,
            points_earned: receipt.points_earned,
            score: receipt.score,
            streak: receipt.streak,
            lives: receipt.lives,
        }
    }
}

impl From<&PowerUpReceipt> for PlayerOutboundMessage {
    fn from(receipt: &PowerUpReceipt) -> Self {
        PlayerOutboundMessage::PowerUpApplied {
            kind: receipt.kind.into(),
            remaining: receipt.remaining,
            effect: (&receipt.effect).into(),
        }
    }
}

impl From<&RoomError> for PlayerOutboundMessage {
    fn from(err: &RoomError) -> Self {
        PlayerOutboundMessage::Error {
            code: err.code().to_string(),
            class: err.class().as_str().to_string(),
            message: err.to_string(),
        }
    }
}

impl PlayerOutboundMessage {
    /// Protocol-level rejection that never reached the room.
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        PlayerOutboundMessage::Error {
            code: code.to_string(),
            class: ErrorClass::Rejected.as_str().to_string(),
            message: message.into(),
        }
    }

    /// Error reply for a frame that could not be parsed or validated.
    pub fn invalid_message(err: &InboundMessageError) -> Self {
        Self::rejected("invalid_message", err.to_string())
    }
}

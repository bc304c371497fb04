//! Wire shapes of the room REST API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        common::{DifficultyDto, LeaderboardRow, RoomSummaryDto},
        phase::VisibleRoomPhase,
        validation::validate_room_code,
    },
    state::{
        game::{Question, RoomConfig},
        leaderboard::LeaderboardSnapshot,
    },
};

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Opaque host identity supplied by the caller.
    #[validate(length(min = 1, max = 64))]
    pub host_id: String,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
    /// Options overriding the configured room defaults.
    #[serde(default)]
    #[validate(nested)]
    pub config: Option<RoomConfigInput>,
}

/// One finalized question.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    pub id: u32,
    #[validate(length(min = 1, max = 500))]
    pub prompt: String,
    #[validate(length(min = 2, max = 8))]
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct: usize,
    #[validate(range(min = 1000, max = 600000))]
    pub time_limit_ms: u64,
    #[validate(range(min = 1, max = 100000))]
    pub points: u32,
    #[serde(default)]
    pub difficulty: DifficultyDto,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl From<QuestionInput> for Question {
    fn from(input: QuestionInput) -> Self {
        Self {
            id: input.id,
            prompt: input.prompt,
            options: input.options,
            correct: input.correct,
            time_limit: Duration::from_millis(input.time_limit_ms),
            points: input.points,
            difficulty: input.difficulty.into(),
            explanation: input.explanation,
        }
    }
}

/// Room options. Every omitted field keeps the configured default.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct RoomConfigInput {
    /// Time limit applied to every question instead of its own.
    #[validate(range(min = 1000, max = 600000))]
    pub time_limit_ms: Option<u64>,
    /// Percentage applied to question points.
    #[validate(range(min = 1, max = 1000))]
    pub point_multiplier: Option<u32>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    #[validate(range(min = 1, max = 500))]
    pub max_players: Option<usize>,
    #[validate(range(min = 1, max = 500))]
    pub min_players: Option<usize>,
    pub allow_reconnect: Option<bool>,
    pub allow_late_join: Option<bool>,
    /// Enables the lives variant.
    #[validate(range(min = 1, max = 20))]
    pub lives: Option<u32>,
    /// Enables the teams variant.
    #[validate(range(min = 2, max = 16))]
    pub teams: Option<u32>,
}

impl RoomConfigInput {
    /// Overlay the supplied options on `defaults`.
    pub fn apply_to(self, defaults: &RoomConfig) -> RoomConfig {
        RoomConfig {
            time_limit: self
                .time_limit_ms
                .map(Duration::from_millis)
                .or(defaults.time_limit),
            point_multiplier: self.point_multiplier.unwrap_or(defaults.point_multiplier),
            shuffle_questions: self.shuffle_questions.unwrap_or(defaults.shuffle_questions),
            shuffle_options: self.shuffle_options.unwrap_or(defaults.shuffle_options),
            max_players: self.max_players.unwrap_or(defaults.max_players),
            min_players: self.min_players.unwrap_or(defaults.min_players),
            allow_reconnect: self.allow_reconnect.unwrap_or(defaults.allow_reconnect),
            allow_late_join: self.allow_late_join.unwrap_or(defaults.allow_late_join),
            lives: self.lives.or(defaults.lives),
            teams: self.teams.or(defaults.teams),
        }
    }
}

/// Returned once a room has been opened.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    pub code: String,
    /// Credential for host-only controls, sent back in the `x-host-token` header.
    pub host_token: String,
    pub room: RoomSummaryDto,
}

/// Acknowledgement of a host control.
#[derive(Debug, Serialize, ToSchema)]
pub struct HostActionResponse {
    pub code: String,
    pub phase: VisibleRoomPhase,
}

/// Current ranking of a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub code: String,
    pub entries: Vec<LeaderboardRow>,
}

impl LeaderboardResponse {
    /// Project a snapshot taken from room `code`.
    pub fn new(code: String, snapshot: &LeaderboardSnapshot) -> Self {
        Self {
            code,
            entries: snapshot.entries.iter().map(LeaderboardRow::from).collect(),
        }
    }
}

/// Path parameters addressing one player of a room.
#[derive(Debug, Deserialize)]
pub struct RoomPlayerPath {
    pub code: String,
    pub player_id: Uuid,
}

impl Validate for RoomPlayerPath {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(err) = validate_room_code(&self.code) {
            errors.add("code", err);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

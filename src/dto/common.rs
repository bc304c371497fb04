use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{duration_ms, format_system_time, phase::VisibleRoomPhase},
    state::{
        game::{Difficulty, Question, RoomConfig},
        leaderboard::{LeaderboardEntry, TeamStanding},
        power_ups::{PowerUpKind, PowerUpLedger},
        presence::Player,
        round::RoundStats,
        session::RoomSummary,
    },
};

/// Difficulty tier as exchanged with clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyDto {
    /// ×1.0
    #[default]
    Easy,
    /// ×1.5
    Medium,
    /// ×2.0
    Hard,
}

impl From<DifficultyDto> for Difficulty {
    fn from(value: DifficultyDto) -> Self {
        match value {
            DifficultyDto::Easy => Difficulty::Easy,
            DifficultyDto::Medium => Difficulty::Medium,
            DifficultyDto::Hard => Difficulty::Hard,
        }
    }
}

impl From<Difficulty> for DifficultyDto {
    fn from(value: Difficulty) -> Self {
        match value {
            Difficulty::Easy => DifficultyDto::Easy,
            Difficulty::Medium => DifficultyDto::Medium,
            Difficulty::Hard => DifficultyDto::Hard,
        }
    }
}

/// Power-up kind as exchanged with clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKindDto {
    /// Extends the round timer for everyone.
    ExtraTime,
    /// Doubles the next scoring event.
    DoublePoints,
    /// Hides half of the wrong options.
    FiftyFifty,
    /// Keeps the streak on the next wrong answer.
    AnswerShield,
    /// Blocks an opponent for a few seconds.
    Freeze,
}

impl From<PowerUpKindDto> for PowerUpKind {
    fn from(value: PowerUpKindDto) -> Self {
        match value {
            PowerUpKindDto::ExtraTime => PowerUpKind::ExtraTime,
            PowerUpKindDto::DoublePoints => PowerUpKind::DoublePoints,
            PowerUpKindDto::FiftyFifty => PowerUpKind::FiftyFifty,
            PowerUpKindDto::AnswerShield => PowerUpKind::AnswerShield,
            PowerUpKindDto::Freeze => PowerUpKind::Freeze,
        }
    }
}

impl From<PowerUpKind> for PowerUpKindDto {
    fn from(value: PowerUpKind) -> Self {
        match value {
            PowerUpKind::ExtraTime => PowerUpKindDto::ExtraTime,
            PowerUpKind::DoublePoints => PowerUpKindDto::DoublePoints,
            PowerUpKind::FiftyFifty => PowerUpKindDto::FiftyFifty,
            PowerUpKind::AnswerShield => PowerUpKindDto::AnswerShield,
            PowerUpKind::Freeze => PowerUpKindDto::Freeze,
        }
    }
}

/// Remaining units per power-up kind, plus the modifiers waiting to fire.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PowerUpCounts {
    pub extra_time: u32,
    pub double_points: u32,
    pub fifty_fifty: u32,
    pub answer_shield: u32,
    pub freeze: u32,
    pub double_points_armed: bool,
    pub shield_armed: bool,
}

impl From<&PowerUpLedger> for PowerUpCounts {
    fn from(ledger: &PowerUpLedger) -> Self {
        Self {
            extra_time: ledger.count(PowerUpKind::ExtraTime),
            double_points: ledger.count(PowerUpKind::DoublePoints),
            fifty_fifty: ledger.count(PowerUpKind::FiftyFifty),
            answer_shield: ledger.count(PowerUpKind::AnswerShield),
            freeze: ledger.count(PowerUpKind::Freeze),
            double_points_armed: ledger.double_points_armed(),
            shield_armed: ledger.shield_armed(),
        }
    }
}

/// Public projection of a player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: Uuid,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub score: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<u32>,
    /// Present in the lives variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<u32>,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            display_name: player.display_name.clone(),
            avatar: player.avatar.clone(),
            score: player.score,
            streak: player.streak,
            max_streak: player.max_streak,
            connected: player.is_connected(),
            team: player.team,
            lives: player.lives,
        }
    }
}

/// Projection of a player sent only to that player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OwnPlayerState {
    pub player: PlayerSummary,
    pub power_ups: PowerUpCounts,
}

impl From<&Player> for OwnPlayerState {
    fn from(player: &Player) -> Self {
        Self {
            player: player.into(),
            power_ups: (&player.power_ups).into(),
        }
    }
}

/// Question as shown to players: the correct answer is stripped.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionSnapshot {
    pub id: u32,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: u32,
    pub difficulty: DifficultyDto,
}

impl From<&Question> for QuestionSnapshot {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            points: question.points,
            difficulty: question.difficulty.into(),
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub player_id: Uuid,
    pub display_name: String,
    pub score: u32,
    pub streak: u32,
    pub rank: usize,
    /// Positions gained since the previous snapshot.
    pub rank_delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<u32>,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            player_id: entry.player_id,
            display_name: entry.display_name.clone(),
            score: entry.score,
            streak: entry.streak,
            rank: entry.rank,
            rank_delta: entry.rank_delta,
            team: entry.team,
        }
    }
}

/// Aggregated team score.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamStandingDto {
    pub team: u32,
    pub score: u64,
    pub members: usize,
}

impl From<&TeamStanding> for TeamStandingDto {
    fn from(standing: &TeamStanding) -> Self {
        Self {
            team: standing.team,
            score: standing.score,
            members: standing.members,
        }
    }
}

/// Per-round statistics revealed at round close.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundStatsDto {
    pub option_counts: Vec<usize>,
    pub answered: usize,
    pub correct: usize,
    pub average_latency_ms: u64,
}

impl From<&RoundStats> for RoundStatsDto {
    fn from(stats: &RoundStats) -> Self {
        Self {
            option_counts: stats.option_counts.clone(),
            answered: stats.answered,
            correct: stats.correct,
            average_latency_ms: stats.average_latency_ms,
        }
    }
}

/// Room options as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomConfigSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,
    pub point_multiplier: u32,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub max_players: usize,
    pub min_players: usize,
    pub allow_reconnect: bool,
    pub allow_late_join: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<u32>,
}

impl From<&RoomConfig> for RoomConfigSummary {
    fn from(config: &RoomConfig) -> Self {
        Self {
            time_limit_ms: config.time_limit.map(duration_ms),
            point_multiplier: config.point_multiplier,
            shuffle_questions: config.shuffle_questions,
            shuffle_options: config.shuffle_options,
            max_players: config.max_players,
            min_players: config.min_players,
            allow_reconnect: config.allow_reconnect,
            allow_late_join: config.allow_late_join,
            lives: config.lives,
            teams: config.teams,
        }
    }
}

/// Public projection of a room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummaryDto {
    pub code: String,
    pub host_id: String,
    pub phase: VisibleRoomPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_index: Option<usize>,
    pub total_rounds: usize,
    /// Time left on the running timer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    pub created_at: String,
    pub config: RoomConfigSummary,
    pub players: Vec<PlayerSummary>,
}

impl From<&RoomSummary> for RoomSummaryDto {
    fn from(summary: &RoomSummary) -> Self {
        Self {
            code: summary.code.clone(),
            host_id: summary.host_id.clone(),
            phase: summary.phase.into(),
            round_index: summary.round_index,
            total_rounds: summary.total_rounds,
            remaining_ms: summary.remaining.map(duration_ms),
            created_at: format_system_time(summary.created_at),
            config: (&summary.config).into(),
            players: summary.players.iter().map(PlayerSummary::from).collect(),
        }
    }
}

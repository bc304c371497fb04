use std::{error::Error, sync::Arc};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::state::game::PlayerId;

/// Result alias for result sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Error raised by a result sink regardless of where it writes.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The persistence collaborator could not take the records.
    #[error("result sink unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Finalized record emitted for one player when a room finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerResult {
    /// Player identity.
    pub player_id: PlayerId,
    /// Display name.
    pub display_name: String,
    /// Final score.
    pub score: u32,
    /// Final 1-based rank.
    pub rank: usize,
    /// Number of players ranked.
    pub total_players: usize,
    /// Correct answers.
    pub correct: usize,
    /// Incorrect or missed answers.
    pub incorrect: usize,
    /// Longest streak.
    pub max_streak: u32,
    /// Team index in the teams variant.
    pub team: Option<u32>,
}

/// Every record produced by one finished room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResults {
    /// Code the room was registered under.
    pub room_code: String,
    /// Host identity supplied at creation.
    pub host_id: String,
    /// Why the room finished (`completed`, `host_ended`, ...).
    pub reason: String,
    /// Rounds that were opened.
    pub rounds_played: usize,
    /// One record per player, best rank first.
    pub players: Vec<PlayerResult>,
}

/// Persistence collaborator receiving finalized results.
pub trait ResultSink: Send + Sync {
    /// Store the results of a finished room.
    fn record(&self, results: GameResults) -> BoxFuture<'static, SinkResult<()>>;
}

/// Sink that only logs the records; used when no persistence collaborator is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingResultSink;

impl ResultSink for LoggingResultSink {
    fn record(&self, results: GameResults) -> BoxFuture<'static, SinkResult<()>> {
        Box::pin(async move {
            info!(
                code = %results.room_code,
                reason = %results.reason,
                rounds = results.rounds_played,
                players = results.players.len(),
                "room results finalized"
            );
            for player in &results.players {
                info!(
                    code = %results.room_code,
                    player_id = %player.player_id,
                    name = %player.display_name,
                    score = player.score,
                    rank = player.rank,
                    correct = player.correct,
                    incorrect = player.incorrect,
                    "player result"
                );
            }
            Ok(())
        })
    }
}

/// Sink keeping every record in memory, handy for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryResultSink {
    records: Arc<Mutex<Vec<GameResults>>>,
}

impl MemoryResultSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every result set received so far.
    pub async fn records(&self) -> Vec<GameResults> {
        self.records.lock().await.clone()
    }
}

impl ResultSink for MemoryResultSink {
    fn record(&self, results: GameResults) -> BoxFuture<'static, SinkResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            records.lock().await.push(results);
            Ok(())
        })
    }
}

use std::{collections::HashSet, time::Duration};

use rand::{Rng, seq::SliceRandom};
use uuid::Uuid;

/// Stable identity issued to a player at join, independent of any connection.
pub type PlayerId = Uuid;

/// Identifier assigned to a question by the content collaborator.
pub type QuestionId = u32;

/// Difficulty tier of a question, scaling the points it awards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    /// Multiplier of 1.0.
    #[default]
    Easy,
    /// Multiplier of 1.5.
    Medium,
    /// Multiplier of 2.0.
    Hard,
}

impl Difficulty {
    /// Point multiplier expressed in percent so scoring stays integral.
    pub fn multiplier_percent(&self) -> u64 {
        match self {
            Difficulty::Easy => 100,
            Difficulty::Medium => 150,
            Difficulty::Hard => 200,
        }
    }
}

/// One finalized question handed over by the content collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Collaborator identifier, echoed back by clients when answering.
    pub id: QuestionId,
    /// Prompt displayed to players.
    pub prompt: String,
    /// Answer options in display order.
    pub options: Vec<String>,
    /// Index of the correct option in `options`.
    pub correct: usize,
    /// Time players have to answer.
    pub time_limit: Duration,
    /// Base points awarded for a correct answer.
    pub points: u32,
    /// Difficulty tier.
    pub difficulty: Difficulty,
    /// Optional explanation revealed with the answer.
    pub explanation: Option<String>,
}

impl Question {
    /// Permute the options and remap the correct index accordingly.
    pub fn shuffle_options<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.options.len() < 2 {
            return;
        }
        let mut order: Vec<usize> = (0..self.options.len()).collect();
        order.shuffle(rng);
        let shuffled = order
            .iter()
            .map(|&index| self.options[index].clone())
            .collect();
        self.correct = order
            .iter()
            .position(|&index| index == self.correct)
            .unwrap_or(self.correct);
        self.options = shuffled;
    }
}

/// Per-room options supplied at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Overrides every question's own time limit when set.
    pub time_limit: Option<Duration>,
    /// Room-wide point multiplier in percent (100 = unchanged).
    pub point_multiplier: u32,
    /// Shuffle the question order once at creation.
    pub shuffle_questions: bool,
    /// Shuffle each question's options once at creation.
    pub shuffle_options: bool,
    /// Maximum number of players, host excluded.
    pub max_players: usize,
    /// Minimum number of players required before the host can start.
    pub min_players: usize,
    /// Whether a disconnected player may reclaim their identity.
    pub allow_reconnect: bool,
    /// Whether new players may join after the game started.
    pub allow_late_join: bool,
    /// Lives variant: number of wrong or missed answers tolerated.
    pub lives: Option<u32>,
    /// Teams variant: number of teams players are spread across.
    pub teams: Option<u32>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            point_multiplier: 100,
            shuffle_questions: false,
            shuffle_options: false,
            max_players: 50,
            min_players: 1,
            allow_reconnect: true,
            allow_late_join: false,
            lives: None,
            teams: None,
        }
    }
}

impl RoomConfig {
    /// Effective time limit for a question under this configuration.
    pub fn time_limit_for(&self, question: &Question) -> Duration {
        self.time_limit.unwrap_or(question.time_limit)
    }

    /// Base points for a question after the room multiplier.
    pub fn base_points_for(&self, question: &Question) -> u32 {
        let scaled = u64::from(question.points) * u64::from(self.point_multiplier) / 100;
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

/// Check that a question list can drive a room, describing the first problem found.
pub fn validate_questions(questions: &[Question]) -> Result<(), String> {
    if questions.is_empty() {
        return Err("a room requires at least one question".into());
    }

    let mut seen = HashSet::new();
    for question in questions {
        if !seen.insert(question.id) {
            return Err(format!("duplicate question id `{}`", question.id));
        }
        if question.prompt.trim().is_empty() {
            return Err(format!("question `{}` has an empty prompt", question.id));
        }
        if question.options.len() < 2 {
            return Err(format!(
                "question `{}` needs at least two options",
                question.id
            ));
        }
        if question.correct >= question.options.len() {
            return Err(format!(
                "question `{}` references option {} out of {}",
                question.id,
                question.correct,
                question.options.len()
            ));
        }
        if question.time_limit.is_zero() {
            return Err(format!(
                "question `{}` must have a strictly positive time limit",
                question.id
            ));
        }
    }

    Ok(())
}

/// Prepare the immutable question list for a room, applying the shuffle flags once.
pub fn prepare_questions(mut questions: Vec<Question>, config: &RoomConfig) -> Vec<Question> {
    let mut rng = rand::rng();
    if config.shuffle_questions && questions.len() > 1 {
        questions.shuffle(&mut rng);
    }
    if config.shuffle_options {
        for question in questions.iter_mut() {
            question.shuffle_options(&mut rng);
        }
    }
    questions
}

#[cfg(test)]
pub(crate) fn sample_question(id: QuestionId) -> Question {
    Question {
        id,
        prompt: format!("Question {id}?"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct: 1,
        time_limit: Duration::from_secs(30),
        points: 1000,
        difficulty: Difficulty::Easy,
        explanation: None,
    }
}

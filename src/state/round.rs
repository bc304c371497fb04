//! One question being played: its answer window and the set of accepted answers.

use std::{collections::HashMap, time::Duration};

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use tokio::time::Instant;

use crate::state::{
    RoomError,
    game::{PlayerId, Question, QuestionId},
};

/// An answer admitted into a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedAnswer {
    /// Who answered.
    pub player_id: PlayerId,
    /// Option index submitted.
    pub answer: usize,
    /// Active time elapsed since the round opened, pauses excluded.
    pub latency: Duration,
    /// Latency reported by the client, kept for statistics only.
    pub client_latency_ms: Option<u64>,
    /// Whether the answer matched the correct option.
    pub correct: bool,
    /// Points awarded.
    pub points: u32,
}

/// Per-round statistics revealed when the round closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStats {
    /// Submissions per option index.
    pub option_counts: Vec<usize>,
    /// Number of accepted answers.
    pub answered: usize,
    /// Number of correct answers.
    pub correct: usize,
    /// Mean latency of accepted answers in milliseconds (truncated).
    pub average_latency_ms: u64,
}

/// Live state of one round.
#[derive(Debug, Clone)]
pub struct Round {
    index: usize,
    question: Question,
    started_at: Instant,
    time_limit: Duration,
    paused_total: Duration,
    paused_at: Option<Instant>,
    accepted: IndexMap<PlayerId, AcceptedAnswer>,
    eliminated: HashMap<PlayerId, Vec<usize>>,
    closed: bool,
}

impl Round {
    /// Open a round for `question` at `now`.
    pub fn open(index: usize, question: Question, time_limit: Duration, now: Instant) -> Self {
        Self {
            index,
            question,
            started_at: now,
            time_limit,
            paused_total: Duration::ZERO,
            paused_at: None,
            accepted: IndexMap::new(),
            eliminated: HashMap::new(),
            closed: false,
        }
    }

    /// Round index within the room.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Question played in this round.
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Identifier of the question played.
    pub fn question_id(&self) -> QuestionId {
        self.question.id
    }

    /// Current time limit, extensions included.
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Whether the answer window is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Active time since the round opened, pauses excluded.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let frozen_at = self.paused_at.unwrap_or(now);
        frozen_at
            .saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total)
    }

    /// Active time left before the window closes.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.time_limit.saturating_sub(self.elapsed(now))
    }

    /// Instant at which the timer expires; `None` while paused or closed.
    pub fn deadline(&self) -> Option<Instant> {
        if self.closed || self.paused_at.is_some() {
            return None;
        }
        Some(self.started_at + self.paused_total + self.time_limit)
    }

    /// Suspend the timer, keeping the elapsed time.
    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Resume the timer where it stopped.
    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }

    /// Extend the answer window for everyone.
    pub fn extend(&mut self, by: Duration) {
        self.time_limit += by;
    }

    /// Validate a submission and return its latency, without admitting it.
    pub fn check_submission(
        &self,
        player_id: PlayerId,
        question_id: QuestionId,
        answer: usize,
        now: Instant,
    ) -> Result<Duration, RoomError> {
        if question_id != self.question.id {
            return Err(RoomError::NotInRound);
        }
        if self.closed {
            return Err(RoomError::RoundClosed);
        }
        if self.paused_at.is_some() {
            return Err(RoomError::RoundPaused);
        }
        let latency = self.elapsed(now);
        if latency >= self.time_limit {
            return Err(RoomError::RoundClosed);
        }
        if self.accepted.contains_key(&player_id) {
            return Err(RoomError::AlreadyAnswered);
        }
        if answer >= self.question.options.len() {
            return Err(RoomError::InvalidAnswer(answer));
        }
        Ok(latency)
    }

    /// Whether `answer` is the correct option.
    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.question.correct
    }

    /// Admit an answer. The first answer per player wins; later ones are rejected.
    pub fn accept(&mut self, answer: AcceptedAnswer) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::RoundClosed);
        }
        if self.accepted.contains_key(&answer.player_id) {
            return Err(RoomError::AlreadyAnswered);
        }
        self.accepted.insert(answer.player_id, answer);
        Ok(())
    }

    /// Whether a player already has an accepted answer.
    pub fn has_answered(&self, player_id: &PlayerId) -> bool {
        self.accepted.contains_key(player_id)
    }

    /// Whether every listed player has answered.
    ///
    /// An empty list only completes the round once somebody answered, which
    /// covers the last active players knocking themselves out.
    pub fn all_answered(&self, expected: &[PlayerId]) -> bool {
        if expected.is_empty() {
            return !self.accepted.is_empty();
        }
        expected.iter().all(|id| self.accepted.contains_key(id))
    }

    /// Close the answer window; the accepted set is frozen from now on.
    pub fn close(&mut self) {
        self.closed = true;
        self.paused_at = None;
    }

    /// Pick the wrong options eliminated for `player_id` by a fifty-fifty.
    ///
    /// Half of the options go, but at least one wrong option always stays.
    pub fn eliminate_options<R: Rng + ?Sized>(
        &mut self,
        player_id: PlayerId,
        rng: &mut R,
    ) -> Option<Vec<usize>> {
        if self.eliminated.contains_key(&player_id) {
            return None;
        }
        let mut wrong: Vec<usize> = (0..self.question.options.len())
            .filter(|index| *index != self.question.correct)
            .collect();
        let count = (self.question.options.len() / 2).min(wrong.len().saturating_sub(1));
        if count == 0 {
            return None;
        }
        wrong.shuffle(rng);
        let mut removed: Vec<usize> = wrong.into_iter().take(count).collect();
        removed.sort_unstable();
        self.eliminated.insert(player_id, removed.clone());
        Some(removed)
    }

    /// Statistics over the accepted answers.
    pub fn stats(&self) -> RoundStats {
        let mut option_counts = vec![0; self.question.options.len()];
        let mut total_latency: u128 = 0;
        let mut correct = 0;
        for answer in self.accepted.values() {
            if let Some(count) = option_counts.get_mut(answer.answer) {
                *count += 1;
            }
            total_latency += answer.latency.as_millis();
            if answer.correct {
                correct += 1;
            }
        }
        let answered = self.accepted.len();
        let average_latency_ms = if answered == 0 {
            0
        } else {
            u64::try_from(total_latency / answered as u128).unwrap_or(u64::MAX)
        };
        RoundStats {
            option_counts,
            answered,
            correct,
            average_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{Question, sample_question};
    use uuid::Uuid;

    fn round(now: Instant) -> Round {
        Round::open(0, sample_question(7), Duration::from_secs(30), now)
    }

    fn accepted(player_id: PlayerId, answer: usize, latency: Duration) -> AcceptedAnswer {
        AcceptedAnswer {
            player_id,
            answer,
            latency,
            client_latency_ms: None,
            correct: answer == 1,
            points: 0,
        }
    }

    #[test]
    fn first_submission_wins() {
        let now = Instant::now();
        let mut round = round(now);
        let player = Uuid::new_v4();
        round
            .accept(accepted(player, 1, Duration::from_secs(2)))
            .unwrap();
        assert_eq!(
            round.check_submission(player, 7, 2, now),
            Err(RoomError::AlreadyAnswered)
        );
        assert_eq!(
            round.accept(accepted(player, 2, Duration::from_secs(3))),
            Err(RoomError::AlreadyAnswered)
        );
        assert_eq!(round.stats().option_counts, vec![0, 1, 0, 0]);
    }

    #[test]
    fn completion_needs_an_answer_when_nobody_is_left() {
        let now = Instant::now();
        let mut round = round(now);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(!round.all_answered(&[]));

        round.accept(accepted(alice, 0, Duration::from_secs(1))).unwrap();
        assert!(!round.all_answered(&[alice, bob]));
        assert!(round.all_answered(&[alice]));
        // Both players knocked out by their own answers leave nobody active.
        round.accept(accepted(bob, 2, Duration::from_secs(1))).unwrap();
        assert!(round.all_answered(&[]));
    }

    #[test]
    fn closed_round_is_immutable() {
        let now = Instant::now();
        let mut round = round(now);
        round.close();
        let player = Uuid::new_v4();
        assert_eq!(
            round.check_submission(player, 7, 1, now),
            Err(RoomError::RoundClosed)
        );
        assert_eq!(
            round.accept(accepted(player, 1, Duration::ZERO)),
            Err(RoomError::RoundClosed)
        );
        assert_eq!(round.stats().answered, 0);
    }

    #[test]
    fn wrong_question_and_bad_option_are_rejected() {
        let now = Instant::now();
        let round = round(now);
        let player = Uuid::new_v4();
        assert_eq!(
            round.check_submission(player, 8, 1, now),
            Err(RoomError::NotInRound)
        );
        assert_eq!(
            round.check_submission(player, 7, 4, now),
            Err(RoomError::InvalidAnswer(4))
        );
    }

    #[test]
    fn pause_preserves_remaining_time() {
        let start = Instant::now();
        let mut round = round(start);
        round.pause(start + Duration::from_secs(18));
        assert_eq!(round.deadline(), None);
        assert_eq!(
            round.remaining(start + Duration::from_secs(100)),
            Duration::from_secs(12)
        );

        round.resume(start + Duration::from_secs(100));
        assert_eq!(
            round.remaining(start + Duration::from_secs(100)),
            Duration::from_secs(12)
        );
        assert_eq!(round.deadline(), Some(start + Duration::from_secs(112)));
    }

    #[test]
    fn extension_moves_the_deadline() {
        let start = Instant::now();
        let mut round = round(start);
        round.extend(Duration::from_secs(10));
        assert_eq!(round.deadline(), Some(start + Duration::from_secs(40)));
        assert!(
            round
                .check_submission(Uuid::new_v4(), 7, 1, start + Duration::from_secs(35))
                .is_ok()
        );
    }

    #[test]
    fn fifty_fifty_keeps_one_wrong_option() {
        let mut round = round(Instant::now());
        let player = Uuid::new_v4();
        let mut rng = rand::rng();
        let removed = round.eliminate_options(player, &mut rng).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!removed.contains(&1));
        assert!(round.eliminate_options(player, &mut rng).is_none());

        let mut binary = Round::open(
            1,
            Question {
                options: vec!["yes".into(), "no".into()],
                correct: 0,
                ..sample_question(9)
            },
            Duration::from_secs(30),
            Instant::now(),
        );
        assert!(binary.eliminate_options(player, &mut rng).is_none());
    }

    #[test]
    fn stats_count_options_and_latency() {
        let mut round = round(Instant::now());
        round
            .accept(accepted(Uuid::new_v4(), 1, Duration::from_millis(1000)))
            .unwrap();
        round
            .accept(accepted(Uuid::new_v4(), 1, Duration::from_millis(2001)))
            .unwrap();
        round
            .accept(accepted(Uuid::new_v4(), 3, Duration::from_millis(3000)))
            .unwrap();
        let stats = round.stats();
        assert_eq!(stats.option_counts, vec![0, 2, 0, 1]);
        assert_eq!(stats.answered, 3);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.average_latency_ms, 2000);
    }
}

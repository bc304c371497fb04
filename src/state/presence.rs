//! Per-room presence table: who joined, whether they are connected, and their standing.

use indexmap::IndexMap;
use tokio::time::Instant;
use uuid::Uuid;

use crate::state::{
    RoomError,
    game::{PlayerId, QuestionId},
    power_ups::PowerUpLedger,
};

/// Identifies one transport connection of a player.
pub type ConnectionId = Uuid;

/// Connection status tracked independently of the player's standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A live connection is attached.
    Connected,
    /// The player dropped or closed their connection; their record is kept.
    Disconnected,
}

/// What happened to a player in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Correct answer with the points it earned.
    Correct {
        /// Points awarded.
        points: u32,
    },
    /// Wrong answer.
    Incorrect,
    /// No answer before the round closed.
    Missed,
}

/// One entry of a player's per-round answer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    /// Index of the round.
    pub round: usize,
    /// Question played in that round.
    pub question_id: QuestionId,
    /// Outcome of the round for this player.
    pub outcome: AnswerOutcome,
}

/// One joined participant.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identity issued at join.
    pub id: PlayerId,
    /// Display name chosen at join.
    pub display_name: String,
    /// Optional avatar token.
    pub avatar: Option<String>,
    /// Position in join order, used as the final leaderboard tie-break.
    pub join_order: u64,
    /// Team index in the teams variant.
    pub team: Option<u32>,
    /// Current score; only ever increases.
    pub score: u32,
    /// Consecutive correct answers.
    pub streak: u32,
    /// Longest streak observed.
    pub max_streak: u32,
    /// Event sequence at which the current streak value was reached.
    pub streak_achieved_at: Option<u64>,
    /// Connection status.
    pub status: ConnectionStatus,
    /// Connection currently bound to the player, if any.
    pub connection: Option<ConnectionId>,
    /// Per-round answer record.
    pub answers: Vec<AnswerRecord>,
    /// Power-up counters and armed modifiers.
    pub power_ups: PowerUpLedger,
    /// Lives left in the lives variant.
    pub lives: Option<u32>,
    /// Submissions are rejected until this instant.
    pub frozen_until: Option<Instant>,
}

impl Player {
    /// Whether a live connection is attached.
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Whether the player ran out of lives.
    pub fn is_eliminated(&self) -> bool {
        self.lives == Some(0)
    }

    /// Whether the player is frozen at `now`.
    pub fn is_frozen(&self, now: Instant) -> bool {
        self.frozen_until.is_some_and(|until| now < until)
    }

    /// Number of correct answers so far.
    pub fn correct_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|record| matches!(record.outcome, AnswerOutcome::Correct { .. }))
            .count()
    }

    /// Number of incorrect or missed answers so far.
    pub fn incorrect_count(&self) -> usize {
        self.answers.len() - self.correct_count()
    }

    /// Apply a correct answer worth `points`.
    pub fn record_correct(&mut self, round: usize, question_id: QuestionId, points: u32, seq: u64) {
        self.score = self.score.saturating_add(points);
        self.streak += 1;
        self.max_streak = self.max_streak.max(self.streak);
        self.streak_achieved_at = Some(seq);
        self.answers.push(AnswerRecord {
            round,
            question_id,
            outcome: AnswerOutcome::Correct { points },
        });
    }

    /// Apply a wrong answer; an armed shield keeps the streak alive.
    pub fn record_incorrect(&mut self, round: usize, question_id: QuestionId) {
        if !self.power_ups.take_shield() {
            self.reset_streak();
        }
        self.lose_life();
        self.answers.push(AnswerRecord {
            round,
            question_id,
            outcome: AnswerOutcome::Incorrect,
        });
    }

    /// Apply a missed round.
    pub fn record_miss(&mut self, round: usize, question_id: QuestionId) {
        self.reset_streak();
        self.lose_life();
        self.answers.push(AnswerRecord {
            round,
            question_id,
            outcome: AnswerOutcome::Missed,
        });
    }

    fn reset_streak(&mut self) {
        self.streak = 0;
        self.streak_achieved_at = None;
    }

    fn lose_life(&mut self) {
        if let Some(lives) = self.lives.as_mut() {
            *lives = lives.saturating_sub(1);
        }
    }
}

/// Join request as received from a client.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Desired display name (already trimmed and validated).
    pub display_name: String,
    /// Optional avatar token.
    pub avatar: Option<String>,
    /// Identity issued by an earlier join, if the client has one.
    pub existing: Option<PlayerId>,
    /// Connection the player is joining through.
    pub connection: ConnectionId,
}

/// Room-dependent rules applied to joins and reconnects.
#[derive(Debug, Clone)]
pub struct JoinRules {
    /// Whether new identities may be admitted right now.
    pub accepting_new: bool,
    /// Whether known identities may reclaim their record.
    pub allow_reconnect: bool,
    /// Maximum number of player records.
    pub max_players: usize,
    /// Ledger handed to new players.
    pub initial_power_ups: PowerUpLedger,
    /// Lives handed to new players in the lives variant.
    pub lives: Option<u32>,
    /// Team count in the teams variant.
    pub teams: Option<u32>,
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Player record after the join.
    pub player: Player,
    /// True when an existing identity was reclaimed.
    pub rejoined: bool,
}

/// Map of player identity to presence and standing for one room.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    players: IndexMap<PlayerId, Player>,
    next_join_order: u64,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a player, reclaiming `existing` when it is a known identity.
    pub fn join(&mut self, request: JoinRequest, rules: &JoinRules) -> Result<JoinOutcome, RoomError> {
        if let Some(existing) = request.existing
            && self.players.contains_key(&existing)
        {
            let player = self.reconnect(existing, request.connection, rules)?;
            return Ok(JoinOutcome {
                player: player.clone(),
                rejoined: true,
            });
        }

        if !rules.accepting_new {
            return Err(RoomError::RoomNotJoinable);
        }
        if self.players.len() >= rules.max_players {
            return Err(RoomError::RoomFull);
        }
        if self.name_taken(&request.display_name) {
            return Err(RoomError::NameTaken(request.display_name));
        }

        let join_order = self.next_join_order;
        self.next_join_order += 1;
        let id = Uuid::new_v4();
        let team = rules
            .teams
            .filter(|count| *count > 0)
            .map(|count| (join_order % u64::from(count)) as u32);

        let player = Player {
            id,
            display_name: request.display_name,
            avatar: request.avatar,
            join_order,
            team,
            score: 0,
            streak: 0,
            max_streak: 0,
            streak_achieved_at: None,
            status: ConnectionStatus::Connected,
            connection: Some(request.connection),
            answers: Vec::new(),
            power_ups: rules.initial_power_ups.clone(),
            lives: rules.lives,
            frozen_until: None,
        };
        self.players.insert(id, player.clone());

        Ok(JoinOutcome {
            player,
            rejoined: false,
        })
    }

    /// Reattach a known identity to a new connection, keeping its standing.
    pub fn reconnect(
        &mut self,
        id: PlayerId,
        connection: ConnectionId,
        rules: &JoinRules,
    ) -> Result<&Player, RoomError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(RoomError::PlayerNotFound(id))?;
        if !rules.allow_reconnect && !player.is_connected() {
            return Err(RoomError::RoomNotJoinable);
        }
        player.status = ConnectionStatus::Connected;
        player.connection = Some(connection);
        Ok(player)
    }

    /// Flip a player to disconnected when `connection` is still the one bound to them.
    ///
    /// Returns `true` when the status changed.
    pub fn mark_disconnected(&mut self, id: PlayerId, connection: Option<ConnectionId>) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if connection.is_some() && player.connection != connection {
            return false;
        }
        if !player.is_connected() {
            return false;
        }
        player.status = ConnectionStatus::Disconnected;
        player.connection = None;
        true
    }

    /// Delete a player record.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        self.players.shift_remove(&id)
    }

    /// Borrow a player.
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Borrow a player mutably.
    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Every player, in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of player records.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody joined yet.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Number of players with a live connection.
    pub fn connected_count(&self) -> usize {
        self.players().filter(|player| player.is_connected()).count()
    }

    /// Players expected to answer: connected and not eliminated.
    pub fn active_ids(&self) -> Vec<PlayerId> {
        self.players()
            .filter(|player| player.is_connected() && !player.is_eliminated())
            .map(|player| player.id)
            .collect()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.players
            .values()
            .any(|player| player.display_name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::power_ups::PowerUpKind;

    fn rules() -> JoinRules {
        JoinRules {
            accepting_new: true,
            allow_reconnect: true,
            max_players: 2,
            initial_power_ups: PowerUpLedger::with_uniform(1),
            lives: None,
            teams: None,
        }
    }

    fn request(name: &str) -> JoinRequest {
        JoinRequest {
            display_name: name.into(),
            avatar: None,
            existing: None,
            connection: Uuid::new_v4(),
        }
    }

    #[test]
    fn join_issues_identity_and_join_order() {
        let mut tracker = PresenceTracker::new();
        let alice = tracker.join(request("alice"), &rules()).unwrap().player;
        let bob = tracker.join(request("bob"), &rules()).unwrap().player;
        assert_ne!(alice.id, bob.id);
        assert_eq!(alice.join_order, 0);
        assert_eq!(bob.join_order, 1);
        assert_eq!(tracker.connected_count(), 2);
    }

    #[test]
    fn full_room_rejects_without_adding() {
        let mut tracker = PresenceTracker::new();
        let rules = JoinRules {
            max_players: 1,
            ..rules()
        };
        tracker.join(request("alice"), &rules).unwrap();
        let err = tracker.join(request("bob"), &rules).unwrap_err();
        assert_eq!(err, RoomError::RoomFull);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.players().all(|player| player.display_name != "bob"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut tracker = PresenceTracker::new();
        tracker.join(request("Alice"), &rules()).unwrap();
        let err = tracker.join(request("alice"), &rules()).unwrap_err();
        assert!(matches!(err, RoomError::NameTaken(_)));
    }

    #[test]
    fn closed_room_rejects_new_identities() {
        let mut tracker = PresenceTracker::new();
        let rules = JoinRules {
            accepting_new: false,
            ..rules()
        };
        let err = tracker.join(request("alice"), &rules).unwrap_err();
        assert_eq!(err, RoomError::RoomNotJoinable);
    }

    #[test]
    fn reconnect_restores_standing() {
        let mut tracker = PresenceTracker::new();
        let alice = tracker.join(request("alice"), &rules()).unwrap().player;
        {
            let player = tracker.get_mut(&alice.id).unwrap();
            player.record_correct(0, 1, 1500, 7);
            player.power_ups.consume(PowerUpKind::Freeze).unwrap();
        }

        assert!(tracker.mark_disconnected(alice.id, alice.connection));
        assert_eq!(tracker.connected_count(), 0);
        assert_eq!(tracker.len(), 1);

        let closed = JoinRules {
            accepting_new: false,
            ..rules()
        };
        let rejoined = tracker
            .join(
                JoinRequest {
                    existing: Some(alice.id),
                    ..request("ignored")
                },
                &closed,
            )
            .unwrap();
        assert!(rejoined.rejoined);
        assert_eq!(rejoined.player.score, 1500);
        assert_eq!(rejoined.player.streak, 1);
        assert_eq!(rejoined.player.power_ups.count(PowerUpKind::Freeze), 0);
        assert!(rejoined.player.is_connected());
    }

    #[test]
    fn unknown_identity_cannot_reconnect() {
        let mut tracker = PresenceTracker::new();
        let id = Uuid::new_v4();
        let err = tracker.reconnect(id, Uuid::new_v4(), &rules()).unwrap_err();
        assert_eq!(err, RoomError::PlayerNotFound(id));
    }

    #[test]
    fn unknown_identity_joins_fresh_when_open() {
        let mut tracker = PresenceTracker::new();
        let outcome = tracker
            .join(
                JoinRequest {
                    existing: Some(Uuid::new_v4()),
                    ..request("alice")
                },
                &rules(),
            )
            .unwrap();
        assert!(!outcome.rejoined);
    }

    #[test]
    fn stale_connection_does_not_disconnect() {
        let mut tracker = PresenceTracker::new();
        let alice = tracker.join(request("alice"), &rules()).unwrap().player;
        let fresh = Uuid::new_v4();
        tracker.reconnect(alice.id, fresh, &rules()).unwrap();

        assert!(!tracker.mark_disconnected(alice.id, alice.connection));
        assert!(tracker.get(&alice.id).unwrap().is_connected());
        assert!(tracker.mark_disconnected(alice.id, Some(fresh)));
    }

    #[test]
    fn teams_are_assigned_round_robin() {
        let mut tracker = PresenceTracker::new();
        let rules = JoinRules {
            teams: Some(2),
            max_players: 4,
            ..rules()
        };
        let teams: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| tracker.join(request(name), &rules).unwrap().player.team)
            .collect();
        assert_eq!(teams, vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn shield_preserves_streak_and_lives_run_out() {
        let mut tracker = PresenceTracker::new();
        let rules = JoinRules {
            lives: Some(1),
            ..rules()
        };
        let alice = tracker.join(request("alice"), &rules).unwrap().player;
        let player = tracker.get_mut(&alice.id).unwrap();
        player.record_correct(0, 1, 100, 1);
        player.power_ups.consume(PowerUpKind::AnswerShield).unwrap();
        player.record_incorrect(1, 2);
        assert_eq!(player.streak, 1);
        assert!(player.is_eliminated());
        assert_eq!(player.incorrect_count(), 1);
        assert_eq!(player.correct_count(), 1);
    }
}

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        common::{LeaderboardRow, QuestionSnapshot, RoundStatsDto, TeamStandingDto},
        duration_ms,
        phase::finish_reason,
        sse::{
            GameFinishedEvent, LeaderboardDeltaEvent, PhaseChangedEvent, PlayerDisconnectedEvent,
            PlayerFrozenEvent, PlayerPresenceEvent, PowerUpUsedEvent, RoundClosedEvent,
            RoundExtendedEvent, RoundOpenedEvent, RoundProgressEvent, ScoreUpdateEvent,
            ServerEvent, TimeRemainingEvent,
        },
    },
    state::{
        game::PlayerId,
        hub::RoomHub,
        leaderboard::{LeaderboardDelta, LeaderboardSnapshot, TeamStanding},
        power_ups::PowerUpKind,
        presence::Player,
        round::{Round, RoundStats},
        state_machine::{CloseReason, FinishReason, RoomPhase},
    },
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_ROUND_OPENED: &str = "round.opened";
const EVENT_TIME_REMAINING: &str = "round.time_remaining";
const EVENT_ROUND_PROGRESS: &str = "round.progress";
const EVENT_ROUND_EXTENDED: &str = "round.extended";
const EVENT_ROUND_CLOSED: &str = "round.closed";
const EVENT_LEADERBOARD_DELTA: &str = "leaderboard.delta";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_PLAYER_LEFT: &str = "player.left";
const EVENT_PLAYER_REMOVED: &str = "player.removed";
const EVENT_PLAYER_RECONNECTED: &str = "player.reconnected";
const EVENT_PLAYER_DISCONNECTED: &str = "player.disconnected";
const EVENT_SCORE_UPDATE: &str = "player.score";
const EVENT_PLAYER_FROZEN: &str = "player.frozen";
const EVENT_POWER_UP_USED: &str = "power_up.used";
const EVENT_GAME_FINISHED: &str = "game.finished";

/// Broadcast a new player.
pub fn broadcast_player_joined(hub: &RoomHub, player: &Player, player_count: usize) {
    let payload = PlayerPresenceEvent {
        player: player.into(),
        player_count: Some(player_count),
    };
    send_room_event(hub, EVENT_PLAYER_JOINED, &payload);
}

/// Broadcast that a known identity is connected again.
pub fn broadcast_player_reconnected(hub: &RoomHub, player: &Player) {
    let payload = PlayerPresenceEvent {
        player: player.into(),
        player_count: None,
    };
    send_room_event(hub, EVENT_PLAYER_RECONNECTED, &payload);
}

/// Broadcast a voluntary departure.
pub fn broadcast_player_left(hub: &RoomHub, player: &Player) {
    let payload = PlayerPresenceEvent {
        player: player.into(),
        player_count: None,
    };
    send_room_event(hub, EVENT_PLAYER_LEFT, &payload);
}

/// Broadcast that the host removed a player.
pub fn broadcast_player_removed(hub: &RoomHub, player: &Player) {
    let payload = PlayerPresenceEvent {
        player: player.into(),
        player_count: None,
    };
    send_room_event(hub, EVENT_PLAYER_REMOVED, &payload);
}

/// Broadcast that a player's connection dropped. The record is kept.
pub fn broadcast_player_disconnected(hub: &RoomHub, player_id: PlayerId) {
    send_room_event(
        hub,
        EVENT_PLAYER_DISCONNECTED,
        &PlayerDisconnectedEvent { player_id },
    );
}

/// Tell the answering player how the answer scored.
pub fn send_score_update(hub: &RoomHub, player: &Player, points: u32, correct: bool) {
    let payload = ScoreUpdateEvent {
        player_id: player.id,
        correct,
        points_earned: points,
        score: player.score,
        streak: player.streak,
        lives: player.lives,
    };
    send_player_event(hub, player.id, EVENT_SCORE_UPDATE, &payload);
}

/// Broadcast how many expected players already answered.
pub fn broadcast_round_progress(hub: &RoomHub, round_index: usize, answered: usize, expected: usize) {
    let payload = RoundProgressEvent {
        round_index,
        answered,
        expected,
    };
    send_room_event(hub, EVENT_ROUND_PROGRESS, &payload);
}

/// Broadcast a power-up use. Fifty-fifty results are never part of it.
pub fn broadcast_power_up_used(
    hub: &RoomHub,
    player_id: PlayerId,
    kind: PowerUpKind,
    target: Option<PlayerId>,
) {
    let payload = PowerUpUsedEvent {
        player_id,
        kind: kind.into(),
        target,
    };
    send_room_event(hub, EVENT_POWER_UP_USED, &payload);
}

/// Broadcast the new remaining time after an extension.
pub fn broadcast_round_extended(
    hub: &RoomHub,
    round_index: usize,
    remaining: Duration,
    by: PlayerId,
) {
    let payload = RoundExtendedEvent {
        round_index,
        remaining_ms: duration_ms(remaining),
        by,
    };
    send_room_event(hub, EVENT_ROUND_EXTENDED, &payload);
}

/// Tell a player they are frozen.
pub fn send_player_frozen(hub: &RoomHub, target: PlayerId, by: PlayerId, duration: Duration) {
    let payload = PlayerFrozenEvent {
        player_id: target,
        by,
        duration_ms: duration_ms(duration),
    };
    send_player_event(hub, target, EVENT_PLAYER_FROZEN, &payload);
}

/// Periodic countdown tick.
pub fn broadcast_time_remaining(hub: &RoomHub, round_index: usize, remaining: Duration) {
    let payload = TimeRemainingEvent {
        round_index,
        remaining_ms: duration_ms(remaining),
    };
    send_room_event(hub, EVENT_TIME_REMAINING, &payload);
}

/// Broadcast the question of a freshly opened round, without its answer.
pub fn broadcast_round_opened(hub: &RoomHub, round: &Round, total_rounds: usize) {
    let payload = RoundOpenedEvent {
        round_index: round.index(),
        total_rounds,
        question: QuestionSnapshot::from(round.question()),
        time_limit_ms: duration_ms(round.time_limit()),
    };
    send_room_event(hub, EVENT_ROUND_OPENED, &payload);
}

/// Reveal the correct option and the round statistics.
pub fn broadcast_round_closed(hub: &RoomHub, round: &Round, stats: &RoundStats, reason: CloseReason) {
    let question = round.question();
    let payload = RoundClosedEvent {
        round_index: round.index(),
        question_id: question.id,
        correct_option: question.correct,
        explanation: question.explanation.clone(),
        stats: RoundStatsDto::from(stats),
        reason: close_reason_label(reason).to_string(),
    };
    send_room_event(hub, EVENT_ROUND_CLOSED, &payload);
}

/// Broadcast the leaderboard rows that moved.
pub fn broadcast_leaderboard_delta(hub: &RoomHub, delta: &LeaderboardDelta) {
    let payload = LeaderboardDeltaEvent {
        changed: delta.changed.iter().map(LeaderboardRow::from).collect(),
        removed: delta.removed.clone(),
    };
    send_room_event(hub, EVENT_LEADERBOARD_DELTA, &payload);
}

/// Broadcast the current phase.
pub fn broadcast_phase_changed(
    hub: &RoomHub,
    phase: RoomPhase,
    round_index: Option<usize>,
    total_rounds: usize,
    remaining: Option<Duration>,
) {
    let payload = PhaseChangedEvent {
        phase: phase.into(),
        round_index,
        total_rounds,
        remaining_ms: remaining.map(duration_ms),
        finish_reason: finish_reason(phase),
    };
    send_room_event(hub, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast the final standings.
pub fn broadcast_game_finished(
    hub: &RoomHub,
    reason: FinishReason,
    snapshot: &LeaderboardSnapshot,
    teams: &[TeamStanding],
    rounds_played: usize,
    total_rounds: usize,
) {
    let payload = GameFinishedEvent {
        reason: reason.into(),
        rounds_played,
        total_rounds,
        leaderboard: snapshot.entries.iter().map(LeaderboardRow::from).collect(),
        teams: teams.iter().map(TeamStandingDto::from).collect(),
    };
    send_room_event(hub, EVENT_GAME_FINISHED, &payload);
}

fn close_reason_label(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::TimerExpired => "timer_expired",
        CloseReason::AllAnswered => "all_answered",
    }
}

fn send_room_event(hub: &RoomHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize room event payload"),
    }
}

fn send_player_event(hub: &RoomHub, player_id: PlayerId, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event.for_player(player_id)),
        Err(err) => warn!(event, error = %err, "failed to serialize player event payload"),
    }
}

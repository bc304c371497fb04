//! The room actor: the only writer of a room's state.
//!
//! Every join, answer, power-up use, host control and timer expiry goes through one
//! bounded command queue and is applied sequentially, so nothing inside a room
//! needs locking. Broadcasts are emitted from the same loop and therefore follow
//! the order of the transitions they describe.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::{
    sync::{
        broadcast,
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    time::{Instant, MissedTickBehavior, interval_at, sleep_until},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::EngineSettings,
    dao::results::{GameResults, PlayerResult, ResultSink},
    dto::sse::ServerEvent,
    services::room_events,
    state::{
        RoomError,
        game::{PlayerId, Question, QuestionId, RoomConfig},
        hub::RoomHub,
        leaderboard::{LeaderboardAggregator, LeaderboardSnapshot, team_standings},
        power_ups::PowerUpKind,
        presence::{ConnectionId, JoinRequest, JoinRules, Player, PresenceTracker},
        registry::RoomCode,
        round::{AcceptedAnswer, Round},
        scoring::{Modifiers, score},
        state_machine::{
            CloseReason, FinishReason, PausedFrom, RoomPhase, RoomStateMachine, SessionEvent,
        },
    },
};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Controls reserved to the room host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Leave the waiting room and start the countdown.
    Start,
    /// Suspend the current round or reveal window.
    Pause,
    /// Resume where the pause left off.
    Resume,
    /// Terminate the room immediately.
    ForceEnd,
    /// Delete a player record.
    RemovePlayer(PlayerId),
}

/// Answer sent by a player for the open round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// Question the player believes is open.
    pub question_id: QuestionId,
    /// Chosen option index.
    pub answer: usize,
    /// Latency measured by the client, kept for statistics.
    pub client_latency_ms: Option<u64>,
}

/// Outcome of an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points earned by this answer.
    pub points_earned: u32,
    /// Score after the answer.
    pub score: u32,
    /// Streak after the answer.
    pub streak: u32,
    /// Lives left in the lives variant.
    pub lives: Option<u32>,
}

/// Immediate effect of a power-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerUpEffect {
    /// Round extended for everyone; time left afterwards.
    TimeExtended {
        /// Remaining active time after the extension.
        remaining: Duration,
    },
    /// The next scoring event counts double.
    DoublePointsArmed,
    /// Wrong options hidden for the requester.
    OptionsEliminated(Vec<usize>),
    /// The next wrong answer keeps the streak.
    ShieldArmed,
    /// An opponent cannot answer for a while.
    Froze {
        /// Frozen player.
        target: PlayerId,
        /// Freeze length.
        duration: Duration,
    },
}

/// Outcome of a power-up use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerUpReceipt {
    /// Kind used.
    pub kind: PowerUpKind,
    /// Units left afterwards.
    pub remaining: u32,
    /// What the power-up did.
    pub effect: PowerUpEffect,
}

/// Read-only projection of a room.
#[derive(Debug, Clone)]
pub struct RoomSummary {
    /// Room code.
    pub code: String,
    /// Host identity.
    pub host_id: String,
    /// Current phase.
    pub phase: RoomPhase,
    /// Index of the current (or last) round.
    pub round_index: Option<usize>,
    /// Number of questions.
    pub total_rounds: usize,
    /// Time left on the running timer, if any.
    pub remaining: Option<Duration>,
    /// Room options.
    pub config: RoomConfig,
    /// Every player, in join order.
    pub players: Vec<Player>,
    /// Creation time.
    pub created_at: SystemTime,
}

/// Reply to a successful join or reconnect.
#[derive(Debug, Clone)]
pub struct JoinAccepted {
    /// Room state after the join.
    pub room: RoomSummary,
    /// The joined player.
    pub player: Player,
    /// True when an existing identity was reclaimed.
    pub rejoined: bool,
}

enum RoomCommand {
    Join {
        request: JoinRequest,
        reply: Reply<JoinAccepted>,
    },
    Reconnect {
        player_id: PlayerId,
        connection: ConnectionId,
        reply: Reply<JoinAccepted>,
    },
    Leave {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    Disconnect {
        player_id: PlayerId,
        connection: ConnectionId,
    },
    SubmitAnswer {
        player_id: PlayerId,
        submission: Submission,
        reply: Reply<AnswerReceipt>,
    },
    UsePowerUp {
        player_id: PlayerId,
        kind: PowerUpKind,
        target: Option<PlayerId>,
        reply: Reply<PowerUpReceipt>,
    },
    Host {
        command: HostCommand,
        reply: Reply<RoomPhase>,
    },
    Summary {
        reply: Reply<RoomSummary>,
    },
    Leaderboard {
        reply: Reply<LeaderboardSnapshot>,
    },
}

/// Cloneable entry point to a running room.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    host_id: String,
    host_token: String,
    commands: mpsc::Sender<RoomCommand>,
    hub: Arc<RoomHub>,
}

impl fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomHandle")
            .field("code", &self.code)
            .field("host_id", &self.host_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RoomHandle {
    /// Code the room is registered under.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Host identity supplied at creation.
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Credential required by host controls.
    pub fn host_token(&self) -> &str {
        &self.host_token
    }

    /// Whether the actor stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Subscribe to the room's broadcasts.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.hub.subscribe()
    }

    /// Number of live broadcast subscribers, player sockets included.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Join the room, reclaiming `existing` when the room still knows it.
    pub async fn join(
        &self,
        display_name: String,
        avatar: Option<String>,
        existing: Option<PlayerId>,
        connection: ConnectionId,
    ) -> Result<JoinAccepted, RoomError> {
        let request = JoinRequest {
            display_name: display_name.trim().to_string(),
            avatar,
            existing,
            connection,
        };
        self.request(|reply| RoomCommand::Join { request, reply })
            .await
    }

    /// Reattach a known identity to a new connection.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<JoinAccepted, RoomError> {
        self.request(|reply| RoomCommand::Reconnect {
            player_id,
            connection,
            reply,
        })
        .await
    }

    /// Leave the room for good.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await
    }

    /// Report that `connection` of a player dropped. Never rejected.
    pub fn disconnect(&self, player_id: PlayerId, connection: ConnectionId) {
        let command = RoomCommand::Disconnect {
            player_id,
            connection,
        };
        match self.commands.try_send(command) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => {
                let commands = self.commands.clone();
                tokio::spawn(async move {
                    let _ = commands.send(command).await;
                });
            }
        }
    }

    /// Submit an answer for the open round.
    pub async fn submit_answer(
        &self,
        player_id: PlayerId,
        submission: Submission,
    ) -> Result<AnswerReceipt, RoomError> {
        self.request(|reply| RoomCommand::SubmitAnswer {
            player_id,
            submission,
            reply,
        })
        .await
    }

    /// Spend one power-up unit. `target` is required by freeze.
    pub async fn use_power_up(
        &self,
        player_id: PlayerId,
        kind: PowerUpKind,
        target: Option<PlayerId>,
    ) -> Result<PowerUpReceipt, RoomError> {
        self.request(|reply| RoomCommand::UsePowerUp {
            player_id,
            kind,
            target,
            reply,
        })
        .await
    }

    /// Run a host control after checking the host token.
    pub async fn host(&self, token: &str, command: HostCommand) -> Result<RoomPhase, RoomError> {
        if token != self.host_token {
            return Err(RoomError::NotHost);
        }
        self.request(|reply| RoomCommand::Host { command, reply })
            .await
    }

    /// Current room projection.
    pub async fn summary(&self) -> Result<RoomSummary, RoomError> {
        self.request(|reply| RoomCommand::Summary { reply }).await
    }

    /// Current leaderboard.
    pub async fn leaderboard(&self) -> Result<LeaderboardSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Leaderboard { reply })
            .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .try_send(build(reply))
            .map_err(|err| match err {
                TrySendError::Full(_) => RoomError::RoomBusy,
                TrySendError::Closed(_) => RoomError::RoomClosed,
            })?;
        response.await.map_err(|_| RoomError::RoomClosed)?
    }
}

/// Everything needed to start a room actor.
pub(crate) struct RoomSetup {
    pub code: RoomCode,
    pub host_id: String,
    pub questions: Vec<Question>,
    pub config: RoomConfig,
    pub settings: EngineSettings,
    pub sink: Arc<dyn ResultSink>,
}

/// Actor owning a room's state and its command queue.
pub(crate) struct RoomActor {
    session: RoomSession,
    commands: mpsc::Receiver<RoomCommand>,
}

/// Build the handle and the actor of a new room; the caller spawns [`RoomActor::run`].
pub(crate) fn build_room(setup: RoomSetup) -> (RoomHandle, RoomActor) {
    let (commands_tx, commands_rx) = mpsc::channel(setup.settings.queue_capacity.max(1));
    let hub = Arc::new(RoomHub::new(setup.settings.broadcast_capacity));
    let now = Instant::now();

    let handle = RoomHandle {
        code: setup.code.clone(),
        host_id: setup.host_id.clone(),
        host_token: Uuid::new_v4().simple().to_string(),
        commands: commands_tx,
        hub: hub.clone(),
    };

    let session = RoomSession {
        code: setup.code,
        host_id: setup.host_id,
        questions: setup.questions,
        config: setup.config,
        settings: setup.settings,
        sink: setup.sink,
        hub,
        machine: RoomStateMachine::new(),
        presence: PresenceTracker::new(),
        leaderboard: LeaderboardAggregator::new(),
        round: None,
        round_index: None,
        phase_deadline: None,
        suspended_remaining: None,
        empty_since: Some(now),
        created_at: SystemTime::now(),
        seq: 0,
    };

    (
        handle,
        RoomActor {
            session,
            commands: commands_rx,
        },
    )
}

impl RoomActor {
    /// Serve the room until it finishes. No timer fires afterwards.
    pub(crate) async fn run(self) {
        let RoomActor {
            mut session,
            mut commands,
        } = self;
        let tick = session.settings.tick_interval;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            code = %session.code,
            host_id = %session.host_id,
            questions = session.questions.len(),
            "room opened"
        );

        while !session.machine.is_finished() {
            let deadline = session.next_deadline();
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => session.handle(command),
                    None => session.finish(FinishReason::Abandoned, Instant::now()),
                },
                _ = wait_until(deadline) => session.on_deadline(Instant::now()),
                _ = ticker.tick() => session.on_tick(Instant::now()),
            }
        }

        info!(code = %session.code, "room actor stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct RoomSession {
    code: RoomCode,
    host_id: String,
    questions: Vec<Question>,
    config: RoomConfig,
    settings: EngineSettings,
    sink: Arc<dyn ResultSink>,
    hub: Arc<RoomHub>,
    machine: RoomStateMachine,
    presence: PresenceTracker,
    leaderboard: LeaderboardAggregator,
    round: Option<Round>,
    round_index: Option<usize>,
    /// Deadline of the countdown or reveal window.
    phase_deadline: Option<Instant>,
    /// Reveal time left when paused during results.
    suspended_remaining: Option<Duration>,
    /// Since when no player is connected.
    empty_since: Option<Instant>,
    created_at: SystemTime,
    /// Sequence number of the input being applied.
    seq: u64,
}

impl RoomSession {
    fn handle(&mut self, command: RoomCommand) {
        let now = Instant::now();
        self.seq += 1;
        match command {
            RoomCommand::Join { request, reply } => {
                let result = self.join(request, now);
                self.respond(reply, result, "join");
            }
            RoomCommand::Reconnect {
                player_id,
                connection,
                reply,
            } => {
                let result = self.reconnect(player_id, connection, now);
                self.respond(reply, result, "reconnect");
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.leave(player_id, now);
                self.respond(reply, result, "leave");
            }
            RoomCommand::Disconnect {
                player_id,
                connection,
            } => self.disconnect(player_id, connection, now),
            RoomCommand::SubmitAnswer {
                player_id,
                submission,
                reply,
            } => {
                let result = self.submit_answer(player_id, submission, now);
                self.respond(reply, result, "submit_answer");
            }
            RoomCommand::UsePowerUp {
                player_id,
                kind,
                target,
                reply,
            } => {
                let result = self.use_power_up(player_id, kind, target, now);
                self.respond(reply, result, "use_power_up");
            }
            RoomCommand::Host { command, reply } => {
                let result = self.host(command, now);
                self.respond(reply, result, "host");
            }
            RoomCommand::Summary { reply } => {
                let _ = reply.send(Ok(self.summary(now)));
            }
            RoomCommand::Leaderboard { reply } => {
                let _ = reply.send(Ok(self.leaderboard.snapshot(self.presence.players())));
            }
        }
    }

    fn respond<T>(&self, reply: Reply<T>, result: Result<T, RoomError>, operation: &'static str) {
        if let Err(err) = &result {
            debug!(code = %self.code, operation, error = %err, "request rejected");
        }
        let _ = reply.send(result);
    }

    fn join_rules(&self) -> JoinRules {
        let phase = self.machine.phase();
        JoinRules {
            accepting_new: phase == RoomPhase::Waiting
                || (self.config.allow_late_join && !self.machine.is_finished()),
            allow_reconnect: self.config.allow_reconnect,
            max_players: self.config.max_players,
            initial_power_ups: self.settings.initial_ledger(),
            lives: self.config.lives,
            teams: self.config.teams,
        }
    }

    fn join(&mut self, request: JoinRequest, now: Instant) -> Result<JoinAccepted, RoomError> {
        let rules = self.join_rules();
        let outcome = self.presence.join(request, &rules)?;
        if outcome.rejoined {
            info!(code = %self.code, player_id = %outcome.player.id, "player rejoined");
            room_events::broadcast_player_reconnected(&self.hub, &outcome.player);
        } else {
            info!(
                code = %self.code,
                player_id = %outcome.player.id,
                name = %outcome.player.display_name,
                "player joined"
            );
            room_events::broadcast_player_joined(&self.hub, &outcome.player, self.presence.len());
            self.publish_leaderboard();
        }
        self.track_presence(now);

        Ok(JoinAccepted {
            room: self.summary(now),
            player: outcome.player,
            rejoined: outcome.rejoined,
        })
    }

    fn reconnect(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionId,
        now: Instant,
    ) -> Result<JoinAccepted, RoomError> {
        let rules = self.join_rules();
        let player = self
            .presence
            .reconnect(player_id, connection, &rules)?
            .clone();
        info!(code = %self.code, player_id = %player_id, "player reconnected");
        room_events::broadcast_player_reconnected(&self.hub, &player);
        self.track_presence(now);

        Ok(JoinAccepted {
            room: self.summary(now),
            player,
            rejoined: true,
        })
    }

    fn leave(&mut self, player_id: PlayerId, now: Instant) -> Result<(), RoomError> {
        let player = self
            .presence
            .remove(player_id)
            .ok_or(RoomError::PlayerNotFound(player_id))?;
        info!(code = %self.code, player_id = %player_id, "player left");
        room_events::broadcast_player_left(&self.hub, &player);
        self.after_departure(now);
        Ok(())
    }

    fn disconnect(&mut self, player_id: PlayerId, connection: ConnectionId, now: Instant) {
        if !self.presence.mark_disconnected(player_id, Some(connection)) {
            return;
        }
        info!(code = %self.code, player_id = %player_id, "player disconnected");
        room_events::broadcast_player_disconnected(&self.hub, player_id);
        self.track_presence(now);
        self.close_round_when_complete(now);
    }

    fn after_departure(&mut self, now: Instant) {
        self.publish_leaderboard();
        self.track_presence(now);
        self.close_round_when_complete(now);
    }

    fn submit_answer(
        &mut self,
        player_id: PlayerId,
        submission: Submission,
        now: Instant,
    ) -> Result<AnswerReceipt, RoomError> {
        match self.machine.phase() {
            RoomPhase::RoundActive => {}
            RoomPhase::Paused(PausedFrom::RoundActive) => return Err(RoomError::RoundPaused),
            RoomPhase::Waiting | RoomPhase::Countdown => return Err(RoomError::NotInRound),
            RoomPhase::RoundResults | RoomPhase::Paused(_) | RoomPhase::Finished(_) => {
                return Err(RoomError::RoundClosed);
            }
        }

        let round = self.round.as_mut().ok_or(RoomError::NotInRound)?;
        let player = self
            .presence
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotFound(player_id))?;
        if player.is_eliminated() {
            return Err(RoomError::Eliminated);
        }
        if player.is_frozen(now) {
            return Err(RoomError::Frozen);
        }

        let latency =
            round.check_submission(player_id, submission.question_id, submission.answer, now)?;
        let correct = round.is_correct(submission.answer);
        let question = round.question();
        let modifiers = Modifiers {
            double_points: player.power_ups.double_points_armed(),
        };
        let points = if correct {
            score(
                self.config.base_points_for(question),
                latency,
                round.time_limit(),
                player.streak,
                question.difficulty,
                modifiers,
            )
        } else {
            0
        };

        round.accept(AcceptedAnswer {
            player_id,
            answer: submission.answer,
            latency,
            client_latency_ms: submission.client_latency_ms,
            correct,
            points,
        })?;

        player.power_ups.take_double_points();
        let (index, question_id) = (round.index(), round.question_id());
        if correct {
            player.record_correct(index, question_id, points, self.seq);
        } else {
            player.record_incorrect(index, question_id);
        }

        let receipt = AnswerReceipt {
            correct,
            points_earned: points,
            score: player.score,
            streak: player.streak,
            lives: player.lives,
        };
        debug!(
            code = %self.code,
            player_id = %player_id,
            round = index,
            correct,
            points,
            latency_ms = latency.as_millis() as u64,
            "answer accepted"
        );

        room_events::send_score_update(&self.hub, player, points, correct);
        let expected = self.presence.active_ids();
        let answered = expected
            .iter()
            .filter(|id| round.has_answered(id))
            .count();
        room_events::broadcast_round_progress(&self.hub, index, answered, expected.len());
        self.publish_leaderboard();
        self.close_round_when_complete(now);

        Ok(receipt)
    }

    fn use_power_up(
        &mut self,
        player_id: PlayerId,
        kind: PowerUpKind,
        target: Option<PlayerId>,
        now: Instant,
    ) -> Result<PowerUpReceipt, RoomError> {
        let player = self
            .presence
            .get(&player_id)
            .ok_or(RoomError::PlayerNotFound(player_id))?;
        player.power_ups.ensure_available(kind)?;
        if player.is_eliminated() {
            return Err(RoomError::Eliminated);
        }
        if self.machine.phase() != RoomPhase::RoundActive {
            return Err(RoomError::NotUsableNow("no round is open"));
        }
        let round = self
            .round
            .as_mut()
            .filter(|round| !round.is_closed())
            .ok_or(RoomError::NotUsableNow("no round is open"))?;
        if round.has_answered(&player_id) {
            return Err(RoomError::NotUsableNow("answer already submitted"));
        }

        let effect = match kind {
            PowerUpKind::ExtraTime => {
                round.extend(self.settings.extra_time);
                PowerUpEffect::TimeExtended {
                    remaining: round.remaining(now),
                }
            }
            PowerUpKind::DoublePoints => {
                if player.power_ups.double_points_armed() {
                    return Err(RoomError::NotUsableNow("double points already armed"));
                }
                PowerUpEffect::DoublePointsArmed
            }
            PowerUpKind::FiftyFifty => round
                .eliminate_options(player_id, &mut rand::rng())
                .map(PowerUpEffect::OptionsEliminated)
                .ok_or(RoomError::NotUsableNow("no option left to eliminate"))?,
            PowerUpKind::AnswerShield => {
                if player.power_ups.shield_armed() {
                    return Err(RoomError::NotUsableNow("shield already armed"));
                }
                PowerUpEffect::ShieldArmed
            }
            PowerUpKind::Freeze => {
                let target = target.ok_or(RoomError::NotUsableNow("freeze needs a target"))?;
                if target == player_id {
                    return Err(RoomError::NotUsableNow("cannot freeze yourself"));
                }
                let opponent = self
                    .presence
                    .get(&target)
                    .ok_or(RoomError::PlayerNotFound(target))?;
                if opponent.is_eliminated() || round.has_answered(&target) {
                    return Err(RoomError::NotUsableNow("target already out of this round"));
                }
                PowerUpEffect::Froze {
                    target,
                    duration: self.settings.freeze_duration,
                }
            }
        };

        let round_index = round.index();
        let remaining = self
            .presence
            .get_mut(&player_id)
            .ok_or(RoomError::PlayerNotFound(player_id))?
            .power_ups
            .consume(kind)?;

        info!(code = %self.code, player_id = %player_id, kind = %kind, remaining, "power-up used");
        room_events::broadcast_power_up_used(&self.hub, player_id, kind, target);
        match &effect {
            PowerUpEffect::TimeExtended { remaining } => {
                room_events::broadcast_round_extended(
                    &self.hub,
                    round_index,
                    *remaining,
                    player_id,
                );
            }
            PowerUpEffect::Froze { target, duration } => {
                if let Some(opponent) = self.presence.get_mut(target) {
                    opponent.frozen_until = Some(now + *duration);
                }
                room_events::send_player_frozen(&self.hub, *target, player_id, *duration);
            }
            _ => {}
        }

        Ok(PowerUpReceipt {
            kind,
            remaining,
            effect,
        })
    }

    fn host(&mut self, command: HostCommand, now: Instant) -> Result<RoomPhase, RoomError> {
        match command {
            HostCommand::Start => {
                self.machine.check(SessionEvent::Start)?;
                let required = self.config.min_players.max(1);
                let present = self.presence.connected_count();
                if present < required {
                    return Err(RoomError::NotEnoughPlayers { required, present });
                }
                self.transition(SessionEvent::Start)?;
                self.phase_deadline = Some(now + self.settings.countdown);
                self.announce_phase(now);
            }
            HostCommand::Pause => {
                let next = self.transition(SessionEvent::Pause)?;
                match next {
                    RoomPhase::Paused(PausedFrom::RoundActive) => {
                        if let Some(round) = self.round.as_mut() {
                            round.pause(now);
                        }
                    }
                    RoomPhase::Paused(PausedFrom::RoundResults) => {
                        self.suspended_remaining = self
                            .phase_deadline
                            .take()
                            .map(|deadline| deadline.saturating_duration_since(now));
                    }
                    _ => {}
                }
                self.announce_phase(now);
            }
            HostCommand::Resume => {
                let next = self.transition(SessionEvent::Resume)?;
                match next {
                    RoomPhase::RoundActive => {
                        if let Some(round) = self.round.as_mut() {
                            round.resume(now);
                        }
                    }
                    RoomPhase::RoundResults => {
                        let remaining = self.suspended_remaining.take().unwrap_or_default();
                        self.phase_deadline = Some(now + remaining);
                    }
                    _ => {}
                }
                self.announce_phase(now);
                // Departures during the pause may have left nobody to wait for.
                self.close_round_when_complete(now);
            }
            HostCommand::ForceEnd => {
                self.machine
                    .check(SessionEvent::Finish(FinishReason::HostEnded))?;
                info!(code = %self.code, "host ended the room");
                self.finish(FinishReason::HostEnded, now);
            }
            HostCommand::RemovePlayer(player_id) => {
                let player = self
                    .presence
                    .remove(player_id)
                    .ok_or(RoomError::PlayerNotFound(player_id))?;
                info!(code = %self.code, player_id = %player_id, "player removed by host");
                room_events::broadcast_player_removed(&self.hub, &player);
                self.after_departure(now);
            }
        }

        Ok(self.machine.phase())
    }

    fn transition(&mut self, event: SessionEvent) -> Result<RoomPhase, RoomError> {
        let from = self.machine.phase();
        let next = self.machine.apply(event)?;
        let version = self.machine.snapshot().version;
        info!(code = %self.code, ?from, to = ?next, version, "room phase changed");
        Ok(next)
    }

    /// Apply an engine-driven event; a rejection here means the room state is corrupt.
    fn advance_to(&mut self, event: SessionEvent, now: Instant) -> bool {
        match self.transition(event) {
            Ok(_) => true,
            Err(err) => {
                self.halt(now, &err.to_string());
                false
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match self.machine.phase() {
            RoomPhase::Countdown | RoomPhase::RoundResults => self.phase_deadline,
            RoomPhase::RoundActive => self.round.as_ref().and_then(Round::deadline),
            _ => None,
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        self.seq += 1;
        match self.machine.phase() {
            RoomPhase::Countdown => {
                self.phase_deadline = None;
                if self.advance_to(SessionEvent::CountdownElapsed, now) {
                    self.open_round(0, now);
                }
            }
            RoomPhase::RoundActive => {
                let expired = self
                    .round
                    .as_ref()
                    .and_then(Round::deadline)
                    .is_some_and(|deadline| deadline <= now);
                if expired {
                    self.close_round(CloseReason::TimerExpired, now);
                }
            }
            RoomPhase::RoundResults => {
                self.phase_deadline = None;
                self.next_round_or_finish(now);
            }
            _ => {}
        }
    }

    fn on_tick(&mut self, now: Instant) {
        if self.machine.phase() == RoomPhase::RoundActive
            && let Some(round) = self.round.as_ref().filter(|round| !round.is_closed())
        {
            room_events::broadcast_time_remaining(&self.hub, round.index(), round.remaining(now));
        }

        if let Some(since) = self.empty_since
            && now.saturating_duration_since(since) >= self.settings.abandon_grace
        {
            info!(code = %self.code, "no player connected for too long; abandoning room");
            self.finish(FinishReason::Abandoned, now);
        }
    }

    fn open_round(&mut self, index: usize, now: Instant) {
        let expected = self.round_index.map_or(0, |current| current + 1);
        if index != expected {
            self.halt(now, "round index out of sequence");
            return;
        }
        if self.round.as_ref().is_some_and(|round| !round.is_closed()) {
            self.halt(now, "previous round still open");
            return;
        }
        let Some(question) = self.questions.get(index).cloned() else {
            self.halt(now, "round index past the question list");
            return;
        };

        let time_limit = self.config.time_limit_for(&question);
        let round = Round::open(index, question, time_limit, now);
        self.round_index = Some(index);
        self.announce_phase(now);
        room_events::broadcast_round_opened(&self.hub, &round, self.questions.len());
        self.round = Some(round);
    }

    fn close_round(&mut self, reason: CloseReason, now: Instant) {
        if !self.advance_to(SessionEvent::CloseRound(reason), now) {
            return;
        }
        let Some(round) = self.round.as_mut() else {
            self.halt(now, "closing a round that was never opened");
            return;
        };
        round.close();

        let (index, question_id) = (round.index(), round.question_id());
        for player_id in self.presence.active_ids() {
            if round.has_answered(&player_id) {
                continue;
            }
            if let Some(player) = self.presence.get_mut(&player_id) {
                player.record_miss(index, question_id);
            }
        }

        let stats = round.stats();
        info!(
            code = %self.code,
            round = index,
            ?reason,
            answered = stats.answered,
            "round closed"
        );
        self.phase_deadline = Some(now + self.settings.reveal);
        self.announce_phase(now);
        if let Some(round) = self.round.as_ref() {
            room_events::broadcast_round_closed(&self.hub, round, &stats, reason);
        }
        self.publish_leaderboard();
    }

    fn close_round_when_complete(&mut self, now: Instant) {
        if self.machine.phase() != RoomPhase::RoundActive {
            return;
        }
        let complete = self.round.as_ref().is_some_and(|round| {
            !round.is_closed() && round.all_answered(&self.presence.active_ids())
        });
        if complete {
            self.close_round(CloseReason::AllAnswered, now);
        }
    }

    fn next_round_or_finish(&mut self, now: Instant) {
        let next = self.round_index.map_or(0, |current| current + 1);
        let everyone_out = self.config.lives.is_some()
            && !self.presence.is_empty()
            && self.presence.players().all(Player::is_eliminated);

        if next < self.questions.len() && !everyone_out {
            if self.advance_to(SessionEvent::NextRound, now) {
                self.open_round(next, now);
            }
        } else if self.advance_to(SessionEvent::QuestionsExhausted, now) {
            self.wrap_up(FinishReason::Completed, now);
        }
    }

    fn finish(&mut self, reason: FinishReason, now: Instant) {
        match self.transition(SessionEvent::Finish(reason)) {
            Ok(_) => self.wrap_up(reason, now),
            Err(err) => debug!(code = %self.code, error = %err, "room already finished"),
        }
    }

    /// Stop the room after an internal invariant broke.
    fn halt(&mut self, now: Instant, detail: &str) {
        error!(code = %self.code, detail, "room invariant violated; halting room");
        self.finish(FinishReason::Fatal, now);
    }

    fn wrap_up(&mut self, reason: FinishReason, now: Instant) {
        if let Some(round) = self.round.as_mut() {
            round.close();
        }
        self.phase_deadline = None;
        self.suspended_remaining = None;
        self.announce_phase(now);

        let (snapshot, _) = self.leaderboard.refresh(self.presence.players());
        let teams = team_standings(self.presence.players());
        let rounds_played = self.round_index.map_or(0, |index| index + 1);
        room_events::broadcast_game_finished(
            &self.hub,
            reason,
            &snapshot,
            &teams,
            rounds_played,
            self.questions.len(),
        );
        info!(
            code = %self.code,
            reason = reason.as_str(),
            rounds_played,
            players = snapshot.entries.len(),
            "room finished"
        );

        let total_players = snapshot.entries.len();
        let players = snapshot
            .entries
            .iter()
            .filter_map(|entry| {
                let player = self.presence.get(&entry.player_id)?;
                Some(PlayerResult {
                    player_id: player.id,
                    display_name: player.display_name.clone(),
                    score: player.score,
                    rank: entry.rank,
                    total_players,
                    correct: player.correct_count(),
                    incorrect: player.incorrect_count(),
                    max_streak: player.max_streak,
                    team: player.team,
                })
            })
            .collect();
        let results = GameResults {
            room_code: self.code.to_string(),
            host_id: self.host_id.clone(),
            reason: reason.as_str().to_string(),
            rounds_played,
            players,
        };

        let code = self.code.clone();
        let pending = self.sink.record(results);
        tokio::spawn(async move {
            if let Err(err) = pending.await {
                warn!(code = %code, error = %err, "failed to hand over room results");
            }
        });
    }

    fn publish_leaderboard(&mut self) {
        let (_, delta) = self.leaderboard.refresh(self.presence.players());
        if !delta.is_empty() {
            room_events::broadcast_leaderboard_delta(&self.hub, &delta);
        }
    }

    fn announce_phase(&self, now: Instant) {
        room_events::broadcast_phase_changed(
            &self.hub,
            self.machine.phase(),
            self.round_index,
            self.questions.len(),
            self.remaining(now),
        );
    }

    fn track_presence(&mut self, now: Instant) {
        if self.presence.connected_count() == 0 {
            self.empty_since.get_or_insert(now);
        } else {
            self.empty_since = None;
        }
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.machine.phase() {
            RoomPhase::RoundActive | RoomPhase::Paused(PausedFrom::RoundActive) => {
                self.round.as_ref().map(|round| round.remaining(now))
            }
            RoomPhase::Countdown | RoomPhase::RoundResults => self
                .phase_deadline
                .map(|deadline| deadline.saturating_duration_since(now)),
            RoomPhase::Paused(PausedFrom::RoundResults) => self.suspended_remaining,
            RoomPhase::Waiting | RoomPhase::Finished(_) => None,
        }
    }

    fn summary(&self, now: Instant) -> RoomSummary {
        RoomSummary {
            code: self.code.to_string(),
            host_id: self.host_id.clone(),
            phase: self.machine.phase(),
            round_index: self.round_index,
            total_rounds: self.questions.len(),
            remaining: self.remaining(now),
            config: self.config.clone(),
            players: self.presence.players().cloned().collect(),
            created_at: self.created_at,
        }
    }
}

use std::{sync::Arc, time::Duration};

use live_quiz_back::{
    config::EngineSettings,
    dao::results::MemoryResultSink,
    state::{
        RoomError, RoomHandle, RoomRegistry,
        game::{Difficulty, PlayerId, Question, RoomConfig},
        power_ups::PowerUpKind,
        session::{HostCommand, PowerUpEffect, Submission},
        state_machine::{FinishReason, PausedFrom, RoomPhase},
    },
};
use tokio::time::sleep;
use uuid::Uuid;

const COUNTDOWN: Duration = Duration::from_secs(3);

fn question(id: u32) -> Question {
    Question {
        id,
        prompt: format!("Question {id}?"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct: 2,
        time_limit: Duration::from_secs(30),
        points: 1000,
        difficulty: Difficulty::Easy,
        explanation: None,
    }
}

fn registry_with(settings: EngineSettings) -> (Arc<RoomRegistry>, MemoryResultSink) {
    let sink = MemoryResultSink::new();
    let registry = RoomRegistry::new(settings, Arc::new(sink.clone()));
    (registry, sink)
}

fn open_room(registry: &Arc<RoomRegistry>, questions: u32, config: RoomConfig) -> RoomHandle {
    registry
        .create_room(
            "host-1".into(),
            (1..=questions).map(question).collect(),
            config,
        )
        .unwrap()
}

async fn join(handle: &RoomHandle, name: &str) -> PlayerId {
    handle
        .join(name.into(), None, None, Uuid::new_v4())
        .await
        .unwrap()
        .player
        .id
}

async fn start(handle: &RoomHandle) {
    handle
        .host(handle.host_token(), HostCommand::Start)
        .await
        .unwrap();
}

fn answer(question_id: u32, answer: usize) -> Submission {
    Submission {
        question_id,
        answer,
        client_latency_ms: None,
    }
}

#[tokio::test(start_paused = true)]
async fn earlier_correct_answer_scores_higher_and_ranks_first() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        3,
        RoomConfig {
            time_limit: Some(Duration::from_secs(30)),
            ..RoomConfig::default()
        },
    );
    let fast = join(&handle, "fast").await;
    let slow = join(&handle, "slow").await;
    start(&handle).await;

    sleep(COUNTDOWN + Duration::from_secs(5)).await;
    let first = handle.submit_answer(fast, answer(1, 2)).await.unwrap();
    sleep(Duration::from_secs(20)).await;
    let second = handle.submit_answer(slow, answer(1, 2)).await.unwrap();

    assert!(first.correct && second.correct);
    assert!(first.points_earned > second.points_earned);

    // Both answered: the round closed early.
    let summary = handle.summary().await.unwrap();
    assert_eq!(summary.phase, RoomPhase::RoundResults);

    let leaderboard = handle.leaderboard().await.unwrap();
    assert_eq!(leaderboard.entries[0].player_id, fast);
    assert_eq!(leaderboard.entries[0].rank, 1);
    assert_eq!(leaderboard.entries[1].player_id, slow);
}

#[tokio::test(start_paused = true)]
async fn power_up_without_units_reports_insufficient_count() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 2, RoomConfig::default());
    let player = join(&handle, "solo").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;

    let receipt = handle
        .use_power_up(player, PowerUpKind::FiftyFifty, None)
        .await
        .unwrap();
    assert_eq!(receipt.remaining, 0);

    let err = handle
        .use_power_up(player, PowerUpKind::FiftyFifty, None)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::InsufficientCount(PowerUpKind::FiftyFifty));

    let summary = handle.summary().await.unwrap();
    let me = summary.players.iter().find(|p| p.id == player).unwrap();
    assert_eq!(me.power_ups.count(PowerUpKind::FiftyFifty), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_units_win_over_phase_checks() {
    let settings = EngineSettings {
        initial_power_ups: 0,
        ..EngineSettings::default()
    };
    let (registry, _) = registry_with(settings);
    let handle = open_room(&registry, 1, RoomConfig::default());
    let player = join(&handle, "solo").await;

    // Still waiting: no round is open, yet the count is reported first.
    let err = handle
        .use_power_up(player, PowerUpKind::FiftyFifty, None)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::InsufficientCount(PowerUpKind::FiftyFifty));
}

#[tokio::test(start_paused = true)]
async fn full_room_rejects_second_player_without_broadcasting_it() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        1,
        RoomConfig {
            max_players: 1,
            ..RoomConfig::default()
        },
    );
    let mut events = handle.subscribe();

    join(&handle, "first").await;
    let err = handle
        .join("second".into(), None, None, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::RoomFull);

    let summary = handle.summary().await.unwrap();
    assert_eq!(summary.players.len(), 1);
    assert_eq!(summary.players[0].display_name, "first");

    let mut joined = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.event.as_deref() == Some("player.joined") {
            joined.push(event.data);
        }
    }
    assert_eq!(joined.len(), 1);
    assert!(joined.iter().all(|data| !data.contains("second")));
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_remaining_time() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        2,
        RoomConfig {
            time_limit: Some(Duration::from_secs(30)),
            ..RoomConfig::default()
        },
    );
    let player = join(&handle, "solo").await;
    start(&handle).await;

    sleep(COUNTDOWN + Duration::from_secs(18)).await;
    let phase = handle
        .host(handle.host_token(), HostCommand::Pause)
        .await
        .unwrap();
    assert_eq!(phase, RoomPhase::Paused(PausedFrom::RoundActive));

    sleep(Duration::from_secs(60)).await;
    let paused = handle.summary().await.unwrap();
    assert_eq!(paused.remaining, Some(Duration::from_secs(12)));
    assert_eq!(
        handle.submit_answer(player, answer(1, 2)).await.unwrap_err(),
        RoomError::RoundPaused
    );

    handle
        .host(handle.host_token(), HostCommand::Resume)
        .await
        .unwrap();
    let resumed = handle.summary().await.unwrap();
    assert_eq!(resumed.phase, RoomPhase::RoundActive);
    assert_eq!(resumed.remaining, Some(Duration::from_secs(12)));

    sleep(Duration::from_secs(11)).await;
    assert_eq!(handle.summary().await.unwrap().phase, RoomPhase::RoundActive);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(
        handle.summary().await.unwrap().phase,
        RoomPhase::RoundResults
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_answer_is_rejected_and_first_one_kept() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 2, RoomConfig::default());
    let alice = join(&handle, "alice").await;
    join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(2)).await;

    let receipt = handle.submit_answer(alice, answer(1, 2)).await.unwrap();
    let err = handle.submit_answer(alice, answer(1, 0)).await.unwrap_err();
    assert_eq!(err, RoomError::AlreadyAnswered);

    let summary = handle.summary().await.unwrap();
    let me = summary.players.iter().find(|p| p.id == alice).unwrap();
    assert_eq!(me.score, receipt.score);
    assert_eq!(me.streak, 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_keeps_score_and_streak() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 3, RoomConfig::default());
    let first_connection = Uuid::new_v4();
    let alice = handle
        .join("alice".into(), None, None, first_connection)
        .await
        .unwrap()
        .player
        .id;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;
    let receipt = handle.submit_answer(alice, answer(1, 2)).await.unwrap();

    handle.disconnect(alice, first_connection);
    let summary = handle.summary().await.unwrap();
    assert!(!summary.players[0].is_connected());

    let rejoined = handle.reconnect(alice, Uuid::new_v4()).await.unwrap();
    assert!(rejoined.rejoined);
    assert_eq!(rejoined.player.id, alice);
    assert_eq!(rejoined.player.score, receipt.score);
    assert_eq!(rejoined.player.streak, 1);

    // The stale connection closing afterwards changes nothing.
    handle.disconnect(alice, first_connection);
    let summary = handle.summary().await.unwrap();
    assert!(summary.players[0].is_connected());
}

#[tokio::test(start_paused = true)]
async fn host_end_finishes_room_and_hands_over_results() {
    let (registry, sink) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 2, RoomConfig::default());
    join(&handle, "alice").await;
    start(&handle).await;

    let phase = handle
        .host(handle.host_token(), HostCommand::ForceEnd)
        .await
        .unwrap();
    assert_eq!(phase, RoomPhase::Finished(FinishReason::HostEnded));

    sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.summary().await.unwrap_err(), RoomError::RoomClosed);
    assert!(registry.resolve(handle.code().as_str()).is_err());

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, "host_ended");
    assert_eq!(records[0].players.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn game_completes_after_the_last_question() {
    let (registry, sink) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        2,
        RoomConfig {
            time_limit: Some(Duration::from_secs(10)),
            ..RoomConfig::default()
        },
    );
    let alice = join(&handle, "alice").await;
    let mut events = handle.subscribe();
    start(&handle).await;

    sleep(COUNTDOWN + Duration::from_secs(1)).await;
    handle.submit_answer(alice, answer(1, 2)).await.unwrap();
    // Reveal (5s) then the second round opens.
    sleep(Duration::from_secs(6)).await;
    handle.submit_answer(alice, answer(2, 0)).await.unwrap();
    sleep(Duration::from_secs(6)).await;

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, "completed");
    assert_eq!(records[0].rounds_played, 2);
    assert_eq!(records[0].players[0].correct, 1);
    assert_eq!(records[0].players[0].incorrect, 1);

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.extend(event.event);
    }
    let opened = names.iter().filter(|name| *name == "round.opened").count();
    assert_eq!(opened, 2);
    assert_eq!(names.last().map(String::as_str), Some("game.finished"));
}

#[tokio::test(start_paused = true)]
async fn lives_variant_eliminates_after_last_life() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        3,
        RoomConfig {
            lives: Some(1),
            time_limit: Some(Duration::from_secs(10)),
            ..RoomConfig::default()
        },
    );
    let alice = join(&handle, "alice").await;
    let bob = join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;

    let wrong = handle.submit_answer(alice, answer(1, 0)).await.unwrap();
    assert_eq!(wrong.lives, Some(0));
    handle.submit_answer(bob, answer(1, 2)).await.unwrap();

    sleep(Duration::from_secs(6)).await;
    assert_eq!(
        handle.submit_answer(alice, answer(2, 2)).await.unwrap_err(),
        RoomError::Eliminated
    );
    // Only bob is expected now: his answer closes the round.
    handle.submit_answer(bob, answer(2, 2)).await.unwrap();
    assert_eq!(
        handle.summary().await.unwrap().phase,
        RoomPhase::RoundResults
    );
}

#[tokio::test(start_paused = true)]
async fn last_players_knocked_out_close_the_round() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        3,
        RoomConfig {
            lives: Some(1),
            ..RoomConfig::default()
        },
    );
    let alice = join(&handle, "alice").await;
    let bob = join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;

    handle.submit_answer(alice, answer(1, 0)).await.unwrap();
    let last = handle.submit_answer(bob, answer(1, 1)).await.unwrap();
    assert_eq!(last.lives, Some(0));

    // Nobody is left active, yet everyone connected has answered.
    assert_eq!(
        handle.summary().await.unwrap().phase,
        RoomPhase::RoundResults
    );
}

#[tokio::test(start_paused = true)]
async fn resume_closes_round_when_departures_left_nobody_to_wait_for() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 2, RoomConfig::default());
    let alice = join(&handle, "alice").await;
    let bob = join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;

    handle.submit_answer(alice, answer(1, 2)).await.unwrap();
    handle
        .host(handle.host_token(), HostCommand::Pause)
        .await
        .unwrap();
    handle.leave(bob).await.unwrap();
    assert_eq!(
        handle.summary().await.unwrap().phase,
        RoomPhase::Paused(PausedFrom::RoundActive)
    );

    let phase = handle
        .host(handle.host_token(), HostCommand::Resume)
        .await
        .unwrap();
    assert_eq!(phase, RoomPhase::RoundResults);
}

#[tokio::test(start_paused = true)]
async fn room_without_players_is_abandoned_after_grace() {
    let settings = EngineSettings {
        abandon_grace: Duration::from_secs(5),
        ..EngineSettings::default()
    };
    let (registry, sink) = registry_with(settings);
    let handle = open_room(&registry, 1, RoomConfig::default());
    let code = handle.code().as_str().to_string();

    sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.summary().await.unwrap().phase, RoomPhase::Waiting);

    sleep(Duration::from_secs(4)).await;
    assert_eq!(handle.summary().await.unwrap_err(), RoomError::RoomClosed);
    assert!(registry.resolve(&code).is_err());

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, FinishReason::Abandoned.as_str());
    assert!(records[0].players.is_empty());
}

#[tokio::test(start_paused = true)]
async fn extra_time_pushes_the_close_deadline() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        2,
        RoomConfig {
            time_limit: Some(Duration::from_secs(10)),
            ..RoomConfig::default()
        },
    );
    let alice = join(&handle, "alice").await;
    join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;

    let receipt = handle
        .use_power_up(alice, PowerUpKind::ExtraTime, None)
        .await
        .unwrap();
    assert_eq!(
        receipt.effect,
        PowerUpEffect::TimeExtended {
            remaining: Duration::from_secs(19)
        }
    );

    // Past the original 10s limit the round is still open.
    sleep(Duration::from_secs(10)).await;
    let summary = handle.summary().await.unwrap();
    assert_eq!(summary.phase, RoomPhase::RoundActive);
    assert_eq!(summary.remaining, Some(Duration::from_secs(9)));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(
        handle.summary().await.unwrap().phase,
        RoomPhase::RoundResults
    );
}

#[tokio::test(start_paused = true)]
async fn frozen_player_cannot_answer_until_it_wears_off() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 2, RoomConfig::default());
    let alice = join(&handle, "alice").await;
    let bob = join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(1)).await;

    let receipt = handle
        .use_power_up(alice, PowerUpKind::Freeze, Some(bob))
        .await
        .unwrap();
    assert_eq!(
        receipt.effect,
        PowerUpEffect::Froze {
            target: bob,
            duration: Duration::from_secs(5)
        }
    );
    assert_eq!(
        handle.submit_answer(bob, answer(1, 2)).await.unwrap_err(),
        RoomError::Frozen
    );

    sleep(Duration::from_secs(6)).await;
    let late = handle.submit_answer(bob, answer(1, 2)).await.unwrap();
    assert!(late.correct);
}

#[tokio::test(start_paused = true)]
async fn armed_double_points_doubles_the_next_correct_answer() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(&registry, 2, RoomConfig::default());
    let alice = join(&handle, "alice").await;
    let bob = join(&handle, "bob").await;
    start(&handle).await;
    sleep(COUNTDOWN + Duration::from_secs(4)).await;

    handle
        .use_power_up(alice, PowerUpKind::DoublePoints, None)
        .await
        .unwrap();
    // Same instant, same streak: only the modifier differs.
    let doubled = handle.submit_answer(alice, answer(1, 2)).await.unwrap();
    let plain = handle.submit_answer(bob, answer(1, 2)).await.unwrap();
    assert!(plain.points_earned > 0);
    assert_eq!(doubled.points_earned, plain.points_earned * 2);
}

#[tokio::test(start_paused = true)]
async fn timer_expiry_resets_streak_of_connected_non_answerer() {
    let (registry, _) = registry_with(EngineSettings::default());
    let handle = open_room(
        &registry,
        3,
        RoomConfig {
            time_limit: Some(Duration::from_secs(10)),
            ..RoomConfig::default()
        },
    );
    let alice = join(&handle, "alice").await;
    let bob = join(&handle, "bob").await;
    start(&handle).await;

    sleep(COUNTDOWN + Duration::from_secs(1)).await;
    handle.submit_answer(alice, answer(1, 2)).await.unwrap();
    handle.submit_answer(bob, answer(1, 2)).await.unwrap();

    // Reveal, then round two where only alice answers.
    sleep(Duration::from_secs(6)).await;
    let kept = handle.submit_answer(alice, answer(2, 2)).await.unwrap();
    assert_eq!(kept.streak, 2);
    sleep(Duration::from_secs(10)).await;

    let summary = handle.summary().await.unwrap();
    assert_eq!(summary.phase, RoomPhase::RoundResults);
    let streak_of = |id| summary.players.iter().find(|p| p.id == id).unwrap().streak;
    assert_eq!(streak_of(alice), 2);
    assert_eq!(streak_of(bob), 0);
}

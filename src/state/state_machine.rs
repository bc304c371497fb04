use thiserror::Error;

/// High-level phases a room session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Room is open and accepting joins; no round has been played yet.
    Waiting,
    /// Host started the game; the short pre-game delay is running.
    Countdown,
    /// One round is open for submissions.
    RoundActive,
    /// The round is closed and its answer and statistics are revealed.
    RoundResults,
    /// Host paused the game from one of the gameplay phases.
    Paused(PausedFrom),
    /// Terminal phase; no further mutation happens once reached.
    Finished(FinishReason),
}

/// Phase a paused room resumes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausedFrom {
    /// Paused while a round was open.
    RoundActive,
    /// Paused during the reveal window.
    RoundResults,
}

impl From<PausedFrom> for RoomPhase {
    fn from(value: PausedFrom) -> Self {
        match value {
            PausedFrom::RoundActive => RoomPhase::RoundActive,
            PausedFrom::RoundResults => RoomPhase::RoundResults,
        }
    }
}

/// Indicates why a room reached the terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every question was played.
    Completed,
    /// The host ended the game early.
    HostEnded,
    /// Nobody stayed connected for longer than the grace period.
    Abandoned,
    /// An internal invariant was violated and the room was halted.
    Fatal,
}

impl FinishReason {
    /// Stable wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Completed => "completed",
            FinishReason::HostEnded => "host_ended",
            FinishReason::Abandoned => "abandoned",
            FinishReason::Fatal => "fatal",
        }
    }
}

/// Why an open round was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The round timer ran out.
    TimerExpired,
    /// Every connected, still-playing player submitted an answer.
    AllAnswered,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the game from the waiting room.
    Start,
    /// The pre-game countdown elapsed; round 0 opens.
    CountdownElapsed,
    /// Close the current round.
    CloseRound(CloseReason),
    /// Reveal window elapsed and another question remains.
    NextRound,
    /// Reveal window elapsed and the question list is exhausted.
    QuestionsExhausted,
    /// Host pauses gameplay.
    Pause,
    /// Host resumes gameplay.
    Resume,
    /// Terminate the room.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: RoomPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
}

/// Explicit transition table driving one room session.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Waiting,
            version: 0,
        }
    }
}

impl RoomStateMachine {
    /// Create a new state machine initialised in the waiting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Whether the terminal phase has been reached.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, RoomPhase::Finished(_))
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Apply an event, moving to the next phase when the table allows it.
    ///
    /// Rejected events leave the machine untouched.
    pub fn apply(&mut self, event: SessionEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Phase an event would lead to, without applying it.
    pub fn check(&self, event: SessionEvent) -> Result<RoomPhase, InvalidTransition> {
        self.compute_transition(event)
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Waiting, SessionEvent::Start) => RoomPhase::Countdown,
            (RoomPhase::Countdown, SessionEvent::CountdownElapsed) => RoomPhase::RoundActive,
            (RoomPhase::RoundActive, SessionEvent::CloseRound(_)) => RoomPhase::RoundResults,
            (RoomPhase::RoundResults, SessionEvent::NextRound) => RoomPhase::RoundActive,
            (RoomPhase::RoundResults, SessionEvent::QuestionsExhausted) => {
                RoomPhase::Finished(FinishReason::Completed)
            }
            (RoomPhase::RoundActive, SessionEvent::Pause) => {
                RoomPhase::Paused(PausedFrom::RoundActive)
            }
            (RoomPhase::RoundResults, SessionEvent::Pause) => {
                RoomPhase::Paused(PausedFrom::RoundResults)
            }
            (RoomPhase::Paused(from), SessionEvent::Resume) => from.into(),
            (RoomPhase::Finished(_), SessionEvent::Finish(_)) => {
                return Err(InvalidTransition {
                    from: self.phase,
                    event,
                });
            }
            (_, SessionEvent::Finish(reason)) => RoomPhase::Finished(reason),
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: SessionEvent) -> RoomPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = RoomStateMachine::new();
        assert_eq!(sm.phase(), RoomPhase::Waiting);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = RoomStateMachine::new();

        assert_eq!(apply(&mut sm, SessionEvent::Start), RoomPhase::Countdown);
        assert_eq!(
            apply(&mut sm, SessionEvent::CountdownElapsed),
            RoomPhase::RoundActive
        );
        assert_eq!(
            apply(
                &mut sm,
                SessionEvent::CloseRound(CloseReason::AllAnswered)
            ),
            RoomPhase::RoundResults
        );
        assert_eq!(apply(&mut sm, SessionEvent::NextRound), RoomPhase::RoundActive);
        assert_eq!(
            apply(
                &mut sm,
                SessionEvent::CloseRound(CloseReason::TimerExpired)
            ),
            RoomPhase::RoundResults
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::QuestionsExhausted),
            RoomPhase::Finished(FinishReason::Completed)
        );
        assert_eq!(sm.snapshot().version, 6);
    }

    #[test]
    fn pause_returns_to_the_phase_it_paused_from() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::CountdownElapsed);

        assert_eq!(
            apply(&mut sm, SessionEvent::Pause),
            RoomPhase::Paused(PausedFrom::RoundActive)
        );
        assert_eq!(apply(&mut sm, SessionEvent::Resume), RoomPhase::RoundActive);

        apply(&mut sm, SessionEvent::CloseRound(CloseReason::TimerExpired));
        assert_eq!(
            apply(&mut sm, SessionEvent::Pause),
            RoomPhase::Paused(PausedFrom::RoundResults)
        );
        assert_eq!(apply(&mut sm, SessionEvent::Resume), RoomPhase::RoundResults);
    }

    #[test]
    fn paused_room_cannot_close_rounds() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::CountdownElapsed);
        apply(&mut sm, SessionEvent::Pause);

        let err = sm
            .apply(SessionEvent::CloseRound(CloseReason::TimerExpired))
            .unwrap_err();
        assert_eq!(err.from, RoomPhase::Paused(PausedFrom::RoundActive));
    }

    #[test]
    fn waiting_and_countdown_cannot_pause() {
        let mut sm = RoomStateMachine::new();
        assert!(sm.apply(SessionEvent::Pause).is_err());
        apply(&mut sm, SessionEvent::Start);
        assert!(sm.apply(SessionEvent::Pause).is_err());
    }

    #[test]
    fn finish_is_reachable_from_everywhere_and_irreversible() {
        for setup in [
            vec![],
            vec![SessionEvent::Start],
            vec![SessionEvent::Start, SessionEvent::CountdownElapsed],
            vec![
                SessionEvent::Start,
                SessionEvent::CountdownElapsed,
                SessionEvent::Pause,
            ],
        ] {
            let mut sm = RoomStateMachine::new();
            for event in setup {
                apply(&mut sm, event);
            }
            assert_eq!(
                apply(&mut sm, SessionEvent::Finish(FinishReason::HostEnded)),
                RoomPhase::Finished(FinishReason::HostEnded)
            );
            assert!(sm.is_finished());
            assert!(sm.apply(SessionEvent::Finish(FinishReason::Fatal)).is_err());
            assert!(sm.apply(SessionEvent::Resume).is_err());
            assert!(sm.apply(SessionEvent::Start).is_err());
        }
    }

    #[test]
    fn invalid_transition_returns_error_and_keeps_version() {
        let mut sm = RoomStateMachine::new();
        let err = sm.apply(SessionEvent::NextRound).unwrap_err();
        assert_eq!(err.from, RoomPhase::Waiting);
        assert_eq!(err.event, SessionEvent::NextRound);
        assert_eq!(sm.snapshot().version, 0);
        assert!(sm.check(SessionEvent::Resume).is_err());
    }
}

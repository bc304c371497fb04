//! Pure scoring rules for correct answers.
//!
//! Every intermediate value is an integer truncated toward zero, so a score can be
//! recomputed exactly from the recorded inputs.

use std::time::Duration;

use crate::state::game::Difficulty;

/// Points added per consecutive correct answer already on the streak.
pub const STREAK_BONUS_STEP: u64 = 100;
/// Streak length beyond which the streak bonus stops growing.
pub const STREAK_BONUS_CAP: u32 = 5;

/// Modifiers active for the player at scoring time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Double points power-up armed for this scoring event.
    pub double_points: bool,
}

/// Compute the points awarded for a correct answer.
///
/// `streak` is the number of consecutive correct answers before this one. An answer
/// at or past the time limit earns nothing; rounds reject such answers before they
/// get here.
pub fn score(
    base_points: u32,
    latency: Duration,
    time_limit: Duration,
    streak: u32,
    difficulty: Difficulty,
    modifiers: Modifiers,
) -> u32 {
    let limit_ms = time_limit.as_millis();
    let latency_ms = latency.as_millis();
    if limit_ms == 0 || latency_ms >= limit_ms {
        return 0;
    }

    let base = u128::from(base_points);
    let time_bonus = base * (limit_ms - latency_ms) / limit_ms;
    let streak_bonus = u128::from(streak.min(STREAK_BONUS_CAP)) * u128::from(STREAK_BONUS_STEP);

    let subtotal = base + time_bonus + streak_bonus;
    let mut total = subtotal * u128::from(difficulty.multiplier_percent()) / 100;
    if modifiers.double_points {
        total *= 2;
    }

    u32::try_from(total).unwrap_or(u32::MAX)
}

use std::fmt;

use thiserror::Error;

/// Consumable boosts a player can spend during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerUpKind {
    /// Extends the current round's timer for everyone.
    ExtraTime,
    /// Doubles the points of the player's next scoring event.
    DoublePoints,
    /// Eliminates half of the wrong options for the requester.
    FiftyFifty,
    /// Keeps the streak alive through the next incorrect answer.
    AnswerShield,
    /// Blocks an opponent's submissions for a short while.
    Freeze,
}

impl PowerUpKind {
    /// Every kind, in wire order.
    pub const ALL: [PowerUpKind; 5] = [
        PowerUpKind::ExtraTime,
        PowerUpKind::DoublePoints,
        PowerUpKind::FiftyFifty,
        PowerUpKind::AnswerShield,
        PowerUpKind::Freeze,
    ];

    fn slot(&self) -> usize {
        match self {
            PowerUpKind::ExtraTime => 0,
            PowerUpKind::DoublePoints => 1,
            PowerUpKind::FiftyFifty => 2,
            PowerUpKind::AnswerShield => 3,
            PowerUpKind::Freeze => 4,
        }
    }
}

impl fmt::Display for PowerUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PowerUpKind::ExtraTime => "extra_time",
            PowerUpKind::DoublePoints => "double_points",
            PowerUpKind::FiftyFifty => "fifty_fifty",
            PowerUpKind::AnswerShield => "answer_shield",
            PowerUpKind::Freeze => "freeze",
        };
        f.write_str(label)
    }
}

/// Returned when the player has no unit left of the requested kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no `{0}` power-up left")]
pub struct InsufficientCount(pub PowerUpKind);

/// Per-player counters plus the modifiers armed by earlier uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerUpLedger {
    counts: [u32; 5],
    double_points_armed: bool,
    shield_armed: bool,
}

impl PowerUpLedger {
    /// Build a ledger holding `initial` units of every kind.
    pub fn with_uniform(initial: u32) -> Self {
        Self {
            counts: [initial; 5],
            ..Self::default()
        }
    }

    /// Build a ledger from explicit counts.
    pub fn with_counts(counts: impl IntoIterator<Item = (PowerUpKind, u32)>) -> Self {
        let mut ledger = Self::default();
        for (kind, count) in counts {
            ledger.counts[kind.slot()] = count;
        }
        ledger
    }

    /// Units remaining for `kind`.
    pub fn count(&self, kind: PowerUpKind) -> u32 {
        self.counts[kind.slot()]
    }

    /// Remaining units of every kind.
    pub fn counts(&self) -> impl Iterator<Item = (PowerUpKind, u32)> + '_ {
        PowerUpKind::ALL.into_iter().map(|kind| (kind, self.count(kind)))
    }

    /// Check that at least one unit remains without consuming it.
    pub fn ensure_available(&self, kind: PowerUpKind) -> Result<(), InsufficientCount> {
        if self.count(kind) == 0 {
            Err(InsufficientCount(kind))
        } else {
            Ok(())
        }
    }

    /// Decrement the counter for `kind`, failing when it is already zero.
    ///
    /// Modifier kinds are armed as part of the same call.
    pub fn consume(&mut self, kind: PowerUpKind) -> Result<u32, InsufficientCount> {
        let slot = &mut self.counts[kind.slot()];
        if *slot == 0 {
            return Err(InsufficientCount(kind));
        }
        *slot -= 1;
        match kind {
            PowerUpKind::DoublePoints => self.double_points_armed = true,
            PowerUpKind::AnswerShield => self.shield_armed = true,
            _ => {}
        }
        Ok(*slot)
    }

    /// Whether a double-points modifier waits for the next scoring event.
    pub fn double_points_armed(&self) -> bool {
        self.double_points_armed
    }

    /// Whether a shield waits for the next incorrect answer.
    pub fn shield_armed(&self) -> bool {
        self.shield_armed
    }

    /// Take the double-points modifier, disarming it.
    pub fn take_double_points(&mut self) -> bool {
        std::mem::take(&mut self.double_points_armed)
    }

    /// Take the shield, disarming it.
    pub fn take_shield(&mut self) -> bool {
        std::mem::take(&mut self.shield_armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_decrements_until_empty() {
        let mut ledger = PowerUpLedger::with_uniform(2);
        assert_eq!(ledger.consume(PowerUpKind::Freeze), Ok(1));
        assert_eq!(ledger.consume(PowerUpKind::Freeze), Ok(0));
        assert_eq!(
            ledger.consume(PowerUpKind::Freeze),
            Err(InsufficientCount(PowerUpKind::Freeze))
        );
        assert_eq!(ledger.count(PowerUpKind::Freeze), 0);
        assert_eq!(ledger.count(PowerUpKind::ExtraTime), 2);
    }

    #[test]
    fn empty_counter_is_left_untouched() {
        let mut ledger = PowerUpLedger::with_counts([(PowerUpKind::FiftyFifty, 0)]);
        assert!(ledger.ensure_available(PowerUpKind::FiftyFifty).is_err());
        assert!(ledger.consume(PowerUpKind::FiftyFifty).is_err());
        assert_eq!(ledger.count(PowerUpKind::FiftyFifty), 0);
    }

    #[test]
    fn modifiers_are_armed_and_taken_once() {
        let mut ledger = PowerUpLedger::with_uniform(1);
        ledger.consume(PowerUpKind::DoublePoints).unwrap();
        ledger.consume(PowerUpKind::AnswerShield).unwrap();
        assert!(ledger.double_points_armed());
        assert!(ledger.take_double_points());
        assert!(!ledger.take_double_points());
        assert!(ledger.take_shield());
        assert!(!ledger.shield_armed());
    }
}

//! Ranked views of a room's players and the deltas broadcast between them.

use std::cmp::Reverse;

use indexmap::IndexMap;

use crate::state::{game::PlayerId, presence::Player};

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Player identity.
    pub player_id: PlayerId,
    /// Display name at snapshot time.
    pub display_name: String,
    /// Score at snapshot time.
    pub score: u32,
    /// Current streak.
    pub streak: u32,
    /// 1-based rank; unique within a snapshot.
    pub rank: usize,
    /// Positions gained since the previous snapshot (negative when dropping).
    pub rank_delta: i64,
    /// Team index in the teams variant.
    pub team: Option<u32>,
}

/// Point-in-time ranking of every player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardSnapshot {
    /// Rows ordered by rank.
    pub entries: Vec<LeaderboardEntry>,
}

impl LeaderboardSnapshot {
    /// Rank of a player, if present.
    pub fn rank_of(&self, id: &PlayerId) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| entry.player_id == *id)
            .map(|entry| entry.rank)
    }
}

/// Changes between two consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardDelta {
    /// Rows that are new or whose rank or score changed.
    pub changed: Vec<LeaderboardEntry>,
    /// Players that disappeared from the ranking.
    pub removed: Vec<PlayerId>,
}

impl LeaderboardDelta {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Aggregated score of one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamStanding {
    /// Team index.
    pub team: u32,
    /// Sum of member scores.
    pub score: u64,
    /// Number of members.
    pub members: usize,
}

/// Ordering key: score desc, earliest current streak achievement, then join order.
fn ranking_key(player: &Player) -> (Reverse<u32>, u64, u64) {
    (
        Reverse(player.score),
        player.streak_achieved_at.unwrap_or(u64::MAX),
        player.join_order,
    )
}

/// Keeps the previous ranking so each refresh can be expressed as a delta.
#[derive(Debug, Default)]
pub struct LeaderboardAggregator {
    previous: IndexMap<PlayerId, (usize, u32)>,
}

impl LeaderboardAggregator {
    /// Create an aggregator with no previous snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank `players` without recording the result.
    pub fn snapshot<'a>(&self, players: impl IntoIterator<Item = &'a Player>) -> LeaderboardSnapshot {
        let mut ranked: Vec<&Player> = players.into_iter().collect();
        ranked.sort_by_key(|player| ranking_key(player));

        let entries = ranked
            .into_iter()
            .enumerate()
            .map(|(position, player)| {
                let rank = position + 1;
                let rank_delta = self
                    .previous
                    .get(&player.id)
                    .map(|(previous, _)| *previous as i64 - rank as i64)
                    .unwrap_or(0);
                LeaderboardEntry {
                    player_id: player.id,
                    display_name: player.display_name.clone(),
                    score: player.score,
                    streak: player.streak,
                    rank,
                    rank_delta,
                    team: player.team,
                }
            })
            .collect();

        LeaderboardSnapshot { entries }
    }

    /// Rank `players`, record the result, and describe what changed since last time.
    pub fn refresh<'a>(
        &mut self,
        players: impl IntoIterator<Item = &'a Player>,
    ) -> (LeaderboardSnapshot, LeaderboardDelta) {
        let snapshot = self.snapshot(players);

        let changed = snapshot
            .entries
            .iter()
            .filter(|entry| {
                self.previous
                    .get(&entry.player_id)
                    .is_none_or(|(rank, score)| *rank != entry.rank || *score != entry.score)
            })
            .cloned()
            .collect();
        let removed = self
            .previous
            .keys()
            .filter(|id| snapshot.rank_of(id).is_none())
            .copied()
            .collect();

        self.previous = snapshot
            .entries
            .iter()
            .map(|entry| (entry.player_id, (entry.rank, entry.score)))
            .collect();

        (snapshot, LeaderboardDelta { changed, removed })
    }
}

/// Sum scores per team, best team first (ties broken by team index).
pub fn team_standings<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<TeamStanding> {
    let mut totals: IndexMap<u32, TeamStanding> = IndexMap::new();
    for player in players {
        let Some(team) = player.team else {
            continue;
        };
        let standing = totals.entry(team).or_insert(TeamStanding {
            team,
            score: 0,
            members: 0,
        });
        standing.score += u64::from(player.score);
        standing.members += 1;
    }
    let mut standings: Vec<_> = totals.into_values().collect();
    standings.sort_by_key(|standing| (Reverse(standing.score), standing.team));
    standings
}

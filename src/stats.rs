//! Per-player aggregate statistics and the Elo-difference/LOS estimators (§4.6).
//! `monitors` never aggregates across games (it plays one match and exits), so
//! this is grounded in `original_source/src/game/playerstats.cpp`'s running
//! totals, reimplemented with `statrs` for the normal-CDF piece instead of a
//! hand-rolled erf.

use std::collections::BTreeMap;
use std::time::Duration;

use statrs::function::erf::erf;

use crate::store::MatchRecord;
use rules::result::GameResult;

#[derive(Clone, Debug, Default)]
pub struct PlayerStats {
    pub games: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Games played with the white pieces (§3 `TourStanding.whiteCount`).
    pub white_count: u32,
    /// Byes credited so far (§3 `TourStanding.byeCount`).
    pub bye_count: u32,
    /// Games that ended some way other than a normal mate/stalemate/draw
    /// verdict: illegal move, timeout, or crash (§3 `TourStanding.abnormalCount`).
    pub abnormal_count: u32,
    pub node_sum: u64,
    pub depth_sum: u64,
    pub elapsed: Duration,
    pub move_count: u64,
}

impl PlayerStats {
    pub fn score(&self) -> f64 {
        self.wins as f64 + 0.5 * self.draws as f64
    }

    /// Elo-difference estimate relative to the field, from (wins, draws, losses).
    /// `None` when the game count is zero or the score is at a boundary (0 or 1)
    /// where the logit is undefined.
    pub fn elo_diff(&self) -> Option<f64> {
        if self.games == 0 {
            return None;
        }
        let p = self.score() / self.games as f64;
        if p <= 0.0 || p >= 1.0 {
            return None;
        }
        Some(-((1.0 / p - 1.0).ln()) * 400.0 / std::f64::consts::LN_10)
    }

    /// Likelihood of superiority, from the normal approximation with `erf`.
    pub fn los(&self) -> Option<f64> {
        let n = self.wins + self.losses;
        if n == 0 {
            return None;
        }
        let diff = self.wins as f64 - self.losses as f64;
        Some(0.5 + 0.5 * erf(diff / (2.0 * n as f64).sqrt()))
    }
}

#[derive(Default)]
pub struct Standings {
    per_player: BTreeMap<String, PlayerStats>,
}

impl Standings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player: &str) -> Option<&PlayerStats> {
        self.per_player.get(player)
    }

    pub fn players(&self) -> impl Iterator<Item = (&String, &PlayerStats)> {
        self.per_player.iter()
    }

    /// Folds one completed record's outcome and ingest metrics into the running
    /// totals for both sides. `metrics` is `(nodes, depth, elapsed, moves)` per
    /// side, opportunistically parsed from `info` lines and `(0, 0, 0, 0)` when
    /// the adapter never reported any.
    pub fn record_game(&mut self, record: &MatchRecord, metrics: [(u64, u64, Duration, u64); 2]) {
        let Some(result) = &record.result else { return };
        let is_bye = record.players[1].is_empty();
        if is_bye {
            let stats = self.per_player.entry(record.players[0].clone()).or_default();
            stats.games += 1;
            stats.wins += 1;
            stats.bye_count += 1;
            return;
        }
        let outcome = if result.outcome == GameResult::WhiteWin.to_string() {
            GameResult::WhiteWin
        } else if result.outcome == GameResult::BlackWin.to_string() {
            GameResult::BlackWin
        } else {
            GameResult::Draw
        };
        let abnormal = matches!(result.reason.as_str(), "Illegal move" | "Time forfeit" | "Engine crashed");
        for (side, player) in record.players.iter().enumerate() {
            if player.is_empty() {
                continue;
            }
            let stats = self.per_player.entry(player.clone()).or_default();
            stats.games += 1;
            if side == 0 {
                stats.white_count += 1;
            }
            if abnormal {
                stats.abnormal_count += 1;
            }
            let (nodes, depth, elapsed, moves) = metrics[side];
            stats.node_sum += nodes;
            stats.depth_sum += depth;
            stats.elapsed += elapsed;
            stats.move_count += moves;
            let is_white = side == 0;
            match outcome {
                GameResult::Draw => stats.draws += 1,
                GameResult::WhiteWin if is_white => stats.wins += 1,
                GameResult::BlackWin if !is_white => stats.wins += 1,
                _ => stats.losses += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn won(n: u32) -> PlayerStats {
        PlayerStats { games: n, wins: n, ..Default::default() }
    }

    #[test]
    fn perfect_score_has_no_finite_elo_diff() {
        assert_eq!(won(5).elo_diff(), None);
    }

    #[test]
    fn even_score_has_zero_elo_diff() {
        let stats = PlayerStats { games: 4, wins: 1, draws: 2, losses: 1, ..Default::default() };
        assert!(stats.elo_diff().unwrap().abs() < 1e-9);
    }

    #[test]
    fn los_favors_the_player_with_more_wins() {
        let stats = PlayerStats { games: 10, wins: 7, draws: 0, losses: 3, ..Default::default() };
        assert!(stats.los().unwrap() > 0.5);
    }

    #[test]
    fn standings_accumulates_both_sides_of_a_record() {
        let mut standings = Standings::new();
        let record = MatchRecord {
            players: ["A".to_string(), "B".to_string()],
            start_fen: String::new(),
            start_moves: Vec::new(),
            result: Some(crate::store::StoredResult {
                outcome: GameResult::WhiteWin.to_string(),
                reason: "Checkmate".to_string(),
                comment: String::new(),
            }),
            state: crate::store::RecordState::Completed,
            game_index: 0,
            round_index: 1,
            pair_id: 0,
        };
        standings.record_game(&record, [(0, 0, Duration::ZERO, 0); 2]);
        assert_eq!(standings.get("A").unwrap().wins, 1);
        assert_eq!(standings.get("B").unwrap().losses, 1);
    }
}

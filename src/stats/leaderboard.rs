//! Leaderboard views over the record book

use super::RecordBook;
use crate::game::UserId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which statistic a leaderboard ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    Points,
    Streak,
    Sfiga,
    Combo,
    WinRate,
    Speed,
    Elo,
    Duels,
}

impl LeaderboardKind {
    /// Heading shown above the rows.
    pub fn title(&self) -> &'static str {
        match self {
            LeaderboardKind::Points => "Top points",
            LeaderboardKind::Streak => "Best winning streaks",
            LeaderboardKind::Sfiga => "Worst losing streaks",
            LeaderboardKind::Combo => "Most combos",
            LeaderboardKind::WinRate => "Best win rate",
            LeaderboardKind::Speed => "Fastest hands",
            LeaderboardKind::Elo => "Duel rating",
            LeaderboardKind::Duels => "Most duels won",
        }
    }
}

/// The value a row is ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum Metric {
    Points { points: i64 },
    Streak { best: u32 },
    Sfiga { best: u32 },
    Combo { total: u32, doubles: u32, triples: u32, quads: u32, quints: u32 },
    WinRate { rate: f64, wins: u64, trials: u64 },
    Speed { per_second: f64 },
    Elo { rating: i32 },
    Duels { wins: u32, losses: u32 },
}

impl Metric {
    fn sort_key(&self) -> f64 {
        match self {
            Metric::Points { points } => *points as f64,
            Metric::Streak { best } | Metric::Sfiga { best } => f64::from(*best),
            Metric::Combo { total, .. } => f64::from(*total),
            Metric::WinRate { rate, .. } => *rate,
            Metric::Speed { per_second } => *per_second,
            Metric::Elo { rating } => f64::from(*rating),
            Metric::Duels { wins, .. } => f64::from(*wins),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Points { points } => write!(f, "{} pts", points),
            Metric::Streak { best } => write!(f, "{} wins in a row", best),
            Metric::Sfiga { best } => write!(f, "{} losses in a row", best),
            Metric::Combo { total, doubles, triples, quads, quints } => write!(
                f,
                "{} combos (x2 {}, x3 {}, x4 {}, x5 {})",
                total, doubles, triples, quads, quints
            ),
            Metric::WinRate { rate, wins, trials } => {
                write!(f, "{:.1}% ({}/{})", rate * 100.0, wins, trials)
            }
            Metric::Speed { per_second } => write!(f, "{:.2} rolls/s", per_second),
            Metric::Elo { rating } => write!(f, "{} ELO", rating),
            Metric::Duels { wins, losses } => write!(f, "{}W {}L", wins, losses),
        }
    }
}

/// One ranked entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// 1-based position
    pub rank: usize,
    pub user_id: UserId,
    pub name: String,
    #[serde(flatten)]
    pub metric: Metric,
}

/// Options that filter who appears on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardOptions {
    /// Maximum rows returned
    pub size: usize,
    /// Minimum trials to appear on the win rate board
    pub winrate_min_trials: u64,
}

impl Default for LeaderboardOptions {
    fn default() -> Self {
        LeaderboardOptions {
            size: 10,
            winrate_min_trials: 10,
        }
    }
}

/// Rank players by `kind`, highest first.
///
/// Ties keep user id order. Players who do not qualify for a board are
/// left out rather than shown with a zero.
pub fn build(book: &RecordBook, kind: LeaderboardKind, options: LeaderboardOptions) -> Vec<LeaderboardRow> {
    let mut entries: Vec<(UserId, &str, Metric)> = book
        .iter()
        .filter_map(|(id, r)| {
            let metric = match kind {
                LeaderboardKind::Points => Metric::Points { points: r.points },
                LeaderboardKind::Streak => Metric::Streak { best: r.best_streak },
                LeaderboardKind::Sfiga => Metric::Sfiga { best: r.best_sfiga },
                LeaderboardKind::Combo => {
                    if r.combo_total() == 0 {
                        return None;
                    }
                    Metric::Combo {
                        total: r.combo_total(),
                        doubles: r.doubles,
                        triples: r.triples,
                        quads: r.quads,
                        quints: r.quints,
                    }
                }
                LeaderboardKind::WinRate => {
                    if r.total_trials < options.winrate_min_trials.max(1) {
                        return None;
                    }
                    Metric::WinRate {
                        rate: r.win_rate(),
                        wins: r.total_wins,
                        trials: r.total_trials,
                    }
                }
                LeaderboardKind::Speed => {
                    if r.best_speed <= 0.0 {
                        return None;
                    }
                    Metric::Speed { per_second: r.best_speed }
                }
                LeaderboardKind::Elo => Metric::Elo { rating: r.elo },
                LeaderboardKind::Duels => {
                    if r.duel_wins + r.duel_losses == 0 {
                        return None;
                    }
                    Metric::Duels {
                        wins: r.duel_wins,
                        losses: r.duel_losses,
                    }
                }
            };
            Some((id, r.name.as_str(), metric))
        })
        .collect();

    // Stable sort, so equal keys stay in id order
    entries.sort_by(|a, b| {
        b.2.sort_key()
            .partial_cmp(&a.2.sort_key())
            .unwrap_or(Ordering::Equal)
    });

    entries
        .into_iter()
        .take(options.size)
        .enumerate()
        .map(|(i, (user_id, name, metric))| LeaderboardRow {
            rank: i + 1,
            user_id,
            name: name.to_string(),
            metric,
        })
        .collect()
}

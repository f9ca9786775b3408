//! Chat text for engine events

use crate::game::duel::{ChallengeOutcome, DuelHistoryEntry, DuelSession, TurnOutcome};
use crate::game::streak::TrialEvent;
use crate::stats::leaderboard::{LeaderboardKind, LeaderboardRow};
use crate::stats::PlayerRecord;
use std::fmt::Write;

pub const EXPANSION_ENDED: &str = "🌌 The domain dissolves. Reality is stable again.";
pub const LOSS_ERASED: &str = "🌌 IDLE DEATH GAMBLE: your loss has been erased.";
pub const VENTED: &str = "🔥 Let it all out. 🔥";

/// Text for a recorded trial, or `None` when nothing is worth saying.
pub fn trial_report(name: &str, events: &[TrialEvent], duel: &TurnOutcome) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    for event in events {
        match event {
            TrialEvent::ExpansionBonus => lines.insert(0, "🌌 DOMAIN EXPANSION ACTIVE".to_string()),
            TrialEvent::Win { jackpot: true } => lines.push(format!("💥 JACKPOT! {} hit the sevens!", name)),
            TrialEvent::Win { jackpot: false } => lines.push(format!("🎉 {} wins!", name)),
            TrialEvent::Combo { length } => lines.push(combo_line(name, *length)),
            TrialEvent::TripleReached { .. } => lines.push(format!(
                "🎲 The domain's energy gathers around {}. Expand it before the triple fades.",
                name
            )),
            TrialEvent::SfigaMilestone { sfiga } => {
                lines.push(format!("💀 {} has gone {} rolls without a win.", name, sfiga))
            }
            TrialEvent::NewSpeedRecord { per_second } => lines.push(format!(
                "⚡ New personal speed record for {}: {:.3} rolls/s",
                name, per_second
            )),
            TrialEvent::Achievement(a) => lines.push(format!("🏅 Achievement unlocked: {}", a.title())),
        }
    }

    if let Some(text) = duel_line(name, duel) {
        lines.push(text);
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn combo_line(name: &str, length: u32) -> String {
    match length {
        2 => format!("⚡ {} is flying: DOUBLE!", name),
        3 => format!("🔥🔥 {} found the seed: TRIPLE!", name),
        4 => format!("🧨 {} is overdoing it: POKER!", name),
        _ => format!("👑 King Slot {}: FIVE IN A ROW.", name),
    }
}

fn duel_line(name: &str, duel: &TurnOutcome) -> Option<String> {
    match duel {
        TurnOutcome::NoDuel | TurnOutcome::NotParticipant => None,
        TurnOutcome::NotYourTurn { on_turn } => {
            Some(format!("⚔️ Not your turn! It is {}'s turn.", on_turn))
        }
        TurnOutcome::Round { won, score, next_turn } => {
            let mut text = if *won {
                format!("🎯 {} takes the round! ({}-{})", name, score.0, score.1)
            } else {
                format!("💥 {} loses the round! ({}-{})", name, score.0, score.1)
            };
            if let Some(next) = next_turn {
                let _ = write!(text, "\n📍 Next turn: {}", next);
            }
            Some(text)
        }
        TurnOutcome::Finished(finish) => Some(format!(
            "🏁 DUEL OVER!\n{} {} - {} {}\n🏆 {} wins ({:+} ELO, loser {:+})",
            finish.entry.p1,
            finish.entry.score1,
            finish.entry.score2,
            finish.entry.p2,
            finish.entry.winner,
            finish.elo.winner,
            finish.elo.loser
        )),
    }
}

pub fn challenge(outcome: &ChallengeOutcome) -> String {
    match outcome {
        ChallengeOutcome::Pending(p) => format!(
            "⚔️ CHALLENGE ISSUED!\n{} challenged {}.\n{}, challenge them back or accept to start.",
            p.challenger_name, p.target_name, p.target_name
        ),
        ChallengeOutcome::Started(session) => duel_started(session),
    }
}

pub fn duel_started(session: &DuelSession) -> String {
    format!(
        "⚔️ DUEL ON!\n{} vs {}\n🎲 First turn: {}\nFirst to the target wins!",
        session.players[0].name,
        session.players[1].name,
        session.on_turn_name()
    )
}

pub fn expansion_activated(name: &str, duration_secs: u64) -> String {
    format!(
        "🌌 DOMAIN EXPANSION\n{} opens their domain for {}m {}s. Losses may be erased.",
        name,
        duration_secs / 60,
        duration_secs % 60
    )
}

pub fn stats(record: &PlayerRecord) -> String {
    let mut text = format!(
        "📊 {}\nPoints: {}\nStreak: {} (best {})\nSfiga: {} (worst {})\n\
         Rolls: {} | Wins: {} ({:.1}%)\nCombos: x2 {} | x3 {} | x4 {} | x5 {}\n\
         Duels: {}W {}L | ELO {}\nDomains used: {}",
        record.name,
        record.points,
        record.streak,
        record.best_streak,
        record.sfiga,
        record.best_sfiga,
        record.total_trials,
        record.total_wins,
        record.win_rate() * 100.0,
        record.doubles,
        record.triples,
        record.quads,
        record.quints,
        record.duel_wins,
        record.duel_losses,
        record.elo,
        record.domains_used,
    );
    if record.best_speed > 0.0 {
        let _ = write!(text, "\nBest speed: {:.3} rolls/s", record.best_speed);
    }
    if !record.achievements.is_empty() {
        let titles: Vec<_> = record.achievements.iter().map(|a| a.title()).collect();
        let _ = write!(text, "\n🏅 {}", titles.join(", "));
    }
    text
}

pub fn leaderboard(kind: LeaderboardKind, rows: &[LeaderboardRow]) -> String {
    if rows.is_empty() {
        return format!("🏆 {}\nNobody qualifies yet.", kind.title());
    }
    let mut text = format!("🏆 {}", kind.title());
    for row in rows {
        let _ = write!(text, "\n{}. {}: {}", row.rank, row.name, row.metric);
    }
    text
}

pub fn history(entries: &[DuelHistoryEntry]) -> String {
    if entries.is_empty() {
        return "📜 No duels played yet.".to_string();
    }
    let mut text = "📜 Latest duels".to_string();
    for e in entries {
        let _ = write!(
            text,
            "\n{} {}-{} {} → {} ({})",
            e.p1,
            e.score1,
            e.score2,
            e.p2,
            e.winner,
            e.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::elo::EloDelta;
    use crate::stats::leaderboard::Metric;

    #[test]
    fn test_quiet_trial_has_no_text() {
        assert_eq!(trial_report("A", &[], &TurnOutcome::NoDuel), None);
    }

    #[test]
    fn test_expansion_banner_comes_first() {
        let text = trial_report(
            "Ann",
            &[TrialEvent::Win { jackpot: false }, TrialEvent::ExpansionBonus],
            &TurnOutcome::NoDuel,
        )
        .unwrap();
        assert!(text.starts_with("🌌 DOMAIN EXPANSION ACTIVE\n🎉 Ann wins!"));
    }

    #[test]
    fn test_round_line_shows_next_turn() {
        let text = trial_report(
            "Ann",
            &[],
            &TurnOutcome::Round {
                won: true,
                score: (2, 1),
                next_turn: Some("Ben".into()),
            },
        )
        .unwrap();
        assert_eq!(text, "🎯 Ann takes the round! (2-1)\n📍 Next turn: Ben");
    }

    #[test]
    fn test_finished_duel_shows_elo() {
        let finish = crate::game::duel::DuelFinish {
            entry: DuelHistoryEntry {
                p1: "Ann".into(),
                p2: "Ben".into(),
                score1: 3,
                score2: 0,
                winner: "Ann".into(),
                timestamp: chrono::Utc::now(),
            },
            winner_id: 1,
            loser_id: 2,
            elo: EloDelta { winner: 16, loser: -16 },
            first_duel_win: true,
        };
        let text = trial_report("Ann", &[], &TurnOutcome::Finished(finish)).unwrap();
        assert!(text.contains("Ann 3 - 0 Ben"));
        assert!(text.contains("+16 ELO, loser -16"));
    }

    #[test]
    fn test_leaderboard_rendering() {
        let rows = vec![LeaderboardRow {
            rank: 1,
            user_id: 9,
            name: "Zed".into(),
            metric: Metric::Points { points: 40 },
        }];
        assert_eq!(
            leaderboard(LeaderboardKind::Points, &rows),
            "🏆 Top points\n1. Zed: 40 pts"
        );
        assert!(leaderboard(LeaderboardKind::Speed, &[]).contains("Nobody qualifies"));
    }

    #[test]
    fn test_expansion_duration_text() {
        assert!(expansion_activated("Ann", 251).contains("4m 11s"));
    }
}

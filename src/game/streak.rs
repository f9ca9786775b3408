//! Streak/Combo engine
//!
//! Applies one classified trial to a player record: streak and losing-streak
//! counters, combo counters, points, the streak-3 expansion marker and the
//! speed record. Each function returns the events the caller should announce.

use super::{Classification, MessageId};
use crate::stats::{Achievement, PlayerRecord};

/// Something worth telling the chat about after a trial.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    /// A winning roll, jackpot or not
    Win { jackpot: bool },
    /// Streak reached 2, 3, 4 or 5
    Combo { length: u32 },
    /// Streak reached exactly 3; the player may expand their domain
    TripleReached { message_id: MessageId },
    /// Extra point granted by an active expansion
    ExpansionBonus,
    /// Losing streak hit a milestone
    SfigaMilestone { sfiga: u32 },
    /// New best trial-to-trial rate
    NewSpeedRecord { per_second: f64 },
    /// Achievement unlocked for the first time
    Achievement(Achievement),
}

/// Thresholds for losing-streak milestone notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneRule {
    pub start: u32,
    pub step: u32,
}

impl MilestoneRule {
    /// Whether `sfiga` is a milestone.
    pub fn hits(&self, sfiga: u32) -> bool {
        self.step > 0 && sfiga >= self.start && sfiga % self.step == 0
    }
}

impl Default for MilestoneRule {
    fn default() -> Self {
        MilestoneRule { start: 50, step: 10 }
    }
}

/// Bonus points granted when the streak reaches `length`.
pub fn streak_bonus(length: u32) -> i64 {
    match length {
        2 | 3 => 1,
        4 => 2,
        5 => 3,
        _ => 0,
    }
}

/// Base points for a winning roll.
pub fn base_points(jackpot: bool) -> i64 {
    if jackpot {
        2
    } else {
        1
    }
}

fn unlock(record: &mut PlayerRecord, achievement: Achievement, events: &mut Vec<TrialEvent>) {
    if record.unlock(achievement) {
        events.push(TrialEvent::Achievement(achievement));
    }
}

/// Apply a winning trial.
///
/// `message_id` identifies the trial and becomes the expansion marker when
/// the streak reaches exactly 3.
pub fn apply_win(
    record: &mut PlayerRecord,
    classification: Classification,
    message_id: MessageId,
    expansion_active: bool,
) -> Vec<TrialEvent> {
    let mut events = vec![TrialEvent::Win { jackpot: classification.jackpot }];

    record.sfiga = 0;
    record.set_streak(record.streak.saturating_add(1));
    record.total_wins = record.total_wins.saturating_add(1);
    record.total_trials = record.total_trials.saturating_add(1);
    record.last_was_win = true;

    let streak = record.streak;
    match streak {
        2 => record.doubles += 1,
        3 => record.triples += 1,
        4 => record.quads += 1,
        5 => record.quints += 1,
        _ => {}
    }
    if (2..=5).contains(&streak) {
        events.push(TrialEvent::Combo { length: streak });
    }

    let gained = base_points(classification.jackpot) + streak_bonus(streak);
    record.points = record.points.saturating_add(gained);
    if expansion_active {
        record.points = record.points.saturating_add(1);
        events.push(TrialEvent::ExpansionBonus);
    }

    if streak == 3 {
        record.last_triple_msg_id = Some(message_id);
        events.push(TrialEvent::TripleReached { message_id });
    }

    unlock(record, Achievement::FirstBlood, &mut events);
    match streak {
        3 => unlock(record, Achievement::Triple, &mut events),
        4 => unlock(record, Achievement::Quad, &mut events),
        5 => {
            unlock(record, Achievement::Quint, &mut events);
            unlock(record, Achievement::Streak5, &mut events);
        }
        10 => unlock(record, Achievement::Streak10, &mut events),
        _ => {}
    }

    events
}

/// Apply a losing trial.
pub fn apply_loss(record: &mut PlayerRecord, milestones: MilestoneRule) -> Vec<TrialEvent> {
    record.streak = 0;
    record.set_sfiga(record.sfiga.saturating_add(1));
    record.total_trials = record.total_trials.saturating_add(1);
    record.last_was_win = false;

    if milestones.hits(record.sfiga) {
        vec![TrialEvent::SfigaMilestone { sfiga: record.sfiga }]
    } else {
        Vec::new()
    }
}

/// Update the speed record from the trial captured at `now` (epoch seconds),
/// then store `now` as the last trial timestamp.
///
/// `now` must be captured before any reveal delay.
pub fn apply_speed(record: &mut PlayerRecord, now: f64) -> Vec<TrialEvent> {
    let mut events = Vec::new();
    let last = record.last_trial_ts;
    record.last_trial_ts = now;

    if last <= 0.0 {
        return events;
    }
    let elapsed = now - last;
    if elapsed <= 0.0 {
        return events;
    }

    let rate = 1.0 / elapsed;
    if record.best_speed == 0.0 || rate > record.best_speed {
        record.best_speed = rate;
        events.push(TrialEvent::NewSpeedRecord { per_second: rate });
        unlock(record, Achievement::SpeedDemon, &mut events);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WIN: Classification = Classification { won: true, jackpot: false };
    const JACKPOT: Classification = Classification { won: true, jackpot: true };

    #[test]
    fn test_jackpot_on_streak_two() {
        let mut r = PlayerRecord::new("Alice");
        r.streak = 2;
        r.best_streak = 2;
        r.points = 10;

        let events = apply_win(&mut r, JACKPOT, 500, false);

        assert_eq!(r.streak, 3);
        assert_eq!(r.best_streak, 3);
        assert_eq!(r.points, 13);
        assert_eq!(r.triples, 1);
        assert_eq!(r.last_triple_msg_id, Some(500));
        assert!(events.contains(&TrialEvent::TripleReached { message_id: 500 }));
        assert!(events.contains(&TrialEvent::Win { jackpot: true }));
    }

    #[test]
    fn test_points_schedule_over_five_wins() {
        let mut r = PlayerRecord::new("Alice");
        let mut gained = Vec::new();
        for id in 0..6 {
            let before = r.points;
            apply_win(&mut r, WIN, id, false);
            gained.push(r.points - before);
        }
        // 1, 1+1, 1+1, 1+2, 1+3, 1
        assert_eq!(gained, vec![1, 2, 2, 3, 4, 1]);
        assert_eq!((r.doubles, r.triples, r.quads, r.quints), (1, 1, 1, 1));
    }

    #[test]
    fn test_counters_saturate_after_admin_overrides() {
        let mut r = PlayerRecord::new("Alice");
        r.points = i64::MAX;
        r.set_streak(u32::MAX);
        apply_win(&mut r, JACKPOT, 1, true);
        assert_eq!((r.points, r.streak), (i64::MAX, u32::MAX));

        r.set_sfiga(u32::MAX);
        apply_loss(&mut r, MilestoneRule::default());
        assert_eq!((r.streak, r.sfiga), (0, u32::MAX));
    }

    #[test]
    fn test_expansion_bonus_point() {
        let mut r = PlayerRecord::new("Alice");
        let events = apply_win(&mut r, WIN, 1, true);
        assert_eq!(r.points, 2);
        assert!(events.contains(&TrialEvent::ExpansionBonus));
    }

    #[test]
    fn test_loss_resets_streak() {
        let mut r = PlayerRecord::new("Bob");
        r.streak = 7;
        r.best_streak = 7;
        r.sfiga = 0;

        apply_loss(&mut r, MilestoneRule::default());

        assert_eq!(r.streak, 0);
        assert_eq!(r.best_streak, 7);
        assert_eq!(r.sfiga, 1);
        assert_eq!(r.best_sfiga, 1);
        assert_eq!(r.total_trials, 1);
        assert_eq!(r.total_wins, 0);
        assert!(!r.last_was_win);
    }

    #[test]
    fn test_sfiga_milestones() {
        let rule = MilestoneRule::default();
        let mut r = PlayerRecord::new("Bob");
        r.sfiga = 49;
        assert_eq!(
            apply_loss(&mut r, rule),
            vec![TrialEvent::SfigaMilestone { sfiga: 50 }]
        );
        assert!(apply_loss(&mut r, rule).is_empty());

        r.sfiga = 39;
        assert!(apply_loss(&mut r, rule).is_empty(), "40 is below the start");
    }

    #[test]
    fn test_first_win_unlocks_first_blood_once() {
        let mut r = PlayerRecord::new("Carol");
        let first = apply_win(&mut r, WIN, 1, false);
        apply_loss(&mut r, MilestoneRule::default());
        let second = apply_win(&mut r, WIN, 2, false);

        assert!(first.contains(&TrialEvent::Achievement(Achievement::FirstBlood)));
        assert!(!second.contains(&TrialEvent::Achievement(Achievement::FirstBlood)));
    }

    #[test]
    fn test_speed_first_trial_only_stamps() {
        let mut r = PlayerRecord::new("Dan");
        assert!(apply_speed(&mut r, 1000.0).is_empty());
        assert_eq!(r.last_trial_ts, 1000.0);
        assert_eq!(r.best_speed, 0.0);
    }

    #[test]
    fn test_speed_record() {
        let mut r = PlayerRecord::new("Dan");
        apply_speed(&mut r, 1000.0);

        let events = apply_speed(&mut r, 1002.0);
        assert_eq!(r.best_speed, 0.5);
        assert_eq!(events[0], TrialEvent::NewSpeedRecord { per_second: 0.5 });
        assert!(events.contains(&TrialEvent::Achievement(Achievement::SpeedDemon)));

        // Slower: no record, timestamp still advances
        assert!(apply_speed(&mut r, 1006.0).is_empty());
        assert_eq!(r.best_speed, 0.5);
        assert_eq!(r.last_trial_ts, 1006.0);

        // Faster
        apply_speed(&mut r, 1007.0);
        assert_eq!(r.best_speed, 1.0);
    }

    #[test]
    fn test_speed_ignores_non_positive_delta() {
        let mut r = PlayerRecord::new("Dan");
        r.last_trial_ts = 1000.0;
        assert!(apply_speed(&mut r, 1000.0).is_empty());
        assert!(apply_speed(&mut r, 999.0).is_empty());
        assert_eq!(r.best_speed, 0.0);
    }

    proptest! {
        #[test]
        fn prop_n_wins_make_streak_n(prior_best in 0u32..20, n in 1u32..30) {
            let mut r = PlayerRecord::new("P");
            r.best_streak = prior_best;
            r.sfiga = 4;
            for id in 0..n {
                apply_win(&mut r, WIN, i64::from(id), false);
            }
            prop_assert_eq!(r.streak, n);
            prop_assert_eq!(r.best_streak, n.max(prior_best));
            prop_assert_eq!(r.sfiga, 0);
        }

        #[test]
        fn prop_loss_increments_sfiga_by_one(streak in 0u32..50, sfiga in 0u32..200) {
            let mut r = PlayerRecord::new("P");
            r.streak = streak;
            r.sfiga = sfiga;
            apply_loss(&mut r, MilestoneRule::default());
            prop_assert_eq!(r.streak, 0);
            prop_assert_eq!(r.sfiga, sfiga + 1);
        }
    }
}

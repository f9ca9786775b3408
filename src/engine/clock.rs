//! Wall-clock seam

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as float epoch seconds.
    fn epoch_secs(&self) -> f64 {
        let now = self.now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
    }
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at_epoch_secs(secs: i64) -> Self {
        ManualClock {
            now: std::sync::Mutex::new(DateTime::from_timestamp(secs, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch_secs(1_000);
        assert_eq!(clock.epoch_secs(), 1_000.0);
        clock.advance(Duration::from_millis(1_500));
        assert_eq!(clock.epoch_secs(), 1_001.5);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2023-01-01
        assert!(SystemClock.epoch_secs() > 1_672_531_200.0);
    }
}

//! Engine configuration.
//!
//! Every field has a default equal to the values the bot has always shipped
//! with, so an empty (or missing) config file yields a working engine.

use crate::error::ConfigError;
use crate::game::duel::DuelMode;
use crate::game::{RollValue, UserId};
use crate::network::DEFAULT_PORT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default host the gateway binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Configuration for the engine and its host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// The single privileged user allowed to run admin commands
    pub admin_id: UserId,
    /// Roll values counted as wins
    pub winning_values: Vec<RollValue>,
    /// The winning value worth extra points
    pub jackpot_value: RollValue,
    /// Lowest value the slot can produce
    pub roll_min: RollValue,
    /// Highest value the slot can produce
    pub roll_max: RollValue,
    /// K factor for rating updates
    pub elo_k_factor: f64,
    /// How long a domain expansion lasts
    pub expansion_duration_secs: u64,
    /// Messages allowed between the triple and the activation
    pub expansion_message_window: i64,
    /// Chance that a loss is erased while the domain is expanded
    pub suppression_probability: f64,
    /// Pause before the outcome of a roll is revealed
    pub reveal_delay_ms: u64,
    /// Round wins needed to take a duel
    pub duel_target_wins: u32,
    /// Turn-alternating or free-for-all duels
    pub duel_mode: DuelMode,
    /// Consecutive losses needed to earn a vent
    pub vent_threshold: u32,
    /// Losing streak at which milestone notices begin
    pub sfiga_milestone_start: u32,
    /// Interval between milestone notices
    pub sfiga_milestone_step: u32,
    /// Entries shown by the duel history query
    pub history_limit: usize,
    /// Rows shown by leaderboards
    pub leaderboard_size: usize,
    /// Minimum trials to appear on the win rate leaderboard
    pub winrate_min_trials: u64,
    /// Gateway listen address
    pub listen: String,
    /// Where the database lives (OS data dir when unset)
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_id: 0,
            winning_values: vec![1, 22, 43, 64],
            jackpot_value: 64,
            roll_min: 1,
            roll_max: 64,
            elo_k_factor: 32.0,
            expansion_duration_secs: 4 * 60 + 11,
            expansion_message_window: 10,
            suppression_probability: 0.33,
            reveal_delay_ms: 1000,
            duel_target_wins: 3,
            duel_mode: DuelMode::Alternating,
            vent_threshold: 50,
            sfiga_milestone_start: 50,
            sfiga_milestone_step: 10,
            history_limit: 10,
            leaderboard_size: 10,
            winrate_min_trials: 10,
            listen: format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT),
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load a config file, falling back to defaults for absent fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reveal delay as a `Duration`.
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roll_min > self.roll_max {
            return Err(ConfigError::Invalid {
                field: "roll_min",
                reason: format!("{} is above roll_max {}", self.roll_min, self.roll_max),
            });
        }
        if self.winning_values.is_empty() {
            return Err(ConfigError::Invalid {
                field: "winning_values",
                reason: "at least one winning value is required".to_string(),
            });
        }
        if let Some(v) = self
            .winning_values
            .iter()
            .find(|v| **v < self.roll_min || **v > self.roll_max)
        {
            return Err(ConfigError::Invalid {
                field: "winning_values",
                reason: format!("{} is outside {}..={}", v, self.roll_min, self.roll_max),
            });
        }
        if !self.winning_values.contains(&self.jackpot_value) {
            return Err(ConfigError::Invalid {
                field: "jackpot_value",
                reason: format!("{} is not a winning value", self.jackpot_value),
            });
        }
        if !(0.0..=1.0).contains(&self.suppression_probability) {
            return Err(ConfigError::Invalid {
                field: "suppression_probability",
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if self.duel_target_wins == 0 {
            return Err(ConfigError::Invalid {
                field: "duel_target_wins",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.vent_threshold == 0 || self.sfiga_milestone_step == 0 {
            return Err(ConfigError::Invalid {
                field: "vent_threshold",
                reason: "thresholds must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = EngineConfig::from_toml("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.expansion_duration_secs, 251);
        assert_eq!(cfg.duel_mode, DuelMode::Alternating);
    }

    #[test]
    fn test_partial_override() {
        let cfg = EngineConfig::from_toml(
            r#"
            admin_id = 77
            reveal_delay_ms = 0
            duel_mode = "race"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.admin_id, 77);
        assert_eq!(cfg.reveal_delay(), Duration::ZERO);
        assert_eq!(cfg.duel_mode, DuelMode::Race);
        assert_eq!(cfg.winning_values, vec![1, 22, 43, 64]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            EngineConfig::from_toml("bogus = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_jackpot_must_be_winning() {
        let err = EngineConfig::from_toml("jackpot_value = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "jackpot_value", .. }));
    }

    #[test]
    fn test_probability_range_checked() {
        assert!(EngineConfig::from_toml("suppression_probability = 1.5").is_err());
        assert!(EngineConfig::from_toml("suppression_probability = 1.0").is_ok());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/slotbot.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/slotbot.toml"));
    }
}

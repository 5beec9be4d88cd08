//! Session configuration

use serde::{Deserialize, Serialize};

/// Turn allotment used when the configured limit is unusable
pub const DEFAULT_TURN_SECONDS: u32 = 60;

/// Ruleset variant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Classic,
    Creative,
}

/// Per-session settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Raw turn limit in seconds as supplied by the caller
    pub turn_time_limit: f64,
    pub mode: GameMode,
    /// Seed for tile layout, effect rolls and AI sampling (None = entropy)
    pub seed: Option<u64>,
    /// Inclusive AI "thinking" delay range in milliseconds
    pub ai_think_ms: (u64, u64),
    /// Timeouts before a seat is force-settled
    pub max_timeouts: u32,
    /// Turn allotment under a time-pressure status
    pub time_pressure_seconds: u32,
    /// Client-side item phase length, reported only
    pub item_phase_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_time_limit: DEFAULT_TURN_SECONDS as f64,
            mode: GameMode::Classic,
            seed: None,
            ai_think_ms: (1000, 2000),
            max_timeouts: 3,
            time_pressure_seconds: 5,
            item_phase_seconds: 15,
        }
    }
}

impl SessionConfig {
    /// Classic rules with the given turn limit
    pub fn classic(turn_time_limit: f64) -> Self {
        Self {
            turn_time_limit,
            ..Default::default()
        }
    }

    /// Creative rules with the given turn limit
    pub fn creative(turn_time_limit: f64) -> Self {
        Self {
            turn_time_limit,
            mode: GameMode::Creative,
            ..Default::default()
        }
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the AI thinking delay range
    pub fn with_think_ms(mut self, min: u64, max: u64) -> Self {
        self.ai_think_ms = (min.min(max), min.max(max));
        self
    }

    pub fn with_mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whole-second turn limit, falling back to 60 for non-finite or non-positive input
    pub fn effective_turn_limit(&self) -> u32 {
        let raw = self.turn_time_limit;
        if !raw.is_finite() || raw <= 0.0 {
            return DEFAULT_TURN_SECONDS;
        }
        (raw.floor() as u32).max(1)
    }

    pub fn is_creative(&self) -> bool {
        self.mode == GameMode::Creative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_limit_fallback() {
        assert_eq!(SessionConfig::classic(45.0).effective_turn_limit(), 45);
        assert_eq!(SessionConfig::classic(0.0).effective_turn_limit(), 60);
        assert_eq!(SessionConfig::classic(-3.0).effective_turn_limit(), 60);
        assert_eq!(SessionConfig::classic(f64::NAN).effective_turn_limit(), 60);
        assert_eq!(SessionConfig::classic(f64::INFINITY).effective_turn_limit(), 60);
        assert_eq!(SessionConfig::classic(0.4).effective_turn_limit(), 1);
        assert_eq!(SessionConfig::classic(30.9).effective_turn_limit(), 30);
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::creative(20.0).with_seed(9).with_think_ms(500, 100);
        assert!(config.is_creative());
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.ai_think_ms, (100, 500));
    }

    #[test]
    fn test_mode_serde() {
        let mode: GameMode = serde_json::from_str("\"creative\"").unwrap();
        assert_eq!(mode, GameMode::Creative);
        assert_eq!(serde_json::to_string(&GameMode::Classic).unwrap(), "\"classic\"");
    }
}

//! # Configuration Management Module
//!
//! Tuning knobs for the progression and economy engine: XP caps and curve
//! bases, token awards, power-up base prices, and session sequencing limits.
//! Everything has a sensible default so a missing or partial `config.toml`
//! still yields a working engine.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [xp]
//! session_cap = 150
//! daily_cap = 1000
//! session_idle_minutes = 30
//! deck_xp_base = 100
//! commander_xp_base = 100
//!
//! [tokens]
//! per_correct = 5
//! mastery_bonus = 50
//! tier_skip_cost = 200
//!
//! [powerups]
//! fifty_fifty = 25
//! retry = 20
//! hint = 15
//! time_freeze = 30
//!
//! [sessions]
//! remix_size = 10
//!
//! [storage]
//! data_dir = "data/deckforge"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::engine::types::PowerUpKind;

/// XP caps, windows, and leveling curve bases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XpConfig {
    /// Per-session XP cap; overflow is awarded at half value.
    pub session_cap: i64,
    /// Per-day XP cap; overflow is banked in the bonus vault.
    pub daily_cap: i64,
    /// Idle minutes after which the session window resets.
    pub session_idle_minutes: i64,
    /// Initial `xp_to_next` for a fresh deck (grows x1.5 per level).
    pub deck_xp_base: i64,
    /// Initial `xp_to_next` for the commander track (grows x2 per level).
    pub commander_xp_base: i64,
    /// Share of a cleared deck threshold spilled into commander XP.
    pub spillover_share: f64,
    /// Rolling accuracy required on every populated tier for deck mastery.
    pub mastery_accuracy: f64,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            session_cap: 150,
            daily_cap: 1000,
            session_idle_minutes: 30,
            deck_xp_base: 100,
            commander_xp_base: 100,
            spillover_share: 0.75,
            mastery_accuracy: 0.8,
        }
    }
}

/// Token awards and fixed costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Tokens granted per correct answer.
    pub per_correct: i64,
    /// One-time bonus on deck mastery.
    pub mastery_bonus: i64,
    /// Cost of skipping a mastery gate (also resets power-up prices).
    pub tier_skip_cost: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            per_correct: 5,
            mastery_bonus: 50,
            tier_skip_cost: 200,
        }
    }
}

/// Base prices per power-up kind; the escalating price multiplies these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerUpConfig {
    pub fifty_fifty: i64,
    pub retry: i64,
    pub hint: i64,
    pub time_freeze: i64,
}

impl Default for PowerUpConfig {
    fn default() -> Self {
        Self {
            fifty_fifty: 25,
            retry: 20,
            hint: 15,
            time_freeze: 30,
        }
    }
}

impl PowerUpConfig {
    pub fn base_price(&self, kind: PowerUpKind) -> i64 {
        match kind {
            PowerUpKind::FiftyFifty => self.fifty_fifty,
            PowerUpKind::Retry => self.retry,
            PowerUpKind::Hint => self.hint,
            PowerUpKind::TimeFreeze => self.time_freeze,
        }
    }
}

/// Session sequencing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cards per remix session.
    pub remix_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { remix_size: 10 }
    }
}

/// Where the sled store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/deckforge".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub xp: XpConfig,
    pub tokens: TokenConfig,
    pub powerups: PowerUpConfig,
    pub sessions: SessionConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file.
    pub fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.xp.session_cap <= 0 {
            return Err(anyhow!("xp.session_cap must be positive"));
        }
        if self.xp.daily_cap < self.xp.session_cap {
            return Err(anyhow!("xp.daily_cap must be at least xp.session_cap"));
        }
        if self.xp.deck_xp_base <= 0 || self.xp.commander_xp_base <= 0 {
            return Err(anyhow!("xp curve bases must be positive"));
        }
        if !(0.0..=1.0).contains(&self.xp.spillover_share) {
            return Err(anyhow!("xp.spillover_share must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.xp.mastery_accuracy) {
            return Err(anyhow!("xp.mastery_accuracy must be within [0, 1]"));
        }
        if self.tokens.per_correct < 0 || self.tokens.mastery_bonus < 0 {
            return Err(anyhow!("token awards cannot be negative"));
        }
        for kind in PowerUpKind::ALL {
            if self.powerups.base_price(kind) <= 0 {
                return Err(anyhow!("power-up base price for {} must be positive", kind));
            }
        }
        if self.sessions.remix_size == 0 {
            return Err(anyhow!("sessions.remix_size must be at least 1"));
        }
        Ok(())
    }
}

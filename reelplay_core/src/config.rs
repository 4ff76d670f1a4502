use crate::amount::Amount;
use crate::error::ConfigError;
use crate::variant::GameDefinition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotsConfig {
    pub game: GameConfig,
    pub limits: Limits,
    pub timings: Timings,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub title: String,
    pub theme_color: String,
    pub symbol_count: u8,
    /// JSON payout table; the built-in example table when absent.
    pub paytable_path: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let example = GameDefinition::example();
        Self {
            title: example.title,
            theme_color: example.theme_color,
            symbol_count: example.symbol_count,
            paytable_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_spins: u8,
    pub default_spins: u8,
    pub min_bet: Amount,
    pub max_bet: Amount,
    pub protocol_fee: Amount,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_spins: 15,
            default_spins: 10,
            min_bet: Amount::from_units(1),
            max_bet: Amount::from_units(1_000),
            protocol_fee: Amount::ZERO,
        }
    }
}

/// Presentation delays. The core only hands them back in timer requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    #[serde(with = "humantime_serde")]
    pub spin_animation: Duration,
    #[serde(with = "humantime_serde")]
    pub next_spin: Duration,
    #[serde(with = "humantime_serde")]
    pub win_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub loss_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            spin_animation: Duration::from_millis(1000),
            next_spin: Duration::from_millis(500),
            win_settle: Duration::from_millis(1500),
            loss_settle: Duration::from_millis(800),
        }
    }
}

impl Timings {
    pub fn settle_delay(&self, won: bool) -> Duration {
        if won {
            self.win_settle
        } else {
            self.loss_settle
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl SlotsConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: SlotsConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_spins == 0 {
            return Err(ConfigError::Invalid("limits.max_spins must be positive".into()));
        }
        if self.limits.default_spins == 0 || self.limits.default_spins > self.limits.max_spins {
            return Err(ConfigError::Invalid(
                "limits.default_spins must be within 1..=max_spins".into(),
            ));
        }
        if self.limits.min_bet > self.limits.max_bet {
            return Err(ConfigError::Invalid("limits.min_bet exceeds limits.max_bet".into()));
        }
        Ok(())
    }

    /// Builds the game variant this config selects.
    pub fn game_definition(&self) -> Result<GameDefinition, ConfigError> {
        let mut def = GameDefinition {
            title: self.game.title.clone(),
            theme_color: self.game.theme_color.clone(),
            symbol_count: self.game.symbol_count,
            ..GameDefinition::example()
        };
        if let Some(path) = &self.game.paytable_path {
            def = def.with_paytable_file(path)?;
        }
        def.validate()?;
        Ok(def)
    }
}

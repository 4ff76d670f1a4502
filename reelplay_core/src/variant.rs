use crate::error::ConfigError;
use crate::paytable::Paytable;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a game variant supplies to a session: its table, its symbol set and
/// its accent colour.
pub trait GameVariant: Send + Sync {
    fn title(&self) -> &str;
    fn payout_table(&self) -> &Paytable;
    fn symbol_count(&self) -> u8;
    fn theme_color(&self) -> &str;
}

/// A variant defined by data, usually loaded from config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Settlement contract or oracle address, informational.
    #[serde(default)]
    pub game_address: String,
    pub theme_color: String,
    pub symbol_count: u8,
    #[serde(default)]
    pub payouts: Paytable,
}

impl GameDefinition {
    pub fn example() -> Self {
        Self {
            title: "Example Slots".to_string(),
            description: "Three reels, six symbols, up to fifteen spins per session.".to_string(),
            game_address: String::new(),
            theme_color: "#F4C542".to_string(),
            symbol_count: 6,
            payouts: Paytable::example_default(),
        }
    }

    /// Replaces the table with one read from a JSON file.
    pub fn with_paytable_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.payouts = serde_json::from_str(&text)?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol_count == 0 {
            return Err(ConfigError::Invalid("symbol_count must be positive".into()));
        }
        if let Some(top) = self.payouts.highest_symbol() {
            if top >= self.symbol_count {
                return Err(ConfigError::Invalid(format!(
                    "paytable uses symbol {top} but the game has {} symbols",
                    self.symbol_count
                )));
            }
        }
        Ok(())
    }
}

impl Default for GameDefinition {
    fn default() -> Self {
        Self::example()
    }
}

impl GameVariant for GameDefinition {
    fn title(&self) -> &str {
        &self.title
    }

    fn payout_table(&self) -> &Paytable {
        &self.payouts
    }

    fn symbol_count(&self) -> u8 {
        self.symbol_count
    }

    fn theme_color(&self) -> &str {
        &self.theme_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paytable::PaytableEntry;

    #[test]
    fn example_is_consistent() {
        assert!(GameDefinition::example().validate().is_ok());
    }

    #[test]
    fn table_symbols_must_exist() {
        let mut def = GameDefinition::example();
        def.payouts = Paytable::from_entries([PaytableEntry {
            symbols: [7, 7, 7],
            multiplier: 1,
        }]);
        assert!(def.validate().is_err());
    }
}

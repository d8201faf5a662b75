use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Catalog, CatalogError};

const DEFAULT_ROUND_LIMIT: u32 = 12;
const DEFAULT_STARTING_CASH: i64 = 5000;
const DEFAULT_EVENT_CHANCE: f64 = 0.7;
const DEFAULT_MIN_PLAYERS: usize = 1;
const DEFAULT_MAX_PLAYERS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("event_chance must be within [0, 1] (got {value})")]
    EventChanceOutOfRange { value: f64 },
    #[error("max_players must be >= min_players (min={min}, max={max})")]
    PlayerBounds { min: usize, max: usize },
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// Match settings loaded from YAML.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_round_limit")]
    pub round_limit: u32,
    #[serde(default = "default_starting_cash")]
    pub starting_cash: i64,
    /// Probability that an account's turn draws an event at all.
    #[serde(default = "default_event_chance")]
    pub event_chance: f64,
    #[serde(default = "default_min_players")]
    pub min_players: usize,
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Unset means a pending decision waits forever.
    #[serde(default)]
    pub decision_timeout_ms: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Replaces the standard catalog when present.
    #[serde(default)]
    pub catalog: Option<Catalog>,
}

fn default_round_limit() -> u32 {
    DEFAULT_ROUND_LIMIT
}

fn default_starting_cash() -> i64 {
    DEFAULT_STARTING_CASH
}

fn default_event_chance() -> f64 {
    DEFAULT_EVENT_CHANCE
}

fn default_min_players() -> usize {
    DEFAULT_MIN_PLAYERS
}

fn default_max_players() -> usize {
    DEFAULT_MAX_PLAYERS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_limit: DEFAULT_ROUND_LIMIT,
            starting_cash: DEFAULT_STARTING_CASH,
            event_chance: DEFAULT_EVENT_CHANCE,
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
            seed: None,
            decision_timeout_ms: None,
            log_level: default_log_level(),
            catalog: None,
        }
    }
}

impl GameConfig {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_limit == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "round_limit",
                value: 0,
            });
        }
        if self.min_players == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "min_players",
                value: 0,
            });
        }
        if !(0.0..=1.0).contains(&self.event_chance) {
            return Err(ConfigError::EventChanceOutOfRange {
                value: self.event_chance,
            });
        }
        if self.max_players < self.min_players {
            return Err(ConfigError::PlayerBounds {
                min: self.min_players,
                max: self.max_players,
            });
        }
        if let Some(catalog) = &self.catalog {
            catalog.validate()?;
        }
        Ok(())
    }

    /// Configured catalog, or the standard one.
    pub fn catalog(&self) -> Catalog {
        self.catalog.clone().unwrap_or_else(Catalog::standard)
    }
}

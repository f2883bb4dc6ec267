//! Engine configuration.
//!
//! Loaded from TOML; every key is optional and falls back to the
//! defaults below.
//!
//! ```toml
//! risk_free_rate = 0.065
//! days_to_expiry = 3
//! around_atm = 5
//! strikes_limit = 11
//! nearest_expiry_only = true
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::black_scholes::DEFAULT_RISK_FREE_RATE;
use crate::signal::window::{DEFAULT_AROUND_ATM, DEFAULT_STRIKES_LIMIT};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Parameters for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Annual risk-free rate (decimal).
    pub risk_free_rate: f64,

    /// Trading days to expiry. When unset, derived from the snapshot's
    /// nearest expiry.
    pub days_to_expiry: Option<f64>,

    /// Strikes on each side of ATM.
    pub around_atm: usize,

    /// Maximum strikes in the window.
    pub strikes_limit: usize,

    /// Only look at rows of the nearest listed expiry.
    pub nearest_expiry_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            days_to_expiry: None,
            around_atm: DEFAULT_AROUND_ATM,
            strikes_limit: DEFAULT_STRIKES_LIMIT,
            nearest_expiry_only: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        if let Some(days) = self.days_to_expiry {
            if !days.is_finite() || days < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "days_to_expiry must be a non-negative number, got {}",
                    days
                )));
            }
        }
        if self.strikes_limit == 0 {
            return Err(ConfigError::Invalid(
                "strikes_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

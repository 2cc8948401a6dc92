//! Engine Configuration
//!
//! JSON document, every field optional.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub pricing: PricePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePolicy {
    #[serde(default = "default_decimal_places")]
    pub max_decimal_places: u32,
    #[serde(default)]
    pub max_price: Option<Decimal>,
}

fn default_decimal_places() -> u32 { 2 }

impl Default for PricePolicy {
    fn default() -> Self {
        Self {
            max_decimal_places: default_decimal_places(),
            max_price: None,
        }
    }
}

impl PricePolicy {
    /// Message for a price the policy refuses, if any.
    pub fn check(&self, price: Decimal) -> Option<String> {
        if price.is_sign_negative() && !price.is_zero() {
            return Some("Price cannot be negative.".to_string());
        }
        if price.normalize().scale() > self.max_decimal_places {
            return Some(format!(
                "Price may have at most {} decimal places.",
                self.max_decimal_places
            ));
        }
        match self.max_price {
            Some(max) if price > max => Some(format!("Price may not exceed {}.", max)),
            _ => None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pricing.max_decimal_places > 28 {
            return Err(ConfigError::Invalid(
                "pricing.maxDecimalPlaces must be at most 28".into(),
            ));
        }
        if let Some(max) = self.pricing.max_price {
            if max.is_sign_negative() && !max.is_zero() {
                return Err(ConfigError::Invalid("pricing.maxPrice cannot be negative".into()));
            }
        }
        Ok(())
    }
}

//! Protocol configuration and parameters.
//!
//! Parameters are fixed when a protocol instance is created. They can be
//! loaded from a JSON file and overridden through `CLEARN_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable protocol parameters (set at deployment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Protocol version
    pub version: String,

    /// Decimal places of the CLEARN credit token
    pub credit_decimals: u8,

    /// Length of one reward emission window in seconds
    pub reward_period_secs: u64,

    /// Reject oracle answers older than this many seconds.
    /// `None` accepts any answer.
    pub max_price_age_secs: Option<u64>,

    /// Protocol events kept in memory
    pub max_events: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            credit_decimals: CREDIT_DECIMALS,
            reward_period_secs: REWARD_PERIOD_SECS,
            max_price_age_secs: None,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl ProtocolParams {
    /// Create with a custom reward period (for testing)
    pub fn with_reward_period(mut self, secs: u64) -> Self {
        self.reward_period_secs = secs;
        self
    }

    /// Create with an oracle staleness bound
    pub fn with_max_price_age(mut self, secs: u64) -> Self {
        self.max_price_age_secs = Some(secs);
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        if self.credit_decimals > MAX_DECIMALS {
            return Err(Error::Config(format!(
                "credit_decimals {} exceeds maximum {}",
                self.credit_decimals, MAX_DECIMALS
            )));
        }
        if self.reward_period_secs == 0 {
            return Err(Error::Config("reward_period_secs must be greater than 0".into()));
        }
        if self.max_events == 0 {
            return Err(Error::Config("max_events must be greater than 0".into()));
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let params: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("{}: {}", parent.display(), e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `CLEARN_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(secs) = env_var("CLEARN_REWARD_PERIOD_SECS")? {
            self.reward_period_secs = secs;
        }
        if let Some(decimals) = env_var("CLEARN_CREDIT_DECIMALS")? {
            self.credit_decimals = decimals;
        }
        if let Some(age) = env_var("CLEARN_MAX_PRICE_AGE_SECS")? {
            self.max_price_age_secs = Some(age);
        }
        if let Some(max_events) = env_var("CLEARN_MAX_EVENTS")? {
            self.max_events = max_events;
        }
        self.validate()?;
        Ok(self)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }
}

fn env_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has invalid value {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

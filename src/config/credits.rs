//! Credit configuration loading from config.toml
//!
//! Holds the starting balance for new wallets, the manual transfer policy and
//! the session price table. Every field is optional in the file; missing
//! values fall back to the platform defaults, and the `INITIAL_CREDITS`
//! environment variable overrides the starting balance.

use crate::{
    core::pricing::PriceTable,
    entities::{SessionDuration, SessionLevel},
    errors::{Error, Result},
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Starting balance used when neither the file nor the environment sets one
pub const DEFAULT_INITIAL_CREDITS: i64 = 10;

/// Environment variable overriding `initial_credits`
pub const INITIAL_CREDITS_ENV: &str = "INITIAL_CREDITS";

/// Who may move credits outside of session completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualTransferPolicy {
    /// Nobody; credits only move when sessions complete
    Disabled,
    /// Staff only
    #[default]
    PrivilegedOnly,
    /// Any user, from their own wallet
    Everyone,
}

/// One price override in config.toml
#[derive(Debug, Deserialize, Clone)]
pub struct PriceConfig {
    /// Session length in minutes (60, 90 or 120)
    pub duration: u32,
    /// Session level
    pub level: SessionLevel,
    /// Price in credits
    pub credits: i64,
}

/// Structure of config.toml as written on disk
#[derive(Debug, Deserialize, Default)]
pub struct RawCreditsConfig {
    /// Starting balance for new wallets
    pub initial_credits: Option<i64>,
    /// Manual transfer policy
    #[serde(default)]
    pub manual_transfers: ManualTransferPolicy,
    /// Price for combinations missing from the table
    pub default_price: Option<i64>,
    /// Overrides on top of the standard price table
    #[serde(default)]
    pub prices: Vec<PriceConfig>,
}

/// Validated credit settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditsConfig {
    /// Starting balance for new wallets
    pub initial_credits: i64,
    /// Manual transfer policy
    pub manual_transfers: ManualTransferPolicy,
    /// Session price table
    pub prices: PriceTable,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            initial_credits: DEFAULT_INITIAL_CREDITS,
            manual_transfers: ManualTransferPolicy::default(),
            prices: PriceTable::standard(),
        }
    }
}

impl TryFrom<RawCreditsConfig> for CreditsConfig {
    type Error = Error;

    fn try_from(raw: RawCreditsConfig) -> Result<Self> {
        let initial_credits = raw.initial_credits.unwrap_or(DEFAULT_INITIAL_CREDITS);
        if initial_credits < 0 {
            return Err(Error::Config {
                message: format!("initial_credits cannot be negative, got {initial_credits}"),
            });
        }

        let mut prices = match raw.default_price {
            Some(fallback) => PriceTable::standard().with_fallback(fallback)?,
            None => PriceTable::standard(),
        };

        for entry in raw.prices {
            let duration =
                SessionDuration::from_minutes(entry.duration).ok_or_else(|| Error::Config {
                    message: format!("Unsupported session duration {} minutes", entry.duration),
                })?;
            prices.set_price(duration, entry.level, entry.credits)?;
        }

        Ok(Self {
            initial_credits,
            manual_transfers: raw.manual_transfers,
            prices,
        })
    }
}

/// Parses and validates credit settings from TOML text
pub fn parse_config(contents: &str) -> Result<CreditsConfig> {
    let raw: RawCreditsConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    raw.try_into()
}

/// Loads credit settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A price, duration or starting balance is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CreditsConfig> {
    debug!("Loading credit configuration from {:?}", path.as_ref());
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads ./config.toml if present, otherwise the defaults, then applies the
/// `INITIAL_CREDITS` override.
pub fn load_default_config() -> Result<CreditsConfig> {
    let path = Path::new("config.toml");
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        info!("No config.toml found, using default credit settings");
        CreditsConfig::default()
    };

    if let Some(initial_credits) = initial_credits_from_env()? {
        config.initial_credits = initial_credits;
    }

    Ok(config)
}

/// Reads the `INITIAL_CREDITS` override, `None` when unset
pub fn initial_credits_from_env() -> Result<Option<i64>> {
    match std::env::var(INITIAL_CREDITS_ENV) {
        Ok(value) => {
            let credits = value.trim().parse::<i64>().map_err(|e| Error::Config {
                message: format!("{INITIAL_CREDITS_ENV} must be an integer: {e}"),
            })?;
            if credits < 0 {
                return Err(Error::Config {
                    message: format!("{INITIAL_CREDITS_ENV} cannot be negative, got {credits}"),
                });
            }
            Ok(Some(credits))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

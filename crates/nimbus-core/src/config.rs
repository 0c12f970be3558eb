//! Central configuration loaded from the environment.
//!
//! Every tool reads the same keys; binaries layer command-line flags on
//! top of the result.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::constants::{
    BASE_DENOM, DEFAULT_GAS_PRICE_UUSD, DEFAULT_ORACLE_STALE_THRESHOLD_SECS,
    DEFAULT_RETARGET_INTERVAL_SECS, EMA_TAU_BLOCKS, NetworkType,
};
use crate::decimal::Rational;
use crate::error::ConfigError;

/// Signing identity handed to the signer collaborator.
#[derive(Clone, PartialEq, Eq)]
pub enum Identity {
    Mnemonic(String),
    KeyFile(PathBuf),
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mnemonic(_) => f.write_str("Mnemonic(<redacted>)"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NimbusConfig {
    pub network: NetworkType,
    pub chain_id: String,
    pub lcd_url: String,
    pub identity: Option<Identity>,
    /// Gas price per denom.
    pub chain_gas_prices: BTreeMap<String, Rational>,
    pub retarget_interval_secs: u64,
    pub ema_tau_blocks: i64,
    pub oracle_stale_threshold_secs: u64,
    /// Endpoint of the signing sidecar, if transactions are sent.
    pub signer_url: Option<String>,
}

impl NimbusConfig {
    /// Defaults for `network` with no identity.
    pub fn for_network(network: NetworkType) -> Self {
        let mut chain_gas_prices = BTreeMap::new();
        if let Ok(price) = DEFAULT_GAS_PRICE_UUSD.parse() {
            chain_gas_prices.insert(BASE_DENOM.to_string(), price);
        }
        Self {
            network,
            chain_id: network.default_chain_id().to_string(),
            lcd_url: network.default_lcd_url().to_string(),
            identity: None,
            chain_gas_prices,
            retarget_interval_secs: DEFAULT_RETARGET_INTERVAL_SECS,
            ema_tau_blocks: EMA_TAU_BLOCKS,
            oracle_stale_threshold_secs: DEFAULT_ORACLE_STALE_THRESHOLD_SECS,
            signer_url: None,
        }
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a key to its value.
    ///
    /// `NETWORK` wins over `USE_TESTNET`. `MNEMONIC` and `KEY_FILE` are
    /// mutually exclusive.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let network = match get("NETWORK") {
            Some(name) => name.parse().map_err(|reason| ConfigError::Invalid {
                key: "NETWORK",
                reason,
            })?,
            None if get("USE_TESTNET").is_some_and(|v| is_truthy(&v)) => NetworkType::Testnet,
            None => NetworkType::Mainnet,
        };
        let mut config = Self::for_network(network);

        if let Some(chain_id) = get("CHAIN_ID") {
            config.chain_id = chain_id;
        }
        if let Some(lcd_url) = get("LCD_URL") {
            config.lcd_url = lcd_url.trim_end_matches('/').to_string();
        }

        config.identity = match (get("MNEMONIC"), get("KEY_FILE")) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid {
                    key: "MNEMONIC",
                    reason: "set either MNEMONIC or KEY_FILE, not both".to_string(),
                });
            }
            (Some(words), None) => Some(Identity::Mnemonic(words)),
            (None, Some(path)) => Some(Identity::KeyFile(PathBuf::from(path))),
            (None, None) => None,
        };

        if let Some(spec) = get("GAS_PRICES") {
            config.chain_gas_prices = parse_gas_prices(&spec)?;
        }
        if let Some(v) = get("RETARGET_INTERVAL_SECS") {
            config.retarget_interval_secs = parse_field("RETARGET_INTERVAL_SECS", &v)?;
            if config.retarget_interval_secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "RETARGET_INTERVAL_SECS",
                    reason: "must be positive".to_string(),
                });
            }
        }
        if let Some(v) = get("EMA_TAU_BLOCKS") {
            config.ema_tau_blocks = parse_field("EMA_TAU_BLOCKS", &v)?;
            if config.ema_tau_blocks >= 0 {
                return Err(ConfigError::Invalid {
                    key: "EMA_TAU_BLOCKS",
                    reason: "must be negative".to_string(),
                });
            }
        }
        if let Some(v) = get("ORACLE_STALE_THRESHOLD_SECS") {
            config.oracle_stale_threshold_secs = parse_field("ORACLE_STALE_THRESHOLD_SECS", &v)?;
        }
        config.signer_url = get("SIGNER_URL");

        Ok(config)
    }

    /// Fail unless an identity is configured.
    pub fn require_identity(&self) -> Result<&Identity, ConfigError> {
        self.identity
            .as_ref()
            .ok_or(ConfigError::Missing { key: "MNEMONIC" })
    }
}

impl Default for NimbusConfig {
    fn default() -> Self {
        Self::for_network(NetworkType::default())
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_field<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

/// Parse `uusd=0.15,uluna=0.011`.
pub fn parse_gas_prices(spec: &str) -> Result<BTreeMap<String, Rational>, ConfigError> {
    let mut prices = BTreeMap::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (denom, price) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
            key: "GAS_PRICES",
            reason: format!("expected denom=price, got {entry:?}"),
        })?;
        let price: Rational = parse_field("GAS_PRICES", price)?;
        if price.is_negative() {
            return Err(ConfigError::Invalid {
                key: "GAS_PRICES",
                reason: format!("negative price for {denom}"),
            });
        }
        prices.insert(denom.trim().to_string(), price);
    }
    Ok(prices)
}

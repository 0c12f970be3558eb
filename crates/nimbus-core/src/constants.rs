//! Protocol and bot constants. Token amounts are in micro-units of their denom.

use std::fmt;
use std::str::FromStr;

/// Time constant of the notional-value EMA, in blocks.
///
/// Negative so that `exp(Δb / τ)` decays toward zero as blocks pass.
pub const EMA_TAU_BLOCKS: i64 = -600;

/// Scale constant `C` used when converting a weight into a unit target:
/// `amount = ⌊C · w / price⌋`.
pub const TARGET_SCALE: u128 = 100_000_000;

/// Decimal places kept by [`Rational::exp`](crate::Rational::exp).
pub const EXP_DECIMALS: u32 = 18;

/// Working precision (decimal places) of the integer Taylor series inside `exp`.
pub const EXP_WORK_DECIMALS: u32 = 36;

/// Below `exp(-EXP_UNDERFLOW)` the truncated result is exactly zero.
///
/// `e^-42 ≈ 5.7e-19`, which is already below one unit in the 18th decimal.
pub const EXP_UNDERFLOW: u64 = 42;

/// Maximum decimal places printed by `Display` for [`Rational`](crate::Rational).
pub const DISPLAY_DECIMALS: u32 = 18;

/// Default retarget period: 24 hours.
pub const DEFAULT_RETARGET_INTERVAL_SECS: u64 = 86_400;

/// A tick is given the period minus this margin before it is abandoned.
pub const TICK_TIMEOUT_MARGIN_SECS: u64 = 60;

/// Default maximum age of a pricing-oracle quote.
pub const DEFAULT_ORACLE_STALE_THRESHOLD_SECS: u64 = 3_600;

/// Block time used by the simulator when advancing the clock.
pub const BLOCK_TIME_SECS: u64 = 6;

/// Base denom in which prices and notional values are quoted.
pub const BASE_DENOM: &str = "uusd";

/// Default gas price for the base denom.
pub const DEFAULT_GAS_PRICE_UUSD: &str = "0.15";

/// Network the tools talk to.
///
/// Controls the default chain id and LCD endpoint.
///
/// # Examples
///
/// ```
/// use nimbus_core::constants::NetworkType;
/// let net: NetworkType = "testnet".parse().unwrap();
/// assert_eq!(net.default_chain_id(), "bombay-12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkType {
    /// A LocalTerra instance on this machine.
    Local,
    /// Public test network.
    Testnet,
    /// Production network.
    #[default]
    Mainnet,
}

impl NetworkType {
    /// Chain id used when `CHAIN_ID` is not set.
    pub fn default_chain_id(&self) -> &'static str {
        match self {
            Self::Local => "localterra",
            Self::Testnet => "bombay-12",
            Self::Mainnet => "columbus-5",
        }
    }

    /// LCD endpoint used when `LCD_URL` is not set.
    pub fn default_lcd_url(&self) -> &'static str {
        match self {
            Self::Local => "http://localhost:1317",
            Self::Testnet => "https://bombay-lcd.terra.dev",
            Self::Mainnet => "https://lcd.terra.dev",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet",
        };
        f.write_str(name)
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "localterra" => Ok(Self::Local),
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

//! Core cluster types: asset identifiers, targets, quotes, penalty parameters.
//!
//! Integer amounts are `u128` micro-units and travel over the wire as
//! decimal strings, following the CosmWasm `Uint128` convention.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::Rational;
use crate::error::ClusterError;

/// Serde adapter for `u128` as a decimal string (numbers are accepted too).
pub mod uint128 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(v)
    }

    struct U128Visitor;

    impl Visitor<'_> for U128Visitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned integer or decimal string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.trim().parse().map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v as u128)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(E::custom)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        d.deserialize_any(U128Visitor)
    }
}

/// Serde adapter for `Option<u128>` as an optional decimal string.
pub mod opt_uint128 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wrapped(#[serde(with = "super::uint128")] u128);

    pub fn serialize<S: Serializer>(v: &Option<u128>, s: S) -> Result<S::Ok, S::Error> {
        v.map(Wrapped).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u128>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(d)?.map(|w| w.0))
    }
}

/// Serde adapter for `Vec<u128>` as a list of decimal strings.
pub mod uint128_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wrapped(#[serde(with = "super::uint128")] u128);

    pub fn serialize<S: Serializer>(v: &[u128], s: S) -> Result<S::Ok, S::Error> {
        let wrapped: Vec<Wrapped> = v.iter().copied().map(Wrapped).collect();
        wrapped.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u128>, D::Error> {
        Ok(Vec::<Wrapped>::deserialize(d)?.into_iter().map(|w| w.0).collect())
    }
}

/// Identifier of a cluster asset: a native chain denom or a CW20 contract.
///
/// Serializes as `{"native_token": {"denom": ..}}` or
/// `{"token": {"contract_addr": ..}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssetInfo {
    Token { contract_addr: String },
    NativeToken { denom: String },
}

impl AssetInfo {
    pub fn native(denom: impl Into<String>) -> Self {
        Self::NativeToken {
            denom: denom.into(),
        }
    }

    pub fn token(contract_addr: impl Into<String>) -> Self {
        Self::Token {
            contract_addr: contract_addr.into(),
        }
    }

    /// Denom or contract address; unique within a cluster.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Token { contract_addr } => contract_addr,
            Self::NativeToken { denom } => denom,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::NativeToken { .. })
    }
}

impl fmt::Display for AssetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token { contract_addr } => write!(f, "cw20:{contract_addr}"),
            Self::NativeToken { denom } => write!(f, "native:{denom}"),
        }
    }
}

/// An amount of one asset. Used both for deposits and for target entries.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Asset {
    pub info: AssetInfo,
    #[serde(with = "uint128")]
    pub amount: u128,
}

impl Asset {
    pub fn new(info: AssetInfo, amount: u128) -> Self {
        Self { info, amount }
    }
}

/// Desired cluster composition as `(asset, unit amount)` pairs.
///
/// The amounts are unit targets, not percentages: the weight vector is
/// recovered by pricing them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Target(Vec<Asset>);

impl Target {
    /// Build a validated target.
    pub fn new(entries: Vec<Asset>) -> Result<Self, ClusterError> {
        let target = Self(entries);
        target.validate()?;
        Ok(target)
    }

    /// Non-empty, unique identifiers, and at least one non-zero amount.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.0.is_empty() {
            return Err(ClusterError::InvalidInput("target is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for entry in &self.0 {
            if !seen.insert(entry.info.identifier()) {
                return Err(ClusterError::InvalidInput(format!(
                    "duplicate target asset: {}",
                    entry.info
                )));
            }
        }
        if self.0.iter().all(|e| e.amount == 0) {
            return Err(ClusterError::InvalidInput(
                "target amounts are all zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn entries(&self) -> &[Asset] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<Asset> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn assets(&self) -> Vec<AssetInfo> {
        self.0.iter().map(|e| e.info.clone()).collect()
    }

    pub fn amounts(&self) -> Vec<u128> {
        self.0.iter().map(|e| e.amount).collect()
    }

    pub fn position(&self, info: &AssetInfo) -> Option<usize> {
        self.0.iter().position(|e| e.info.identifier() == info.identifier())
    }
}

/// A pricing-oracle quote in the base denom.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: Rational,
    /// Unix seconds of the last oracle update.
    pub last_updated: u64,
}

/// One sample of a price history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PricePoint {
    /// Unix seconds.
    pub timestamp: u64,
    pub price: Rational,
}

/// Sampling interval requested from a price-history endpoint.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryInterval {
    Hourly,
    Daily,
}

impl HistoryInterval {
    pub fn seconds(&self) -> u64 {
        match self {
            Self::Hourly => 3_600,
            Self::Daily => 86_400,
        }
    }
}

/// Equity-style fundamentals for an asset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Fundamentals {
    pub trailing_pe: Option<Rational>,
    pub market_cap: Option<Rational>,
}

/// Native funds attached to a transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "uint128")]
    pub amount: u128,
}

/// Block context of an engine operation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BlockInfo {
    pub height: u64,
    /// Unix seconds.
    pub time: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// Outcome of a confirmed transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct TxResult {
    pub txhash: String,
    pub height: u64,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl TxResult {
    /// Value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Economic parameters of the penalty/reward schedule.
///
/// Cutoffs are fractions of the reference notional `e`; amounts are rates
/// applied to changes in imbalance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PenaltyParams {
    pub penalty_amt_lo: Rational,
    pub penalty_amt_hi: Rational,
    pub penalty_cutoff_lo: Rational,
    pub penalty_cutoff_hi: Rational,
    pub reward_amt: Rational,
    pub reward_cutoff: Rational,
}

impl Default for PenaltyParams {
    fn default() -> Self {
        Self {
            penalty_amt_lo: Rational::percent(10),
            penalty_amt_hi: Rational::percent(50),
            penalty_cutoff_lo: Rational::percent(1),
            penalty_cutoff_hi: Rational::percent(10),
            reward_amt: Rational::percent(5),
            reward_cutoff: Rational::percent(2),
        }
    }
}

impl PenaltyParams {
    pub fn validate(&self) -> Result<(), ClusterError> {
        let fields = [
            ("penalty_amt_lo", &self.penalty_amt_lo),
            ("penalty_amt_hi", &self.penalty_amt_hi),
            ("penalty_cutoff_lo", &self.penalty_cutoff_lo),
            ("penalty_cutoff_hi", &self.penalty_cutoff_hi),
            ("reward_amt", &self.reward_amt),
            ("reward_cutoff", &self.reward_cutoff),
        ];
        for (name, value) in fields {
            if value.is_negative() {
                return Err(ClusterError::InvalidInput(format!("{name} is negative")));
            }
        }
        if self.penalty_cutoff_lo > self.penalty_cutoff_hi {
            return Err(ClusterError::InvalidInput(
                "penalty_cutoff_lo exceeds penalty_cutoff_hi".to_string(),
            ));
        }
        if self.penalty_amt_lo > self.penalty_amt_hi {
            return Err(ClusterError::InvalidInput(
                "penalty_amt_lo exceeds penalty_amt_hi".to_string(),
            ));
        }
        Ok(())
    }
}

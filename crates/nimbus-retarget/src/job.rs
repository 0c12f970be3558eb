//! Job file: which clusters a bot drives and how.
//!
//! ```json
//! {
//!   "jobs": [{
//!     "address": "terra1...",
//!     "symbol": "TER",
//!     "universe": [{"info": {"native_token": {"denom": "uluna"}}, "feed_id": "terra-luna"}],
//!     "policy": {"kind": "market_cap"}
//!   }]
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use nimbus_core::constants::TARGET_SCALE;
use nimbus_core::error::{ConfigError, NimbusError};
use nimbus_core::types::uint128;
use serde::{Deserialize, Serialize};

use crate::policy::PolicySpec;
use crate::universe::UniverseAsset;

fn default_scale() -> u128 {
    TARGET_SCALE
}

/// One cluster driven by a retargeter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Cluster contract address.
    pub address: String,
    /// Cluster symbol tag, selectable from the command line.
    pub symbol: String,
    pub universe: Vec<UniverseAsset>,
    pub policy: PolicySpec,
    /// Scale constant `C` of the weight-to-amount conversion.
    #[serde(default = "default_scale", with = "uint128")]
    pub scale: u128,
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid {
        key: "jobs",
        reason,
    }
}

impl Job {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() {
            return Err(invalid(format!("{}: empty universe", self.symbol)));
        }
        if self.scale == 0 {
            return Err(invalid(format!("{}: scale must be positive", self.symbol)));
        }
        let mut ids = BTreeSet::new();
        let mut infos = BTreeSet::new();
        for asset in &self.universe {
            if !ids.insert(asset.feed_id.as_str()) || !infos.insert(asset.info.identifier()) {
                return Err(invalid(format!(
                    "{}: {} appears twice in the universe",
                    self.symbol, asset.feed_id
                )));
            }
        }
        if let PolicySpec::Activation { reserve, .. } = &self.policy {
            if infos.contains(reserve.info.identifier()) {
                return Err(invalid(format!(
                    "{}: reserve {} is also in the universe",
                    self.symbol, reserve.feed_id
                )));
            }
        }
        self.policy.validate()
    }

    /// Whether `selector` names this job by address or by symbol tag.
    pub fn matches(&self, selector: &str) -> bool {
        self.address == selector || self.symbol.eq_ignore_ascii_case(selector)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self, NimbusError> {
        let bytes = fs::read(path)?;
        let file: Self = serde_json::from_slice(&bytes)?;
        for job in &file.jobs {
            job.validate()?;
        }
        Ok(file)
    }

    /// Jobs named by `selectors`; all jobs when none are given.
    ///
    /// A selector that names no job is an error.
    pub fn select(&self, selectors: &[String]) -> Result<Vec<Job>, ConfigError> {
        if selectors.is_empty() {
            return Ok(self.jobs.clone());
        }
        for selector in selectors {
            if !self.jobs.iter().any(|j| j.matches(selector)) {
                return Err(ConfigError::Invalid {
                    key: "selector",
                    reason: format!("no job matches {selector}"),
                });
            }
        }
        Ok(self
            .jobs
            .iter()
            .filter(|j| selectors.iter().any(|s| j.matches(s)))
            .cloned()
            .collect())
    }
}

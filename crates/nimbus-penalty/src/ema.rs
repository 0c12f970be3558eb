//! Exponential moving average of cluster notional value.
//!
//! ```text
//! ema' = ema · exp(Δb / τ) + nav · (1 − exp(Δb / τ))
//! ```
//!
//! `τ` is negative, so the weight on the old value decays as blocks pass.

use nimbus_core::Rational;
use nimbus_core::constants::{EMA_TAU_BLOCKS, EXP_DECIMALS};
use serde::{Deserialize, Serialize};

/// Serializable snapshot of the penalty state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct PenaltyState {
    pub ema: Rational,
    pub last_block: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmaTracker {
    ema: Rational,
    last_block: u64,
    tau: i64,
}

impl Default for EmaTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EmaTracker {
    pub fn new() -> Self {
        Self::with_tau(EMA_TAU_BLOCKS)
    }

    /// Tracker with a custom time constant. `tau` must be negative.
    pub(crate) fn with_tau(tau: i64) -> Self {
        Self {
            ema: Rational::zero(),
            last_block: 0,
            tau,
        }
    }

    pub fn ema(&self) -> &Rational {
        &self.ema
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    pub fn tau(&self) -> i64 {
        self.tau
    }

    pub fn state(&self) -> PenaltyState {
        PenaltyState {
            ema: self.ema.clone(),
            last_block: self.last_block,
        }
    }

    /// Weight kept by the previous EMA after moving to `height`.
    ///
    /// A height below `last_block` counts as no elapsed blocks.
    pub fn decay_factor(&self, height: u64) -> Rational {
        let elapsed = height.saturating_sub(self.last_block);
        match Rational::from_ratio(elapsed as i128, self.tau as i128) {
            Some(exponent) => exponent.exp(),
            None => Rational::one(),
        }
    }

    /// EMA projected to `height` against `nav`, without recording it.
    pub fn at(&self, height: u64, nav: &Rational) -> Rational {
        if self.last_block == 0 {
            return nav.clone();
        }
        let factor = self.decay_factor(height);
        &factor * &self.ema + (Rational::one() - &factor) * nav
    }

    /// Record the projected EMA at `height`.
    ///
    /// The stored value is truncated to 18 decimals, matching on-chain
    /// fixed-point state.
    pub fn update(&mut self, height: u64, nav: &Rational) {
        self.ema = self.at(height, nav).truncate(EXP_DECIMALS);
        self.last_block = self.last_block.max(height);
    }
}

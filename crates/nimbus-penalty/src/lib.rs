//! # nimbus-penalty — Imbalance penalty and reward model.
//!
//! All calculations use exact rationals; the only rounding is the
//! 18-decimal truncation of `exp` inside the EMA.
//!
//! - **Imbalance scoring**: a move that worsens alignment pays the integral
//!   of a flat–linear–flat penalty schedule; a move that improves it earns a
//!   flat reward above a cutoff.
//! - **Reference notional**: cutoffs scale with `e = min(ema, nav)`, so a
//!   sudden notional increase does not widen them until it is amortized.
//! - **EMA**: single-pole filter over notional value keyed by block height.

pub mod ema;
pub mod model;

pub use ema::{EmaTracker, PenaltyState};
pub use model::PenaltyModel;
pub use nimbus_core::types::PenaltyParams;

//! Penalty model implementing the [`PenaltyCalculator`] trait.
//!
//! The schedule, as a function of imbalance `x` with reference notional `e`:
//!
//! ```text
//! rate(x) = amt_lo                                   x ≤ cutoff_lo·e
//!         = linear from amt_lo to amt_hi             cutoff_lo·e < x ≤ cutoff_hi·e
//!         = amt_hi                                   x > cutoff_hi·e
//! ```
//!
//! A worsening move `imb0 → imb1` pays `∫ rate(x) dx` over `[imb0, imb1]`.
//! An improving move earns `reward_amt` per unit of imbalance removed above
//! `reward_cutoff·e`.

use std::cmp::{max, min};

use nimbus_core::error::ClusterError;
use nimbus_core::math::{dot, imbalance};
use nimbus_core::traits::PenaltyCalculator;
use nimbus_core::types::PenaltyParams;
use nimbus_core::Rational;
use tracing::trace;

use crate::ema::{EmaTracker, PenaltyState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PenaltyModel {
    params: PenaltyParams,
    ema: EmaTracker,
}

fn clamp(x: &Rational, lo: &Rational, hi: &Rational) -> Rational {
    min(max(x.clone(), lo.clone()), hi.clone())
}

impl PenaltyModel {
    /// Model with the default time constant and an empty EMA.
    pub fn new(params: PenaltyParams) -> Result<Self, ClusterError> {
        params.validate()?;
        Ok(Self {
            params,
            ema: EmaTracker::new(),
        })
    }

    /// Model with a custom EMA time constant in blocks. `tau` must be negative.
    pub fn with_tau(params: PenaltyParams, tau: i64) -> Result<Self, ClusterError> {
        if tau >= 0 {
            return Err(ClusterError::InvalidInput(format!(
                "EMA time constant must be negative, got {tau}"
            )));
        }
        params.validate()?;
        Ok(Self {
            params,
            ema: EmaTracker::with_tau(tau),
        })
    }

    pub fn state(&self) -> PenaltyState {
        self.ema.state()
    }

    /// EMA projected to `height` without recording it.
    pub fn ema_at(&self, height: u64, nav: &Rational) -> Rational {
        self.ema.at(height, nav)
    }

    /// Reference notional `e = min(ema projected to height, nav)`.
    pub fn reference(&self, height: u64, nav: &Rational) -> Rational {
        min(self.ema_at(height, nav), nav.clone())
    }

    /// Score an imbalance change against reference notional `e`.
    pub fn score(
        &self,
        imb0: &Rational,
        imb1: &Rational,
        e: &Rational,
    ) -> Result<Rational, ClusterError> {
        let p = &self.params;

        if imb1 <= imb0 {
            let cutoff = &p.reward_cutoff * e;
            let reward =
                (max(imb0.clone(), cutoff.clone()) - max(imb1.clone(), cutoff)) * &p.reward_amt;
            return Ok(reward);
        }

        let cutoff_lo = &p.penalty_cutoff_lo * e;
        let cutoff_hi = &p.penalty_cutoff_hi * e;
        if *imb1 > cutoff_hi {
            return Err(ClusterError::ClusterImbalanceTooHigh {
                imbalance: imb1.clone(),
                ceiling: cutoff_hi,
            });
        }

        let flat_lo = (min(imb1.clone(), cutoff_lo.clone()) - min(imb0.clone(), cutoff_lo.clone()))
            * &p.penalty_amt_lo;

        let imb0_mid = clamp(imb0, &cutoff_lo, &cutoff_hi);
        let imb1_mid = clamp(imb1, &cutoff_lo, &cutoff_hi);
        let cutoff_gap = &cutoff_hi - &cutoff_lo;
        let ramp = match (&p.penalty_amt_hi - &p.penalty_amt_lo).checked_div(&cutoff_gap) {
            // zero-width middle segment
            None => Rational::zero(),
            Some(slope) => {
                let height0 = (&imb0_mid - &cutoff_lo) * &slope + &p.penalty_amt_lo;
                let height1 = (&imb1_mid - &cutoff_lo) * &slope + &p.penalty_amt_lo;
                let width = &imb1_mid - &imb0_mid;
                (height0 + height1) * width * Rational::percent(50)
            }
        };

        let flat_hi = (max(imb1.clone(), cutoff_hi.clone()) - max(imb0.clone(), cutoff_hi))
            * &p.penalty_amt_hi;

        Ok(-(flat_lo + ramp + flat_hi))
    }
}

impl PenaltyCalculator for PenaltyModel {
    fn params(&self) -> &PenaltyParams {
        &self.params
    }

    fn ema(&self) -> &Rational {
        self.ema.ema()
    }

    fn last_block(&self) -> u64 {
        self.ema.last_block()
    }

    fn notional_penalty(
        &self,
        height: u64,
        i0: &[Rational],
        i1: &[Rational],
        w: &[Rational],
        p: &[Rational],
    ) -> Result<Rational, ClusterError> {
        let imb0 = imbalance(i0, w, p)?;
        let imb1 = imbalance(i1, w, p)?;
        let nav = dot(i0, p);
        let e = self.reference(height, &nav);
        let penalty = self.score(&imb0, &imb1, &e)?;
        trace!(height, %imb0, %imb1, %e, %penalty, "scored inventory move");
        Ok(penalty)
    }

    fn update_ema(&mut self, height: u64, nav: &Rational) {
        self.ema.update(height, nav);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::math::to_rationals;
    use proptest::prelude::*;

    fn model() -> PenaltyModel {
        PenaltyModel::new(PenaltyParams::default()).unwrap()
    }

    fn v(xs: &[u128]) -> Vec<Rational> {
        to_rationals(xs)
    }

    fn r(n: u64) -> Rational {
        Rational::from(n)
    }

    // --- construction ---

    #[test]
    fn rejects_invalid_params() {
        let params = PenaltyParams {
            penalty_amt_lo: Rational::percent(90),
            ..PenaltyParams::default()
        };
        assert!(PenaltyModel::new(params).is_err());
    }

    #[test]
    fn rejects_non_negative_tau() {
        assert!(PenaltyModel::with_tau(PenaltyParams::default(), 0).is_err());
        assert!(PenaltyModel::with_tau(PenaltyParams::default(), 600).is_err());
        assert!(PenaltyModel::with_tau(PenaltyParams::default(), -1).is_ok());
    }

    #[test]
    fn model_is_object_safe() {
        let m = model();
        let dyn_m: &dyn PenaltyCalculator = &m;
        assert_eq!(dyn_m.last_block(), 0);
        assert!(dyn_m.ema().is_zero());
    }

    // --- schedule ---

    #[test]
    fn penalty_in_low_flat_segment() {
        // e = 2_000_000: cutoff_lo = 20_000
        let pen = model().score(&r(0), &r(1_000), &r(2_000_000)).unwrap();
        assert_eq!(pen, -r(100));
    }

    #[test]
    fn penalty_spans_flat_and_ramp() {
        // flat: 20_000 · 0.1 = 2_000
        // ramp: heights 0.1 and 0.1 + 80_000·0.4/180_000, width 80_000
        let pen = model().score(&r(0), &r(100_000), &r(2_000_000)).unwrap();
        let expected: Rational = "154000/9".parse().unwrap();
        assert_eq!(pen, -expected);
        assert_eq!(pen.floor_int().to_string(), "-17112");
    }

    #[test]
    fn penalty_at_ceiling_is_allowed() {
        let pen = model().score(&r(0), &r(200_000), &r(2_000_000)).unwrap();
        // 2_000 + (0.1 + 0.5)/2 · 180_000 = 56_000
        assert_eq!(pen, -r(56_000));
    }

    #[test]
    fn above_ceiling_rejected() {
        let err = model().score(&r(0), &r(200_001), &r(2_000_000)).unwrap_err();
        assert!(matches!(err, ClusterError::ClusterImbalanceTooHigh { .. }));
    }

    #[test]
    fn improving_move_never_hits_ceiling() {
        let reward = model().score(&r(900_000), &r(800_000), &r(2_000_000)).unwrap();
        assert_eq!(reward, r(5_000));
    }

    #[test]
    fn reward_above_cutoff() {
        // reward_cutoff = 40_000
        let reward = model().score(&r(200_000), &r(100_000), &r(2_000_000)).unwrap();
        assert_eq!(reward, r(5_000));
    }

    #[test]
    fn reward_zero_below_cutoff() {
        let reward = model().score(&r(30_000), &r(10_000), &r(2_000_000)).unwrap();
        assert!(reward.is_zero());
    }

    #[test]
    fn reward_clipped_at_cutoff() {
        let reward = model().score(&r(50_000), &r(0), &r(2_000_000)).unwrap();
        assert_eq!(reward, r(500));
    }

    #[test]
    fn unchanged_imbalance_scores_zero() {
        let pen = model().score(&r(1_234), &r(1_234), &r(2_000_000)).unwrap();
        assert!(pen.is_zero());
    }

    #[test]
    fn zero_width_ramp() {
        let params = PenaltyParams {
            penalty_cutoff_lo: Rational::percent(10),
            penalty_cutoff_hi: Rational::percent(10),
            ..PenaltyParams::default()
        };
        let m = PenaltyModel::new(params).unwrap();
        let pen = m.score(&r(0), &r(100_000), &r(2_000_000)).unwrap();
        assert_eq!(pen, -r(10_000));
    }

    #[test]
    fn zero_reference_rejects_any_worsening() {
        let err = model().score(&r(0), &r(1), &r(0)).unwrap_err();
        assert!(matches!(err, ClusterError::ClusterImbalanceTooHigh { .. }));
    }

    // --- notional_penalty ---

    #[test]
    fn one_sided_deposit_pays_penalty() {
        let pen = model()
            .notional_penalty(
                10,
                &v(&[1_000_000, 1_000_000]),
                &v(&[1_001_000, 1_000_000]),
                &v(&[1, 1]),
                &v(&[1, 1]),
            )
            .unwrap();
        assert_eq!(pen, -r(100));
    }

    #[test]
    fn reference_capped_by_nav() {
        let mut m = model();
        m.update_ema(1, &r(10_000_000));
        // ema stays high one block later, but e is bounded by the current nav
        assert_eq!(m.reference(2, &r(1_000)), r(1_000));
    }

    #[test]
    fn reference_lags_sudden_increase() {
        let mut m = model();
        m.update_ema(1, &r(1_000));
        let e = m.reference(2, &r(1_000_000));
        assert!(e < r(10_000));
        assert!(e > r(1_000));
    }

    #[test]
    fn length_mismatch_surfaces() {
        let err = model()
            .notional_penalty(1, &v(&[1]), &v(&[1, 2]), &v(&[1, 1]), &v(&[1, 1]))
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    #[test]
    fn update_ema_records_block() {
        let mut m = model();
        m.update_ema(42, &r(7));
        assert_eq!(m.last_block(), 42);
        assert_eq!(m.state().ema, r(7));
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn penalty_sign_follows_imbalance(
            i0 in proptest::collection::vec(1u128..1_000_000, 3),
            delta in proptest::collection::vec(0u128..50_000, 3),
            w in proptest::collection::vec(1u128..100, 3),
        ) {
            let m = model();
            let p = v(&[1, 2, 3]);
            let (i0r, wr) = (v(&i0), v(&w));
            let i1: Vec<u128> = i0.iter().zip(&delta).map(|(a, b)| a + b).collect();
            let i1r = v(&i1);
            let imb0 = imbalance(&i0r, &wr, &p).unwrap();
            let imb1 = imbalance(&i1r, &wr, &p).unwrap();
            match m.notional_penalty(1, &i0r, &i1r, &wr, &p) {
                Ok(pen) if imb1 > imb0 => prop_assert!(pen <= Rational::zero()),
                Ok(pen) => prop_assert!(pen >= Rational::zero()),
                Err(ClusterError::ClusterImbalanceTooHigh { .. }) => prop_assert!(imb1 > imb0),
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }

        #[test]
        fn penalty_bounded_by_high_rate(
            a in 0u64..200_000,
            b in 0u64..200_000,
        ) {
            let (imb0, imb1) = (r(a.min(b)), r(a.max(b)));
            let pen = model().score(&imb0, &imb1, &r(2_000_000)).unwrap();
            let width = &imb1 - &imb0;
            prop_assert!(-pen.clone() <= &width * &Rational::percent(50));
            prop_assert!(-pen >= &width * &Rational::percent(10));
        }

        #[test]
        fn reward_bounded_by_rate(a in 0u64..2_000_000, b in 0u64..2_000_000) {
            let (imb1, imb0) = (r(a.min(b)), r(a.max(b)));
            let reward = model().score(&imb0, &imb1, &r(2_000_000)).unwrap();
            prop_assert!(reward >= Rational::zero());
            prop_assert!(reward <= (&imb0 - &imb1) * Rational::percent(5));
        }
    }
}

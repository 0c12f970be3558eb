//! Vector helpers over inventories, prices, and weights.
//!
//! All vectors are aligned by asset index. Callers check lengths at the
//! boundary; [`imbalance`] re-checks because it is the one entry point
//! the penalty model exposes to arbitrary input.

use crate::decimal::Rational;
use crate::error::ClusterError;

/// `Σ a_k · b_k`.
pub fn dot(a: &[Rational], b: &[Rational]) -> Rational {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Element-wise `a + b`.
pub fn add(a: &[Rational], b: &[Rational]) -> Vec<Rational> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Element-wise `a - b`.
pub fn sub(a: &[Rational], b: &[Rational]) -> Vec<Rational> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

pub fn to_rationals(v: &[u128]) -> Vec<Rational> {
    v.iter().map(|&x| Rational::from(x)).collect()
}

/// Divergence of inventory `i` from target weights `w` under prices `p`.
///
/// With `N = Σ i_k·p_k` and `W = Σ w_k·p_k`:
///
/// ```text
/// imbalance = Σ_k |w_k·p_k·N − W·i_k·p_k| / W
/// ```
///
/// The result is in notional units, zero iff `i` is proportional to `w`,
/// and at most `2·N`.
pub fn imbalance(i: &[Rational], w: &[Rational], p: &[Rational]) -> Result<Rational, ClusterError> {
    if i.len() != w.len() || i.len() != p.len() {
        return Err(ClusterError::InvalidInput(format!(
            "vector length mismatch: inventory {}, weights {}, prices {}",
            i.len(),
            w.len(),
            p.len()
        )));
    }

    let wp = dot(w, p);
    if !wp.is_positive() {
        return Err(ClusterError::InvalidInput(
            "target notional must be positive".to_string(),
        ));
    }
    let nav = dot(i, p);

    let err: Rational = i
        .iter()
        .zip(w)
        .zip(p)
        .map(|((ik, wk), pk)| (wk * pk * &nav - &wp * ik * pk).abs())
        .sum();

    err.checked_div(&wp)
        .ok_or_else(|| ClusterError::InvalidInput("target notional must be positive".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(xs: &[u128]) -> Vec<Rational> {
        to_rationals(xs)
    }

    #[test]
    fn dot_product() {
        assert_eq!(dot(&v(&[1, 2, 3]), &v(&[4, 5, 6])), Rational::from(32u64));
        assert_eq!(dot(&[], &[]), Rational::zero());
    }

    #[test]
    fn add_and_sub() {
        assert_eq!(add(&v(&[1, 2]), &v(&[10, 20])), v(&[11, 22]));
        assert_eq!(sub(&v(&[10, 20]), &v(&[1, 2])), v(&[9, 18]));
    }

    #[test]
    fn aligned_inventory_has_zero_imbalance() {
        let imb = imbalance(&v(&[1_000_000, 1_000_000]), &v(&[1, 1]), &v(&[1, 1])).unwrap();
        assert!(imb.is_zero());
    }

    #[test]
    fn proportional_inventory_has_zero_imbalance() {
        let imb = imbalance(&v(&[300, 600, 900]), &v(&[1, 2, 3]), &v(&[7, 5, 2])).unwrap();
        assert!(imb.is_zero());
    }

    #[test]
    fn one_sided_deposit_imbalance() {
        // N = 2_001_000, W = 2: |2_001_000 - 2_002_000| + |2_001_000 - 2_000_000| = 2000, / 2
        let imb = imbalance(&v(&[1_001_000, 1_000_000]), &v(&[1, 1]), &v(&[1, 1])).unwrap();
        assert_eq!(imb, Rational::from(1_000u64));
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = imbalance(&v(&[1, 2]), &v(&[1]), &v(&[1, 1])).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    #[test]
    fn zero_target_notional_rejected() {
        let err = imbalance(&v(&[1, 2]), &v(&[0, 0]), &v(&[1, 1])).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidInput(_)));
    }

    proptest! {
        #[test]
        fn imbalance_bounded_by_twice_nav(
            i in proptest::collection::vec(0u128..1_000_000, 3),
            w in proptest::collection::vec(1u128..1_000, 3),
            p in proptest::collection::vec(1u128..1_000, 3),
        ) {
            let (i, w, p) = (v(&i), v(&w), v(&p));
            let imb = imbalance(&i, &w, &p).unwrap();
            let nav = dot(&i, &p);
            prop_assert!(imb >= Rational::zero());
            prop_assert!(imb <= nav * Rational::from(2u64));
        }

        #[test]
        fn scaling_weights_does_not_change_imbalance(
            i in proptest::collection::vec(0u128..1_000_000, 3),
            w in proptest::collection::vec(1u128..1_000, 3),
            k in 1u128..100,
        ) {
            let p = v(&[3, 5, 7]);
            let scaled: Vec<u128> = w.iter().map(|x| x * k).collect();
            let a = imbalance(&v(&i), &v(&w), &p).unwrap();
            let b = imbalance(&v(&i), &v(&scaled), &p).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}

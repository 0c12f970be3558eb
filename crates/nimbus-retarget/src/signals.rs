//! Price-series statistics used by the momentum, activation, and
//! moving-average-cross policies.

use nimbus_core::Rational;
use nimbus_core::types::PricePoint;

/// Relative change `(last − first) / first` of a series.
///
/// `None` with fewer than two samples or a non-positive first price.
pub fn change(points: &[PricePoint]) -> Option<Rational> {
    let (first, last) = match points {
        [first, .., last] => (&first.price, &last.price),
        _ => return None,
    };
    if !first.is_positive() {
        return None;
    }
    (last - first).checked_div(first)
}

/// Outcome of following one moving-average length over a series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossStats {
    pub len: usize,
    /// Bars where price closed above its moving average.
    pub signals: u64,
    /// Of those, bars followed by a higher close.
    pub ups: u64,
    /// Laplace-smoothed next-bar-up rate `(ups + 1) / (signals + 2)`.
    pub rate: Rational,
    /// Whether the latest close is above its moving average.
    pub bullish: bool,
}

/// Running prefix sums; `prefix[i]` is the sum of `prices[..i]`.
fn prefix_sums(prices: &[Rational]) -> Vec<Rational> {
    let mut out = Vec::with_capacity(prices.len() + 1);
    let mut acc = Rational::zero();
    out.push(acc.clone());
    for p in prices {
        acc += p;
        out.push(acc.clone());
    }
    out
}

fn above_average(prices: &[Rational], prefix: &[Rational], len: usize, t: usize) -> bool {
    // price_t > (Σ prices[t+1-len..=t]) / len, without dividing.
    let window = &prefix[t + 1] - &prefix[t + 1 - len];
    &prices[t] * Rational::from(len as u64) > window
}

/// Statistics of the `len`-bar moving average over `prices`.
///
/// `None` when `len` is zero or the series is too short to score even one
/// signal bar.
pub fn cross_stats(prices: &[Rational], len: usize) -> Option<CrossStats> {
    if len == 0 || prices.len() <= len {
        return None;
    }
    let prefix = prefix_sums(prices);
    let mut signals = 0u64;
    let mut ups = 0u64;
    for t in (len - 1)..(prices.len() - 1) {
        if above_average(prices, &prefix, len, t) {
            signals += 1;
            if prices[t + 1] > prices[t] {
                ups += 1;
            }
        }
    }
    let rate = Rational::from_ratio(ups as i128 + 1, signals as i128 + 2)?;
    let bullish = above_average(prices, &prefix, len, prices.len() - 1);
    Some(CrossStats {
        len,
        signals,
        ups,
        rate,
        bullish,
    })
}

/// Length in `min_len..=max_len` with the highest smoothed up-rate.
/// Ties go to the shorter length.
pub fn best_cross(prices: &[Rational], min_len: usize, max_len: usize) -> Option<CrossStats> {
    let mut best: Option<CrossStats> = None;
    for len in min_len..=max_len {
        let Some(stats) = cross_stats(prices, len) else {
            continue;
        };
        if best.as_ref().is_none_or(|b| stats.rate > b.rate) {
            best = Some(stats);
        }
    }
    best
}

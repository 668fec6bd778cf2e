//! Numeric helpers shared by the analyzers
//!
//! Every ratio here is guarded: a zero or non-finite denominator yields the
//! caller's neutral value instead of NaN/Inf.

use tracing::warn;

/// Trading days per year, used to annualize return volatility
pub const TRADING_DAYS: f64 = 252.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// `num / den`, or `neutral` when the quotient would not be finite
#[inline]
pub fn safe_ratio(num: f64, den: f64, neutral: f64) -> f64 {
    if den.abs() <= f64::EPSILON || !den.is_finite() || !num.is_finite() {
        return neutral;
    }
    num / den
}

/// Replace a non-finite indicator value with `neutral`, logging the substitution
#[inline]
pub fn finite_or(value: f64, neutral: f64, name: &'static str) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(indicator = name, value, neutral, "non-finite value replaced");
        neutral
    }
}

/// Arithmetic mean; 0.0 for an empty slice
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0.0 with fewer than two values
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Simple moving average of the trailing `period` values (clipped to the slice)
#[inline]
pub fn sma_tail(values: &[f64], period: usize) -> f64 {
    mean(&values[values.len().saturating_sub(period)..])
}

/// Simple returns between consecutive values, skipping non-positive bases
pub fn pct_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Annualized sample volatility of simple returns
#[inline]
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS.sqrt()
}

/// Relative distance of `actual` from `reference`; `None` when the reference
/// is not a positive price
#[inline]
pub fn relative_error(actual: f64, reference: f64) -> Option<f64> {
    (reference > 0.0 && reference.is_finite()).then(|| (actual - reference).abs() / reference)
}

/// Coefficient of determination of a model whose residual and total sums of
/// squares are given. Clamped to 0.0..=1.0; a flat series scores 1.0 only
/// when reproduced exactly.
#[inline]
pub fn coefficient_of_determination(ss_res: f64, ss_tot: f64) -> f64 {
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

/// Days elapsed between two touches: from timestamps when both are known,
/// otherwise the bar distance (one bar per day).
pub fn days_between(
    first: (usize, Option<i64>),
    last: (usize, Option<i64>),
) -> f64 {
    match (first.1, last.1) {
        (Some(a), Some(b)) => b.saturating_sub(a).max(0) as f64 / MS_PER_DAY,
        _ => last.0.saturating_sub(first.0) as f64,
    }
}

/// Minimum and maximum of a sequence, ignoring non-finite values; `None` if nothing finite
pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

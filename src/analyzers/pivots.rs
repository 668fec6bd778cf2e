//! Fractal pivot detection
//!
//! A pivot high is strictly above every neighbour within `order` bars on
//! both sides; a pivot low strictly below. Neighbourhoods are clipped at the
//! edges of the series, so the first and last values never qualify.

use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use crate::params::{get_period, ParamMeta, Parameterized};
use crate::{AnalysisError, Period, Result, OHLCV};

/// Which extreme a pivot marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotKind {
    High,
    Low,
}

impl PivotKind {
    /// `a` is more extreme than `b` for this kind
    #[inline]
    fn dominates(self, a: f64, b: f64) -> bool {
        match self {
            PivotKind::High => a > b,
            PivotKind::Low => a < b,
        }
    }
}

/// Local price extremum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// Indices of the pivots of `kind` in `values`, ascending.
pub fn find_pivot_indices(values: &[f64], order: usize, kind: PivotKind) -> Vec<usize> {
    let n = values.len();
    if n < 3 || order == 0 {
        return Vec::new();
    }

    (1..n - 1)
        .filter(|&i| {
            let lo = i.saturating_sub(order);
            let hi = (i + order).min(n - 1);
            (lo..=hi)
                .filter(|&j| j != i)
                .all(|j| kind.dominates(values[i], values[j]))
        })
        .collect()
}

/// Pivot finder with a cap on how many pivots of each kind are kept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotDetector {
    /// Neighbourhood on each side
    pub order: Period,
    /// Keep at most this many pivots per kind, the most extreme first
    pub max_pivots: Period,
}

impl Default for PivotDetector {
    fn default() -> Self {
        Self {
            order: Period::new_const(5),
            max_pivots: Period::new_const(40),
        }
    }
}

impl PivotDetector {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Pivots of one kind over a price series, ordered by index.
    pub fn select(&self, values: &[f64], kind: PivotKind) -> Vec<Pivot> {
        let mut pivots: Vec<Pivot> = find_pivot_indices(values, self.order.get(), kind)
            .into_iter()
            .map(|index| Pivot {
                index,
                price: values[index],
                kind,
            })
            .collect();

        let cap = self.max_pivots.get();
        if pivots.len() > cap {
            pivots.sort_by(|a, b| match kind {
                PivotKind::High => b.price.total_cmp(&a.price),
                PivotKind::Low => a.price.total_cmp(&b.price),
            });
            pivots.truncate(cap);
            pivots.sort_by_key(|p| p.index);
        }
        pivots
    }

    /// Pivot highs (on bar highs) and pivot lows (on bar lows), ordered by index.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Vec<Pivot> {
        let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();

        let mut pivots = self.select(&highs, PivotKind::High);
        pivots.extend(self.select(&lows, PivotKind::Low));
        pivots.sort_by_key(|p| p.index);
        pivots
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.max_pivots.get() < 2 {
            return Err(AnalysisError::InvalidConfig(
                "max_pivots must keep at least two pivots".into(),
            ));
        }
        Ok(())
    }
}

static PIVOT_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("pivot_order", 5.0, (2.0, 10.0, 1.0), "Bars on each side a pivot must dominate"),
    ParamMeta::period("max_pivots", 40.0, (10.0, 80.0, 10.0), "Most extreme pivots kept per kind"),
];

impl Parameterized for PivotDetector {
    fn param_meta() -> &'static [ParamMeta] {
        PIVOT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            order: get_period(params, "pivot_order", 5)?,
            max_pivots: get_period(params, "max_pivots", 40)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn analyzer_name() -> &'static str {
        "pivots"
    }
}

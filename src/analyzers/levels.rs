//! Horizontal support/resistance levels
//!
//! Candidates are pivot prices plus round numbers inside the window's price
//! range. A candidate survives when enough bars touch it, and is then
//! scored by touches, how long it has held, and how many touches came on
//! heavy volume.

use std::collections::HashMap;

use tracing::debug;

use super::helpers::{self, days_between, min_max, relative_error};
use super::pivots::PivotDetector;
use crate::params::{get_float, get_period, get_ratio, ParamMeta, Parameterized};
use crate::{
    AnalysisError, LevelKind, Period, Ratio, Result, Strength, SupportResistanceLevel, TrendScope, OHLCV,
};

/// Round-number candidates are skipped when the price range would need more
/// than this many of them
const MAX_ROUND_LEVELS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelLocator {
    pub pivots: PivotDetector,
    /// Relative distance of high/low/close from a level that counts as a touch
    pub touch_tolerance: Ratio,
    /// Spacing of round-number candidates
    pub round_step: f64,
    /// Touch bars with volume above `high_volume_factor * average` earn a bonus
    pub high_volume_factor: f64,
    pub max_levels: Period,
    /// Score at or above which a level is strong
    pub strong_score: f64,
    /// Score at or above which a level is medium
    pub medium_score: f64,
}

impl Default for LevelLocator {
    fn default() -> Self {
        Self {
            pivots: PivotDetector::default(),
            touch_tolerance: Ratio::new_const(0.02),
            round_step: 5.0,
            high_volume_factor: 1.5,
            max_levels: Period::new_const(5),
            strong_score: 50.0,
            medium_score: 30.0,
        }
    }
}

impl LevelLocator {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Strongest levels in the scope's trailing window, best first.
    ///
    /// Sorted by strength tier then touch count, both descending; never more
    /// than `max_levels`. `last_touch_index` refers to `bars`.
    pub fn locate<T: OHLCV>(&self, bars: &[T], scope: TrendScope) -> Vec<SupportResistanceLevel> {
        let window = scope.window().min(bars.len());
        if window == 0 {
            return Vec::new();
        }

        let offset = bars.len() - window;
        let slice = &bars[offset..];
        let last_close = slice[window - 1].close();
        let volumes: Vec<f64> = slice.iter().map(|b| b.volume()).collect();
        let avg_volume = helpers::finite_or(helpers::mean(&volumes), 0.0, "avg_volume");

        let mut levels: Vec<SupportResistanceLevel> = self
            .candidates(slice)
            .into_iter()
            .filter_map(|price| self.score_level(slice, offset, price, avg_volume, last_close, scope))
            .collect();

        levels.sort_by(|a, b| {
            b.strength
                .cmp(&a.strength)
                .then(b.touch_count.cmp(&a.touch_count))
        });
        levels.truncate(self.max_levels.get());
        levels
    }

    /// Candidate prices: pivot highs and lows plus round numbers spanning the
    /// window, sorted and deduplicated.
    pub fn candidates<T: OHLCV>(&self, bars: &[T]) -> Vec<f64> {
        let mut prices: Vec<f64> = self.pivots.detect(bars).iter().map(|p| p.price).collect();

        if let Some((lo, hi)) = min_max(bars.iter().flat_map(|b| [b.low(), b.high()])) {
            let step = self.round_step;
            let first = (lo / step).ceil();
            let last = (hi / step).floor();
            let count = (last - first + 1.0).max(0.0);
            if count as usize > MAX_ROUND_LEVELS {
                debug!(lo, hi, step, "price range too wide for round-number candidates");
            } else {
                prices.extend((0..count as usize).map(|k| (first + k as f64) * step));
            }
        }

        prices.retain(|p| p.is_finite() && *p > 0.0);
        prices.sort_by(f64::total_cmp);
        prices.dedup_by(|a, b| (*a - *b).abs() <= 1e-9 * b.abs().max(1.0));
        prices
    }

    /// Tier for a raw level score
    #[inline]
    pub fn tier(&self, score: f64) -> Strength {
        if score >= self.strong_score {
            Strength::Strong
        } else if score >= self.medium_score {
            Strength::Medium
        } else {
            Strength::Weak
        }
    }

    fn score_level<T: OHLCV>(
        &self,
        bars: &[T],
        offset: usize,
        price: f64,
        avg_volume: f64,
        last_close: f64,
        scope: TrendScope,
    ) -> Option<SupportResistanceLevel> {
        let tolerance = self.touch_tolerance.get();
        let near = |value: f64| relative_error(value, price).is_some_and(|err| err <= tolerance);
        let heavy = avg_volume * self.high_volume_factor;

        let mut touches = 0;
        let mut heavy_touches = 0;
        let mut first: Option<usize> = None;
        let mut last = 0;

        for (i, bar) in bars.iter().enumerate() {
            if near(bar.high()) || near(bar.low()) || near(bar.close()) {
                touches += 1;
                first.get_or_insert(i);
                last = i;
                if avg_volume > 0.0 && bar.volume() > heavy {
                    heavy_touches += 1;
                }
            }
        }

        let first = first?;
        if touches < scope.min_touches() {
            return None;
        }

        let days = days_between((first, bars[first].timestamp()), (last, bars[last].timestamp()));
        let score = touches as f64 * 10.0 + (days / 10.0).min(20.0) + heavy_touches as f64 * 5.0;

        Some(SupportResistanceLevel {
            price_level: price,
            strength: self.tier(score),
            touch_count: touches,
            last_touch_timestamp: bars[last].timestamp(),
            last_touch_index: offset + last,
            score,
            scope,
            kind: if price < last_close {
                LevelKind::Support
            } else {
                LevelKind::Resistance
            },
        })
    }

    pub fn validate_config(&self) -> Result<()> {
        self.pivots.validate_config()?;
        if !(self.round_step > 0.0 && self.round_step.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "round_step must be positive, got {}",
                self.round_step
            )));
        }
        if self.medium_score > self.strong_score {
            return Err(AnalysisError::InvalidConfig(
                "medium_score must not exceed strong_score".into(),
            ));
        }
        Ok(())
    }
}

static LEVEL_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("pivot_order", 5.0, (2.0, 10.0, 1.0), "Bars on each side a pivot must dominate"),
    ParamMeta::period("max_pivots", 40.0, (10.0, 80.0, 10.0), "Most extreme pivots kept per kind"),
    ParamMeta::ratio("touch_tolerance", 0.02, (0.005, 0.05, 0.005), "Relative distance counted as a touch"),
    ParamMeta::float("round_step", 5.0, (1.0, 20.0, 1.0), "Spacing of round-number candidates"),
    ParamMeta::float("high_volume_factor", 1.5, (1.0, 3.0, 0.25), "Volume multiple earning the heavy-touch bonus"),
    ParamMeta::period("max_levels", 5.0, (1.0, 10.0, 1.0), "Levels returned per call"),
    ParamMeta::float("strong_score", 50.0, (30.0, 80.0, 5.0), "Score threshold of a strong level"),
    ParamMeta::float("medium_score", 30.0, (10.0, 50.0, 5.0), "Score threshold of a medium level"),
];

impl Parameterized for LevelLocator {
    fn param_meta() -> &'static [ParamMeta] {
        LEVEL_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let locator = Self {
            pivots: PivotDetector::with_params(params)?,
            touch_tolerance: get_ratio(params, "touch_tolerance", 0.02)?,
            round_step: get_float(params, "round_step", 5.0)?,
            high_volume_factor: get_float(params, "high_volume_factor", 1.5)?,
            max_levels: get_period(params, "max_levels", 5)?,
            strong_score: get_float(params, "strong_score", 50.0)?,
            medium_score: get_float(params, "medium_score", 30.0)?,
        };
        locator.validate_config()?;
        Ok(locator)
    }

    fn analyzer_name() -> &'static str {
        "levels"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    const DAY: i64 = 86_400_000;

    fn bar(i: usize, close: f64, spread: f64, volume: f64) -> Bar {
        Bar::new(i as i64 * DAY, close, close + spread, close - spread, close, volume)
    }

    /// Closes oscillating within a 2-point band around 50
    fn banded_around_fifty(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 50.0 + [0.0, 0.8, -0.6, 0.4, -0.9, 0.2][i % 6];
                bar(i, close, 0.1, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let bars: Vec<Bar> = vec![];
        assert!(LevelLocator::default().locate(&bars, TrendScope::Minor).is_empty());
    }

    #[test]
    fn test_round_number_level_in_band() {
        let bars = banded_around_fifty(20);
        let levels = LevelLocator::default().locate(&bars, TrendScope::Minor);

        let fifty = levels
            .iter()
            .find(|l| (l.price_level - 50.0).abs() < 1e-9)
            .expect("level at 50");
        assert!(fifty.touch_count >= 3);
        assert_eq!(fifty.scope, TrendScope::Minor);
    }

    #[test]
    fn test_at_most_five_sorted() {
        let bars: Vec<Bar> = (0..250)
            .map(|i| {
                let close = 100.0 + ((i as f64) * 0.35).sin() * 20.0;
                bar(i, close, 1.0, 1000.0 + (i % 7) as f64 * 400.0)
            })
            .collect();
        let levels = LevelLocator::default().locate(&bars, TrendScope::Primary);

        assert!(!levels.is_empty());
        assert!(levels.len() <= 5);
        for pair in levels.windows(2) {
            let key = |l: &SupportResistanceLevel| (l.strength, l.touch_count);
            assert!(key(&pair[0]) >= key(&pair[1]));
        }
    }

    #[test]
    fn test_primary_scope_needs_three_touches() {
        // 55 is touched exactly twice
        let mut bars: Vec<Bar> = (0..30).map(|i| bar(i, 40.0, 0.1, 1000.0)).collect();
        bars[10] = bar(10, 55.0, 0.1, 1000.0);
        bars[20] = bar(20, 55.0, 0.1, 1000.0);

        let primary = LevelLocator::default().locate(&bars, TrendScope::Primary);
        assert!(primary.iter().all(|l| (l.price_level - 55.0).abs() > 1e-9));

        let secondary = LevelLocator::default().locate(&bars, TrendScope::Secondary);
        assert!(secondary.iter().any(|l| (l.price_level - 55.0).abs() < 1e-9));
    }

    #[test]
    fn test_kind_relative_to_close() {
        let mut bars: Vec<Bar> = (0..20).map(|i| bar(i, 60.0, 0.1, 1000.0)).collect();
        for i in [3, 8, 13] {
            bars[i] = bar(i, 45.0, 0.1, 1000.0);
        }
        let levels = LevelLocator::default().locate(&bars, TrendScope::Minor);

        let below = levels.iter().find(|l| (l.price_level - 45.0).abs() < 1e-9).unwrap();
        assert_eq!(below.kind, LevelKind::Support);
        let at_close = levels.iter().find(|l| (l.price_level - 60.0).abs() < 1e-9).unwrap();
        assert_eq!(at_close.kind, LevelKind::Resistance);
    }

    #[test]
    fn test_score_components() {
        // Level 45 touched at bars 0, 50, 100; bar 100 on heavy volume
        let mut bars: Vec<Bar> = (0..101).map(|i| bar(i, 60.0, 0.1, 1000.0)).collect();
        bars[0] = bar(0, 45.0, 0.1, 1000.0);
        bars[50] = bar(50, 45.0, 0.1, 1000.0);
        bars[100] = bar(100, 45.0, 0.1, 10_000.0);

        let levels = LevelLocator::default().locate(&bars, TrendScope::Primary);
        let level = levels.iter().find(|l| (l.price_level - 45.0).abs() < 1e-9).unwrap();

        // 3 touches * 10 + min(20, 100 days / 10) + 1 heavy touch * 5
        assert!((level.score - 45.0).abs() < 1e-9);
        assert_eq!(level.strength, Strength::Medium);
        assert_eq!(level.last_touch_index, 100);
        assert_eq!(level.last_touch_timestamp, Some(100 * DAY));
    }

    #[test]
    fn test_tiers() {
        let locator = LevelLocator::default();
        assert_eq!(locator.tier(50.0), Strength::Strong);
        assert_eq!(locator.tier(49.9), Strength::Medium);
        assert_eq!(locator.tier(30.0), Strength::Medium);
        assert_eq!(locator.tier(29.9), Strength::Weak);
    }

    #[test]
    fn test_candidates_dedup_and_sorted() {
        let bars = banded_around_fifty(20);
        let candidates = LevelLocator::default().candidates(&bars);
        assert!(candidates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(candidates.iter().filter(|&&p| p == 50.0).count(), 1);
    }

    #[test]
    fn test_offset_indices_refer_to_input() {
        let mut bars: Vec<Bar> = (0..10).map(|i| bar(i, 80.0, 0.1, 1000.0)).collect();
        bars.extend(banded_around_fifty(20).into_iter().enumerate().map(|(i, mut b)| {
            b.timestamp = Some((i + 10) as i64 * DAY);
            b
        }));
        let levels = LevelLocator::default().locate(&bars, TrendScope::Minor);
        assert!(levels.iter().all(|l| l.last_touch_index >= 10));
    }

    #[test]
    fn test_validate_config() {
        assert!(LevelLocator::default().validate_config().is_ok());
        let bad = LevelLocator {
            medium_score: 80.0,
            ..LevelLocator::default()
        };
        assert!(bad.validate_config().is_err());
    }

    #[test]
    fn test_max_levels_caps_output() {
        let params = HashMap::from([("max_levels", 0.0)]);
        assert!(LevelLocator::with_params(&params).is_err());

        let bars = banded_around_fifty(40);
        let locator = LevelLocator {
            max_levels: Period::new_const(1),
            ..LevelLocator::default()
        };
        assert!(locator.locate(&bars, TrendScope::Minor).len() <= 1);
    }
}

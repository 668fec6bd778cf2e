//! Breakout confirmation
//!
//! A level is breached when the current close sits beyond it: above a
//! resistance, below a support. The breach is dated to the first close that
//! crossed the level within the lookback window and then confirmed on
//! price, volume and follow-through.

use std::collections::HashMap;

use super::helpers::relative_error;
use super::levels::LevelLocator;
use crate::params::{get_float, get_period, get_ratio, ParamMeta, Parameterized};
use crate::{
    AnalysisError, BreakoutDirection, BreakoutSignal, LevelKind, Period, Ratio, Result, Strength,
    SupportResistanceLevel, TrendScope, VolumeAnalysis, OHLCV,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutDetector {
    /// Most recent bars searched for the crossing
    pub lookback: Period,
    /// Minimum relative distance beyond the level for price confirmation
    pub min_magnitude: Ratio,
    /// `VolumeAnalysis::volume_ratio` must exceed this for volume confirmation
    pub min_volume_ratio: f64,
    /// Bars after the breakout that must close in its direction
    pub follow_through_bars: Period,
}

impl Default for BreakoutDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(5),
            min_magnitude: Ratio::new_const(0.01),
            min_volume_ratio: 1.5,
            follow_through_bars: Period::new_const(2),
        }
    }
}

impl BreakoutDetector {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// One signal per level breached within the lookback window.
    ///
    /// Levels not crossed inside the window, including those crossed
    /// earlier, produce nothing.
    pub fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        levels: &[SupportResistanceLevel],
        volume: &VolumeAnalysis,
    ) -> Vec<BreakoutSignal> {
        let Some(current) = bars.last() else {
            return Vec::new();
        };
        let close = current.close();
        let window_start = bars.len().saturating_sub(self.lookback.get());

        levels
            .iter()
            .filter_map(|level| {
                let price = level.price_level;
                let direction = match level.kind {
                    LevelKind::Resistance if close > price => BreakoutDirection::Upward,
                    LevelKind::Support if close < price => BreakoutDirection::Downward,
                    _ => return None,
                };
                let index = self.crossing_index(bars, window_start, price, direction)?;
                Some(self.confirm(bars, index, level, direction, volume))
            })
            .collect()
    }

    /// Locate levels on the bars before the lookback window, then report
    /// breakouts of those levels inside it.
    pub fn detect_from_history<T: OHLCV>(
        &self,
        bars: &[T],
        locator: &LevelLocator,
        scope: TrendScope,
        volume: &VolumeAnalysis,
    ) -> Vec<BreakoutSignal> {
        let lookback = self.lookback.get();
        if bars.len() <= lookback {
            return Vec::new();
        }
        let history = &bars[..bars.len() - lookback];
        let levels = locator.locate(history, scope);
        self.detect(bars, &levels, volume)
    }

    /// First bar in the window whose close moved beyond the level from a
    /// close that was not.
    fn crossing_index<T: OHLCV>(
        &self,
        bars: &[T],
        window_start: usize,
        level: f64,
        direction: BreakoutDirection,
    ) -> Option<usize> {
        (window_start..bars.len()).find(|&i| {
            direction.is_beyond(bars[i].close(), level)
                && (i == 0 || !direction.is_beyond(bars[i - 1].close(), level))
        })
    }

    fn confirm<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        level: &SupportResistanceLevel,
        direction: BreakoutDirection,
        volume: &VolumeAnalysis,
    ) -> BreakoutSignal {
        let breakout = &bars[index];
        let breakout_price = breakout.close();
        let magnitude = relative_error(breakout_price, level.price_level).unwrap_or(0.0);

        let price_confirmed = magnitude >= self.min_magnitude.get();
        let volume_confirmed = volume.volume_ratio > self.min_volume_ratio;
        let follow = &bars[index + 1..];
        let follow_through = self.follow_through_bars.get();
        let time_confirmed = follow.len() >= follow_through
            && follow[..follow_through]
                .iter()
                .all(|b| direction.agrees_with(b));

        let confirmations = [price_confirmed, volume_confirmed, time_confirmed]
            .iter()
            .filter(|&&c| c)
            .count();
        let strength = match confirmations {
            3 if level.strength == Strength::Strong => Strength::Strong,
            2 | 3 => Strength::Medium,
            _ => Strength::Weak,
        };

        BreakoutSignal {
            level_price: level.price_level,
            breakout_price,
            breakout_timestamp: breakout.timestamp(),
            breakout_index: index,
            magnitude,
            direction,
            price_confirmed,
            volume_confirmed,
            time_confirmed,
            scope: level.scope,
            strength,
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.follow_through_bars.get() >= self.lookback.get() {
            return Err(AnalysisError::InvalidConfig(format!(
                "follow_through_bars ({}) must be shorter than lookback ({})",
                self.follow_through_bars.get(),
                self.lookback.get()
            )));
        }
        Ok(())
    }
}

static BREAKOUT_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 5.0, (3.0, 10.0, 1.0), "Recent bars searched for the crossing"),
    ParamMeta::ratio("min_magnitude", 0.01, (0.005, 0.03, 0.005), "Distance beyond the level for price confirmation"),
    ParamMeta::float("min_volume_ratio", 1.5, (1.0, 3.0, 0.25), "Volume ratio needed for volume confirmation"),
    ParamMeta::period("follow_through_bars", 2.0, (1.0, 4.0, 1.0), "Bars that must close in the breakout direction"),
];

impl Parameterized for BreakoutDetector {
    fn param_meta() -> &'static [ParamMeta] {
        BREAKOUT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            lookback: get_period(params, "lookback", 5)?,
            min_magnitude: get_ratio(params, "min_magnitude", 0.01)?,
            min_volume_ratio: get_float(params, "min_volume_ratio", 1.5)?,
            follow_through_bars: get_period(params, "follow_through_bars", 2)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn analyzer_name() -> &'static str {
        "breakout"
    }
}

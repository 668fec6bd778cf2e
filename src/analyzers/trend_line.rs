//! Best-fit trend line search
//!
//! Candidate lines join two pivots of the same kind: pivot lows for a
//! rising support line, pivot highs for a falling resistance line. Each
//! candidate is extrapolated over its span plus a verification tail and
//! scored by fit and touches. With no acceptable candidate, direction comes
//! from the ordering of price and its 5/20/60-bar moving averages.

use std::collections::HashMap;

use tracing::debug;

use super::helpers::{self, coefficient_of_determination, relative_error, sma_tail};
use super::pivots::{Pivot, PivotDetector, PivotKind};
use crate::params::{get_float, get_period, get_ratio, ParamMeta, Parameterized};
use crate::{
    AnalysisError, LineSource, Period, Ratio, Result, TrendDirection, TrendLine, TrendPoint, TrendScope,
    OHLCV,
};

/// Windows shorter than this produce no line at all
pub const MIN_FIT_BARS: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    start_price: f64,
    end_price: f64,
    slope: f64,
    fit: f64,
    touches: usize,
    score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendLineFitter {
    pub pivots: PivotDetector,
    /// Relative distance from the line that counts as a touch
    pub touch_tolerance: Ratio,
    /// Candidates must fit strictly better than this to be considered
    pub min_fit: Ratio,
    /// Bars past the second pivot included in the evaluation
    pub verification_bars: Period,
    /// Below this absolute slope (price per bar) a line is sideways
    pub flat_slope: f64,
}

impl Default for TrendLineFitter {
    fn default() -> Self {
        Self {
            pivots: PivotDetector::default(),
            touch_tolerance: Ratio::new_const(0.02),
            min_fit: Ratio::new_const(0.5),
            verification_bars: Period::new_const(20),
            flat_slope: 0.01,
        }
    }
}

impl TrendLineFitter {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Fit the dominant trend line over the scope's trailing window.
    ///
    /// Returns `None` only when fewer than [`MIN_FIT_BARS`] bars are
    /// available. When neither side yields a valid pivot line, the
    /// moving-average fallback decides the direction. Point indices refer
    /// to `bars`.
    pub fn fit<T: OHLCV>(&self, bars: &[T], scope: TrendScope) -> Option<TrendLine> {
        let window = scope.window().min(bars.len());
        if window < MIN_FIT_BARS {
            debug!(bars = bars.len(), ?scope, "window too short for a trend line");
            return None;
        }

        let offset = bars.len() - window;
        let slice = &bars[offset..];
        let highs: Vec<f64> = slice.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = slice.iter().map(|b| b.low()).collect();

        let upward = self.best_candidate(&lows, &self.pivots.select(&lows, PivotKind::Low));
        let downward = self.best_candidate(&highs, &self.pivots.select(&highs, PivotKind::High));

        let valid = |c: &Candidate| TrendLine::meets_validity(c.fit, c.touches);
        let best = match (upward.filter(valid), downward.filter(valid)) {
            (Some(up), Some(down)) => Some(if down.score > up.score { down } else { up }),
            (up, down) => up.or(down),
        };

        Some(match best {
            Some(candidate) => self.line_from_candidate(slice, offset, candidate, scope),
            None => {
                debug!(?scope, "no valid pivot line, using moving-average fallback");
                self.moving_average_line(slice, offset, scope)
            }
        })
    }

    /// Classify a slope, treating near-flat lines as sideways
    #[inline]
    pub fn classify_slope(&self, slope: f64) -> TrendDirection {
        if slope.abs() < self.flat_slope || !slope.is_finite() {
            TrendDirection::Sideways
        } else if slope > 0.0 {
            TrendDirection::Upward
        } else {
            TrendDirection::Downward
        }
    }

    /// Fit and touch count of a line anchored at `start` with `slope`,
    /// evaluated over `[start, min(end + verification_bars, len))`.
    pub fn evaluate(&self, series: &[f64], start: usize, end: usize, slope: f64) -> (f64, usize) {
        let stop = end.saturating_add(self.verification_bars.get()).min(series.len());
        if start >= stop {
            return (0.0, 0);
        }

        let observed = &series[start..stop];
        let anchor = observed[0];
        let tolerance = self.touch_tolerance.get();

        let mut ss_res = 0.0;
        let mut touches = 0;
        for (step, &actual) in observed.iter().enumerate() {
            let expected = anchor + slope * step as f64;
            ss_res += (actual - expected).powi(2);
            if relative_error(actual, expected).is_some_and(|err| err < tolerance) {
                touches += 1;
            }
        }

        let mean = helpers::mean(observed);
        let ss_tot: f64 = observed.iter().map(|v| (v - mean).powi(2)).sum();
        let fit = helpers::finite_or(coefficient_of_determination(ss_res, ss_tot), 0.0, "goodness_of_fit");

        (fit, touches)
    }

    fn best_candidate(&self, series: &[f64], pivots: &[Pivot]) -> Option<Candidate> {
        let min_fit = self.min_fit.get();
        let mut best: Option<Candidate> = None;

        for (a, first) in pivots.iter().enumerate() {
            for second in &pivots[a + 1..] {
                if second.index <= first.index {
                    continue;
                }
                let slope = (second.price - first.price) / (second.index - first.index) as f64;
                if !slope.is_finite() {
                    continue;
                }

                let (fit, touches) = self.evaluate(series, first.index, second.index, slope);
                if fit <= min_fit {
                    continue;
                }

                let score = fit * 100.0 + touches as f64 * 10.0;
                if best.map_or(true, |b| score > b.score) {
                    best = Some(Candidate {
                        start: first.index,
                        end: second.index,
                        start_price: first.price,
                        end_price: second.price,
                        slope,
                        fit,
                        touches,
                        score,
                    });
                }
            }
        }

        best
    }

    fn line_from_candidate<T: OHLCV>(
        &self,
        slice: &[T],
        offset: usize,
        c: Candidate,
        scope: TrendScope,
    ) -> TrendLine {
        TrendLine {
            start_point: TrendPoint {
                index: offset + c.start,
                timestamp: slice[c.start].timestamp(),
                price: c.start_price,
            },
            end_point: TrendPoint {
                index: offset + c.end,
                timestamp: slice[c.end].timestamp(),
                price: c.end_price,
            },
            slope: c.slope,
            goodness_of_fit: c.fit,
            touch_count: c.touches,
            is_valid: TrendLine::meets_validity(c.fit, c.touches),
            scope,
            direction: self.classify_slope(c.slope),
            source: LineSource::PivotFit,
        }
    }

    fn moving_average_line<T: OHLCV>(&self, slice: &[T], offset: usize, scope: TrendScope) -> TrendLine {
        let closes: Vec<f64> = slice.iter().map(|b| b.close()).collect();
        let last = closes.len() - 1;

        let slope = helpers::finite_or((closes[last] - closes[0]) / last as f64, 0.0, "fallback_slope");

        TrendLine {
            start_point: TrendPoint {
                index: offset,
                timestamp: slice[0].timestamp(),
                price: closes[0],
            },
            end_point: TrendPoint {
                index: offset + last,
                timestamp: slice[last].timestamp(),
                price: closes[last],
            },
            slope,
            goodness_of_fit: 0.0,
            touch_count: 0,
            is_valid: false,
            scope,
            direction: moving_average_direction(&closes),
            source: LineSource::MovingAverage,
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        self.pivots.validate_config()?;
        if !(self.flat_slope >= 0.0 && self.flat_slope.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "flat_slope must be a finite non-negative number, got {}",
                self.flat_slope
            )));
        }
        Ok(())
    }
}

/// Upward when price > MA5 > MA20 > MA60, downward for the reverse ordering,
/// sideways otherwise. Averages are clipped to the available closes.
pub fn moving_average_direction(closes: &[f64]) -> TrendDirection {
    let Some(&price) = closes.last() else {
        return TrendDirection::Sideways;
    };
    let ma5 = sma_tail(closes, 5);
    let ma20 = sma_tail(closes, 20);
    let ma60 = sma_tail(closes, 60);

    if price > ma5 && ma5 > ma20 && ma20 > ma60 {
        TrendDirection::Upward
    } else if price < ma5 && ma5 < ma20 && ma20 < ma60 {
        TrendDirection::Downward
    } else {
        TrendDirection::Sideways
    }
}

static TREND_LINE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("pivot_order", 5.0, (2.0, 10.0, 1.0), "Bars on each side a pivot must dominate"),
    ParamMeta::period("max_pivots", 40.0, (10.0, 80.0, 10.0), "Most extreme pivots kept per kind"),
    ParamMeta::ratio("touch_tolerance", 0.02, (0.01, 0.05, 0.005), "Relative distance counted as a touch"),
    ParamMeta::ratio("min_fit", 0.5, (0.3, 0.8, 0.1), "Goodness of fit a candidate must exceed"),
    ParamMeta::period("verification_bars", 20.0, (5.0, 40.0, 5.0), "Bars past the second pivot that are evaluated"),
    ParamMeta::float("flat_slope", 0.01, (0.0, 0.1, 0.005), "Absolute slope below which a line is sideways"),
];

impl Parameterized for TrendLineFitter {
    fn param_meta() -> &'static [ParamMeta] {
        TREND_LINE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let fitter = Self {
            pivots: PivotDetector::with_params(params)?,
            touch_tolerance: get_ratio(params, "touch_tolerance", 0.02)?,
            min_fit: get_ratio(params, "min_fit", 0.5)?,
            verification_bars: get_period(params, "verification_bars", 20)?,
            flat_slope: get_float(params, "flat_slope", 0.01)?,
        };
        fitter.validate_config()?;
        Ok(fitter)
    }

    fn analyzer_name() -> &'static str {
        "trend_line"
    }
}

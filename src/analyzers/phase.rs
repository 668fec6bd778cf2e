//! Market phase classification
//!
//! A fixed indicator set is computed over the window, then one of three
//! rule sets runs depending on the prevailing direction. Each rule is a
//! flat list of boolean conditions with a pass count; the first passing
//! rule names the phase, otherwise the market is in public participation.

use std::collections::HashMap;

use tracing::debug;

use super::helpers::{
    self, annualized_volatility, finite_or, min_max, pct_returns, safe_ratio, sma_tail,
};
use crate::params::{get_period, ParamMeta, Parameterized};
use crate::{AnalysisError, Period, Phase, Result, TrendDirection, VolumeAnalysis, OHLCV};

/// Bars of recent returns behind `recent_volatility`
const RECENT_RETURNS: usize = 10;
/// Trailing bars averaged for `volume_relative`
const RECENT_VOLUME_BARS: usize = 5;
/// Prior bars whose range a close must clear for `breakout_strength`
const BREAKOUT_LOOKBACK: usize = 20;

// ============================================================
// INDICATORS
// ============================================================

/// Indicator snapshot of one window. Pure function of the bars; never cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PhaseIndicators {
    /// Annualized volatility of close-to-close returns over the window
    pub volatility: f64,
    /// Annualized volatility of the last 10 returns
    pub recent_volatility: f64,
    /// Close within the high/low range of the position sub-window, 0.0..=1.0
    pub price_position: f64,
    /// |SMA20 - SMA60| / SMA60, averages clipped to the window
    pub trend_strength: f64,
    pub momentum_10: f64,
    pub momentum_20: f64,
    /// Mean volume of the last 5 bars over mean volume of the window
    pub volume_relative: f64,
    /// How far the close cleared the prior 20-bar high or low, relative
    pub breakout_strength: f64,
}

impl PhaseIndicators {
    /// `position_window` bounds the sub-window used for `price_position`.
    pub fn compute<T: OHLCV>(bars: &[T], position_window: usize) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        let Some(&close) = closes.last() else {
            return Self::neutral();
        };
        let returns = pct_returns(&closes);

        let volatility = finite_or(annualized_volatility(&returns), 0.0, "volatility");
        let recent = &returns[returns.len().saturating_sub(RECENT_RETURNS)..];
        let recent_volatility = finite_or(annualized_volatility(recent), 0.0, "recent_volatility");

        let position_bars = &bars[bars.len().saturating_sub(position_window.max(1))..];
        let price_position = match min_max(position_bars.iter().flat_map(|b| [b.low(), b.high()])) {
            Some((lo, hi)) => safe_ratio(close - lo, hi - lo, 0.5).clamp(0.0, 1.0),
            None => 0.5,
        };
        let price_position = finite_or(price_position, 0.5, "price_position");

        let long_ma = sma_tail(&closes, 60);
        let trend_strength = finite_or(
            safe_ratio((sma_tail(&closes, 20) - long_ma).abs(), long_ma, 0.0),
            0.0,
            "trend_strength",
        );

        let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();
        let volume_relative = finite_or(
            safe_ratio(sma_tail(&volumes, RECENT_VOLUME_BARS), helpers::mean(&volumes), 1.0),
            1.0,
            "volume_relative",
        );

        Self {
            volatility,
            recent_volatility,
            price_position,
            trend_strength,
            momentum_10: finite_or(momentum(&closes, 10), 0.0, "momentum_10"),
            momentum_20: finite_or(momentum(&closes, 20), 0.0, "momentum_20"),
            volume_relative,
            breakout_strength: finite_or(breakout_strength(bars), 0.0, "breakout_strength"),
        }
    }

    fn neutral() -> Self {
        Self {
            volatility: 0.0,
            recent_volatility: 0.0,
            price_position: 0.5,
            trend_strength: 0.0,
            momentum_10: 0.0,
            momentum_20: 0.0,
            volume_relative: 1.0,
            breakout_strength: 0.0,
        }
    }
}

/// Close over the close `period` bars earlier (the first close if the
/// window is shorter), minus one
fn momentum(closes: &[f64], period: usize) -> f64 {
    let Some(&last) = closes.last() else {
        return 0.0;
    };
    let base = closes[closes.len().saturating_sub(period + 1)];
    safe_ratio(last, base, 1.0) - 1.0
}

fn breakout_strength<T: OHLCV>(bars: &[T]) -> f64 {
    let Some((current, prior)) = bars.split_last() else {
        return 0.0;
    };
    let prior = &prior[prior.len().saturating_sub(BREAKOUT_LOOKBACK)..];
    let Some((lo, _)) = min_max(prior.iter().map(|b| b.low())) else {
        return 0.0;
    };
    let Some((_, hi)) = min_max(prior.iter().map(|b| b.high())) else {
        return 0.0;
    };
    let close = current.close();
    let above = safe_ratio(close - hi, hi, 0.0);
    let below = safe_ratio(lo - close, lo, 0.0);
    above.max(below).max(0.0)
}

// ============================================================
// RULES
// ============================================================

/// Outcome of one rule: how many of its conditions held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleCheck {
    pub name: &'static str,
    pub met: usize,
    pub total: usize,
    pub required: usize,
}

impl RuleCheck {
    fn tally(name: &'static str, required: usize, conditions: &[bool]) -> Self {
        Self {
            name,
            met: conditions.iter().filter(|&&c| c).count(),
            total: conditions.len(),
            required,
        }
    }

    #[inline]
    pub fn passed(&self) -> bool {
        self.met >= self.required
    }
}

type Evaluator = fn(&PhaseIndicators, &VolumeAnalysis) -> RuleCheck;

/// A rule set entry: the phase it signals and its evaluator
struct Rule {
    phase: Phase,
    evaluate: Evaluator,
}

const UPWARD_RULES: &[Rule] = &[
    Rule {
        phase: Phase::Accumulation,
        evaluate: upward_accumulation,
    },
    Rule {
        phase: Phase::Panic,
        evaluate: upward_euphoria,
    },
];

const DOWNWARD_RULES: &[Rule] = &[
    Rule {
        phase: Phase::Panic,
        evaluate: downward_capitulation,
    },
    Rule {
        phase: Phase::Accumulation,
        evaluate: downward_bottoming,
    },
];

const SIDEWAYS_RULES: &[Rule] = &[
    Rule {
        phase: Phase::Accumulation,
        evaluate: sideways_base,
    },
    Rule {
        phase: Phase::Panic,
        evaluate: sideways_climax,
    },
];

fn rules_for(direction: TrendDirection) -> &'static [Rule] {
    match direction {
        TrendDirection::Upward => UPWARD_RULES,
        TrendDirection::Downward => DOWNWARD_RULES,
        TrendDirection::Sideways => SIDEWAYS_RULES,
    }
}

/// Quiet base during an uptrend: 4 of 6
fn upward_accumulation(ind: &PhaseIndicators, vol: &VolumeAnalysis) -> RuleCheck {
    RuleCheck::tally(
        "upward_accumulation",
        4,
        &[
            ind.price_position < 0.6,
            ind.recent_volatility < ind.volatility * 1.2,
            vol.volume_ratio < 1.3,
            ind.trend_strength < 0.05,
            ind.momentum_10.abs() < 0.03,
            ind.breakout_strength < 0.02,
        ],
    )
}

/// Euphoric blow-off: 4 of 6
fn upward_euphoria(ind: &PhaseIndicators, vol: &VolumeAnalysis) -> RuleCheck {
    RuleCheck::tally(
        "upward_euphoria",
        4,
        &[
            ind.price_position > 0.8,
            vol.volume_ratio > 2.0,
            ind.momentum_10 > 0.05,
            ind.recent_volatility > ind.volatility * 1.5,
            ind.breakout_strength > 0.03,
            vol.divergence_signal,
        ],
    )
}

/// Capitulation: 3 of 5
fn downward_capitulation(ind: &PhaseIndicators, vol: &VolumeAnalysis) -> RuleCheck {
    RuleCheck::tally(
        "downward_capitulation",
        3,
        &[
            ind.momentum_10 < -0.05,
            vol.volume_ratio > 2.0,
            ind.recent_volatility > ind.volatility * 2.0,
            ind.breakout_strength > 0.03,
            ind.price_position < 0.5 && ind.momentum_10 < 0.0,
        ],
    )
}

/// Bottoming: 3 of 5
fn downward_bottoming(ind: &PhaseIndicators, vol: &VolumeAnalysis) -> RuleCheck {
    RuleCheck::tally(
        "downward_bottoming",
        3,
        &[
            ind.price_position < 0.4,
            ind.momentum_10 > -0.02,
            vol.volume_ratio < 0.8,
            ind.recent_volatility < ind.volatility,
            vol.divergence_signal,
        ],
    )
}

fn sideways_base(ind: &PhaseIndicators, vol: &VolumeAnalysis) -> RuleCheck {
    RuleCheck::tally(
        "sideways_base",
        2,
        &[ind.price_position < 0.3, vol.volume_ratio < 1.2],
    )
}

fn sideways_climax(ind: &PhaseIndicators, vol: &VolumeAnalysis) -> RuleCheck {
    RuleCheck::tally(
        "sideways_climax",
        2,
        &[ind.price_position > 0.7, vol.volume_ratio > 1.5],
    )
}

// ============================================================
// CLASSIFIER
// ============================================================

/// Classification with the rule that decided it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseVerdict {
    pub phase: Phase,
    /// Passing rule, or `None` when no rule passed or history was too short
    pub rule: Option<RuleCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseClassifier {
    /// Shorter windows classify as accumulation
    pub min_bars: Period,
    /// Trailing bars whose range anchors `price_position`
    pub position_window: Period,
}

impl Default for PhaseClassifier {
    fn default() -> Self {
        Self {
            min_bars: Period::new_const(30),
            position_window: Period::new_const(60),
        }
    }
}

impl PhaseClassifier {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn classify<T: OHLCV>(
        &self,
        bars: &[T],
        direction: TrendDirection,
        volume: &VolumeAnalysis,
    ) -> Phase {
        self.classify_detailed(bars, direction, volume).phase
    }

    pub fn classify_detailed<T: OHLCV>(
        &self,
        bars: &[T],
        direction: TrendDirection,
        volume: &VolumeAnalysis,
    ) -> PhaseVerdict {
        if bars.len() < self.min_bars.get() {
            debug!(bars = bars.len(), "history too short, defaulting to accumulation");
            return PhaseVerdict {
                phase: Phase::Accumulation,
                rule: None,
            };
        }

        let indicators = PhaseIndicators::compute(bars, self.position_window.get());
        classify_indicators(&indicators, direction, volume)
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.min_bars.get() < 2 {
            return Err(AnalysisError::InvalidConfig(
                "min_bars must allow at least one return".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn classify_indicators(
    indicators: &PhaseIndicators,
    direction: TrendDirection,
    volume: &VolumeAnalysis,
) -> PhaseVerdict {
    rules_for(direction)
        .iter()
        .map(|rule| (rule.phase, (rule.evaluate)(indicators, volume)))
        .find(|(_, check)| check.passed())
        .map(|(phase, check)| PhaseVerdict {
            phase,
            rule: Some(check),
        })
        .unwrap_or(PhaseVerdict {
            phase: Phase::PublicParticipation,
            rule: None,
        })
}

static PHASE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_bars", 30.0, (20.0, 60.0, 10.0), "Bars needed before rules are applied"),
    ParamMeta::period("position_window", 60.0, (20.0, 120.0, 20.0), "Bars whose range anchors price position"),
];

impl Parameterized for PhaseClassifier {
    fn param_meta() -> &'static [ParamMeta] {
        PHASE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let classifier = Self {
            min_bars: get_period(params, "min_bars", 30)?,
            position_window: get_period(params, "position_window", 60)?,
        };
        classifier.validate_config()?;
        Ok(classifier)
    }

    fn analyzer_name() -> &'static str {
        "phase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bars_from_closes(closes: &[f64], volume: f64) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64, c, c + 0.5, c - 0.5, c, volume))
            .collect()
    }

    fn indicators() -> PhaseIndicators {
        PhaseIndicators {
            volatility: 0.2,
            recent_volatility: 0.2,
            price_position: 0.5,
            trend_strength: 0.03,
            momentum_10: 0.0,
            momentum_20: 0.0,
            volume_relative: 1.0,
            breakout_strength: 0.0,
        }
    }

    #[test]
    fn test_short_history_defaults_to_accumulation() {
        let bars = bars_from_closes(&[100.0; 29], 1000.0);
        let classifier = PhaseClassifier::default();
        for direction in [TrendDirection::Upward, TrendDirection::Downward, TrendDirection::Sideways] {
            let verdict = classifier.classify_detailed(&bars, direction, &VolumeAnalysis::from_ratio(5.0));
            assert_eq!(verdict.phase, Phase::Accumulation);
            assert!(verdict.rule.is_none());
        }
    }

    #[test]
    fn test_monotonic_uptrend_is_not_panic() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes, 1000.0);
        let phase = PhaseClassifier::default().classify(
            &bars,
            TrendDirection::Upward,
            &VolumeAnalysis::from_ratio(1.0),
        );
        assert_eq!(phase, Phase::PublicParticipation);
    }

    #[test]
    fn test_indicators_on_flat_series() {
        let bars = bars_from_closes(&[50.0; 40], 1000.0);
        let ind = PhaseIndicators::compute(&bars, 60);
        assert_eq!(ind.volatility, 0.0);
        assert_eq!(ind.recent_volatility, 0.0);
        assert!((ind.price_position - 0.5).abs() < 1e-12);
        assert_eq!(ind.trend_strength, 0.0);
        assert_eq!(ind.momentum_10, 0.0);
        assert_eq!(ind.volume_relative, 1.0);
        assert_eq!(ind.breakout_strength, 0.0);
    }

    #[test]
    fn test_indicators_degenerate_range_is_neutral() {
        let bars: Vec<Bar> = (0..40).map(|i| Bar::new(i, 10.0, 10.0, 10.0, 10.0, 0.0)).collect();
        let ind = PhaseIndicators::compute(&bars, 60);
        assert_eq!(ind.price_position, 0.5);
        assert_eq!(ind.volume_relative, 1.0);
    }

    #[test]
    fn test_indicators_survive_nan_close() {
        let mut bars = bars_from_closes(&[50.0; 40], 1000.0);
        bars[39].close = f64::NAN;
        let ind = PhaseIndicators::compute(&bars, 60);
        assert!(ind.volatility.is_finite());
        assert!(ind.price_position.is_finite());
        assert!(ind.momentum_10.is_finite());
        assert!(ind.breakout_strength.is_finite());
    }

    #[test]
    fn test_momentum_and_breakout() {
        let mut closes = vec![100.0; 30];
        closes.push(110.0);
        let bars = bars_from_closes(&closes, 1000.0);
        let ind = PhaseIndicators::compute(&bars, 60);
        assert!((ind.momentum_10 - 0.1).abs() < 1e-12);
        assert!((ind.momentum_20 - 0.1).abs() < 1e-12);
        // Prior high is 100.5
        assert!((ind.breakout_strength - (110.0 - 100.5) / 100.5).abs() < 1e-12);
    }

    #[test]
    fn test_volume_relative() {
        let mut bars = bars_from_closes(&[100.0; 30], 1000.0);
        for bar in bars.iter_mut().skip(25) {
            bar.volume = 4000.0;
        }
        let ind = PhaseIndicators::compute(&bars, 60);
        // 4000 / ((25 * 1000 + 5 * 4000) / 30)
        assert!((ind.volume_relative - 4000.0 / 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_upward_accumulation_needs_four() {
        let vol = VolumeAnalysis::from_ratio(1.0);
        let check = upward_accumulation(&indicators(), &vol);
        assert_eq!(check.total, 6);
        assert_eq!(check.met, 6);
        assert!(check.passed());

        let stretched = PhaseIndicators {
            price_position: 0.9,
            trend_strength: 0.2,
            momentum_10: 0.1,
            ..indicators()
        };
        let check = upward_accumulation(&stretched, &vol);
        assert_eq!(check.met, 3);
        assert!(!check.passed());
    }

    #[test]
    fn test_upward_euphoria() {
        let hot = PhaseIndicators {
            price_position: 0.95,
            momentum_10: 0.08,
            recent_volatility: 0.5,
            breakout_strength: 0.04,
            trend_strength: 0.2,
            ..indicators()
        };
        let verdict = classify_indicators(&hot, TrendDirection::Upward, &VolumeAnalysis::from_ratio(1.0));
        assert_eq!(verdict.phase, Phase::Panic);
        assert_eq!(verdict.rule.unwrap().name, "upward_euphoria");
        assert_eq!(verdict.rule.unwrap().met, 4);
    }

    #[test]
    fn test_downward_capitulation_checked_first() {
        let crash = PhaseIndicators {
            price_position: 0.1,
            momentum_10: -0.12,
            recent_volatility: 0.6,
            ..indicators()
        };
        let verdict = classify_indicators(&crash, TrendDirection::Downward, &VolumeAnalysis::from_ratio(2.5));
        assert_eq!(verdict.phase, Phase::Panic);
        assert_eq!(verdict.rule.unwrap().name, "downward_capitulation");
    }

    #[test]
    fn test_downward_bottoming() {
        let base = PhaseIndicators {
            price_position: 0.2,
            momentum_10: 0.01,
            recent_volatility: 0.1,
            ..indicators()
        };
        let verdict = classify_indicators(&base, TrendDirection::Downward, &VolumeAnalysis::from_ratio(0.7));
        assert_eq!(verdict.phase, Phase::Accumulation);
        assert_eq!(verdict.rule.unwrap().met, 4);
    }

    #[test]
    fn test_downward_falls_through_to_participation() {
        let grinding = PhaseIndicators {
            price_position: 0.6,
            momentum_10: -0.03,
            recent_volatility: 0.25,
            ..indicators()
        };
        let verdict = classify_indicators(&grinding, TrendDirection::Downward, &VolumeAnalysis::from_ratio(1.0));
        assert_eq!(verdict.phase, Phase::PublicParticipation);
        assert!(verdict.rule.is_none());
    }

    #[test]
    fn test_sideways_rules() {
        let low = PhaseIndicators {
            price_position: 0.2,
            ..indicators()
        };
        let high = PhaseIndicators {
            price_position: 0.8,
            ..indicators()
        };
        let quiet = VolumeAnalysis::from_ratio(1.0);
        let loud = VolumeAnalysis::from_ratio(1.8);

        assert_eq!(classify_indicators(&low, TrendDirection::Sideways, &quiet).phase, Phase::Accumulation);
        assert_eq!(classify_indicators(&high, TrendDirection::Sideways, &loud).phase, Phase::Panic);
        assert_eq!(
            classify_indicators(&high, TrendDirection::Sideways, &quiet).phase,
            Phase::PublicParticipation
        );
        assert_eq!(
            classify_indicators(&low, TrendDirection::Sideways, &loud).phase,
            Phase::PublicParticipation
        );
    }

    #[test]
    fn test_divergence_counts_toward_bottoming() {
        let ind = PhaseIndicators {
            price_position: 0.35,
            momentum_10: -0.04,
            recent_volatility: 0.3,
            ..indicators()
        };
        let without = VolumeAnalysis::from_ratio(0.7);
        let with = VolumeAnalysis::from_ratio(0.7).with_divergence(true);
        assert_eq!(downward_bottoming(&ind, &without).met, 2);
        assert_eq!(downward_bottoming(&ind, &with).met, 3);
    }
}

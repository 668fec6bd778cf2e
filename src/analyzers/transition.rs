//! Phase transition estimate
//!
//! The trailing window is split into a recent and an older segment and the
//! indicator set is computed on each. Rules registered for the current phase
//! compare the two segments and add probability toward a target phase.

use std::collections::HashMap;

use tracing::debug;

use super::helpers::{mean, safe_ratio};
use super::phase::PhaseIndicators;
use crate::params::{get_period, ParamMeta, Parameterized};
use crate::{AnalysisError, Period, Phase, PhaseTransition, Result, OHLCV};

/// Indicators of both segments plus the volume growth between them
#[derive(Debug, Clone, Copy)]
struct SegmentPair {
    recent: PhaseIndicators,
    older: PhaseIndicators,
    /// Mean recent volume over mean older volume
    volume_growth: f64,
}

/// One transition rule: fires with a signal description, or not at all
struct TransitionRule {
    from: Phase,
    to: Phase,
    increment: f64,
    check: fn(&SegmentPair) -> Option<String>,
}

// Order matters for ties: the first target listed for a phase wins.
const RULES: &[TransitionRule] = &[
    TransitionRule {
        from: Phase::Accumulation,
        to: Phase::PublicParticipation,
        increment: 0.3,
        check: base_breakout,
    },
    TransitionRule {
        from: Phase::Accumulation,
        to: Phase::PublicParticipation,
        increment: 0.3,
        check: volume_expansion,
    },
    TransitionRule {
        from: Phase::PublicParticipation,
        to: Phase::Panic,
        increment: 0.4,
        check: volatility_spike,
    },
    TransitionRule {
        from: Phase::PublicParticipation,
        to: Phase::Accumulation,
        increment: 0.3,
        check: trend_exhaustion,
    },
    TransitionRule {
        from: Phase::Panic,
        to: Phase::Accumulation,
        increment: 0.4,
        check: panic_subsiding,
    },
];

fn base_breakout(s: &SegmentPair) -> Option<String> {
    (s.recent.breakout_strength > 0.02 || s.recent.momentum_10 > 0.05).then(|| {
        format!(
            "price breaking out of base (breakout {:.1}%, 10-bar momentum {:.1}%)",
            s.recent.breakout_strength * 100.0,
            s.recent.momentum_10 * 100.0
        )
    })
}

fn volume_expansion(s: &SegmentPair) -> Option<String> {
    (s.recent.volume_relative > 1.5 || s.volume_growth > 1.3).then(|| {
        format!(
            "volume expanding ({:.2}x recent, {:.2}x over prior segment)",
            s.recent.volume_relative, s.volume_growth
        )
    })
}

fn volatility_spike(s: &SegmentPair) -> Option<String> {
    (s.recent.volatility >= 2.0 * s.older.volatility && s.recent.volume_relative > 2.0).then(|| {
        format!(
            "volatility spike ({:.2} vs {:.2}) on heavy volume ({:.2}x)",
            s.recent.volatility, s.older.volatility, s.recent.volume_relative
        )
    })
}

fn trend_exhaustion(s: &SegmentPair) -> Option<String> {
    (s.recent.trend_strength < 0.5 * s.older.trend_strength && s.recent.momentum_10.abs() < 0.02)
        .then(|| {
            format!(
                "trend exhausting (strength {:.3} from {:.3}, momentum stalled)",
                s.recent.trend_strength, s.older.trend_strength
            )
        })
}

fn panic_subsiding(s: &SegmentPair) -> Option<String> {
    (s.recent.volatility < 0.7 * s.older.volatility && s.recent.volume_relative < 1.0).then(|| {
        format!(
            "panic subsiding (volatility {:.2} from {:.2}, volume {:.2}x)",
            s.recent.volatility, s.older.volatility, s.recent.volume_relative
        )
    })
}

/// How characteristic the recent segment is of `phase`, 0.0..=1.0
fn phase_strength(phase: Phase, recent: &PhaseIndicators) -> f64 {
    let unit = |x: f64| x.clamp(0.0, 1.0);
    let (a, b) = match phase {
        Phase::Accumulation => (
            unit(1.0 - recent.volatility / 0.3),
            unit(1.0 - recent.volume_relative / 1.5),
        ),
        Phase::PublicParticipation => (
            unit(recent.trend_strength / 0.1),
            unit(recent.momentum_10.abs() / 0.05),
        ),
        Phase::Panic => (
            unit(recent.recent_volatility / 0.5),
            unit(recent.volume_relative / 3.0),
        ),
    };
    (a + b) / 2.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionModel {
    /// Shorter histories report no transition
    pub min_bars: Period,
    /// Length of each of the recent and older segments
    pub segment: Period,
}

impl Default for TransitionModel {
    fn default() -> Self {
        Self {
            min_bars: Period::new_const(60),
            segment: Period::new_const(30),
        }
    }
}

impl TransitionModel {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Probability of leaving `current`, the likeliest next phase, and the
    /// signals behind it.
    ///
    /// When rules for different targets fire, the target with the larger
    /// summed increment wins; ties go to the rule listed first.
    pub fn estimate<T: OHLCV>(&self, bars: &[T], current: Phase) -> PhaseTransition {
        let segment = self.segment.get();
        if bars.len() < self.min_bars.get() || bars.len() < 2 * segment {
            debug!(bars = bars.len(), "history too short for transition estimate");
            return PhaseTransition::unchanged(current);
        }

        let split = bars.len() - segment;
        let recent_bars = &bars[split..];
        let older_bars = &bars[split - segment..split];
        let volumes = |s: &[T]| s.iter().map(|b| b.volume()).collect::<Vec<f64>>();

        let pair = SegmentPair {
            recent: PhaseIndicators::compute(recent_bars, segment),
            older: PhaseIndicators::compute(older_bars, segment),
            volume_growth: safe_ratio(mean(&volumes(recent_bars)), mean(&volumes(older_bars)), 1.0),
        };

        let mut targets: Vec<(Phase, f64)> = Vec::new();
        let mut signals = Vec::new();
        for rule in RULES.iter().filter(|r| r.from == current) {
            if let Some(signal) = (rule.check)(&pair) {
                signals.push(signal);
                match targets.iter_mut().find(|(phase, _)| *phase == rule.to) {
                    Some((_, p)) => *p += rule.increment,
                    None => targets.push((rule.to, rule.increment)),
                }
            }
        }

        let best = targets
            .into_iter()
            .fold(None, |best: Option<(Phase, f64)>, (phase, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((phase, p)),
            });

        let (next_phase, probability) = best.unwrap_or((current, 0.0));
        PhaseTransition {
            probability: probability.clamp(0.0, 1.0),
            next_phase,
            signals,
            current_phase_strength: phase_strength(current, &pair.recent),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.segment.get() < 2 {
            return Err(AnalysisError::InvalidConfig(
                "segment must hold at least two bars".into(),
            ));
        }
        if self.min_bars.get() < 2 * self.segment.get() {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_bars ({}) must cover two segments of {}",
                self.min_bars.get(),
                self.segment.get()
            )));
        }
        Ok(())
    }
}

static TRANSITION_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_bars", 60.0, (40.0, 120.0, 20.0), "Bars needed before a transition is estimated"),
    ParamMeta::period("segment", 30.0, (10.0, 60.0, 10.0), "Length of the recent and older segments"),
];

impl Parameterized for TransitionModel {
    fn param_meta() -> &'static [ParamMeta] {
        TRANSITION_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let model = Self {
            min_bars: get_period(params, "min_bars", 60)?,
            segment: get_period(params, "segment", 30)?,
        };
        model.validate_config()?;
        Ok(model)
    }

    fn analyzer_name() -> &'static str {
        "transition"
    }
}

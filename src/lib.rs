//! # trendphase - trend, level and market phase analysis
//!
//! Deterministic, rule-based analysis of a single security's OHLCV window:
//! best-fit trend lines, ranked support/resistance levels with breakout
//! confirmation, and market phase classification with a transition outlook.
//!
//! ## Quick Start
//!
//! ```rust
//! use trendphase::prelude::*;
//!
//! // Define your OHLCV data
//! struct Candle { o: f64, h: f64, l: f64, c: f64, v: f64 }
//!
//! impl OHLCV for Candle {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//! }
//!
//! // Create engine with default analyzers
//! let engine = EngineBuilder::new().build().unwrap();
//!
//! // Analyze your data
//! let bars: Vec<Candle> = vec![];
//! let volume = VolumeAnalysis::from_bars(&bars);
//! let analysis = engine.analyze(&bars, TrendScope::Secondary, &volume).unwrap();
//! assert!(analysis.trend_line.is_none());
//! ```

pub mod analyzers;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Analyzers
        analyzers::*,
        // Parameters
        params::{get_float, get_period, get_ratio, ParamMeta, ParamType, Parameterized},
        // Parallel
        analyze_parallel,
        // Errors
        AnalysisError,
        AnalysisFailure,
        AnalysisResult,
        // Engine
        AnalysisEngine,
        // Types
        Bar,
        BreakoutDirection,
        BreakoutSignal,
        EngineBuilder,
        LevelKind,
        LineSource,
        MarketAnalysis,
        // Core traits
        OHLCVExt,
        Period,
        Phase,
        PhaseTransition,
        Ratio,
        Result,
        Strength,
        SupportResistanceLevel,
        TrendDirection,
        TrendLine,
        TrendPoint,
        TrendScope,
        VolumeAnalysis,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised at the configuration and validation boundary.
///
/// Analyzer calls themselves never fail: short or degenerate windows
/// produce typed defaults instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(AnalysisError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(AnalysisError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    /// Bar open time as Unix epoch milliseconds, if known.
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) || self.volume().is_nan() {
            return Err(AnalysisError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) || self.volume().is_infinite() {
            return Err(AnalysisError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(AnalysisError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.volume() < 0.0 {
            return Err(AnalysisError::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Plain OHLCV bar for callers without their own candle type.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: Option<i64>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

// ============================================================
// CLASSIFICATION ENUMS
// ============================================================

/// Trend horizon, implying how many trailing bars are analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendScope {
    Primary,
    Secondary,
    Minor,
}

impl TrendScope {
    pub const ALL: [TrendScope; 3] = [TrendScope::Primary, TrendScope::Secondary, TrendScope::Minor];

    /// Number of trailing bars analyzed for this scope
    #[inline]
    pub fn window(self) -> usize {
        match self {
            TrendScope::Primary => 250,
            TrendScope::Secondary => 60,
            TrendScope::Minor => 20,
        }
    }

    /// Minimum touches for a horizontal level to count at this scope
    #[inline]
    pub fn min_touches(self) -> usize {
        match self {
            TrendScope::Primary => 3,
            TrendScope::Secondary | TrendScope::Minor => 2,
        }
    }
}

/// Directional bias of a trend line or of the market being classified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Upward,
    Downward,
    #[default]
    Sideways,
}

/// Direction in which a level was breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakoutDirection {
    Upward,
    Downward,
}

impl BreakoutDirection {
    /// True when `price` lies strictly beyond `level` in this direction
    #[inline]
    pub fn is_beyond(self, price: f64, level: f64) -> bool {
        match self {
            BreakoutDirection::Upward => price > level,
            BreakoutDirection::Downward => price < level,
        }
    }

    /// True when the bar closed in this direction relative to its own open
    #[inline]
    pub fn agrees_with<T: OHLCV>(self, bar: &T) -> bool {
        match self {
            BreakoutDirection::Upward => bar.is_bullish(),
            BreakoutDirection::Downward => bar.is_bearish(),
        }
    }
}

/// Qualitative strength tier, ordered `Weak < Medium < Strong`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    #[default]
    Weak,
    Medium,
    Strong,
}

/// Whether a horizontal level sits below (support) or above (resistance) price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
}

/// Market-cycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Quiet base-building
    #[default]
    Accumulation,
    /// Trending, broad participation
    PublicParticipation,
    /// Capitulation or euphoric blow-off
    Panic,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Accumulation, Phase::PublicParticipation, Phase::Panic];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Accumulation => "accumulation",
            Phase::PublicParticipation => "public_participation",
            Phase::Panic => "panic",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// TREND LINE
// ============================================================

/// Minimum goodness-of-fit (exclusive) for a line to be valid
pub const VALID_FIT: f64 = 0.6;
/// Minimum touches for a line to be valid
pub const VALID_TOUCHES: usize = 2;

/// Anchor of a trend line
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendPoint {
    /// Index into the bars passed to the fitter
    pub index: usize,
    pub timestamp: Option<i64>,
    pub price: f64,
}

/// How a trend line was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// Line through two pivots, scored by fit and touches
    PivotFit,
    /// No pivot pair qualified; direction from moving-average ordering
    MovingAverage,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendLine {
    pub start_point: TrendPoint,
    pub end_point: TrendPoint,
    /// Price change per bar
    pub slope: f64,
    /// Coefficient of determination over the evaluation range, 0.0..=1.0
    pub goodness_of_fit: f64,
    pub touch_count: usize,
    pub is_valid: bool,
    pub scope: TrendScope,
    pub direction: TrendDirection,
    pub source: LineSource,
}

impl TrendLine {
    /// Validity rule shared by every producer of trend lines
    #[inline]
    pub fn meets_validity(goodness_of_fit: f64, touch_count: usize) -> bool {
        goodness_of_fit > VALID_FIT && touch_count >= VALID_TOUCHES
    }

    /// Extrapolated line price at a bar index
    #[inline]
    pub fn price_at(&self, index: usize) -> f64 {
        self.start_point.price + self.slope * (index as f64 - self.start_point.index as f64)
    }
}

// ============================================================
// LEVELS & BREAKOUTS
// ============================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SupportResistanceLevel {
    pub price_level: f64,
    pub strength: Strength,
    pub touch_count: usize,
    pub last_touch_timestamp: Option<i64>,
    /// Index into the bars passed to the locator
    pub last_touch_index: usize,
    /// Raw score the strength tier was derived from
    pub score: f64,
    pub scope: TrendScope,
    pub kind: LevelKind,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakoutSignal {
    pub level_price: f64,
    /// Close of the first bar beyond the level
    pub breakout_price: f64,
    pub breakout_timestamp: Option<i64>,
    pub breakout_index: usize,
    /// |breakout_price - level_price| / level_price
    pub magnitude: f64,
    pub direction: BreakoutDirection,
    pub price_confirmed: bool,
    pub volume_confirmed: bool,
    pub time_confirmed: bool,
    pub scope: TrendScope,
    pub strength: Strength,
}

impl BreakoutSignal {
    /// Number of confirmations, 0..=3
    #[inline]
    pub fn confirmations(&self) -> usize {
        [self.price_confirmed, self.volume_confirmed, self.time_confirmed]
            .iter()
            .filter(|&&c| c)
            .count()
    }
}

// ============================================================
// PHASE TRANSITION
// ============================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseTransition {
    /// Probability of moving to `next_phase`, 0.0..=1.0
    pub probability: f64,
    pub next_phase: Phase,
    pub signals: Vec<String>,
    /// How characteristic the recent window is of the current phase, 0.0..=1.0
    pub current_phase_strength: f64,
}

impl PhaseTransition {
    /// No evidence of a transition
    pub fn unchanged(current: Phase) -> Self {
        Self {
            probability: 0.0,
            next_phase: current,
            signals: Vec::new(),
            current_phase_strength: 0.0,
        }
    }
}

// ============================================================
// VOLUME ANALYSIS (external input)
// ============================================================

/// Volume summary produced by an upstream volume-pattern classifier
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolumeAnalysis {
    pub current_volume: f64,
    pub avg_volume_20d: f64,
    /// current_volume / avg_volume_20d
    pub volume_ratio: f64,
    pub pattern: String,
    pub divergence_signal: bool,
    pub strength: Strength,
}

impl Default for VolumeAnalysis {
    fn default() -> Self {
        Self::from_ratio(1.0)
    }
}

impl VolumeAnalysis {
    /// Summary carrying only a volume ratio
    pub fn from_ratio(volume_ratio: f64) -> Self {
        Self {
            current_volume: 0.0,
            avg_volume_20d: 0.0,
            volume_ratio,
            pattern: String::from("normal"),
            divergence_signal: false,
            strength: Strength::Weak,
        }
    }

    /// Neutral summary from raw bars: last volume against the trailing
    /// 20-bar average, no divergence.
    pub fn from_bars<T: OHLCV>(bars: &[T]) -> Self {
        let Some(last) = bars.last() else {
            return Self::default();
        };
        let tail = &bars[bars.len().saturating_sub(20)..];
        let avg = tail.iter().map(|b| b.volume()).sum::<f64>() / tail.len() as f64;
        let ratio = analyzers::helpers::safe_ratio(last.volume(), avg, 1.0);

        Self {
            current_volume: last.volume(),
            avg_volume_20d: avg,
            volume_ratio: ratio,
            ..Self::from_ratio(ratio)
        }
    }

    pub fn with_divergence(mut self, divergence_signal: bool) -> Self {
        self.divergence_signal = divergence_signal;
        self
    }
}

// ============================================================
// ANALYSIS ENGINE
// ============================================================

use analyzers::{BreakoutDetector, LevelLocator, PhaseClassifier, TransitionModel, TrendLineFitter};

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub validate_data: bool,
}

/// Everything the engine derives for one window and scope
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketAnalysis {
    pub scope: TrendScope,
    pub trend_line: Option<TrendLine>,
    pub direction: TrendDirection,
    pub levels: Vec<SupportResistanceLevel>,
    pub breakouts: Vec<BreakoutSignal>,
    pub phase: Phase,
    pub transition: PhaseTransition,
}

/// Composes the analyzers into a single pass over a bar window.
///
/// Holds only configuration; every call is independent.
#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    trend_fitter: TrendLineFitter,
    level_locator: LevelLocator,
    breakout_detector: BreakoutDetector,
    phase_classifier: PhaseClassifier,
    transition_model: TransitionModel,
    config: EngineConfig,
}

impl AnalysisEngine {
    // ===========================================
    // LOW-LEVEL: Single analyzers
    // ===========================================

    #[inline]
    pub fn fit_trend<T: OHLCV>(&self, bars: &[T], scope: TrendScope) -> Option<TrendLine> {
        self.trend_fitter.fit(bars, scope)
    }

    #[inline]
    pub fn locate_levels<T: OHLCV>(
        &self,
        bars: &[T],
        scope: TrendScope,
    ) -> Vec<SupportResistanceLevel> {
        self.level_locator.locate(bars, scope)
    }

    #[inline]
    pub fn detect_breakouts<T: OHLCV>(
        &self,
        bars: &[T],
        levels: &[SupportResistanceLevel],
        volume: &VolumeAnalysis,
    ) -> Vec<BreakoutSignal> {
        self.breakout_detector.detect(bars, levels, volume)
    }

    #[inline]
    pub fn classify_phase<T: OHLCV>(
        &self,
        bars: &[T],
        direction: TrendDirection,
        volume: &VolumeAnalysis,
    ) -> Phase {
        self.phase_classifier.classify(bars, direction, volume)
    }

    #[inline]
    pub fn estimate_transition<T: OHLCV>(&self, bars: &[T], current: Phase) -> PhaseTransition {
        self.transition_model.estimate(bars, current)
    }

    // ===========================================
    // HIGH-LEVEL: Full analysis
    // ===========================================

    /// Run every analyzer over `bars` for one scope.
    ///
    /// Breakouts are measured against levels located on the bars that
    /// precede the breakout lookback window. Errors only when data
    /// validation is enabled and a bar is malformed.
    pub fn analyze<T: OHLCV>(
        &self,
        bars: &[T],
        scope: TrendScope,
        volume: &VolumeAnalysis,
    ) -> Result<MarketAnalysis> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }

        let trend_line = self.trend_fitter.fit(bars, scope);
        let direction = trend_line
            .as_ref()
            .map(|line| line.direction)
            .unwrap_or_default();
        let levels = self.level_locator.locate(bars, scope);
        let breakouts =
            self.breakout_detector
                .detect_from_history(bars, &self.level_locator, scope, volume);
        let phase = self.phase_classifier.classify(bars, direction, volume);
        let transition = self.transition_model.estimate(bars, phase);

        Ok(MarketAnalysis {
            scope,
            trend_line,
            direction,
            levels,
            breakouts,
            phase,
            transition,
        })
    }

    /// Analyze the same window at every scope, primary first.
    pub fn analyze_all_scopes<T: OHLCV>(
        &self,
        bars: &[T],
        volume: &VolumeAnalysis,
    ) -> Result<Vec<MarketAnalysis>> {
        TrendScope::ALL
            .iter()
            .map(|&scope| self.analyze(bars, scope, volume))
            .collect()
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                AnalysisError::InvalidOHLCV { reason, .. } => {
                    AnalysisError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.trend_fitter.validate_config()?;
        self.level_locator.validate_config()?;
        self.breakout_detector.validate_config()?;
        self.phase_classifier.validate_config()?;
        self.transition_model.validate_config()?;
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating AnalysisEngine instances
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    engine: AnalysisEngine,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trend_fitter(mut self, fitter: TrendLineFitter) -> Self {
        self.engine.trend_fitter = fitter;
        self
    }

    pub fn level_locator(mut self, locator: LevelLocator) -> Self {
        self.engine.level_locator = locator;
        self
    }

    pub fn breakout_detector(mut self, detector: BreakoutDetector) -> Self {
        self.engine.breakout_detector = detector;
        self
    }

    pub fn phase_classifier(mut self, classifier: PhaseClassifier) -> Self {
        self.engine.phase_classifier = classifier;
        self
    }

    pub fn transition_model(mut self, model: TransitionModel) -> Self {
        self.engine.transition_model = model;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.engine.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<AnalysisEngine> {
        self.engine.validate()?;
        Ok(self.engine)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Result of analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisResult {
    pub symbol: String,
    pub analysis: MarketAnalysis,
}

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisFailure {
    pub symbol: String,
    pub error: AnalysisError,
}

/// Parallel analysis of multiple instruments at one scope
pub fn analyze_parallel<'a, T, I>(
    engine: &AnalysisEngine,
    scope: TrendScope,
    instruments: I,
) -> (Vec<AnalysisResult>, Vec<AnalysisFailure>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T], &'a VolumeAnalysis)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars, volume)| {
            engine
                .analyze(bars, scope, volume)
                .map(|analysis| AnalysisResult {
                    symbol: symbol.to_string(),
                    analysis,
                })
                .map_err(|error| AnalysisFailure {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

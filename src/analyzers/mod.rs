//! Trend, level and phase analyzers
//!
//! # Components
//!
//! - **Pivots**: fractal highs/lows, the raw material for lines and levels
//! - **Trend line**: best-fit line through a pivot pair, moving-average fallback
//! - **Levels**: ranked horizontal support/resistance
//! - **Breakout**: price/volume/time confirmation of level breaches
//! - **Phase**: direction-specific rule sets over a fixed indicator set
//! - **Transition**: two-window comparison estimating the next phase

pub mod helpers;

pub mod breakout;
pub mod levels;
pub mod phase;
pub mod pivots;
pub mod transition;
pub mod trend_line;

pub use breakout::BreakoutDetector;
pub use levels::LevelLocator;
pub use phase::{PhaseClassifier, PhaseVerdict, RuleCheck};
pub use pivots::{find_pivot_indices, Pivot, PivotDetector, PivotKind};
pub use transition::TransitionModel;
pub use trend_line::TrendLineFitter;

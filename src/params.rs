//! Parameter metadata for the analyzers
//!
//! Every tunable analyzer publishes a static table of its parameters, so
//! callers can:
//! - sweep a parameter grid when calibrating thresholds
//! - document the available knobs
//! - build an analyzer from a flat name/value map
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use trendphase::params::Parameterized;
//! use trendphase::prelude::*;
//!
//! for param in LevelLocator::param_meta() {
//!   println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let params = HashMap::from([("touch_tolerance", 0.015), ("max_levels", 3.0)]);
//! let locator = LevelLocator::with_params(&params).unwrap();
//! assert_eq!(locator.max_levels.get(), 3);
//! ```

use std::collections::HashMap;

use crate::{AnalysisError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value, 0.0..=1.0
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Unbounded real value (multipliers, scores, slopes)
  Float,
}

/// Metadata for a single analyzer parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "touch_tolerance")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a Float parameter
  pub const fn float(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Float, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    if step <= 0.0 {
      values.push(min);
      return values;
    }
    let mut k = 0.0;
    loop {
      let v = min + k * step;
      if v > max + step * 1e-9 {
        break;
      }
      values.push(v);
      k += 1.0;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if !value.is_finite() {
      return Err(AnalysisError::InvalidValue("parameter must be finite"));
    }
    if value < min || value > max {
      return Err(AnalysisError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(AnalysisError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Float => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Analyzers that can be built from a flat parameter map
pub trait Parameterized: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates an analyzer from a parameter map and validates it.
  ///
  /// Missing parameters use their default values; unknown keys are ignored.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  fn analyzer_name() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if !(value >= 1.0) || value.fract() != 0.0 {
    return Err(AnalysisError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a finite float from params with default fallback
pub fn get_float(params: &HashMap<&str, f64>, key: &'static str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() {
    return Err(AnalysisError::InvalidConfig(format!("{key} must be finite, got {value}")));
  }
  Ok(value)
}

// ============================================================
// TESTS
// ============================================================

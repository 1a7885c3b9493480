//! Parameter distribution types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParamValue;

/// Distribution for floating-point parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FloatDistribution {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive).
    pub high: f64,
    /// Whether to sample in log space.
    pub log_scale: bool,
    /// Optional step size for discretization.
    pub step: Option<f64>,
}

impl FloatDistribution {
    /// A plain uniform range without log scale or step.
    #[must_use]
    pub fn uniform(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            log_scale: false,
            step: None,
        }
    }
}

/// Distribution for integer parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntDistribution {
    /// Lower bound (inclusive).
    pub low: i64,
    /// Upper bound (inclusive).
    pub high: i64,
    /// Whether to sample in log space.
    pub log_scale: bool,
    /// Optional step size for discretization.
    pub step: Option<i64>,
}

impl IntDistribution {
    /// A plain uniform range without log scale or step.
    #[must_use]
    pub fn uniform(low: i64, high: i64) -> Self {
        Self {
            low,
            high,
            log_scale: false,
            step: None,
        }
    }
}

/// Distribution for categorical parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CategoricalDistribution {
    /// Number of choices available.
    pub n_choices: usize,
}

/// Enum wrapping all parameter distribution types.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Distribution {
    /// A floating-point distribution.
    Float(FloatDistribution),
    /// An integer distribution.
    Int(IntDistribution),
    /// A categorical distribution.
    Categorical(CategoricalDistribution),
}

impl From<FloatDistribution> for Distribution {
    fn from(d: FloatDistribution) -> Self {
        Distribution::Float(d)
    }
}

impl From<IntDistribution> for Distribution {
    fn from(d: IntDistribution) -> Self {
        Distribution::Int(d)
    }
}

impl From<CategoricalDistribution> for Distribution {
    fn from(d: CategoricalDistribution) -> Self {
        Distribution::Categorical(d)
    }
}

impl Distribution {
    /// Checks bounds, log-scale and step constraints.
    ///
    /// # Errors
    ///
    /// Returns the matching validation error when the distribution cannot be
    /// sampled from.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<()> {
        match self {
            Distribution::Float(d) => {
                if d.low > d.high || d.low.is_nan() || d.high.is_nan() {
                    return Err(Error::InvalidBounds {
                        low: d.low,
                        high: d.high,
                    });
                }
                if d.log_scale && d.low <= 0.0 {
                    return Err(Error::InvalidLogBounds);
                }
                if let Some(step) = d.step
                    && step <= 0.0
                {
                    return Err(Error::InvalidStep);
                }
            }
            Distribution::Int(d) => {
                if d.low > d.high {
                    return Err(Error::InvalidBounds {
                        low: d.low as f64,
                        high: d.high as f64,
                    });
                }
                if d.log_scale && d.low < 1 {
                    return Err(Error::InvalidLogBounds);
                }
                if let Some(step) = d.step
                    && step <= 0
                {
                    return Err(Error::InvalidStep);
                }
            }
            Distribution::Categorical(d) => {
                if d.n_choices == 0 {
                    return Err(Error::EmptyChoices);
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `value` has the right variant and lies inside the bounds.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Distribution::Float(d), ParamValue::Float(v)) => (d.low..=d.high).contains(v),
            (Distribution::Int(d), ParamValue::Int(v)) => (d.low..=d.high).contains(v),
            (Distribution::Categorical(d), ParamValue::Categorical(i)) => *i < d.n_choices,
            _ => false,
        }
    }
}

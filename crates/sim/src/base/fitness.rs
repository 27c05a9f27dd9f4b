use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A log-scale fitness value (natural logarithm of relative fitness).
///
/// Working in log space keeps products of many small per-site effects from
/// underflowing. Negative infinity means zero fitness: a lethal genome.
/// Adding anything to a lethal value stays lethal, including `+∞`, so the
/// sum of factor contributions can never turn into `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct LogFitnessValue(f64);

impl LogFitnessValue {
    /// ln(1.0): neither beneficial nor deleterious.
    pub const NEUTRAL: Self = Self(0.0);

    /// ln(0.0): the genome cannot replicate.
    pub const LETHAL: Self = Self(f64::NEG_INFINITY);

    /// Wrap a log-scale value. `NaN` is treated as lethal.
    pub fn new(log_value: f64) -> Self {
        if log_value.is_nan() {
            Self::LETHAL
        } else {
            Self(log_value)
        }
    }

    /// Returns the inner log-scale f64 value.
    #[inline(always)]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Linear-scale fitness, `exp(self)`.
    #[inline]
    pub fn fitness(self) -> f64 {
        self.0.exp()
    }

    /// Returns true if this represents zero fitness (log = -∞).
    #[inline]
    pub fn is_lethal(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
}

impl Default for LogFitnessValue {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<f64> for LogFitnessValue {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<LogFitnessValue> for f64 {
    fn from(value: LogFitnessValue) -> Self {
        value.0
    }
}

impl fmt::Display for LogFitnessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for LogFitnessValue {
    type Output = Self;

    /// ln(a × b) = ln(a) + ln(b), with zero fitness absorbing.
    fn add(self, other: Self) -> Self::Output {
        if self.is_lethal() || other.is_lethal() {
            Self::LETHAL
        } else {
            Self::new(self.0 + other.0)
        }
    }
}

impl Sum for LogFitnessValue {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::NEUTRAL, Add::add)
    }
}

impl<'a> Sum<&'a LogFitnessValue> for LogFitnessValue {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

//! Parent selection.
//!
//! Selectors turn per-individual log-fitness values into the indices of the
//! individuals that reproduce. Two families exist:
//!
//! ### Proportional selectors
//! Draw a fixed number of parents with replacement, each individual being
//! picked with probability proportional to its fitness. Weights are computed
//! as `exp(log_fitness - max_log_fitness)` so that populations whose
//! log-fitness values are all very negative do not underflow to zero.
//! - **Cumulative**: linear scan of a normalized prefix-sum array.
//! - **BinarySearch**: the same array, searched by bisection.
//! - **Bins**: a lookup table of `bins_per_individual × n` bins, allocated by
//!   rounding the cumulative array; a draw is one uniform bin index.
//! - **MonteCarlo**: rejection sampling of uniform candidates. Slow when
//!   fitness is very uneven; kept as an independent reference.
//!
//! ### Growth models
//! Ignore the requested count and let every individual emit a random number
//! of copies of its index, so the population size can change. These use the
//! absolute fitness `exp(log_fitness)`.
//! - **Poisson**: Poisson(`R · fitness`) copies.
//! - **Branching**: death (0 copies), split (2 copies) or survival (1 copy).

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::base::LogFitnessValue;
pub use crate::errors::SelectionError;

/// Normalized prefix sums of non-negative weights.
///
/// The result is non-decreasing and every entry from the last positive
/// weight onwards is exactly 1.0, so a uniform draw in `[0, 1)` can never
/// land on a trailing zero-weight individual.
///
/// # Errors
/// [`SelectionError::PopulationCollapsed`] if the weights sum to zero (or are
/// not finite).
pub fn cumulative_fitness(weights: &[f64]) -> Result<Vec<f64>, SelectionError> {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(SelectionError::PopulationCollapsed { size: weights.len() });
    }
    let mut running = 0.0;
    let mut cumulative: Vec<f64> = weights
        .iter()
        .map(|w| {
            running += w / total;
            running
        })
        .collect();
    if let Some(last) = weights.iter().rposition(|&w| w > 0.0) {
        for c in &mut cumulative[last..] {
            *c = 1.0;
        }
    }
    Ok(cumulative)
}

/// `exp(lf - max)` for every value; lethal values map to 0.
fn relative_weights(log_fitness: &[LogFitnessValue]) -> Result<Vec<f64>, SelectionError> {
    let max = log_fitness
        .iter()
        .filter(|lf| !lf.is_lethal())
        .map(|lf| lf.get())
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Err(SelectionError::PopulationCollapsed {
            size: log_fitness.len(),
        });
    }
    Ok(log_fitness.iter().map(|lf| (lf.get() - max).exp()).collect())
}

/// `exp(lf)` for every value; lethal values map to 0.
fn absolute_weights(log_fitness: &[LogFitnessValue]) -> Result<Vec<f64>, SelectionError> {
    if log_fitness.iter().all(|lf| lf.is_lethal()) {
        return Err(SelectionError::PopulationCollapsed {
            size: log_fitness.len(),
        });
    }
    Ok(log_fitness.iter().map(|lf| lf.fitness()).collect())
}

#[inline]
fn scan(cumulative: &[f64], draw: f64) -> usize {
    cumulative
        .iter()
        .position(|&c| draw < c)
        .unwrap_or(cumulative.len() - 1)
}

#[inline]
fn bisect(cumulative: &[f64], draw: f64) -> usize {
    cumulative
        .partition_point(|&c| c <= draw)
        .min(cumulative.len() - 1)
}

/// Parent selection algorithm.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Selector {
    #[default]
    Cumulative,
    BinarySearch,
    Bins { bins_per_individual: usize },
    MonteCarlo,
    Poisson { reproductive_number: f64 },
    Branching {
        split_probability: f64,
        death_probability: f64,
    },
}

impl Selector {
    /// Check parameters once, before the first generation.
    pub fn validate(&self) -> Result<(), SelectionError> {
        match *self {
            Self::Bins {
                bins_per_individual: 0,
            } => Err(SelectionError::InvalidParameter(
                "bins_per_individual must be at least 1".into(),
            )),
            Self::Poisson {
                reproductive_number,
            } if !reproductive_number.is_finite() || reproductive_number < 0.0 => {
                Err(SelectionError::InvalidParameter(format!(
                    "reproductive number must be finite and non-negative, got {reproductive_number}"
                )))
            }
            Self::Branching {
                split_probability,
                death_probability,
            } => {
                for (name, p) in [("split", split_probability), ("death", death_probability)] {
                    if !(0.0..=1.0).contains(&p) {
                        return Err(SelectionError::InvalidParameter(format!(
                            "{name} probability must be between 0.0 and 1.0, got {p}"
                        )));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// True for selectors whose output size is random.
    pub fn is_growth_model(&self) -> bool {
        matches!(self, Self::Poisson { .. } | Self::Branching { .. })
    }

    /// Draw parent indices.
    ///
    /// Proportional selectors return exactly `count` indices; growth models
    /// ignore `count` and return the indices of all offspring, in ascending
    /// parent order.
    ///
    /// # Errors
    /// - [`SelectionError::PopulationCollapsed`] when every individual has
    ///   zero fitness.
    /// - [`SelectionError::Extinct`] when a growth model produces nothing.
    pub fn select<R: Rng + ?Sized>(
        &self,
        log_fitness: &[LogFitnessValue],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, SelectionError> {
        match *self {
            Self::Cumulative => {
                let cumulative = cumulative_fitness(&relative_weights(log_fitness)?)?;
                Ok((0..count).map(|_| scan(&cumulative, rng.random())).collect())
            }
            Self::BinarySearch => {
                let cumulative = cumulative_fitness(&relative_weights(log_fitness)?)?;
                Ok((0..count).map(|_| bisect(&cumulative, rng.random())).collect())
            }
            Self::Bins {
                bins_per_individual,
            } => {
                let cumulative = cumulative_fitness(&relative_weights(log_fitness)?)?;
                let table = bin_table(&cumulative, bins_per_individual);
                Ok((0..count)
                    .map(|_| table[rng.random_range(0..table.len())])
                    .collect())
            }
            Self::MonteCarlo => {
                let weights = relative_weights(log_fitness)?;
                let n = weights.len();
                Ok((0..count)
                    .map(|_| loop {
                        let candidate = rng.random_range(0..n);
                        if rng.random::<f64>() < weights[candidate] {
                            break candidate;
                        }
                    })
                    .collect())
            }
            Self::Poisson {
                reproductive_number,
            } => {
                let weights = absolute_weights(log_fitness)?;
                let mut offspring = Vec::with_capacity(weights.len());
                for (index, w) in weights.iter().enumerate() {
                    let mean = reproductive_number * w;
                    if mean == 0.0 {
                        continue;
                    }
                    let poisson = Poisson::new(mean).map_err(|e| {
                        SelectionError::InvalidParameter(format!(
                            "offspring mean {mean} of individual {index} cannot be sampled: {e}"
                        ))
                    })?;
                    let copies = poisson.sample(rng) as usize;
                    offspring.extend(std::iter::repeat_n(index, copies));
                }
                non_empty(offspring)
            }
            Self::Branching {
                split_probability,
                death_probability,
            } => {
                let weights = absolute_weights(log_fitness)?;
                let mut offspring = Vec::with_capacity(weights.len());
                for (index, w) in weights.iter().enumerate() {
                    if *w == 0.0 {
                        continue;
                    }
                    let draw: f64 = rng.random();
                    let copies = if draw < death_probability {
                        0
                    } else if draw < death_probability + split_probability * w {
                        2
                    } else {
                        1
                    };
                    offspring.extend(std::iter::repeat_n(index, copies));
                }
                non_empty(offspring)
            }
        }
    }

    /// Draw `count` second parents for two-parent replication. Always uses
    /// the cumulative proportional rule, whatever selector picked the first
    /// parents.
    pub fn partners<R: Rng + ?Sized>(
        log_fitness: &[LogFitnessValue],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, SelectionError> {
        Self::Cumulative.select(log_fitness, count, rng)
    }
}

fn non_empty(offspring: Vec<usize>) -> Result<Vec<usize>, SelectionError> {
    if offspring.is_empty() {
        Err(SelectionError::Extinct)
    } else {
        Ok(offspring)
    }
}

/// Bin `i` belongs to the individual whose cumulative interval, scaled to the
/// number of bins and rounded, contains `i`.
fn bin_table(cumulative: &[f64], bins_per_individual: usize) -> Vec<usize> {
    let bins = bins_per_individual * cumulative.len();
    let mut table = Vec::with_capacity(bins);
    let mut start = 0;
    for (index, c) in cumulative.iter().enumerate() {
        let end = ((c * bins as f64).round() as usize).min(bins);
        if end > start {
            table.extend(std::iter::repeat_n(index, end - start));
            start = end;
        }
    }
    table
}

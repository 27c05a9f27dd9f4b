use rand::Rng;

use super::SiteTable;
use crate::base::{LogFitnessValue, Sequence};
use crate::errors::FitnessError;

/// Fixed per-site, per-state log-fitness values, e.g. estimated from deep
/// mutational scanning data. Negative infinity marks a lethal state.
#[derive(Debug, Clone)]
pub struct EmpiricalFitness {
    table: SiteTable,
}

impl EmpiricalFitness {
    pub fn new(values: Vec<[f64; 4]>) -> Result<Self, FitnessError> {
        let invalid = values
            .iter()
            .flatten()
            .find(|v| v.is_nan() || **v == f64::INFINITY);
        if let Some(v) = invalid {
            return Err(FitnessError::InvalidParameter(format!(
                "empirical log-fitness values must be finite or -inf, got {v}"
            )));
        }
        Ok(Self {
            table: SiteTable::new(values),
        })
    }

    /// Shuffle the values of every site across its states, keeping the
    /// distribution of effects but destroying which state carries which.
    pub fn permuted<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.table.permute(rng);
        self
    }

    pub fn table(&self) -> &SiteTable {
        &self.table
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        self.table.log_fitness(sequence)
    }
}

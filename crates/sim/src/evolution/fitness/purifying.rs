//! Purifying selection against departures from a fittest sequence.
//!
//! Every site has one fittest state with no penalty. The three other states
//! carry a penalty of `-strength * X`, `X ~ χ²(dof)`, drawn once when the
//! factor is built, so most mutations are mildly deleterious and a few are
//! strongly so. Coding features add a hard constraint: a genome with a stop
//! codon anywhere inside a coding feature cannot replicate.

use rand::Rng;

use super::SiteTable;
use crate::base::{Feature, LogFitnessValue, Nucleotide, Sequence};
use crate::errors::FitnessError;
use crate::genome::MutationSet;

/// Where the fittest state of each site comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FittestState {
    /// A given sequence, usually the founder.
    Reference(Sequence),
    /// An independent uniform draw per site.
    Random,
}

impl FittestState {
    /// Resolve to one state per site for a genome of `length` bases.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<Nucleotide>, FitnessError> {
        match self {
            Self::Reference(sequence) if sequence.len() == length => {
                Ok(sequence.as_slice().to_vec())
            }
            Self::Reference(sequence) => Err(FitnessError::InvalidParameter(format!(
                "reference length {} does not match genome length {length}",
                sequence.len()
            ))),
            Self::Random => Ok((0..length).map(|_| Nucleotide::random(rng)).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurifyingFitness {
    table: SiteTable,
    coding: Vec<Feature>,
}

impl PurifyingFitness {
    /// Draw the penalty table for the given fittest states.
    ///
    /// Only coding features from `features` are kept; they are checked for
    /// stop codons.
    pub fn new<R: Rng + ?Sized>(
        fittest: &[Nucleotide],
        strength: f64,
        dof: f64,
        features: &[Feature],
        rng: &mut R,
    ) -> Result<Self, FitnessError> {
        let table = SiteTable::chi_squared(fittest, strength, dof, rng)?;
        Ok(Self::from_table(table, features))
    }

    /// Use an explicit penalty table.
    pub fn from_table(table: SiteTable, features: &[Feature]) -> Self {
        Self {
            table,
            coding: features.iter().filter(|f| f.is_coding()).cloned().collect(),
        }
    }

    pub fn table(&self) -> &SiteTable {
        &self.table
    }

    pub fn coding_features(&self) -> &[Feature] {
        &self.coding
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        if self.coding.iter().any(|f| f.has_stop_codon(sequence)) {
            return LogFitnessValue::LETHAL;
        }
        self.table.log_fitness(sequence)
    }

    /// The parent had no stop codon (or it would be lethal and this returns
    /// `None`), so only codons touched by a substitution need checking.
    pub(super) fn incremental(
        &self,
        parent_value: LogFitnessValue,
        parent: &Sequence,
        child: &Sequence,
        mutations: &MutationSet,
    ) -> Option<LogFitnessValue> {
        let value = self.table.incremental(parent_value, parent, mutations)?;
        if value.is_lethal() {
            return Some(value);
        }
        for (site, _) in mutations.substitutions() {
            let stop = self
                .coding
                .iter()
                .any(|f| f.codon_at(child, site).is_some_and(|aa| aa.is_stop()));
            if stop {
                return Some(LogFitnessValue::LETHAL);
            }
        }
        Some(value)
    }
}

//! Replication strategies.
//!
//! A replicator produces the genome of one offspring from its parent(s):
//!
//! - **Clonal**: the offspring is a copy of a single parent with freshly
//!   drawn mutations. When no mutation occurs the gene pool simply increments
//!   the parent's frequency.
//! - **Recombinant**: models co-infection. With probability
//!   `dual_infection × recombination` the offspring is a mosaic of two
//!   parents, switching template at a binomial number of breakpoints;
//!   otherwise it is a clonal copy of the first parent.

use rand::Rng;
use rand::seq::index;
use rand_distr::{Binomial, Distribution};

use crate::base::{Nucleotide, Sequence};
pub use crate::errors::RecombinationError;
use crate::errors::{PoolError, SimulationError};
use crate::evolution::fitness::FitnessModel;
use crate::evolution::mutation::MutationGenerator;
use crate::genome::{GenePool, GenomeId};

/// Parameters of template switching between two co-infecting parents.
#[derive(Debug, Clone, PartialEq)]
pub struct RecombinationModel {
    /// Probability that an offspring's host cell was infected by two parents.
    dual_infection_probability: f64,
    /// Probability that a dual infection produces a recombinant.
    recombination_probability: f64,
    /// Per-boundary probability of a template switch.
    rate: f64,
}

impl RecombinationModel {
    /// Create a new recombination model.
    ///
    /// # Errors
    /// Returns an error if any probability is outside [0.0, 1.0].
    pub fn new(
        dual_infection_probability: f64,
        recombination_probability: f64,
        rate: f64,
    ) -> Result<Self, RecombinationError> {
        for (name, p) in [
            ("dual_infection_probability", dual_infection_probability),
            ("recombination_probability", recombination_probability),
            ("rate", rate),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(RecombinationError::InvalidProbability(name, p));
            }
        }
        Ok(Self {
            dual_infection_probability,
            recombination_probability,
            rate,
        })
    }

    pub fn dual_infection_probability(&self) -> f64 {
        self.dual_infection_probability
    }

    pub fn recombination_probability(&self) -> f64 {
        self.recombination_probability
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Probability that one replication produces a recombinant.
    pub fn event_probability(&self) -> f64 {
        self.dual_infection_probability * self.recombination_probability
    }

    /// Sorted, distinct breakpoints in `1..len` for a template of `len` sites.
    ///
    /// The count is Binomial(`len - 1`, `rate`) over the internal boundaries.
    pub fn breakpoints<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Vec<usize> {
        if len < 2 || self.rate == 0.0 {
            return Vec::new();
        }
        let boundaries = len - 1;
        let count = match Binomial::new(boundaries as u64, self.rate) {
            Ok(b) => b.sample(rng) as usize,
            Err(_) => 0,
        };
        let mut points: Vec<usize> = index::sample(rng, boundaries, count.min(boundaries))
            .into_iter()
            .map(|i| i + 1)
            .collect();
        points.sort_unstable();
        points
    }
}

/// Assemble a mosaic of two templates.
///
/// Segments alternate between `first` and `second` at each breakpoint,
/// starting with `first`. The last segment runs to the end of whichever
/// template supplies it. Breakpoints must be sorted and should lie within the
/// shorter template.
///
/// ```
/// use std::str::FromStr;
/// use virevo_sim::base::Sequence;
/// use virevo_sim::evolution::recombine;
///
/// let a = Sequence::from_str("AAAAAA").unwrap();
/// let b = Sequence::from_str("CCCCCCCC").unwrap();
/// let child = recombine(a.as_slice(), b.as_slice(), &[2, 4]);
/// assert_eq!(child.to_string(), "AACCAA");
/// ```
pub fn recombine(first: &[Nucleotide], second: &[Nucleotide], breakpoints: &[usize]) -> Sequence {
    let mut child = Sequence::with_capacity(first.len().max(second.len()));
    let mut start = 0;
    for segment in 0..=breakpoints.len() {
        let source = if segment % 2 == 0 { first } else { second };
        let end = breakpoints
            .get(segment)
            .copied()
            .unwrap_or(source.len())
            .min(source.len());
        if start < end {
            child.extend_from_slice(&source[start..end]);
        }
        start = start.max(end);
    }
    child
}

/// How offspring genomes are produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Replicator {
    #[default]
    Clonal,
    Recombinant(RecombinationModel),
}

impl Replicator {
    /// Number of parents each offspring needs.
    pub fn parent_count(&self) -> usize {
        match self {
            Self::Clonal => 1,
            Self::Recombinant(_) => 2,
        }
    }

    /// Produce the genome of one offspring of `parents`.
    ///
    /// # Errors
    /// - [`RecombinationError::ParentCount`] if `parents` has the wrong length.
    /// - [`PoolError::DeadGenome`] if a parent genome is not alive.
    /// - Any fatal error of the mutation generator.
    pub fn replicate<R: Rng + ?Sized>(
        &self,
        parents: &[GenomeId],
        mutator: &MutationGenerator,
        fitness: &FitnessModel,
        pool: &mut GenePool,
        rng: &mut R,
    ) -> Result<GenomeId, SimulationError> {
        if parents.len() != self.parent_count() {
            return Err(RecombinationError::ParentCount {
                expected: self.parent_count(),
                found: parents.len(),
            }
            .into());
        }
        match self {
            Self::Clonal => clonal(parents[0], mutator, fitness, pool, rng),
            Self::Recombinant(model) => {
                let (first, second) = (parents[0], parents[1]);
                let recombines = rng.random::<f64>() < model.event_probability();
                if !recombines || first == second {
                    return clonal(first, mutator, fitness, pool, rng);
                }

                let (child, inherited) = {
                    let a = live(pool, first)?;
                    let b = live(pool, second)?;
                    let common = a.len().min(b.len());
                    let breakpoints = model.breakpoints(common, rng);
                    if breakpoints.is_empty() {
                        (None, 0)
                    } else {
                        (
                            Some(recombine(a.sequence().as_slice(), b.sequence().as_slice(), &breakpoints)),
                            a.mutation_count(),
                        )
                    }
                };
                let Some(child) = child else {
                    return clonal(first, mutator, fitness, pool, rng);
                };
                let mutations = mutator.mutate(&child, rng)?;
                Ok(pool.create_recombinant(child, &mutations, inherited, fitness)?)
            }
        }
    }
}

fn live(pool: &GenePool, id: GenomeId) -> Result<&crate::genome::Genome, PoolError> {
    pool.get(id).ok_or(PoolError::DeadGenome { index: id.index() })
}

fn clonal<R: Rng + ?Sized>(
    parent: GenomeId,
    mutator: &MutationGenerator,
    fitness: &FitnessModel,
    pool: &mut GenePool,
    rng: &mut R,
) -> Result<GenomeId, SimulationError> {
    let mutations = mutator.mutate(live(pool, parent)?.sequence(), rng)?;
    Ok(pool.duplicate_genome(parent, &mutations, fitness)?)
}

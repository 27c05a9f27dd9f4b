use crate::base::{LogFitnessValue, Sequence};
use crate::evolution::fitness::FitnessCache;

/// One distinct genome held by the [`GenePool`](super::GenePool).
///
/// Several individuals that inherited the same genome without mutation share
/// one `Genome`; `frequency` counts them. Only the pool creates, edits and
/// recycles genomes, so everything outside the crate sees them read-only.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    pub(crate) sequence: Sequence,
    pub(crate) mutation_count: usize,
    pub(crate) log_fitness: LogFitnessValue,
    pub(crate) cache: FitnessCache,
    pub(crate) frequency: usize,
}

impl Genome {
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Mutations accumulated along this genome's line of descent.
    pub fn mutation_count(&self) -> usize {
        self.mutation_count
    }

    pub fn log_fitness(&self) -> LogFitnessValue {
        self.log_fitness
    }

    pub fn fitness(&self) -> f64 {
        self.log_fitness.fitness()
    }

    /// Per-factor contributions and the epochs they were computed at.
    pub fn fitness_cache(&self) -> &FitnessCache {
        &self.cache
    }

    /// Number of individuals currently carrying this genome.
    pub fn frequency(&self) -> usize {
        self.frequency
    }

    pub fn is_alive(&self) -> bool {
        self.frequency > 0
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

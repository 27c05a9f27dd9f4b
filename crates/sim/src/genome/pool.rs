//! Ownership and recycling of genomes.
//!
//! The `GenePool` is the only place where genomes are created or destroyed.
//! Genomes live in an arena addressed by [`GenomeId`]. When a genome's
//! frequency drops to zero its slot is pushed onto a free stack and its
//! sequence buffer is reused by the next genome allocated there, so memory
//! stays bounded by the largest number of distinct genomes ever alive at
//! once rather than growing with the number of generations.
//!
//! Replication without mutation does not allocate at all: the child shares
//! the parent's genome and the frequency is incremented.

use std::ops::Index;

use super::{Genome, MutationSet};
use crate::base::{Nucleotide, Sequence};
use crate::errors::PoolError;
use crate::evolution::fitness::FitnessModel;

/// Stable handle to a genome slot in a [`GenePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenomeId(u32);

impl GenomeId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    fn new(index: usize) -> Self {
        Self(index as u32)
    }
}

#[derive(Debug, Default)]
pub struct GenePool {
    slots: Vec<Genome>,
    free: Vec<GenomeId>,
    live: usize,
}

impl GenePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Register a founder genome with frequency 1 and a full fitness
    /// evaluation.
    pub fn create_genome(&mut self, sequence: Sequence, fitness: &FitnessModel) -> GenomeId {
        let (id, _) = self.allocate();
        let cache = fitness.evaluate(&sequence);
        self.store(
            id,
            Genome {
                log_fitness: cache.total(),
                cache,
                sequence,
                mutation_count: 0,
                frequency: 1,
            },
        );
        id
    }

    /// Produce the genome of a child of `id` that acquired `mutations`.
    ///
    /// With an empty set the child shares the parent's genome: its frequency
    /// is incremented and the same id is returned. Otherwise a slot is
    /// recycled (or allocated), filled with the parent's sequence plus the
    /// mutations, and scored. Substitution-only children reuse the parent's
    /// cached contributions where a factor allows it.
    pub fn duplicate_genome(
        &mut self,
        id: GenomeId,
        mutations: &MutationSet,
        fitness: &FitnessModel,
    ) -> Result<GenomeId, PoolError> {
        self.check_alive(id)?;
        if mutations.is_empty() {
            self.slots[id.index()].frequency += 1;
            return Ok(id);
        }

        let (child, mut sequence) = self.allocate();
        let parent = &self.slots[id.index()];
        sequence.copy_from(&parent.sequence);
        if let Err(e) = mutations.apply(&mut sequence) {
            self.free.push(child);
            return Err(e.into());
        }
        let cache = fitness.evaluate_child(&parent.sequence, &parent.cache, &sequence, mutations);
        let genome = Genome {
            log_fitness: cache.total(),
            cache,
            sequence,
            mutation_count: parent.mutation_count + mutations.len(),
            frequency: 1,
        };
        self.store(child, genome);
        Ok(child)
    }

    /// Register a recombinant assembled outside the pool.
    ///
    /// `mutations` are applied on top of `sequence` and the result is always
    /// scored from scratch.
    pub fn create_recombinant(
        &mut self,
        mut sequence: Sequence,
        mutations: &MutationSet,
        inherited_mutations: usize,
        fitness: &FitnessModel,
    ) -> Result<GenomeId, PoolError> {
        mutations.apply(&mut sequence)?;
        let (id, _) = self.allocate();
        let cache = fitness.evaluate(&sequence);
        self.store(
            id,
            Genome {
                log_fitness: cache.total(),
                cache,
                sequence,
                mutation_count: inherited_mutations + mutations.len(),
                frequency: 1,
            },
        );
        Ok(id)
    }

    /// Release one reference to `id`; the slot is recycled at frequency 0.
    pub fn kill_genome(&mut self, id: GenomeId) -> Result<(), PoolError> {
        let genome = self
            .slots
            .get_mut(id.index())
            .filter(|g| g.is_alive())
            .ok_or(PoolError::DeadGenome { index: id.index() })?;
        genome.frequency -= 1;
        if genome.frequency == 0 {
            self.free.push(id);
            self.live -= 1;
        }
        Ok(())
    }

    /// Live genome at `id`, if any.
    pub fn get(&self, id: GenomeId) -> Option<&Genome> {
        self.slots.get(id.index()).filter(|g| g.is_alive())
    }

    /// Every live genome with its id, in slot order.
    pub fn genomes(&self) -> impl Iterator<Item = (GenomeId, &Genome)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_alive())
            .map(|(i, g)| (GenomeId::new(i), g))
    }

    /// Number of distinct live genomes.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of individuals referencing a live genome.
    pub fn total_frequency(&self) -> usize {
        self.genomes().map(|(_, g)| g.frequency).sum()
    }

    /// Number of slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Per-site state counts weighted by genome frequency.
    ///
    /// The table is as long as the longest live genome; shorter genomes do
    /// not contribute to sites past their end.
    pub fn state_frequencies(&self) -> Vec<[usize; 4]> {
        let max_len = self.genomes().map(|(_, g)| g.len()).max().unwrap_or(0);
        let mut table = vec![[0usize; 4]; max_len];
        for (_, genome) in self.genomes() {
            for (site, nuc) in genome.sequence.as_slice().iter().enumerate() {
                table[site][nuc.idx()] += genome.frequency;
            }
        }
        table
    }

    /// Frequency-weighted majority state at every site. Ties go to the
    /// lowest state index.
    pub fn consensus(&self) -> Sequence {
        self.state_frequencies()
            .iter()
            .map(|counts| {
                let mut best = 0;
                for state in 1..4 {
                    if counts[state] > counts[best] {
                        best = state;
                    }
                }
                Nucleotide::ALL[best]
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Hamming distance between two live genomes, counting any length
    /// difference as mismatches.
    pub fn hamming_distance(&self, a: GenomeId, b: GenomeId) -> Result<usize, PoolError> {
        let first = self.get(a).ok_or(PoolError::DeadGenome { index: a.index() })?;
        let second = self.get(b).ok_or(PoolError::DeadGenome { index: b.index() })?;
        Ok(first.sequence.hamming_distance(&second.sequence))
    }

    /// Recompute stale cached contributions of every live genome. Returns
    /// the number of genomes whose fitness was touched.
    pub fn refresh_fitness(&mut self, fitness: &FitnessModel) -> usize {
        let mut refreshed = 0;
        for genome in self.slots.iter_mut().filter(|g| g.is_alive()) {
            if fitness.refresh(&genome.sequence, &mut genome.cache) {
                genome.log_fitness = genome.cache.total();
                refreshed += 1;
            }
        }
        refreshed
    }

    fn check_alive(&self, id: GenomeId) -> Result<(), PoolError> {
        match self.get(id) {
            Some(_) => Ok(()),
            None => Err(PoolError::DeadGenome { index: id.index() }),
        }
    }

    fn allocate(&mut self) -> (GenomeId, Sequence) {
        if let Some(id) = self.free.pop() {
            let buffer = std::mem::take(&mut self.slots[id.index()].sequence);
            (id, buffer)
        } else {
            let id = GenomeId::new(self.slots.len());
            self.slots.push(Genome::default());
            (id, Sequence::new())
        }
    }

    fn store(&mut self, id: GenomeId, genome: Genome) {
        self.slots[id.index()] = genome;
        self.live += 1;
    }
}

impl Index<GenomeId> for GenePool {
    type Output = Genome;

    fn index(&self, id: GenomeId) -> &Genome {
        &self.slots[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Mutation;
    use std::str::FromStr;

    fn seq(s: &str) -> Sequence {
        Sequence::from_str(s).unwrap()
    }

    fn substitution(position: usize, state: Nucleotide) -> MutationSet {
        let mut set = MutationSet::new();
        set.insert(Mutation::Substitution { position, state });
        set
    }

    #[test]
    fn test_duplicate_without_mutations_shares_genome() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let id = pool.create_genome(seq("ACGT"), &fitness);

        let child = pool.duplicate_genome(id, &MutationSet::new(), &fitness).unwrap();
        assert_eq!(child, id);
        assert_eq!(pool[id].frequency(), 2);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn test_duplicate_with_mutations_allocates() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let id = pool.create_genome(seq("ACGT"), &fitness);

        let child = pool
            .duplicate_genome(id, &substitution(0, Nucleotide::T), &fitness)
            .unwrap();
        assert_ne!(child, id);
        assert_eq!(pool[child].frequency(), 1);
        assert_eq!(pool[id].frequency(), 1);
        assert_eq!(pool[child].sequence().to_string(), "TCGT");
        assert_eq!(pool[child].mutation_count(), 1);
    }

    #[test]
    fn test_kill_recycles_slot() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let a = pool.create_genome(seq("AAA"), &fitness);
        pool.kill_genome(a).unwrap();
        assert_eq!(pool.live_count(), 0);
        assert!(pool.get(a).is_none());

        let b = pool.create_genome(seq("CCC"), &fitness);
        assert_eq!(a, b);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool[b].sequence().to_string(), "CCC");
    }

    #[test]
    fn test_kill_dead_genome_is_error() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let id = pool.create_genome(seq("AAA"), &fitness);
        pool.kill_genome(id).unwrap();
        assert_eq!(
            pool.kill_genome(id),
            Err(PoolError::DeadGenome { index: id.index() })
        );
        assert!(pool.duplicate_genome(id, &MutationSet::new(), &fitness).is_err());
    }

    #[test]
    fn test_failed_mutation_returns_slot() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let id = pool.create_genome(seq("AAA"), &fitness);
        let result = pool.duplicate_genome(id, &substitution(10, Nucleotide::C), &fitness);
        assert!(matches!(result, Err(PoolError::Sequence(_))));
        assert_eq!(pool.live_count(), 1);

        let other = pool.create_genome(seq("GGG"), &fitness);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool[other].sequence().to_string(), "GGG");
    }

    #[test]
    fn test_consensus_and_state_frequencies() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let a = pool.create_genome(seq("ACGT"), &fitness);
        pool.duplicate_genome(a, &MutationSet::new(), &fitness).unwrap();
        pool.create_genome(seq("TTTTAA"), &fitness);

        let table = pool.state_frequencies();
        assert_eq!(table.len(), 6);
        assert_eq!(table[0], [2, 0, 0, 1]);
        assert_eq!(table[4], [1, 0, 0, 0]);
        assert_eq!(pool.consensus().to_string(), "ACGTAA");
        assert_eq!(pool.total_frequency(), 3);
    }

    #[test]
    fn test_consensus_tie_goes_to_lowest_state() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        pool.create_genome(seq("T"), &fitness);
        pool.create_genome(seq("C"), &fitness);
        assert_eq!(pool.consensus().to_string(), "C");
    }

    #[test]
    fn test_hamming_distance() {
        let fitness = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let a = pool.create_genome(seq("ACGTAC"), &fitness);
        let b = pool.create_genome(seq("ACCTAC"), &fitness);
        let c = pool.create_genome(seq("ACGTACGTA"), &fitness);
        assert_eq!(pool.hamming_distance(a, b), Ok(1));
        assert_eq!(pool.hamming_distance(a, c), Ok(3));
    }
}

//! Population management and the per-generation step.
//!
//! A `Population` holds one generation of individuals. Individuals do not own
//! their genomes: each one holds a [`GenomeId`] into the population's
//! [`GenePool`], and identical genomes are shared. The population also owns
//! the [`Phylogeny`] that records who descends from whom.
//!
//! The next generation is built in a spare buffer while the current one is
//! still intact, then the two buffers are swapped.

use rand::Rng;
use rand::seq::index;

use crate::base::{LogFitnessValue, Sequence};
use crate::errors::{ReconstructionError, SimulationError};
use crate::evolution::{FitnessModel, MutationGenerator, Replicator, Selector};
use crate::genome::{GenePool, Genome, GenomeId, MutationSet};
use crate::phylogeny::{Phylogeny, Tree};

/// One member of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Individual {
    genome: GenomeId,
    /// Index of the parent in the previous generation.
    parent: Option<usize>,
}

impl Individual {
    pub fn genome(&self) -> GenomeId {
        self.genome
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }
}

/// Everything that drives evolution from one generation to the next.
#[derive(Debug, Clone)]
pub struct Dynamics {
    pub mutator: MutationGenerator,
    pub fitness: FitnessModel,
    pub selector: Selector,
    pub replicator: Replicator,
}

/// Statistics of a generation just produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    pub generation: usize,
    pub size: usize,
    /// Distinct genomes alive
    pub live_genomes: usize,
    /// Individuals with zero fitness
    pub lethal: usize,
    /// Mean over viable individuals; `-inf` if there are none
    pub mean_log_fitness: f64,
    pub max_log_fitness: f64,
    /// True if a fitness factor changed before selection
    pub fitness_changed: bool,
}

#[derive(Debug)]
pub struct Population {
    pool: GenePool,
    phylogeny: Phylogeny,
    individuals: Vec<Individual>,
    spare: Vec<Individual>,
    generation: usize,
    /// Full splicing pass every this many generations; 0 disables it
    prune_interval: usize,
    max_size: Option<usize>,
}

impl Population {
    /// Create `size` individuals from `founders`, assigned round-robin.
    ///
    /// Each distinct founder becomes one genome in the pool; further
    /// individuals with the same founder share it.
    pub fn initialize(
        founders: &[Sequence],
        size: usize,
        fitness: &FitnessModel,
    ) -> Result<Self, SimulationError> {
        if founders.is_empty() {
            return Err(SimulationError::InvalidPopulation(
                "at least one founder sequence is required".into(),
            ));
        }
        if size == 0 {
            return Err(SimulationError::InvalidPopulation(
                "population size must be at least 1".into(),
            ));
        }

        let mut pool = GenePool::with_capacity(size);
        let mut founder_ids: Vec<Option<GenomeId>> = vec![None; founders.len()];
        let mut individuals = Vec::with_capacity(size);
        let empty = MutationSet::new();
        for i in 0..size {
            let slot = i % founders.len();
            let genome = match founder_ids[slot] {
                Some(id) => pool.duplicate_genome(id, &empty, fitness)?,
                None => {
                    let id = pool.create_genome(founders[slot].clone(), fitness);
                    founder_ids[slot] = Some(id);
                    id
                }
            };
            individuals.push(Individual {
                genome,
                parent: None,
            });
        }

        Ok(Self {
            pool,
            phylogeny: Phylogeny::new(size),
            individuals,
            spare: Vec::with_capacity(size),
            generation: 0,
            prune_interval: 1,
            max_size: None,
        })
    }

    pub fn with_prune_interval(mut self, interval: usize) -> Self {
        self.prune_interval = interval;
        self
    }

    pub fn with_max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Get the current generation number.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Get the number of individuals in the population.
    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn pool(&self) -> &GenePool {
        &self.pool
    }

    pub fn phylogeny(&self) -> &Phylogeny {
        &self.phylogeny
    }

    /// Genome of individual `index`.
    pub fn genome(&self, index: usize) -> Option<&Genome> {
        self.individuals
            .get(index)
            .and_then(|ind| self.pool.get(ind.genome))
    }

    /// Log-fitness of every individual, in individual order.
    pub fn log_fitness(&self) -> Vec<LogFitnessValue> {
        self.individuals
            .iter()
            .map(|ind| self.pool[ind.genome].log_fitness())
            .collect()
    }

    /// Genealogy of the individuals at `sample`.
    pub fn reconstruct(
        &self,
        sample: &[usize],
        labels: &[String],
    ) -> Result<Tree, ReconstructionError> {
        self.phylogeny.reconstruct(sample, labels)
    }

    /// Produce the next generation.
    ///
    /// Fitness factors update against the current generation, parents are
    /// selected, offspring are replicated into the spare buffer, the current
    /// generation's genome references are released, and the phylogeny
    /// records the new parent assignment.
    pub fn evolve<R: Rng + ?Sized>(
        &mut self,
        dynamics: &mut Dynamics,
        rng: &mut R,
    ) -> Result<GenerationSummary, SimulationError> {
        let generation = self.generation + 1;

        let fitness_changed = dynamics
            .fitness
            .update_generation(generation, &self.pool, rng);
        if fitness_changed {
            let refreshed = self.pool.refresh_fitness(&dynamics.fitness);
            log::trace!("generation {generation}: refreshed fitness of {refreshed} genomes");
        }

        let log_fitness = self.log_fitness();
        let mut parents = dynamics
            .selector
            .select(&log_fitness, self.individuals.len(), rng)?;
        if let Some(max) = self.max_size {
            if parents.len() > max {
                log::warn!(
                    "generation {generation}: {} offspring capped to {max}",
                    parents.len()
                );
                let mut keep = index::sample(rng, parents.len(), max).into_vec();
                keep.sort_unstable();
                parents = keep.into_iter().map(|k| parents[k]).collect();
            }
        }
        let partners = match dynamics.replicator.parent_count() {
            2 => Some(Selector::partners(&log_fitness, parents.len(), rng)?),
            _ => None,
        };

        self.spare.clear();
        for (k, &parent) in parents.iter().enumerate() {
            let first = self.individuals[parent].genome;
            let genome = match &partners {
                Some(partners) => {
                    let second = self.individuals[partners[k]].genome;
                    dynamics.replicator.replicate(
                        &[first, second],
                        &dynamics.mutator,
                        &dynamics.fitness,
                        &mut self.pool,
                        rng,
                    )?
                }
                None => dynamics.replicator.replicate(
                    &[first],
                    &dynamics.mutator,
                    &dynamics.fitness,
                    &mut self.pool,
                    rng,
                )?,
            };
            self.spare.push(Individual {
                genome,
                parent: Some(parent),
            });
        }

        for individual in &self.individuals {
            self.pool.kill_genome(individual.genome)?;
        }

        let released = self.phylogeny.add_generation(generation, &parents);
        if self.prune_interval > 0 && generation % self.prune_interval == 0 {
            let spliced = self.phylogeny.prune_dead_lineages();
            log::trace!(
                "generation {generation}: released {released}, spliced {spliced}, {} lineages live",
                self.phylogeny.live_lineages()
            );
        }

        std::mem::swap(&mut self.individuals, &mut self.spare);
        self.generation = generation;

        let summary = self.summarize(fitness_changed);
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "generation {}: size {}, {} genomes, mean log-fitness {:.4}, max {:.4}, MRCA at {:?}",
                summary.generation,
                summary.size,
                summary.live_genomes,
                summary.mean_log_fitness,
                summary.max_log_fitness,
                self.phylogeny.mrca_generation()
            );
        }
        Ok(summary)
    }

    fn summarize(&self, fitness_changed: bool) -> GenerationSummary {
        let mut lethal = 0;
        let mut total = 0.0;
        let mut max = f64::NEG_INFINITY;
        for individual in &self.individuals {
            let lf = self.pool[individual.genome].log_fitness();
            if lf.is_lethal() {
                lethal += 1;
            } else {
                total += lf.get();
                max = max.max(lf.get());
            }
        }
        let viable = self.individuals.len() - lethal;
        GenerationSummary {
            generation: self.generation,
            size: self.individuals.len(),
            live_genomes: self.pool.live_count(),
            lethal,
            mean_log_fitness: if viable > 0 {
                total / viable as f64
            } else {
                f64::NEG_INFINITY
            },
            max_log_fitness: max,
            fitness_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{EmpiricalFitness, RecombinationModel, SubstitutionModel};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::str::FromStr;

    fn founder() -> Sequence {
        Sequence::from_str("ATGGCCAAAGGGTTTCCC").unwrap()
    }

    fn dynamics(rate: f64) -> Dynamics {
        Dynamics {
            mutator: MutationGenerator::substitutions(rate, SubstitutionModel::default(), 18).unwrap(),
            fitness: FitnessModel::neutral(),
            selector: Selector::Cumulative,
            replicator: Replicator::Clonal,
        }
    }

    #[test]
    fn test_initialize_shares_founders() {
        let other = Sequence::from_str("ATGAAAAAAAAAAAAAAA").unwrap();
        let population =
            Population::initialize(&[founder(), other], 5, &FitnessModel::neutral()).unwrap();
        assert_eq!(population.size(), 5);
        assert_eq!(population.pool().live_count(), 2);
        assert_eq!(population.pool().total_frequency(), 5);
        assert_eq!(population.individuals()[0].genome(), population.individuals()[2].genome());
        assert_eq!(population.generation(), 0);
    }

    #[test]
    fn test_initialize_rejects_empty() {
        assert!(Population::initialize(&[], 5, &FitnessModel::neutral()).is_err());
        assert!(Population::initialize(&[founder()], 0, &FitnessModel::neutral()).is_err());
    }

    #[test]
    fn test_evolve_without_mutation_keeps_one_genome() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut dynamics = dynamics(0.0);
        let mut population =
            Population::initialize(&[founder()], 10, &dynamics.fitness).unwrap();
        for generation in 1..=5 {
            let summary = population.evolve(&mut dynamics, &mut rng).unwrap();
            assert_eq!(summary.generation, generation);
            assert_eq!(summary.size, 10);
            assert_eq!(summary.live_genomes, 1);
        }
        assert_eq!(population.pool().total_frequency(), 10);
        assert!(population.individuals().iter().all(|i| i.parent().is_some()));
    }

    #[test]
    fn test_frequency_matches_individuals() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut dynamics = dynamics(0.05);
        let mut population =
            Population::initialize(&[founder()], 30, &dynamics.fitness).unwrap();
        for _ in 0..10 {
            population.evolve(&mut dynamics, &mut rng).unwrap();
            assert_eq!(population.pool().total_frequency(), 30);
            for (id, genome) in population.pool().genomes() {
                let referencing = population
                    .individuals()
                    .iter()
                    .filter(|i| i.genome() == id)
                    .count();
                assert_eq!(genome.frequency(), referencing);
            }
        }
    }

    #[test]
    fn test_lethal_genomes_are_never_parents() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut table = vec![[0.0; 4]; 18];
        // any change at site 0 away from A is lethal
        table[0] = [0.0, f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        let mut dynamics = dynamics(0.1);
        dynamics
            .fitness
            .push(EmpiricalFitness::new(table).unwrap());
        let mut population =
            Population::initialize(&[founder()], 50, &dynamics.fitness).unwrap();
        for _ in 0..10 {
            let before = population.log_fitness();
            population.evolve(&mut dynamics, &mut rng).unwrap();
            for individual in population.individuals() {
                let parent = individual.parent().unwrap();
                assert!(!before[parent].is_lethal());
            }
        }
    }

    #[test]
    fn test_growth_is_capped() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut dynamics = dynamics(0.0);
        dynamics.selector = Selector::Branching {
            split_probability: 1.0,
            death_probability: 0.0,
        };
        let mut population = Population::initialize(&[founder()], 4, &dynamics.fitness)
            .unwrap()
            .with_max_size(Some(10));
        assert_eq!(population.evolve(&mut dynamics, &mut rng).unwrap().size, 8);
        assert_eq!(population.evolve(&mut dynamics, &mut rng).unwrap().size, 10);
        assert_eq!(population.phylogeny().size(), 10);
        assert_eq!(population.pool().total_frequency(), 10);
    }

    #[test]
    fn test_recombinant_population_evolves() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut dynamics = dynamics(0.02);
        dynamics.replicator = Replicator::Recombinant(RecombinationModel::new(1.0, 1.0, 0.1).unwrap());
        let mut population =
            Population::initialize(&[founder()], 20, &dynamics.fitness).unwrap();
        for _ in 0..10 {
            population.evolve(&mut dynamics, &mut rng).unwrap();
        }
        assert_eq!(population.pool().total_frequency(), 20);
        let tree = population
            .reconstruct(&[0, 1, 2], &["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(tree.leaf_labels(), vec!["a", "b", "c"]);
    }
}

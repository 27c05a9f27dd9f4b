//! Simulation engine for evolutionary processes.
//!
//! This module provides the main simulation loop: it owns the population,
//! the evolutionary dynamics and the random number generator, and advances
//! them one generation at a time.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::configs::{Configuration, ExecutionConfig};
use super::population::{Dynamics, GenerationSummary, Population};
use crate::base::Sequence;
use crate::errors::{ReconstructionError, SimulationError};
use crate::phylogeny::Tree;

/// Main simulation engine.
#[derive(Debug)]
pub struct Simulation {
    /// Current population
    population: Population,
    /// Mutation, fitness, selection and replication
    dynamics: Dynamics,
    /// Execution parameters
    config: ExecutionConfig,
    /// Random number generator (using Xoshiro256++ for better performance)
    rng: Xoshiro256PlusPlus,
}

impl Simulation {
    /// Create a simulation from founder sequences and prepared dynamics.
    pub fn new(
        founders: &[Sequence],
        dynamics: Dynamics,
        config: ExecutionConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let rng = seeded_rng(config.seed);
        let population = Population::initialize(founders, config.population_size, &dynamics.fitness)?
            .with_prune_interval(config.prune_interval)
            .with_max_size(config.max_population_size);
        Ok(Self {
            population,
            dynamics,
            config,
            rng,
        })
    }

    /// Build everything a [`Configuration`] describes.
    ///
    /// Random founders and random fitness tables are drawn from the
    /// simulation's own RNG, so a seeded configuration reproduces the run
    /// exactly.
    pub fn from_config(config: &Configuration) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut rng = seeded_rng(config.execution.seed);
        let founders = config.initialization.build(&mut rng)?;
        let reference = founders.first().ok_or_else(|| {
            SimulationError::InvalidPopulation("at least one founder sequence is required".into())
        })?;
        let dynamics =
            config
                .evolution
                .build(reference, config.initialization.features(), &mut rng)?;
        let execution = &config.execution;
        let population =
            Population::initialize(&founders, execution.population_size, &dynamics.fitness)?
                .with_prune_interval(execution.prune_interval)
                .with_max_size(execution.max_population_size);

        log::info!(
            "initialized {} individuals from {} founder(s) of length {}, {} fitness factor(s)",
            execution.population_size,
            founders.len(),
            reference.len(),
            dynamics.fitness.factors().len()
        );

        Ok(Self {
            population,
            dynamics,
            config: execution.clone(),
            rng,
        })
    }

    /// Advance one generation.
    pub fn step(&mut self) -> Result<GenerationSummary, SimulationError> {
        self.population.evolve(&mut self.dynamics, &mut self.rng)
    }

    /// Run `generations` more generations, returning the last summary.
    pub fn run_for(
        &mut self,
        generations: usize,
    ) -> Result<Option<GenerationSummary>, SimulationError> {
        let mut last = None;
        for _ in 0..generations {
            last = Some(self.step()?);
        }
        Ok(last)
    }

    /// Run until `total_generations` is reached.
    pub fn run(&mut self) -> Result<Option<GenerationSummary>, SimulationError> {
        let remaining = self
            .config
            .total_generations
            .saturating_sub(self.population.generation());
        log::info!(
            "running {remaining} generation(s) from generation {}",
            self.population.generation()
        );
        let last = self.run_for(remaining)?;
        if let Some(summary) = &last {
            log::info!(
                "finished at generation {}: {} individuals, {} distinct genomes, mean log-fitness {:.4}",
                summary.generation,
                summary.size,
                summary.live_genomes,
                summary.mean_log_fitness
            );
        }
        Ok(last)
    }

    /// Genealogy of `k` individuals drawn without replacement, labelled
    /// `ind_<index>`.
    pub fn sample_tree(&mut self, k: usize) -> Result<Tree, SimulationError> {
        if k == 0 {
            return Err(ReconstructionError::EmptySample.into());
        }
        let size = self.population.size();
        if k > size {
            return Err(SimulationError::InvalidPopulation(format!(
                "cannot sample {k} individuals from a population of {size}"
            )));
        }
        let mut sample = index::sample(&mut self.rng, size, k).into_vec();
        sample.sort_unstable();
        let labels: Vec<String> = sample.iter().map(|i| format!("ind_{i}")).collect();
        Ok(self.population.reconstruct(&sample, &labels)?)
    }

    /// Genealogy of the individuals at `sample`.
    pub fn reconstruct(
        &self,
        sample: &[usize],
        labels: &[String],
    ) -> Result<Tree, ReconstructionError> {
        self.population.reconstruct(sample, labels)
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn generation(&self) -> usize {
        self.population.generation()
    }
}

fn seeded_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_seed(rand::rng().random()),
    }
}

//! Evolution module providing fitness, mutation, selection and replication.
//!
//! This module implements the core evolutionary processes:
//! - **Fitness**: additive log-fitness factors with per-factor caching
//! - **Mutation**: point substitutions (transition bias or rate matrix) and
//!   frame-preserving indels
//! - **Selection**: proportional selectors and growth models
//! - **Replication**: clonal copies and two-parent recombinants

pub mod fitness;
pub mod mutation;
pub mod replication;
pub mod selection;

pub use fitness::{
    CachePolicy, EmpiricalFitness, ExposureMemory, FitnessCache, FitnessFactor, FitnessModel,
    FittestState, FluctuatingFitness, FrequencyDependentFitness, PurifyingFitness, SiteTable,
};
pub use mutation::{
    IndelLength, IndelModel, MutationGenerator, RateMatrix, SiteSampling, SubstitutionModel,
};
pub use replication::{RecombinationModel, Replicator, recombine};
pub use selection::{Selector, cumulative_fitness};

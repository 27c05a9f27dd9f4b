//! Simulation engine and population management.
//!
//! - `Simulation`: the engine that owns the RNG and runs generations.
//! - `Population`: one generation of individuals over a shared gene pool.
//! - `Configuration`: the serde model that reproduces a simulation setup.

pub mod configs;
pub mod engine;
pub mod population;

pub use configs::{
    Configuration, EvolutionConfig, ExecutionConfig, FitnessFactorConfig, FittestConfig,
    IndelConfig, InitializationConfig, MutationConfig, ReplicationConfig,
};
pub use engine::Simulation;
pub use population::{Dynamics, GenerationSummary, Individual, Population};

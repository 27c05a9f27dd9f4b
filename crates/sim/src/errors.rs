//! Error types for the simulation crate.
//!
//! Each concern owns one error enum. `SimulationError` aggregates them so the
//! generation loop can propagate any failure with `?`.

use crate::base::Nucleotide;
use thiserror::Error;

/// Error returned when a byte cannot be read as a `Nucleotide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid nucleotide byte: {0}")]
pub struct InvalidNucleotide(pub u8);

/// Errors raised while building or editing sequences and features.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("Invalid character in sequence: '{0}'")]
    InvalidChar(char),

    #[error("Index {index} out of bounds (len = {len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("Range {start}..{end} out of bounds (len = {len})")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("Sequence of length {len} cannot be read in codons")]
    ReadingFrame { len: usize },

    #[error("Invalid feature '{name}': {reason}")]
    InvalidFeature { name: String, reason: String },
}

/// Errors raised by the mutation generator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error("Invalid mutation rate: {0} (must be between 0.0 and 1.0)")]
    InvalidMutationRate(f64),

    #[error("Invalid transition/transversion ratio: {0} (must be finite and positive)")]
    InvalidKappa(f64),

    #[error("Rate matrix row for {from} has no usable off-diagonal mass")]
    InvalidRateMatrix { from: Nucleotide },

    #[error("Invalid indel model: {0}")]
    InvalidIndelModel(String),

    /// No cumulative slot matched a uniform draw. Only reachable if the
    /// normalized matrix was corrupted after construction.
    #[error("Corrupt rate matrix: no target state for {from} at draw {draw}")]
    CorruptRateMatrix { from: Nucleotide, draw: f64 },
}

/// Errors that can occur when building fitness factors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitnessError {
    #[error("Invalid fitness parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised while drawing parents.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    /// Total fitness of the population is zero.
    #[error("Population crashed: total fitness of {size} individuals is zero, no viable children")]
    PopulationCollapsed { size: usize },

    /// A growth model produced no offspring at all.
    #[error("Population went extinct: growth model produced no offspring")]
    Extinct,

    #[error("Invalid selection parameter: {0}")]
    InvalidParameter(String),
}

/// Errors that can occur when configuring recombination.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecombinationError {
    #[error("Invalid probability for {0}: {1} (must be between 0.0 and 1.0)")]
    InvalidProbability(&'static str, f64),

    #[error("Expected {expected} parents, got {found}")]
    ParentCount { expected: usize, found: usize },
}

/// Errors raised by the gene pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Genome {index} is not alive (frequency < 1)")]
    DeadGenome { index: usize },

    #[error("Failed to apply mutations: {0}")]
    Sequence(#[from] SequenceError),
}

/// Soft failures of genealogy reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructionError {
    #[error("Cannot reconstruct a tree from an empty sample")]
    EmptySample,

    #[error("Sample index {index} out of range (population size = {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Sample index {0} appears more than once")]
    DuplicateSample(usize),

    #[error("Got {labels} labels for {sample} sampled individuals")]
    LabelMismatch { labels: usize, sample: usize },

    /// The sampled lineages do not yet share a single ancestor.
    #[error("Sample has not coalesced to a single ancestor")]
    NotCoalesced,
}

/// Errors raised while reading or building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown feature: '{0}'")]
    UnknownFeature(String),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Fitness(#[from] FitnessError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Recombination(#[from] RecombinationError),
}

/// Any failure that stops a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Recombination(#[from] RecombinationError),

    #[error(transparent)]
    Fitness(#[from] FitnessError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid population: {0}")]
    InvalidPopulation(String),
}

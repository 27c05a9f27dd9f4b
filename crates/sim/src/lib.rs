//! # Simulation Crate
//!
//! The `sim` crate provides a forward-time simulator of pathogen genome
//! evolution. It includes modules for sequences and genomic features, a
//! shared gene pool, the evolutionary operators (mutation, fitness,
//! selection, replication), an ancestry graph that reconstructs exact
//! genealogies, and the simulation engine.

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod phylogeny;
pub mod prelude;
pub mod simulation;

pub use base::{Nucleotide, Sequence};

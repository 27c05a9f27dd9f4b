//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use virevo_sim::prelude::*;
//! use std::str::FromStr;
//!
//! let seq = Sequence::from_str("ATGAAA").unwrap();
//! assert_eq!(seq.len(), 6);
//! ```

pub use crate::base::{Feature, LogFitnessValue, Nucleotide, Sequence};
pub use crate::errors::{self, SimulationError};
pub use crate::evolution::{FitnessModel, MutationGenerator, Replicator, Selector};
pub use crate::genome::{GenePool, Genome, GenomeId};
pub use crate::phylogeny::{Phylogeny, Tree};
pub use crate::simulation::{Configuration, Dynamics, Population, Simulation};

//! Genome representation and the gene pool that owns it.

mod mutation;
mod pool;
mod record;

pub use mutation::{Mutation, MutationSet};
pub use pool::{GenePool, GenomeId};
pub use record::Genome;

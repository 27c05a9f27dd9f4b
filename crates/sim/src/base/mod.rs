//! Base types for sequence representation.
//!
//! This module provides the foundational types for representing nucleotides,
//! amino acids, sequences, genome features and log-scale fitness values.

mod codon;
mod feature;
pub mod fitness;
mod nucleotide;
pub mod sequence;

pub use codon::AminoAcid;
pub use feature::{Alphabet, Feature};
pub use fitness::LogFitnessValue;
pub use nucleotide::Nucleotide;
pub use sequence::Sequence;

//! Frequency- and exposure-dependent selection.
//!
//! Models immune escape: the more often a variant of a coding feature (its
//! amino-acid signature, e.g. an epitope) has been seen by hosts, the lower
//! the fitness of genomes carrying it. Once per generation the factor looks
//! at the gene pool, computes the frequency-weighted share of every
//! signature, and folds the shares into its exposure memory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::base::{AminoAcid, Feature, LogFitnessValue, Sequence};
use crate::errors::FitnessError;
use crate::genome::GenePool;

/// Exposure entries below this are forgotten by the decaying memory.
const MIN_EXPOSURE: f64 = 1e-12;

/// How past generations contribute to the current exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExposureMemory {
    /// Only the current generation's share counts.
    Current,
    /// `exposure ← decay · exposure + share`
    Decaying { decay: f64 },
    /// `exposure ← exposure + share`
    Accumulating,
}

#[derive(Debug, Clone)]
pub struct FrequencyDependentFitness {
    feature: Feature,
    strength: f64,
    memory: ExposureMemory,
    exposure: HashMap<Vec<AminoAcid>, f64>,
}

impl FrequencyDependentFitness {
    pub fn new(feature: Feature, strength: f64, memory: ExposureMemory) -> Result<Self, FitnessError> {
        if !feature.is_coding() {
            return Err(FitnessError::InvalidParameter(format!(
                "feature '{}' must be coding to define a signature",
                feature.name()
            )));
        }
        if !strength.is_finite() || strength < 0.0 {
            return Err(FitnessError::InvalidParameter(format!(
                "strength must be finite and non-negative, got {strength}"
            )));
        }
        if let ExposureMemory::Decaying { decay } = memory {
            if !(0.0..=1.0).contains(&decay) {
                return Err(FitnessError::InvalidParameter(format!(
                    "decay must be between 0.0 and 1.0, got {decay}"
                )));
            }
        }
        Ok(Self {
            feature,
            strength,
            memory,
            exposure: HashMap::new(),
        })
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    /// Current exposure of a signature; 0 if it was never observed.
    pub fn exposure(&self, signature: &[AminoAcid]) -> f64 {
        self.exposure.get(signature).copied().unwrap_or(0.0)
    }

    /// Number of signatures with non-zero exposure.
    pub fn remembered(&self) -> usize {
        self.exposure.len()
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        match self.feature.signature(sequence) {
            Ok(signature) => LogFitnessValue::new(-self.strength * self.exposure(&signature)),
            // The feature no longer fits this genome; nothing to recognise.
            Err(_) => LogFitnessValue::NEUTRAL,
        }
    }

    /// Fold the pool's current signature shares into the exposure memory.
    pub fn update_generation(&mut self, pool: &GenePool) -> bool {
        let total = pool.total_frequency() as f64;
        if total == 0.0 {
            return false;
        }
        let mut shares: HashMap<Vec<AminoAcid>, f64> = HashMap::new();
        for (_, genome) in pool.genomes() {
            if let Ok(signature) = self.feature.signature(genome.sequence()) {
                *shares.entry(signature).or_default() += genome.frequency() as f64 / total;
            }
        }

        let updated = match self.memory {
            ExposureMemory::Current => shares,
            ExposureMemory::Decaying { decay } => {
                let mut next: HashMap<_, _> = self
                    .exposure
                    .iter()
                    .map(|(k, v)| (k.clone(), v * decay))
                    .collect();
                for (signature, share) in shares {
                    *next.entry(signature).or_default() += share;
                }
                next.retain(|_, v| *v >= MIN_EXPOSURE);
                next
            }
            ExposureMemory::Accumulating => {
                let mut next = self.exposure.clone();
                for (signature, share) in shares {
                    *next.entry(signature).or_default() += share;
                }
                next
            }
        };

        let changed = updated != self.exposure;
        self.exposure = updated;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Alphabet;
    use crate::evolution::fitness::FitnessModel;
    use crate::genome::MutationSet;
    use std::str::FromStr;

    fn seq(s: &str) -> Sequence {
        Sequence::from_str(s).unwrap()
    }

    fn epitope() -> Feature {
        Feature::contiguous("epitope", Alphabet::AminoAcid, 0..3).unwrap()
    }

    /// Pool with three copies of ATG... and one of GCC...
    fn pool() -> GenePool {
        let neutral = FitnessModel::neutral();
        let mut pool = GenePool::new();
        let a = pool.create_genome(seq("ATGAAA"), &neutral);
        for _ in 0..2 {
            pool.duplicate_genome(a, &MutationSet::new(), &neutral).unwrap();
        }
        pool.create_genome(seq("GCCAAA"), &neutral);
        pool
    }

    #[test]
    fn test_requires_coding_feature() {
        let region = Feature::contiguous("r", Alphabet::Nucleotide, 0..3).unwrap();
        assert!(FrequencyDependentFitness::new(region, 1.0, ExposureMemory::Current).is_err());
        assert!(
            FrequencyDependentFitness::new(epitope(), 1.0, ExposureMemory::Decaying { decay: 1.5 })
                .is_err()
        );
    }

    #[test]
    fn test_unseen_signature_is_neutral() {
        let f = FrequencyDependentFitness::new(epitope(), 2.0, ExposureMemory::Current).unwrap();
        assert_eq!(f.log_fitness(&seq("ATGAAA")).get(), 0.0);
    }

    #[test]
    fn test_current_memory_tracks_shares() {
        let mut f = FrequencyDependentFitness::new(epitope(), 2.0, ExposureMemory::Current).unwrap();
        let pool = pool();
        assert!(f.update_generation(&pool));
        assert!((f.exposure(&[AminoAcid::Met]) - 0.75).abs() < 1e-12);
        assert!((f.log_fitness(&seq("ATGCCC")).get() - -1.5).abs() < 1e-12);
        assert!((f.log_fitness(&seq("GCCCCC")).get() - -0.5).abs() < 1e-12);

        // same pool, same shares
        assert!(!f.update_generation(&pool));
    }

    #[test]
    fn test_accumulating_memory_grows() {
        let mut f =
            FrequencyDependentFitness::new(epitope(), 1.0, ExposureMemory::Accumulating).unwrap();
        let pool = pool();
        f.update_generation(&pool);
        assert!(f.update_generation(&pool));
        assert!((f.exposure(&[AminoAcid::Ala]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_decaying_memory() {
        let mut f = FrequencyDependentFitness::new(
            epitope(),
            1.0,
            ExposureMemory::Decaying { decay: 0.5 },
        )
        .unwrap();
        let pool = pool();
        f.update_generation(&pool);
        f.update_generation(&pool);
        // 0.75 * 0.5 + 0.75
        assert!((f.exposure(&[AminoAcid::Met]) - 1.125).abs() < 1e-12);
        assert_eq!(f.remembered(), 2);
    }
}

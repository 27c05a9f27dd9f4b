use rand::Rng;
use rand_distr::{Distribution, Poisson};

use super::SiteTable;
use crate::base::{LogFitnessValue, Nucleotide, Sequence};
use crate::errors::FitnessError;

/// A purifying landscape that drifts over time.
///
/// Each generation a Poisson(`rate` × sites) number of uniformly chosen
/// sites have their state values reshuffled, so the fittest state at those
/// sites may change. This approximates independent per-site shuffles with
/// probability `rate`.
#[derive(Debug, Clone)]
pub struct FluctuatingFitness {
    table: SiteTable,
    rate: f64,
}

impl FluctuatingFitness {
    pub fn new<R: Rng + ?Sized>(
        fittest: &[Nucleotide],
        strength: f64,
        dof: f64,
        rate: f64,
        rng: &mut R,
    ) -> Result<Self, FitnessError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(FitnessError::InvalidParameter(format!(
                "fluctuation rate must be between 0.0 and 1.0, got {rate}"
            )));
        }
        Ok(Self {
            table: SiteTable::chi_squared(fittest, strength, dof, rng)?,
            rate,
        })
    }

    pub fn table(&self) -> &SiteTable {
        &self.table
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        self.table.log_fitness(sequence)
    }

    /// Reshuffle a random number of sites. Returns `true` if any site fired.
    pub fn update_generation<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let sites = self.table.len();
        let expected = self.rate * sites as f64;
        if expected <= 0.0 {
            return false;
        }
        let events = match Poisson::new(expected) {
            Ok(p) => p.sample(rng) as usize,
            Err(_) => 0,
        };
        for _ in 0..events {
            let site = rng.random_range(0..sites);
            self.table.shuffle_site(site, rng);
        }
        events > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_zero_rate_never_changes() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut f = FluctuatingFitness::new(&[Nucleotide::A; 100], 1.0, 1.0, 0.0, &mut rng).unwrap();
        let before = f.table().clone();
        for _ in 0..10 {
            assert!(!f.update_generation(&mut rng));
        }
        assert_eq!(f.table(), &before);
    }

    #[test]
    fn test_fluctuation_reorders_sites() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let mut f = FluctuatingFitness::new(&[Nucleotide::A; 100], 1.0, 1.0, 0.2, &mut rng).unwrap();
        let before = f.table().clone();
        assert!(f.update_generation(&mut rng));
        assert_ne!(f.table(), &before);

        // each row still holds the same multiset of values
        for (row, old) in f.table().rows().iter().zip(before.rows()) {
            let mut a = *row;
            let mut b = *old;
            a.sort_by(f64::total_cmp);
            b.sort_by(f64::total_cmp);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_invalid_rate() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        assert!(FluctuatingFitness::new(&[Nucleotide::A; 4], 1.0, 1.0, 1.5, &mut rng).is_err());
    }
}

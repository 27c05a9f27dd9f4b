//! Fitness evaluation.
//!
//! A genome's log-fitness is the sum of the contributions of independent
//! fitness factors:
//!
//! - **Purifying**: per-site penalties for leaving the fittest state, and
//!   lethality for stop codons inside coding features.
//! - **Empirical**: a fixed per-site/per-state table, optionally permuted.
//! - **Frequency-dependent**: a penalty that grows with how often the
//!   genome's amino-acid signature has been seen in the population.
//! - **Fluctuating**: a purifying table whose per-site ordering is reshuffled
//!   at random sites every generation.
//!
//! ## Caching
//!
//! Every factor declares a [`CachePolicy`]. The [`FitnessModel`] keeps one
//! epoch counter per factor and bumps it whenever the factor reports that it
//! changed during its per-generation update. Each genome stores its
//! per-factor contributions together with the epochs they were computed at
//! ([`FitnessCache`]); a contribution is only reused while its epoch matches
//! the model's. Stale contributions are recomputed by
//! [`FitnessModel::refresh`].
//!
//! Site-additive factors also support incremental evaluation: a child that
//! differs from its parent only by substitutions gets the parent's
//! contribution plus the per-site differences. Insertions, deletions and
//! recombination always force a full evaluation.
//!
//! A contribution of negative infinity is absorbing: the genome is
//! non-viable whatever the other factors say.

mod empirical;
mod fluctuating;
mod frequency;
mod purifying;

pub use empirical::EmpiricalFitness;
pub use fluctuating::FluctuatingFitness;
pub use frequency::{ExposureMemory, FrequencyDependentFitness};
pub use purifying::{FittestState, PurifyingFitness};

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{ChiSquared, Distribution};

use crate::base::{LogFitnessValue, Nucleotide, Sequence};
use crate::errors::FitnessError;
use crate::genome::{GenePool, MutationSet};

/// Whether a factor's contribution can change between generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Fixed for the whole run; a cached contribution is always valid.
    Static,
    /// May change at a generation boundary; validated by epoch.
    Generational,
}

/// Per-site, per-state table of additive log-fitness values.
///
/// Sites past the end of the table contribute nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteTable {
    values: Vec<[f64; 4]>,
}

impl SiteTable {
    pub fn new(values: Vec<[f64; 4]>) -> Self {
        Self { values }
    }

    /// Draw a table of chi-squared penalties.
    ///
    /// For every site the state in `fittest` gets 0 and each other state
    /// gets `-strength * X` with `X ~ χ²(dof)`.
    pub fn chi_squared<R: Rng + ?Sized>(
        fittest: &[Nucleotide],
        strength: f64,
        dof: f64,
        rng: &mut R,
    ) -> Result<Self, FitnessError> {
        if !strength.is_finite() || strength < 0.0 {
            return Err(FitnessError::InvalidParameter(format!(
                "strength must be finite and non-negative, got {strength}"
            )));
        }
        let chi = ChiSquared::new(dof).map_err(|e| {
            FitnessError::InvalidParameter(format!("chi-squared degrees of freedom {dof}: {e}"))
        })?;
        let values = fittest
            .iter()
            .map(|&best| {
                let mut row = [0.0; 4];
                for state in Nucleotide::ALL {
                    if state != best {
                        row[state.idx()] = -strength * chi.sample(rng);
                    }
                }
                row
            })
            .collect();
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn rows(&self) -> &[[f64; 4]] {
        &self.values
    }

    #[inline]
    pub fn value(&self, site: usize, state: Nucleotide) -> f64 {
        self.values.get(site).map_or(0.0, |row| row[state.idx()])
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        let mut total = 0.0;
        for (row, nuc) in self.values.iter().zip(sequence.as_slice()) {
            let value = row[nuc.idx()];
            if value == f64::NEG_INFINITY {
                return LogFitnessValue::LETHAL;
            }
            total += value;
        }
        LogFitnessValue::new(total)
    }

    /// Parent contribution plus the per-site differences of the
    /// substitutions in `mutations`. `None` when the parent is lethal, since
    /// removing a lethal state cannot be expressed as a difference.
    pub fn incremental(
        &self,
        parent_value: LogFitnessValue,
        parent: &Sequence,
        mutations: &MutationSet,
    ) -> Option<LogFitnessValue> {
        if parent_value.is_lethal() {
            return None;
        }
        let mut total = parent_value.get();
        for (site, state) in mutations.substitutions() {
            let old = parent.get(site)?;
            let new = self.value(site, state);
            if new == f64::NEG_INFINITY {
                return Some(LogFitnessValue::LETHAL);
            }
            total += new - self.value(site, old);
        }
        Some(LogFitnessValue::new(total))
    }

    /// Randomly reorder the state values of one site.
    pub fn shuffle_site<R: Rng + ?Sized>(&mut self, site: usize, rng: &mut R) {
        if let Some(row) = self.values.get_mut(site) {
            row.shuffle(rng);
        }
    }

    /// Randomly reorder the state values of every site.
    pub fn permute<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for row in &mut self.values {
            row.shuffle(rng);
        }
    }
}

/// One pluggable contributor to log-fitness.
#[derive(Debug, Clone)]
pub enum FitnessFactor {
    Purifying(PurifyingFitness),
    Empirical(EmpiricalFitness),
    FrequencyDependent(FrequencyDependentFitness),
    Fluctuating(FluctuatingFitness),
}

impl FitnessFactor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Purifying(_) => "purifying",
            Self::Empirical(_) => "empirical",
            Self::FrequencyDependent(_) => "frequency-dependent",
            Self::Fluctuating(_) => "fluctuating",
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        match self {
            Self::Purifying(_) | Self::Empirical(_) => CachePolicy::Static,
            Self::FrequencyDependent(_) | Self::Fluctuating(_) => CachePolicy::Generational,
        }
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        match self {
            Self::Purifying(f) => f.log_fitness(sequence),
            Self::Empirical(f) => f.log_fitness(sequence),
            Self::FrequencyDependent(f) => f.log_fitness(sequence),
            Self::Fluctuating(f) => f.log_fitness(sequence),
        }
    }

    /// Contribution of a substitution-only child derived from the parent's
    /// current contribution, or `None` when the factor needs a full
    /// evaluation.
    pub fn incremental(
        &self,
        parent_value: LogFitnessValue,
        parent: &Sequence,
        child: &Sequence,
        mutations: &MutationSet,
    ) -> Option<LogFitnessValue> {
        match self {
            Self::Purifying(f) => f.incremental(parent_value, parent, child, mutations),
            Self::Empirical(f) => f.table().incremental(parent_value, parent, mutations),
            Self::Fluctuating(f) => f.table().incremental(parent_value, parent, mutations),
            Self::FrequencyDependent(_) => None,
        }
    }

    /// Per-generation update hook. Returns `true` if contributions computed
    /// before this call are no longer valid.
    pub fn update_generation<R: Rng + ?Sized>(
        &mut self,
        generation: usize,
        pool: &GenePool,
        rng: &mut R,
    ) -> bool {
        let changed = match self {
            Self::Purifying(_) | Self::Empirical(_) => false,
            Self::FrequencyDependent(f) => f.update_generation(pool),
            Self::Fluctuating(f) => f.update_generation(rng),
        };
        if changed {
            log::trace!("generation {generation}: {} factor changed", self.name());
        }
        changed
    }
}

impl From<PurifyingFitness> for FitnessFactor {
    fn from(f: PurifyingFitness) -> Self {
        Self::Purifying(f)
    }
}

impl From<EmpiricalFitness> for FitnessFactor {
    fn from(f: EmpiricalFitness) -> Self {
        Self::Empirical(f)
    }
}

impl From<FrequencyDependentFitness> for FitnessFactor {
    fn from(f: FrequencyDependentFitness) -> Self {
        Self::FrequencyDependent(f)
    }
}

impl From<FluctuatingFitness> for FitnessFactor {
    fn from(f: FluctuatingFitness) -> Self {
        Self::Fluctuating(f)
    }
}

/// Per-factor contributions of one genome with the epochs they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitnessCache {
    contributions: Vec<LogFitnessValue>,
    epochs: Vec<u64>,
}

impl FitnessCache {
    pub fn contributions(&self) -> &[LogFitnessValue] {
        &self.contributions
    }

    pub fn epochs(&self) -> &[u64] {
        &self.epochs
    }

    /// Sum of contributions; lethal if any contribution is.
    pub fn total(&self) -> LogFitnessValue {
        self.contributions.iter().sum()
    }
}

/// The set of active fitness factors and their epochs.
#[derive(Debug, Clone, Default)]
pub struct FitnessModel {
    factors: Vec<FitnessFactor>,
    epochs: Vec<u64>,
}

impl FitnessModel {
    pub fn new(factors: Vec<FitnessFactor>) -> Self {
        let epochs = vec![0; factors.len()];
        Self { factors, epochs }
    }

    /// A model without factors; every genome has log-fitness 0.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn push(&mut self, factor: impl Into<FitnessFactor>) {
        self.factors.push(factor.into());
        self.epochs.push(0);
    }

    pub fn factors(&self) -> &[FitnessFactor] {
        &self.factors
    }

    pub fn epochs(&self) -> &[u64] {
        &self.epochs
    }

    pub fn is_neutral(&self) -> bool {
        self.factors.is_empty()
    }

    /// Full evaluation of every factor.
    pub fn evaluate(&self, sequence: &Sequence) -> FitnessCache {
        FitnessCache {
            contributions: self.factors.iter().map(|f| f.log_fitness(sequence)).collect(),
            epochs: self.epochs.clone(),
        }
    }

    pub fn log_fitness(&self, sequence: &Sequence) -> LogFitnessValue {
        self.evaluate(sequence).total()
    }

    /// Evaluate a child of `parent` that acquired `mutations`.
    ///
    /// Factors whose parent contribution is current and that support it are
    /// updated incrementally for substitution-only sets; everything else is
    /// recomputed.
    pub fn evaluate_child(
        &self,
        parent: &Sequence,
        parent_cache: &FitnessCache,
        child: &Sequence,
        mutations: &MutationSet,
    ) -> FitnessCache {
        if !mutations.is_substitution_only() || !self.is_shaped(parent_cache) {
            return self.evaluate(child);
        }
        let contributions = self
            .factors
            .iter()
            .enumerate()
            .map(|(k, factor)| {
                let cached = parent_cache.contributions[k];
                let incremental = if parent_cache.epochs[k] == self.epochs[k] {
                    factor.incremental(cached, parent, child, mutations)
                } else {
                    None
                };
                incremental.unwrap_or_else(|| factor.log_fitness(child))
            })
            .collect();
        FitnessCache {
            contributions,
            epochs: self.epochs.clone(),
        }
    }

    /// True if every cached contribution belongs to the current epoch.
    pub fn is_current(&self, cache: &FitnessCache) -> bool {
        cache.epochs == self.epochs
    }

    /// Recompute the stale contributions in `cache`. Returns `true` if
    /// anything was recomputed.
    pub fn refresh(&self, sequence: &Sequence, cache: &mut FitnessCache) -> bool {
        if !self.is_shaped(cache) {
            *cache = self.evaluate(sequence);
            return true;
        }
        let mut refreshed = false;
        for (k, factor) in self.factors.iter().enumerate() {
            if cache.epochs[k] != self.epochs[k] {
                cache.contributions[k] = factor.log_fitness(sequence);
                cache.epochs[k] = self.epochs[k];
                refreshed = true;
            }
        }
        refreshed
    }

    /// Run the per-generation update of every generational factor, bumping
    /// the epoch of each one that changed. Returns `true` if any did.
    pub fn update_generation<R: Rng + ?Sized>(
        &mut self,
        generation: usize,
        pool: &GenePool,
        rng: &mut R,
    ) -> bool {
        let mut changed = false;
        for (factor, epoch) in self.factors.iter_mut().zip(self.epochs.iter_mut()) {
            if factor.cache_policy() == CachePolicy::Generational
                && factor.update_generation(generation, pool, rng)
            {
                *epoch += 1;
                changed = true;
            }
        }
        changed
    }

    fn is_shaped(&self, cache: &FitnessCache) -> bool {
        cache.contributions.len() == self.factors.len() && cache.epochs.len() == self.epochs.len()
    }
}

//! Mutation generation.
//!
//! This module draws the mutations acquired by one genome during one
//! replication. The result is a [`MutationSet`] in the parent's coordinates;
//! the parent itself is never modified here.
//!
//! ## Point Substitutions
//! A substitution always changes a site to a *different* state. Which state
//! is chosen is decided by a [`SubstitutionModel`]:
//! - **TransitionBias**: a closed-form split where transitions (A↔G, C↔T) are
//!   κ times as likely as each transversion. κ = 1 gives Jukes-Cantor.
//! - **RateMatrix**: an explicit 4×4 bias matrix, normalized per source state
//!   into cumulative probabilities over the three other states.
//!
//! Which sites mutate is decided by [`SiteSampling`]: either one binomial
//! draw for the number of mutated sites followed by distinct uniform
//! positions, or an independent Bernoulli trial per site.
//!
//! ## Insertions and Deletions
//! At most one indel per replication. An insertion, a deletion or nothing is
//! chosen by partitioning unit probability mass. Indels whose length is not
//! a multiple of 3 would shift the reading frame and are dropped.
//!
//! ## Random stream
//! Draws happen in a fixed order: substitution count (or per-site trials),
//! substitution positions and states, indel outcome, indel length, indel
//! position, inserted bases.

use rand::Rng;
use rand_distr::{Binomial, Distribution, Geometric};
use serde::{Deserialize, Serialize};

use crate::base::{Nucleotide, Sequence};
pub use crate::errors::MutationError;
use crate::genome::{Mutation, MutationSet};

/// Cumulative target probabilities derived from a rate-bias matrix.
///
/// Row `i` lists the three states other than `i` (in index order) followed by
/// a "stay" slot. The third target slot is fixed to exactly 1.0, so a uniform
/// draw in `[0, 1)` always lands on a real target and the stay slot is never
/// reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct RateMatrix {
    rates: [[f64; 4]; 4],
    cumulative: [[f64; 4]; 4],
}

impl RateMatrix {
    /// Normalize a non-negative rate matrix. Diagonal entries are ignored.
    pub fn new(rates: [[f64; 4]; 4]) -> Result<Self, MutationError> {
        let mut cumulative = [[0.0; 4]; 4];
        for from in Nucleotide::ALL {
            let targets = from.others();
            let row = &rates[from.idx()];
            let weights = targets.map(|to| row[to.idx()]);
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(MutationError::InvalidRateMatrix { from });
            }
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return Err(MutationError::InvalidRateMatrix { from });
            }
            let slots = &mut cumulative[from.idx()];
            let mut running = 0.0;
            for (slot, weight) in slots.iter_mut().zip(weights) {
                running += weight / total;
                *slot = running;
            }
            slots[2] = 1.0;
            slots[3] = 1.0;
        }
        Ok(Self { rates, cumulative })
    }

    pub fn rates(&self) -> &[[f64; 4]; 4] {
        &self.rates
    }

    /// Cumulative row for `from`: three targets then the stay slot.
    pub fn cumulative(&self, from: Nucleotide) -> &[f64; 4] {
        &self.cumulative[from.idx()]
    }

    fn mutate<R: Rng + ?Sized>(&self, from: Nucleotide, rng: &mut R) -> Result<Nucleotide, MutationError> {
        let draw: f64 = rng.random();
        let row = &self.cumulative[from.idx()];
        match row[..3].iter().position(|&c| draw < c) {
            Some(slot) => Ok(from.others()[slot]),
            None => Err(MutationError::CorruptRateMatrix { from, draw }),
        }
    }
}

impl TryFrom<[[f64; 4]; 4]> for RateMatrix {
    type Error = MutationError;

    fn try_from(rates: [[f64; 4]; 4]) -> Result<Self, Self::Error> {
        Self::new(rates)
    }
}

impl From<RateMatrix> for [[f64; 4]; 4] {
    fn from(matrix: RateMatrix) -> Self {
        matrix.rates
    }
}

/// How a mutated site picks its new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubstitutionModel {
    /// Transition with probability κ/(κ+2), each transversion 1/(κ+2).
    TransitionBias { kappa: f64 },
    RateMatrix(RateMatrix),
}

impl SubstitutionModel {
    /// Jukes-Cantor: all three targets equally likely.
    pub fn jukes_cantor() -> Self {
        Self::TransitionBias { kappa: 1.0 }
    }

    pub fn transition_bias(kappa: f64) -> Result<Self, MutationError> {
        if !kappa.is_finite() || kappa <= 0.0 {
            return Err(MutationError::InvalidKappa(kappa));
        }
        Ok(Self::TransitionBias { kappa })
    }

    pub fn rate_matrix(rates: [[f64; 4]; 4]) -> Result<Self, MutationError> {
        Ok(Self::RateMatrix(RateMatrix::new(rates)?))
    }

    fn validate(&self) -> Result<(), MutationError> {
        match self {
            Self::TransitionBias { kappa } if !kappa.is_finite() || *kappa <= 0.0 => {
                Err(MutationError::InvalidKappa(*kappa))
            }
            _ => Ok(()),
        }
    }

    /// Draw a new state for a site currently in `from`. Never returns `from`.
    #[inline]
    pub fn mutate<R: Rng + ?Sized>(&self, from: Nucleotide, rng: &mut R) -> Result<Nucleotide, MutationError> {
        match self {
            Self::TransitionBias { kappa } => {
                let draw: f64 = rng.random();
                let transversion = 1.0 / (kappa + 2.0);
                let transition = kappa * transversion;
                let [first, second] = from.transversions();
                Ok(if draw < transition {
                    from.transition()
                } else if draw < transition + transversion {
                    first
                } else {
                    second
                })
            }
            Self::RateMatrix(matrix) => matrix.mutate(from, rng),
        }
    }
}

impl Default for SubstitutionModel {
    fn default() -> Self {
        Self::jukes_cantor()
    }
}

/// How mutated sites are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SiteSampling {
    /// Binomial count, then distinct uniform positions.
    #[default]
    Binomial,
    /// Independent trial per site.
    Bernoulli,
}

/// Distribution of indel lengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IndelLength {
    Fixed(usize),
    /// Uniform over `min..=max`.
    Uniform { min: usize, max: usize },
    /// Geometric on 1, 2, ... with success probability `p` (mean 1/p).
    Geometric { p: f64 },
}

#[derive(Debug, Clone)]
enum LengthSampler {
    Fixed(usize),
    Uniform(usize, usize),
    Geometric(Geometric),
}

impl LengthSampler {
    /// `None` when a geometric draw does not fit in `usize`.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(*n),
            Self::Uniform(min, max) => Some(rng.random_range(*min..=*max)),
            Self::Geometric(geo) => usize::try_from(geo.sample(rng))
                .ok()
                .and_then(|n| n.checked_add(1)),
        }
    }
}

/// Per-replication probabilities of one insertion or one deletion.
#[derive(Debug, Clone)]
pub struct IndelModel {
    insertion_probability: f64,
    deletion_probability: f64,
    length: IndelLength,
    sampler: LengthSampler,
}

impl IndelModel {
    pub fn new(
        insertion_probability: f64,
        deletion_probability: f64,
        length: IndelLength,
    ) -> Result<Self, MutationError> {
        for p in [insertion_probability, deletion_probability] {
            if !(0.0..=1.0).contains(&p) {
                return Err(MutationError::InvalidMutationRate(p));
            }
        }
        if insertion_probability + deletion_probability > 1.0 {
            return Err(MutationError::InvalidIndelModel(format!(
                "insertion ({insertion_probability}) and deletion ({deletion_probability}) probabilities sum above 1"
            )));
        }
        let sampler = match length {
            IndelLength::Fixed(n) => LengthSampler::Fixed(n),
            IndelLength::Uniform { min, max } if min <= max => LengthSampler::Uniform(min, max),
            IndelLength::Uniform { min, max } => {
                return Err(MutationError::InvalidIndelModel(format!(
                    "empty length range {min}..={max}"
                )));
            }
            IndelLength::Geometric { p } if !(p > 0.0 && p <= 1.0) => {
                return Err(MutationError::InvalidIndelModel(format!(
                    "geometric p={p} must be in (0, 1]"
                )));
            }
            IndelLength::Geometric { p } => LengthSampler::Geometric(
                Geometric::new(p)
                    .map_err(|e| MutationError::InvalidIndelModel(format!("geometric p={p}: {e}")))?,
            ),
        };
        Ok(Self {
            insertion_probability,
            deletion_probability,
            length,
            sampler,
        })
    }

    pub fn insertion_probability(&self) -> f64 {
        self.insertion_probability
    }

    pub fn deletion_probability(&self) -> f64 {
        self.deletion_probability
    }

    pub fn length(&self) -> IndelLength {
        self.length
    }

    /// Draw at most one indel against a genome of `len` bases.
    ///
    /// Out-of-frame lengths are dropped, and so is any indel longer than the
    /// genome itself.
    fn draw<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Option<Mutation> {
        let outcome: f64 = rng.random();
        let insertion = if outcome < self.insertion_probability {
            true
        } else if outcome < self.insertion_probability + self.deletion_probability {
            false
        } else {
            return None;
        };

        let length = self.sampler.sample(rng)?;
        if length == 0 || length % 3 != 0 || length > len {
            return None;
        }

        if insertion {
            let position = rng.random_range(0..=len);
            let sequence = (0..length).map(|_| Nucleotide::random(rng)).collect();
            Some(Mutation::Insertion { position, sequence })
        } else {
            let position = rng.random_range(0..=len - length);
            Some(Mutation::Deletion { position, length })
        }
    }
}

/// Draws the mutation set of one replication.
#[derive(Debug, Clone)]
pub struct MutationGenerator {
    rate: f64,
    substitution: SubstitutionModel,
    sampling: SiteSampling,
    indel: Option<IndelModel>,
    /// Count distribution for the expected genome length.
    site_counts: Option<(usize, Binomial)>,
}

impl MutationGenerator {
    /// Create a generator with per-site substitution probability `rate`.
    ///
    /// `genome_length` is the length the binomial count distribution is
    /// precomputed for; genomes of any other length get one built on demand.
    pub fn new(
        rate: f64,
        substitution: SubstitutionModel,
        sampling: SiteSampling,
        indel: Option<IndelModel>,
        genome_length: usize,
    ) -> Result<Self, MutationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(MutationError::InvalidMutationRate(rate));
        }
        substitution.validate()?;
        let site_counts = match sampling {
            SiteSampling::Binomial => Binomial::new(genome_length as u64, rate)
                .ok()
                .map(|b| (genome_length, b)),
            SiteSampling::Bernoulli => None,
        };
        Ok(Self {
            rate,
            substitution,
            sampling,
            indel,
            site_counts,
        })
    }

    /// Substitution-only generator, useful for tests and neutral runs.
    pub fn substitutions(rate: f64, substitution: SubstitutionModel, genome_length: usize) -> Result<Self, MutationError> {
        Self::new(rate, substitution, SiteSampling::Binomial, None, genome_length)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn substitution_model(&self) -> &SubstitutionModel {
        &self.substitution
    }

    pub fn sampling(&self) -> SiteSampling {
        self.sampling
    }

    pub fn indel_model(&self) -> Option<&IndelModel> {
        self.indel.as_ref()
    }

    /// Draw the mutations of one replication of `sequence`.
    pub fn mutate<R: Rng + ?Sized>(&self, sequence: &Sequence, rng: &mut R) -> Result<MutationSet, MutationError> {
        let mut set = MutationSet::new();
        self.mutate_into(sequence, &mut set, rng)?;
        Ok(set)
    }

    /// Like [`mutate`](Self::mutate) but reuses `set`'s allocation.
    pub fn mutate_into<R: Rng + ?Sized>(
        &self,
        sequence: &Sequence,
        set: &mut MutationSet,
        rng: &mut R,
    ) -> Result<(), MutationError> {
        set.clear();
        let len = sequence.len();
        let bases = sequence.as_slice();

        if len > 0 && self.rate > 0.0 {
            match self.sampling {
                SiteSampling::Binomial => {
                    let count = self.draw_site_count(len, rng);
                    while set.len() < count {
                        let position = rng.random_range(0..len);
                        if set.has_substitution_at(position) {
                            continue;
                        }
                        let state = self.substitution.mutate(bases[position], rng)?;
                        set.insert(Mutation::Substitution { position, state });
                    }
                }
                SiteSampling::Bernoulli => {
                    for (position, &from) in bases.iter().enumerate() {
                        if rng.random::<f64>() < self.rate {
                            let state = self.substitution.mutate(from, rng)?;
                            set.insert(Mutation::Substitution { position, state });
                        }
                    }
                }
            }
        }

        if let Some(indel) = &self.indel {
            if let Some(mutation) = indel.draw(len, rng) {
                set.insert(mutation);
            }
        }
        Ok(())
    }

    fn draw_site_count<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> usize {
        let count = match &self.site_counts {
            Some((n, binomial)) if *n == len => binomial.sample(rng),
            _ => match Binomial::new(len as u64, self.rate) {
                Ok(b) => b.sample(rng),
                Err(_) => 0,
            },
        };
        (count as usize).min(len)
    }
}

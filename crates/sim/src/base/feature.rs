//! Named genome regions.
//!
//! A `Feature` marks one or more fragments of a genome (for example the two
//! exons of a spliced gene) and says whether the region should be read as
//! nucleotides or as a coding region. Fitness factors are scoped by features:
//! the purifying factor looks for stop codons inside coding features, and the
//! frequency-dependent factor keys its memory on a feature's translated
//! signature.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{AminoAcid, Nucleotide, Sequence, sequence};
use crate::errors::SequenceError;

/// How the bases of a feature are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alphabet {
    Nucleotide,
    AminoAcid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    name: String,
    alphabet: Alphabet,
    fragments: Vec<Range<usize>>,
}

impl Feature {
    /// Create a feature from half-open fragments in genome coordinates.
    ///
    /// Fragments must be non-empty, and a coding feature must have a total
    /// length that is a multiple of 3.
    pub fn new(
        name: impl Into<String>,
        alphabet: Alphabet,
        fragments: Vec<Range<usize>>,
    ) -> Result<Self, SequenceError> {
        let feature = Self {
            name: name.into(),
            alphabet,
            fragments,
        };
        feature.check_shape()?;
        Ok(feature)
    }

    /// Single-fragment convenience constructor.
    pub fn contiguous(
        name: impl Into<String>,
        alphabet: Alphabet,
        range: Range<usize>,
    ) -> Result<Self, SequenceError> {
        Self::new(name, alphabet, vec![range])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    pub fn fragments(&self) -> &[Range<usize>] {
        &self.fragments
    }

    pub fn is_coding(&self) -> bool {
        self.alphabet == Alphabet::AminoAcid
    }

    /// Total number of bases covered.
    pub fn len(&self) -> usize {
        self.fragments.iter().map(|f| f.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Genome positions covered, in feature order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.fragments.iter().flat_map(|f| f.clone())
    }

    /// Feature-relative offset of a genome position, if covered.
    pub fn offset_of(&self, position: usize) -> Option<usize> {
        let mut offset = 0;
        for fragment in &self.fragments {
            if fragment.contains(&position) {
                return Some(offset + position - fragment.start);
            }
            offset += fragment.len();
        }
        None
    }

    /// Genome position of a feature-relative offset.
    pub fn position_at(&self, mut offset: usize) -> Option<usize> {
        for fragment in &self.fragments {
            if offset < fragment.len() {
                return Some(fragment.start + offset);
            }
            offset -= fragment.len();
        }
        None
    }

    /// Check that every fragment lies inside a genome of `genome_len` bases.
    pub fn validate(&self, genome_len: usize) -> Result<(), SequenceError> {
        self.check_shape()?;
        if let Some(bad) = self.fragments.iter().find(|f| f.end > genome_len) {
            return Err(self.invalid(format!(
                "fragment {}..{} exceeds genome length {genome_len}",
                bad.start, bad.end
            )));
        }
        Ok(())
    }

    /// Concatenate the feature's bases out of `sequence`.
    pub fn extract(&self, sequence: &Sequence) -> Result<Vec<Nucleotide>, SequenceError> {
        let bases = sequence.as_slice();
        let mut out = Vec::with_capacity(self.len());
        for fragment in &self.fragments {
            let slice = bases
                .get(fragment.clone())
                .ok_or(SequenceError::RangeOutOfBounds {
                    start: fragment.start,
                    end: fragment.end,
                    len: bases.len(),
                })?;
            out.extend_from_slice(slice);
        }
        Ok(out)
    }

    /// The amino-acid signature of this feature in `sequence`.
    pub fn signature(&self, sequence: &Sequence) -> Result<Vec<AminoAcid>, SequenceError> {
        sequence::translate(&self.extract(sequence)?)
    }

    /// Translate the codon of a coding feature that covers `position`.
    ///
    /// Returns `None` when the position is outside the feature or the codon
    /// runs past the end of `sequence`.
    pub fn codon_at(&self, sequence: &Sequence, position: usize) -> Option<AminoAcid> {
        let offset = self.offset_of(position)?;
        let start = offset - offset % 3;
        let mut codon = [Nucleotide::A; 3];
        for (k, slot) in codon.iter_mut().enumerate() {
            *slot = sequence.get(self.position_at(start + k)?)?;
        }
        Some(AminoAcid::from_codon(codon[0], codon[1], codon[2]))
    }

    /// True if any complete codon of this coding feature is a stop codon.
    pub fn has_stop_codon(&self, sequence: &Sequence) -> bool {
        let Ok(bases) = self.extract(sequence) else {
            return false;
        };
        bases
            .chunks_exact(3)
            .any(|c| AminoAcid::from_codon(c[0], c[1], c[2]).is_stop())
    }

    fn check_shape(&self) -> Result<(), SequenceError> {
        if self.fragments.is_empty() {
            return Err(self.invalid("no fragments".into()));
        }
        if self.fragments.iter().any(|f| f.start >= f.end) {
            return Err(self.invalid("empty or reversed fragment".into()));
        }
        if self.is_coding() && self.len() % 3 != 0 {
            return Err(self.invalid(format!(
                "coding length {} is not a multiple of 3",
                self.len()
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> SequenceError {
        SequenceError::InvalidFeature {
            name: self.name.clone(),
            reason,
        }
    }
}

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use rand::Rng;

use super::{AminoAcid, Nucleotide};
use crate::errors::SequenceError;

/// Nucleotide sequence of one genome.
///
/// `Sequence` stores a vector of `Nucleotide`s and supports the in-place
/// edits a mutation set needs (substitution, splice-in, range removal). The
/// amino-acid view is derived on demand with [`Sequence::translate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Sequence(Vec<Nucleotide>);

impl Sequence {
    /// Create a new, empty `Sequence`.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a `Sequence` with reserved capacity for `capacity` bases.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Create a `Sequence` from a vector of `Nucleotide`s.
    pub fn from_nucleotides(nucleotides: Vec<Nucleotide>) -> Self {
        Self(nucleotides)
    }

    /// Draw a sequence of `len` uniformly random states.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        Self((0..len).map(|_| Nucleotide::random(rng)).collect())
    }

    /// Return the length of the sequence in bases.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` if the sequence contains no bases.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the `Nucleotide` at `index`, or `None` if out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Nucleotide> {
        self.0.get(index).copied()
    }

    /// Set the base at `index` to `base`.
    #[inline]
    pub fn set(&mut self, index: usize, base: Nucleotide) -> Result<(), SequenceError> {
        let len = self.len();
        self.0
            .get_mut(index)
            .map(|slot| *slot = base)
            .ok_or(SequenceError::OutOfBounds { index, len })
    }

    /// Borrow the underlying `Nucleotide` slice.
    #[inline]
    pub fn as_slice(&self) -> &[Nucleotide] {
        &self.0
    }

    /// Insert `bases` before `index`. `index == len` appends.
    pub fn insert_slice(&mut self, index: usize, bases: &[Nucleotide]) -> Result<(), SequenceError> {
        if index > self.len() {
            return Err(SequenceError::OutOfBounds {
                index,
                len: self.len(),
            });
        }
        self.0.splice(index..index, bases.iter().copied());
        Ok(())
    }

    /// Remove the bases in `range`.
    pub fn remove_range(&mut self, range: Range<usize>) -> Result<(), SequenceError> {
        self.check_range(&range)?;
        self.0.drain(range);
        Ok(())
    }

    /// Copy out the bases in `range` as a new sequence.
    pub fn subsequence(&self, range: Range<usize>) -> Result<Sequence, SequenceError> {
        self.check_range(&range)?;
        Ok(Self(self.0[range].to_vec()))
    }

    /// Overwrite this sequence with the contents of `other`, reusing the
    /// existing allocation.
    pub fn copy_from(&mut self, other: &Sequence) {
        self.0.clone_from(&other.0);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn extend_from_slice(&mut self, bases: &[Nucleotide]) {
        self.0.extend_from_slice(bases);
    }

    /// Translate the sequence codon by codon.
    ///
    /// Fails with `ReadingFrame` unless the length is a multiple of 3.
    pub fn translate(&self) -> Result<Vec<AminoAcid>, SequenceError> {
        translate(&self.0)
    }

    /// Number of mismatching sites over the common prefix, plus the
    /// difference in length.
    pub fn hamming_distance(&self, other: &Sequence) -> usize {
        let mismatches = self
            .0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a != b)
            .count();
        mismatches + self.len().abs_diff(other.len())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), SequenceError> {
        if range.start > range.end || range.end > self.len() {
            return Err(SequenceError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }
        Ok(())
    }
}

/// Translate a slice of nucleotides in reading frame 0.
pub fn translate(bases: &[Nucleotide]) -> Result<Vec<AminoAcid>, SequenceError> {
    if bases.len() % 3 != 0 {
        return Err(SequenceError::ReadingFrame { len: bases.len() });
    }
    Ok(bases
        .chunks_exact(3)
        .map(|c| AminoAcid::from_codon(c[0], c[1], c[2]))
        .collect())
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &nuc in &self.0 {
            write!(f, "{}", nuc.to_char())?;
        }
        Ok(())
    }
}

impl FromStr for Sequence {
    type Err = SequenceError;

    /// Parse a textual representation (e.g. "ACGT"), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| {
                u8::try_from(c)
                    .ok()
                    .and_then(Nucleotide::from_ascii)
                    .ok_or(SequenceError::InvalidChar(c))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl From<Vec<Nucleotide>> for Sequence {
    fn from(nucleotides: Vec<Nucleotide>) -> Self {
        Self(nucleotides)
    }
}

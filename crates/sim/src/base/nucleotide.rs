use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::InvalidNucleotide;

/// A nucleotide state of a pathogen genome.
///
/// `Nucleotide` is a one-byte `Copy` type. The mapping of variants to
/// integers is stable and used throughout the crate (A=0, C=1, G=2, T=3):
/// per-site fitness tables and state-frequency tables are indexed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Nucleotide {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
}

impl Nucleotide {
    /// All states in index order.
    pub const ALL: [Nucleotide; 4] = [Self::A, Self::C, Self::G, Self::T];

    /// Convert from u8 index (0-3)
    #[inline(always)]
    pub const fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::A),
            1 => Some(Self::C),
            2 => Some(Self::G),
            3 => Some(Self::T),
            _ => None,
        }
    }

    /// Convert to the compact u8 index (0-3).
    #[inline(always)]
    pub const fn to_index(self) -> u8 {
        self as u8
    }

    /// Index usable for table lookups.
    #[inline(always)]
    pub const fn idx(self) -> usize {
        self as usize
    }

    /// Convert from an ASCII byte, accepting lowercase. Returns `None` for
    /// anything outside the ACGT alphabet.
    #[inline]
    pub const fn from_ascii(byte: u8) -> Option<Self> {
        match byte {
            b'A' | b'a' => Some(Self::A),
            b'C' | b'c' => Some(Self::C),
            b'G' | b'g' => Some(Self::G),
            b'T' | b't' => Some(Self::T),
            _ => None,
        }
    }

    /// Convert to an uppercase `char`.
    #[inline(always)]
    pub const fn to_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
        }
    }

    /// Return true if the nucleotide is a purine (A or G).
    #[inline(always)]
    pub const fn is_purine(self) -> bool {
        matches!(self, Self::A | Self::G)
    }

    /// The transition partner: the other state of the same chemical class
    /// (A <-> G, C <-> T).
    #[inline(always)]
    pub const fn transition(self) -> Self {
        match self {
            Self::A => Self::G,
            Self::G => Self::A,
            Self::C => Self::T,
            Self::T => Self::C,
        }
    }

    /// The two transversion targets in index order.
    #[inline(always)]
    pub const fn transversions(self) -> [Self; 2] {
        if self.is_purine() {
            [Self::C, Self::T]
        } else {
            [Self::A, Self::G]
        }
    }

    /// The three states different from `self`, in index order.
    #[inline]
    pub const fn others(self) -> [Self; 3] {
        match self {
            Self::A => [Self::C, Self::G, Self::T],
            Self::C => [Self::A, Self::G, Self::T],
            Self::G => [Self::A, Self::C, Self::T],
            Self::T => [Self::A, Self::C, Self::G],
        }
    }

    /// Draw a state uniformly at random.
    #[inline]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..4)]
    }
}

impl TryFrom<u8> for Nucleotide {
    type Error = InvalidNucleotide;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_ascii(byte).ok_or(InvalidNucleotide(byte))
    }
}

impl From<Nucleotide> for char {
    #[inline(always)]
    fn from(nuc: Nucleotide) -> char {
        nuc.to_char()
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

//! Amino-acid alphabet and the standard genetic code.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::Nucleotide;

/// One of the twenty standard residues, or a stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AminoAcid {
    Ala,
    Arg,
    Asn,
    Asp,
    Cys,
    Gln,
    Glu,
    Gly,
    His,
    Ile,
    Leu,
    Lys,
    Met,
    Phe,
    Pro,
    Ser,
    Thr,
    Trp,
    Tyr,
    Val,
    Stop,
}

use AminoAcid::*;

/// Standard code indexed by `16 * first + 4 * second + third` in ACGT order.
const GENETIC_CODE: [AminoAcid; 64] = [
    Lys, Asn, Lys, Asn, Thr, Thr, Thr, Thr, Arg, Ser, Arg, Ser, Ile, Ile, Met, Ile, // A..
    Gln, His, Gln, His, Pro, Pro, Pro, Pro, Arg, Arg, Arg, Arg, Leu, Leu, Leu, Leu, // C..
    Glu, Asp, Glu, Asp, Ala, Ala, Ala, Ala, Gly, Gly, Gly, Gly, Val, Val, Val, Val, // G..
    Stop, Tyr, Stop, Tyr, Ser, Ser, Ser, Ser, Stop, Cys, Trp, Cys, Leu, Phe, Leu, Phe, // T..
];

impl AminoAcid {
    /// Translate one codon with the standard genetic code.
    #[inline]
    pub const fn from_codon(first: Nucleotide, second: Nucleotide, third: Nucleotide) -> Self {
        GENETIC_CODE[16 * first.idx() + 4 * second.idx() + third.idx()]
    }

    #[inline(always)]
    pub const fn is_stop(self) -> bool {
        matches!(self, Stop)
    }

    /// One-letter code; stop is `*`.
    pub const fn to_char(self) -> char {
        match self {
            Ala => 'A',
            Arg => 'R',
            Asn => 'N',
            Asp => 'D',
            Cys => 'C',
            Gln => 'Q',
            Glu => 'E',
            Gly => 'G',
            His => 'H',
            Ile => 'I',
            Leu => 'L',
            Lys => 'K',
            Met => 'M',
            Phe => 'F',
            Pro => 'P',
            Ser => 'S',
            Thr => 'T',
            Trp => 'W',
            Tyr => 'Y',
            Val => 'V',
            Stop => '*',
        }
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

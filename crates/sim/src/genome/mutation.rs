//! Mutation events and ordered mutation sets.
//!
//! A `MutationSet` describes everything that happened to one genome in one
//! replication. All positions refer to the parent's coordinates. Mutations
//! are kept sorted by `(position, kind)` with insertions before deletions
//! before substitutions at the same site, and the set is applied from the
//! highest key downwards so that an edit never shifts a position that is
//! still to be applied.

use serde::{Deserialize, Serialize};

use crate::base::{Nucleotide, Sequence};
use crate::errors::SequenceError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutation {
    /// Replace the state at `position`.
    Substitution { position: usize, state: Nucleotide },
    /// Insert `sequence` before `position`; `position == len` appends.
    Insertion {
        position: usize,
        sequence: Vec<Nucleotide>,
    },
    /// Remove `length` bases starting at `position`.
    Deletion { position: usize, length: usize },
}

impl Mutation {
    pub fn position(&self) -> usize {
        match self {
            Self::Substitution { position, .. }
            | Self::Insertion { position, .. }
            | Self::Deletion { position, .. } => *position,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Insertion { .. } => 0,
            Self::Deletion { .. } => 1,
            Self::Substitution { .. } => 2,
        }
    }

    /// Total ordering key within a set.
    pub fn key(&self) -> (usize, u8) {
        (self.position(), self.rank())
    }

    pub fn is_substitution(&self) -> bool {
        matches!(self, Self::Substitution { .. })
    }

    fn apply(&self, sequence: &mut Sequence) -> Result<(), SequenceError> {
        match self {
            Self::Substitution { position, state } => sequence.set(*position, *state),
            Self::Insertion { position, sequence: bases } => {
                sequence.insert_slice(*position, bases)
            }
            Self::Deletion { position, length } => {
                sequence.remove_range(*position..*position + *length)
            }
        }
    }
}

/// Ordered, duplicate-free collection of mutations for one replication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSet {
    mutations: Vec<Mutation>,
}

impl MutationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    pub fn clear(&mut self) {
        self.mutations.clear();
    }

    /// True if a substitution is already recorded at `position`.
    pub fn has_substitution_at(&self, position: usize) -> bool {
        self.mutations
            .binary_search_by_key(&(position, 2), Mutation::key)
            .is_ok()
    }

    /// Insert a mutation at its ordered place.
    ///
    /// Returns `false` and leaves the set unchanged when `mutation` is a
    /// substitution at a position that already has one. Indels with an equal
    /// key are kept in insertion order.
    pub fn insert(&mut self, mutation: Mutation) -> bool {
        let key = mutation.key();
        if mutation.is_substitution() && self.has_substitution_at(key.0) {
            return false;
        }
        let at = self.mutations.partition_point(|m| m.key() <= key);
        self.mutations.insert(at, mutation);
        true
    }

    /// True if the set contains only substitutions, which keeps the genome
    /// length and lets site-additive fitness be updated incrementally.
    pub fn is_substitution_only(&self) -> bool {
        self.mutations.iter().all(Mutation::is_substitution)
    }

    /// `(position, new state)` of every substitution, in position order.
    pub fn substitutions(&self) -> impl Iterator<Item = (usize, Nucleotide)> + '_ {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Substitution { position, state } => Some((*position, *state)),
            _ => None,
        })
    }

    /// Apply every mutation to `sequence`, highest key first.
    pub fn apply(&self, sequence: &mut Sequence) -> Result<(), SequenceError> {
        self.mutations
            .iter()
            .rev()
            .try_for_each(|m| m.apply(sequence))
    }
}

impl<'a> IntoIterator for &'a MutationSet {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sub(position: usize, state: Nucleotide) -> Mutation {
        Mutation::Substitution { position, state }
    }

    #[test]
    fn test_set_keeps_key_order() {
        let mut set = MutationSet::new();
        assert!(set.insert(sub(5, Nucleotide::A)));
        assert!(set.insert(Mutation::Deletion { position: 5, length: 3 }));
        assert!(set.insert(Mutation::Insertion {
            position: 5,
            sequence: vec![Nucleotide::C; 3],
        }));
        assert!(set.insert(sub(1, Nucleotide::G)));

        let keys: Vec<_> = set.iter().map(Mutation::key).collect();
        assert_eq!(keys, vec![(1, 2), (5, 0), (5, 1), (5, 2)]);
    }

    #[test]
    fn test_rejects_second_substitution_at_site() {
        let mut set = MutationSet::new();
        assert!(set.insert(sub(3, Nucleotide::A)));
        assert!(!set.insert(sub(3, Nucleotide::C)));
        assert_eq!(set.len(), 1);
        assert!(set.has_substitution_at(3));
        assert!(!set.has_substitution_at(4));
    }

    #[test]
    fn test_apply_uses_parent_coordinates() {
        let mut seq = Sequence::from_str("AAAAAAAAA").unwrap();
        let mut set = MutationSet::new();
        set.insert(sub(0, Nucleotide::C));
        set.insert(Mutation::Insertion {
            position: 3,
            sequence: vec![Nucleotide::G; 3],
        });
        set.insert(sub(8, Nucleotide::T));
        set.apply(&mut seq).unwrap();
        assert_eq!(seq.to_string(), "CAAGGGAAAAAT");
    }

    #[test]
    fn test_apply_deletion_then_substitution_downstream() {
        let mut seq = Sequence::from_str("ACGTACGTA").unwrap();
        let mut set = MutationSet::new();
        set.insert(Mutation::Deletion { position: 0, length: 3 });
        set.insert(sub(6, Nucleotide::A));
        set.apply(&mut seq).unwrap();
        // parent site 6 (G) becomes A, then ACG is removed
        assert_eq!(seq.to_string(), "TACATA");
    }

    #[test]
    fn test_apply_out_of_range_fails() {
        let mut seq = Sequence::from_str("ACG").unwrap();
        let mut set = MutationSet::new();
        set.insert(Mutation::Deletion { position: 2, length: 3 });
        assert!(set.apply(&mut seq).is_err());
    }

    #[test]
    fn test_substitution_only() {
        let mut set = MutationSet::new();
        set.insert(sub(2, Nucleotide::T));
        assert!(set.is_substitution_only());
        assert_eq!(set.substitutions().collect::<Vec<_>>(), vec![(2, Nucleotide::T)]);
        set.insert(Mutation::Deletion { position: 0, length: 3 });
        assert!(!set.is_substitution_only());
    }
}

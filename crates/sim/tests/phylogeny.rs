//! Integration tests for the ancestry graph and genealogy reconstruction.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use virevo_sim::errors::ReconstructionError;
use virevo_sim::phylogeny::Phylogeny;

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ind_{i}")).collect()
}

fn assert_no_single_child_interior(phylogeny: &Phylogeny) {
    let root = phylogeny.root();
    for (id, lineage) in phylogeny.lineages() {
        if id != root && lineage.children() > 0 {
            assert_ne!(
                lineage.children(),
                1,
                "lineage {} born in generation {} has a single child",
                id.index(),
                lineage.generation()
            );
        }
    }
}

#[test]
fn test_reconstruct_fixed_history() {
    let mut phylogeny = Phylogeny::new(4);
    for (generation, parents) in [[0, 0, 1, 1], [0, 1, 2, 3], [0, 0, 2, 2]].iter().enumerate() {
        phylogeny.add_generation(generation + 1, parents);
    }
    phylogeny.prune_dead_lineages();

    let sample = [0, 1, 2, 3];
    let tree = phylogeny.reconstruct(&sample, &labels(4)).unwrap();
    assert_eq!(tree.leaves().count(), 4);
    assert_eq!(tree.height(), 3);
    assert!(tree.is_binary());
    for leaf in tree.leaves() {
        assert_eq!(tree.node(leaf).unwrap().height, 0);
    }
    // two cherries joined at the founder
    let root = tree.node(tree.root()).unwrap();
    assert_eq!(root.children.len(), 2);
    for &child in &root.children {
        assert_eq!(tree.node(child).unwrap().height, 1);
        assert_eq!(tree.branch_length(child), Some(2));
    }

    let again = phylogeny.reconstruct(&sample, &labels(4)).unwrap();
    assert_eq!(again, tree);
}

#[test]
fn test_reconstruct_soft_failures() {
    let mut phylogeny = Phylogeny::new(3);
    phylogeny.add_generation(1, &[0, 1, 2]);
    assert_eq!(
        phylogeny.reconstruct(&[], &[]),
        Err(ReconstructionError::EmptySample)
    );
    assert_eq!(
        phylogeny.reconstruct(&[0, 5], &labels(2)),
        Err(ReconstructionError::IndexOutOfRange { index: 5, size: 3 })
    );
    assert_eq!(
        phylogeny.reconstruct(&[1, 1], &labels(2)),
        Err(ReconstructionError::DuplicateSample(1))
    );
    assert_eq!(
        phylogeny.reconstruct(&[0], &labels(1)),
        Err(ReconstructionError::NotCoalesced)
    );
}

#[test]
fn test_pruning_leaves_no_single_child_interior() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let size = 12;
    let mut phylogeny = Phylogeny::new(size);
    for generation in 1..=200 {
        let parents: Vec<usize> = (0..size).map(|_| rng.random_range(0..size)).collect();
        phylogeny.add_generation(generation, &parents);
        if generation % 5 == 0 {
            phylogeny.prune_dead_lineages();
            assert_no_single_child_interior(&phylogeny);
            // a binary tree over the leaves has at most 2n - 1 nodes
            assert!(phylogeny.live_lineages() <= 2 * size - 1);
        }
    }

    let tree = phylogeny.reconstruct(&[0, 3, 7, 11], &labels(4)).unwrap();
    assert_eq!(tree.leaves().count(), 4);
    assert!(tree.height() <= 200);
}

#[test]
fn test_graph_is_bounded_without_pruning() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let size = 10;
    let mut phylogeny = Phylogeny::new(size);
    for generation in 1..=2_000 {
        let parents: Vec<usize> = (0..size).map(|_| rng.random_range(0..size)).collect();
        phylogeny.add_generation(generation, &parents);
        assert!(
            phylogeny.live_lineages() <= 2 * size - 1,
            "{} live lineages at generation {generation}",
            phylogeny.live_lineages()
        );
        assert_no_single_child_interior(&phylogeny);
    }
    let tree = phylogeny.reconstruct(&[1, 4, 8], &labels(3)).unwrap();
    assert_eq!(tree.leaves().count(), 3);
}

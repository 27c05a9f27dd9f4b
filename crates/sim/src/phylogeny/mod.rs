//! Lineage tracking and genealogy reconstruction.
//!
//! The [`Phylogeny`] keeps an implicit ancestry graph over the individuals of
//! every generation. Each individual of the current generation points at a
//! [`Lineage`] node; each node points at its parent and counts its live
//! children. Nodes live in an arena with a free stack, so history that no
//! longer leads to any extant individual is recycled as soon as it dies out.
//!
//! ## Bounding the graph
//! Every generation adds one node per individual. After each generation,
//! nodes of the previous generation that were not selected as parents are
//! released, walking up while ancestors lose their last child, and every node
//! left with exactly one child is spliced out. The live graph is therefore
//! the extant leaves plus their branch points, at most `2n - 1` nodes, and
//! the root is the MRCA of the extant individuals.
//! [`Phylogeny::prune_dead_lineages`] runs the splicing pass on its own.
//!
//! ## Reconstruction
//! [`Phylogeny::reconstruct`] builds the exact genealogy of any sample of
//! extant individuals. Every ancestor of a sampled leaf is tagged with the
//! number of sampled leaves that descend from it. A sampled lineage then
//! moves up to the first ancestor whose tag exceeds its own: that is where it
//! meets another sampled lineage. Meeting points are resolved deepest
//! generation first, and lineages meeting at the same node are merged into
//! one internal node (a polytomy when more than two meet).

mod tree;

pub use tree::{Tree, TreeNode};

use std::collections::{HashMap, HashSet};

use crate::errors::ReconstructionError;

/// Stable handle to a node of the ancestry graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineageId(u32);

impl LineageId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    fn new(index: usize) -> Self {
        Self(index as u32)
    }
}

/// One node of the ancestry graph.
#[derive(Debug, Clone, Default)]
pub struct Lineage {
    parent: Option<LineageId>,
    generation: usize,
    children: usize,
    alive: bool,
    /// Visit marker for the current sweep.
    stamp: u64,
}

impl Lineage {
    pub fn parent(&self) -> Option<LineageId> {
        self.parent
    }

    /// Generation in which this lineage was born.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Number of live child lineages.
    pub fn children(&self) -> usize {
        self.children
    }
}

#[derive(Debug, Clone)]
pub struct Phylogeny {
    lineages: Vec<Lineage>,
    free: Vec<LineageId>,
    /// Lineage of every individual of the current generation.
    extant: Vec<LineageId>,
    /// Buffer for the next generation's lineages.
    next: Vec<LineageId>,
    root: LineageId,
    generation: usize,
    stamp: u64,
}

impl Phylogeny {
    /// Start with `size` individuals that all descend from one founder
    /// lineage born in generation 0.
    pub fn new(size: usize) -> Self {
        let founder = Lineage {
            parent: None,
            generation: 0,
            children: 0,
            alive: true,
            stamp: 0,
        };
        let root = LineageId::new(0);
        Self {
            lineages: vec![founder],
            free: Vec::new(),
            extant: vec![root; size],
            next: Vec::with_capacity(size),
            root,
            generation: 0,
            stamp: 0,
        }
    }

    /// Generation of the current extant individuals.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Number of extant individuals.
    pub fn size(&self) -> usize {
        self.extant.len()
    }

    pub fn root(&self) -> LineageId {
        self.root
    }

    /// Lineage of every extant individual, in individual order.
    pub fn extant(&self) -> &[LineageId] {
        &self.extant
    }

    /// Live node at `id`, if any.
    pub fn lineage(&self, id: LineageId) -> Option<&Lineage> {
        self.lineages.get(id.index()).filter(|l| l.alive)
    }

    /// Every live node with its id.
    pub fn lineages(&self) -> impl Iterator<Item = (LineageId, &Lineage)> + '_ {
        self.lineages
            .iter()
            .enumerate()
            .filter(|(_, l)| l.alive)
            .map(|(i, l)| (LineageId::new(i), l))
    }

    /// Number of nodes currently in the graph.
    pub fn live_lineages(&self) -> usize {
        self.lineages.len() - self.free.len()
    }

    /// Record a new generation.
    ///
    /// `parents[i]` is the index, in the current extant array, of the parent
    /// of new individual `i`. The number of individuals may differ from the
    /// previous generation.
    ///
    /// Lineages of the previous generation that were not selected are
    /// released, together with every ancestor that loses its last child.
    /// Ancestors left with a single child are then spliced out, so the graph
    /// only ever holds the extant leaves and their branch points.
    ///
    /// Returns the number of released or spliced lineages.
    ///
    /// # Panics
    /// If a parent index is out of range for the current generation.
    pub fn add_generation(&mut self, generation: usize, parents: &[usize]) -> usize {
        self.next.clear();
        for &parent in parents {
            let parent = self.extant[parent];
            self.lineages[parent.index()].children += 1;
            let child = self.allocate(parent, generation);
            self.next.push(child);
        }

        self.stamp += 1;
        let mut released = 0;
        for i in 0..self.extant.len() {
            let id = self.extant[i];
            let lineage = &mut self.lineages[id.index()];
            if lineage.stamp == self.stamp {
                continue;
            }
            lineage.stamp = self.stamp;
            released += self.release_chain(id);
        }

        std::mem::swap(&mut self.extant, &mut self.next);
        self.generation = generation;
        released + self.splice_single_children()
    }

    /// Splice every single-child node out of the graph.
    ///
    /// [`add_generation`](Self::add_generation) already leaves no such
    /// node behind, so on a graph built only through it this finds nothing.
    /// Returns the number of spliced nodes.
    pub fn prune_dead_lineages(&mut self) -> usize {
        self.splice_single_children()
    }

    /// Most recent common ancestor of all extant individuals.
    pub fn mrca(&self) -> Option<LineageId> {
        let (&first, rest) = self.extant.split_first()?;

        let mut path = Vec::new();
        let mut on_path = HashMap::new();
        let mut node = Some(first);
        while let Some(id) = node {
            on_path.insert(id, path.len());
            path.push(id);
            node = self.lineages[id.index()].parent;
        }

        let mut highest = 0;
        let mut visited = HashSet::new();
        for &leaf in rest {
            let mut node = Some(leaf);
            while let Some(id) = node {
                if let Some(&i) = on_path.get(&id) {
                    highest = highest.max(i);
                    break;
                }
                if !visited.insert(id) {
                    break;
                }
                node = self.lineages[id.index()].parent;
            }
        }
        path.get(highest).copied()
    }

    /// Birth generation of the MRCA of all extant individuals.
    pub fn mrca_generation(&self) -> Option<usize> {
        self.mrca().map(|id| self.lineages[id.index()].generation)
    }

    /// Reconstruct the genealogy of the extant individuals at `sample`,
    /// labelling leaves with `labels`.
    ///
    /// Does not modify the graph; calling it twice gives the same tree.
    ///
    /// # Errors
    /// - [`ReconstructionError::EmptySample`]
    /// - [`ReconstructionError::LabelMismatch`] if `labels` and `sample`
    ///   differ in length
    /// - [`ReconstructionError::IndexOutOfRange`], [`ReconstructionError::DuplicateSample`]
    /// - [`ReconstructionError::NotCoalesced`] if the sampled lineages do not
    ///   meet in a single ancestor; a single-individual sample never does.
    pub fn reconstruct(
        &self,
        sample: &[usize],
        labels: &[String],
    ) -> Result<Tree, ReconstructionError> {
        if sample.is_empty() {
            return Err(ReconstructionError::EmptySample);
        }
        if labels.len() != sample.len() {
            return Err(ReconstructionError::LabelMismatch {
                labels: labels.len(),
                sample: sample.len(),
            });
        }
        let mut seen = HashSet::with_capacity(sample.len());
        for &index in sample {
            if index >= self.extant.len() {
                return Err(ReconstructionError::IndexOutOfRange {
                    index,
                    size: self.extant.len(),
                });
            }
            if !seen.insert(index) {
                return Err(ReconstructionError::DuplicateSample(index));
            }
        }
        if sample.len() == 1 {
            return Err(ReconstructionError::NotCoalesced);
        }

        let mut below: HashMap<LineageId, usize> = HashMap::new();
        for &index in sample {
            let mut node = Some(self.extant[index]);
            while let Some(id) = node {
                *below.entry(id).or_default() += 1;
                node = self.lineages[id.index()].parent;
            }
        }

        struct Pending {
            node: usize,
            meets_at: Option<LineageId>,
        }

        let mut tree = Tree::with_capacity(2 * sample.len() - 1);
        let mut pending: Vec<Pending> = sample
            .iter()
            .zip(labels)
            .map(|(&index, label)| {
                let leaf = self.extant[index];
                let node = tree.add_leaf(label.clone(), self.height_of(leaf));
                Pending {
                    node,
                    meets_at: self.meeting_point(leaf, 1, &below),
                }
            })
            .collect();

        while pending.len() > 1 {
            let mut target: Option<(LineageId, usize)> = None;
            for p in &pending {
                let id = p.meets_at.ok_or(ReconstructionError::NotCoalesced)?;
                let generation = self.lineages[id.index()].generation;
                if target.is_none_or(|(_, deepest)| generation > deepest) {
                    target = Some((id, generation));
                }
            }
            let Some((target, _)) = target else {
                return Err(ReconstructionError::NotCoalesced);
            };

            let children: Vec<usize> = pending
                .iter()
                .filter(|p| p.meets_at == Some(target))
                .map(|p| p.node)
                .collect();
            let leftmost = pending
                .iter()
                .position(|p| p.meets_at == Some(target))
                .ok_or(ReconstructionError::NotCoalesced)?;

            let node = tree.add_internal(self.height_of(target), children);
            let count = below.get(&target).copied().unwrap_or(0);
            pending[leftmost] = Pending {
                node,
                meets_at: self.meeting_point(target, count, &below),
            };
            pending.retain(|p| p.meets_at != Some(target));
        }
        Ok(tree)
    }

    /// First node at or above `from` with more than `count` sampled
    /// descendants.
    fn meeting_point(
        &self,
        from: LineageId,
        count: usize,
        below: &HashMap<LineageId, usize>,
    ) -> Option<LineageId> {
        let mut node = Some(from);
        while let Some(id) = node {
            if below.get(&id).copied().unwrap_or(0) > count {
                return Some(id);
            }
            node = self.lineages[id.index()].parent;
        }
        None
    }

    fn height_of(&self, id: LineageId) -> usize {
        self.generation
            .saturating_sub(self.lineages[id.index()].generation)
    }

    /// Walks from each extant leaf toward the root, visiting every node at
    /// most once. A single-child root is released and its child becomes the
    /// root.
    fn splice_single_children(&mut self) -> usize {
        self.stamp += 1;
        let stamp = self.stamp;
        let mut spliced = 0;
        for i in 0..self.extant.len() {
            let mut node = self.extant[i];
            if self.lineages[node.index()].stamp == stamp {
                continue;
            }
            self.lineages[node.index()].stamp = stamp;
            while let Some(parent) = self.lineages[node.index()].parent {
                if self.lineages[parent.index()].children == 1 {
                    let grandparent = self.lineages[parent.index()].parent;
                    self.lineages[node.index()].parent = grandparent;
                    if grandparent.is_none() {
                        self.root = node;
                    }
                    self.free_slot(parent);
                    spliced += 1;
                    continue;
                }
                if self.lineages[parent.index()].stamp == stamp {
                    break;
                }
                self.lineages[parent.index()].stamp = stamp;
                node = parent;
            }
        }
        spliced
    }

    fn allocate(&mut self, parent: LineageId, generation: usize) -> LineageId {
        let lineage = Lineage {
            parent: Some(parent),
            generation,
            children: 0,
            alive: true,
            stamp: 0,
        };
        match self.free.pop() {
            Some(id) => {
                self.lineages[id.index()] = lineage;
                id
            }
            None => {
                self.lineages.push(lineage);
                LineageId::new(self.lineages.len() - 1)
            }
        }
    }

    /// Release `id` if childless, then each ancestor that loses its last
    /// child. The root is never released.
    fn release_chain(&mut self, id: LineageId) -> usize {
        let mut released = 0;
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root || self.lineages[node.index()].children > 0 {
                break;
            }
            current = self.lineages[node.index()].parent;
            self.free_slot(node);
            released += 1;
            if let Some(parent) = current {
                self.lineages[parent.index()].children -= 1;
            }
        }
        released
    }

    fn free_slot(&mut self, id: LineageId) {
        let lineage = &mut self.lineages[id.index()];
        lineage.alive = false;
        lineage.parent = None;
        self.free.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("s{i}")).collect()
    }

    /// Three generations on four slots; slots 0,1 and 2,3 are sisters.
    fn two_cherries() -> Phylogeny {
        let mut phylogeny = Phylogeny::new(4);
        phylogeny.add_generation(1, &[0, 0, 1, 1]);
        phylogeny.add_generation(2, &[0, 1, 2, 3]);
        phylogeny.add_generation(3, &[0, 0, 2, 2]);
        phylogeny
    }

    #[test]
    fn test_new_shares_founder() {
        let phylogeny = Phylogeny::new(5);
        assert_eq!(phylogeny.size(), 5);
        assert_eq!(phylogeny.live_lineages(), 1);
        assert!(phylogeny.extant().iter().all(|&id| id == phylogeny.root()));
        assert_eq!(phylogeny.mrca_generation(), Some(0));
    }

    #[test]
    fn test_unselected_lineages_are_released() {
        let mut phylogeny = Phylogeny::new(4);
        phylogeny.add_generation(1, &[0, 0, 1, 1]);
        assert_eq!(phylogeny.live_lineages(), 5);
        // three unselected lineages released, then the founder is left with
        // a single child and is spliced out
        let removed = phylogeny.add_generation(2, &[0, 0, 0, 0]);
        assert_eq!(removed, 4);
        assert_eq!(phylogeny.live_lineages(), 5);
        let root = phylogeny.lineage(phylogeny.root()).unwrap();
        assert_eq!(root.children(), 4);
        assert_eq!(root.generation(), 1);
    }

    #[test]
    fn test_released_slots_are_reused() {
        let mut phylogeny = Phylogeny::new(4);
        for generation in 1..=20 {
            phylogeny.add_generation(generation, &[0, 0, 0, 0]);
            phylogeny.prune_dead_lineages();
        }
        assert_eq!(phylogeny.live_lineages(), 5);
        assert!(phylogeny.lineages.len() <= 10);
    }

    #[test]
    fn test_root_follows_mrca() {
        let mut phylogeny = Phylogeny::new(4);
        phylogeny.add_generation(1, &[0, 0, 1, 1]);
        phylogeny.add_generation(2, &[0, 0, 0, 0]);
        assert_eq!(phylogeny.mrca_generation(), Some(1));

        assert_eq!(phylogeny.prune_dead_lineages(), 0);
        let root = phylogeny.root();
        assert_eq!(phylogeny.lineage(root).unwrap().generation(), 1);
        assert_eq!(phylogeny.lineage(root).unwrap().parent(), None);
        assert_eq!(phylogeny.mrca(), Some(root));
    }

    #[test]
    fn test_prune_leaves_no_single_child_nodes() {
        let mut phylogeny = two_cherries();
        assert_eq!(phylogeny.live_lineages(), 7);
        for (id, lineage) in phylogeny.lineages() {
            if id != phylogeny.root() && lineage.children() > 0 {
                assert_ne!(lineage.children(), 1);
            }
        }
        assert_eq!(phylogeny.prune_dead_lineages(), 0);
        assert_eq!(phylogeny.live_lineages(), 7);
    }

    #[test]
    fn test_graph_stays_bounded_without_pruning() {
        let mut phylogeny = Phylogeny::new(4);
        assert_eq!(phylogeny.add_generation(1, &[0, 1, 2, 3]), 0);
        // every generation-1 lineage has one child and is spliced
        assert_eq!(phylogeny.add_generation(2, &[0, 1, 2, 3]), 4);
        assert_eq!(phylogeny.live_lineages(), 5);
        for generation in 3..=100 {
            let parents: Vec<usize> = (0..4).map(|i| (i + generation) % 4).collect();
            phylogeny.add_generation(generation, &parents);
            assert_eq!(phylogeny.live_lineages(), 5);
        }
    }

    #[test]
    fn test_reconstruct_two_cherries() {
        let phylogeny = two_cherries();
        let tree = phylogeny.reconstruct(&[0, 1, 2, 3], &labels(4)).unwrap();
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.height(), 3);
        assert!(tree.is_binary());
        assert_eq!(tree.leaf_labels(), vec!["s0", "s1", "s2", "s3"]);
        assert_eq!(tree.node(4).unwrap().children, vec![0, 1]);
        assert_eq!(tree.node(4).unwrap().height, 1);
        assert_eq!(tree.node(5).unwrap().children, vec![2, 3]);
        assert_eq!(tree.branch_length(4), Some(2));
    }

    #[test]
    fn test_reconstruct_is_unchanged_by_pruning() {
        let mut phylogeny = two_cherries();
        let before = phylogeny.reconstruct(&[3, 0, 2], &labels(3)).unwrap();
        assert_eq!(before, phylogeny.reconstruct(&[3, 0, 2], &labels(3)).unwrap());
        phylogeny.prune_dead_lineages();
        assert_eq!(before, phylogeny.reconstruct(&[3, 0, 2], &labels(3)).unwrap());
        assert_eq!(before.height(), 3);
    }

    #[test]
    fn test_reconstruct_polytomy() {
        let mut phylogeny = Phylogeny::new(3);
        phylogeny.add_generation(1, &[0, 0, 0]);
        phylogeny.add_generation(2, &[0, 1, 2]);
        let tree = phylogeny.reconstruct(&[0, 1, 2], &labels(3)).unwrap();
        assert_eq!(tree.len(), 4);
        assert!(!tree.is_binary());
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_reconstruct_errors() {
        let phylogeny = two_cherries();
        assert_eq!(
            phylogeny.reconstruct(&[], &[]),
            Err(ReconstructionError::EmptySample)
        );
        assert_eq!(
            phylogeny.reconstruct(&[0, 1], &labels(3)),
            Err(ReconstructionError::LabelMismatch { labels: 3, sample: 2 })
        );
        assert_eq!(
            phylogeny.reconstruct(&[0, 4], &labels(2)),
            Err(ReconstructionError::IndexOutOfRange { index: 4, size: 4 })
        );
        assert_eq!(
            phylogeny.reconstruct(&[1, 1], &labels(2)),
            Err(ReconstructionError::DuplicateSample(1))
        );
        assert_eq!(
            phylogeny.reconstruct(&[2], &labels(1)),
            Err(ReconstructionError::NotCoalesced)
        );
    }

    #[test]
    fn test_reconstruct_founders() {
        // no generation has passed: every individual is the founder
        let phylogeny = Phylogeny::new(3);
        let tree = phylogeny.reconstruct(&[0, 1, 2], &labels(3)).unwrap();
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.node(tree.root()).unwrap().children.len(), 3);
    }
}

//! Time-calibrated genealogies produced by reconstruction.

/// One node of a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Set for leaves only.
    pub label: Option<String>,
    /// Generations before the sampling time; 0 for extant leaves.
    pub height: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted tree stored as an arena of nodes.
///
/// Node indices are stable; leaves come first in sample order, internal
/// nodes follow in the order they were merged, so the root is always the
/// last node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    root: usize,
}

impl Tree {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: 0,
        }
    }

    pub(crate) fn add_leaf(&mut self, label: String, height: usize) -> usize {
        self.nodes.push(TreeNode {
            label: Some(label),
            height,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Join `children` under a new internal node, which becomes the root
    /// until another node is added above it.
    pub(crate) fn add_internal(&mut self, height: usize, children: Vec<usize>) -> usize {
        let id = self.nodes.len();
        for &child in &children {
            self.nodes[child].parent = Some(id);
        }
        self.nodes.push(TreeNode {
            label: None,
            height,
            parent: None,
            children,
        });
        self.root = id;
        id
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of the leaf nodes, in sample order.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, _)| i)
    }

    pub fn leaf_labels(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .filter_map(|n| n.label.as_deref())
            .collect()
    }

    /// Height of the root, i.e. the depth of the genealogy in generations.
    pub fn height(&self) -> usize {
        self.nodes.get(self.root).map_or(0, |n| n.height)
    }

    /// Generations between `node` and its parent; `None` for the root.
    pub fn branch_length(&self, node: usize) -> Option<usize> {
        let n = self.nodes.get(node)?;
        let parent = self.nodes.get(n.parent?)?;
        Some(parent.height - n.height)
    }

    /// True if every internal node has exactly two children.
    pub fn is_binary(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.is_leaf() || n.children.len() == 2)
    }
}

//! Frequency oracle.
//!
//! A shadow trie with the same structure as the emitted one that is never
//! sent anywhere. It outlives individual encode calls and counts how many
//! records reached each node, which is all the sampling heuristic needs to
//! tell common shapes from rare ones.

use crate::builder::{NodeId, PathStep, PathTrie};

/// Process-lifetime occurrence counts per trie node.
#[derive(Debug, Clone)]
pub struct FrequencyOracle {
    trie: PathTrie<()>,
}

impl Default for FrequencyOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyOracle {
    /// Creates an empty oracle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: PathTrie::new(true),
        }
    }

    /// Folds one record path into the oracle, returning the visited nodes.
    pub fn observe(&mut self, steps: &[PathStep<'_>]) -> Vec<NodeId> {
        self.trie.insert_path(steps)
    }

    /// Returns how many records went through `id`.
    #[must_use]
    pub fn count(&self, id: NodeId) -> u64 {
        self.trie.node(id).count
    }

    /// Returns the number of nodes held.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.trie.len()
    }

    /// Returns true if any attribute branch along `path` is rare.
    ///
    /// `path[0]` is the name root. A branch is rare when
    /// `root_count / siblings / factor >= branch_count`, with `siblings`
    /// the number of distinct values seen at that level.
    #[must_use]
    pub fn has_rare_branch(&self, path: &[NodeId], factor: u64) -> bool {
        let Some((&root, branches)) = path.split_first() else {
            return false;
        };
        let root_count = self.count(root);
        branches.iter().any(|&id| {
            let siblings = self.trie.sibling_count(id) as u64;
            siblings > 0 && root_count / siblings / factor >= self.count(id)
        })
    }
}

//! Prefix-trie construction shared by the emitted trie and the oracle.
//!
//! Both tries walk records the same way: one level per schema key, matching
//! children by key and canonical value. They differ only in what they keep:
//! the emitted trie is rebuilt per call and collects leaf payloads, the
//! oracle lives for the process and counts how often each node is visited.

use crate::trie::{EdgeValue, LeafRecord, TrieNode};
use crate::value::Value;
use std::collections::HashMap;

/// Index of a node inside a [`PathTrie`].
pub type NodeId = usize;

/// Parent marker used for root nodes in the child index.
const NO_PARENT: NodeId = NodeId::MAX;

/// One level of a record's path: a key and the record's value for it.
#[derive(Debug, Clone, Copy)]
pub struct PathStep<'a> {
    /// `name` or `attr_<code>`.
    pub key: &'a str,
    /// The value, or `None` when the record lacks the attribute.
    pub value: Option<&'a Value>,
    /// Canonical form of `value`; empty for an absent value.
    pub canonical: &'a str,
}

/// A node of a [`PathTrie`].
#[derive(Debug, Clone)]
pub struct PathNode<L> {
    /// Edge key.
    pub key: String,
    /// Edge value.
    pub value: EdgeValue,
    /// Number of paths that went through this node (counting tries only).
    pub count: u64,
    /// Parent node, `None` for roots.
    pub parent: Option<NodeId>,
    /// Child nodes in insertion order.
    pub children: Vec<NodeId>,
    /// Leaf payloads attached to this node.
    pub leaves: Vec<L>,
}

/// An arena-backed prefix trie keyed by (key, canonical value) edges.
#[derive(Debug, Clone)]
pub struct PathTrie<L> {
    nodes: Vec<PathNode<L>>,
    roots: Vec<NodeId>,
    index: HashMap<(NodeId, String, String), NodeId>,
    track_counts: bool,
}

impl<L> PathTrie<L> {
    /// Creates an empty trie. With `track_counts` every insertion increments
    /// the visit counter of each node on the path.
    #[must_use]
    pub fn new(track_counts: bool) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            track_counts,
        }
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the trie has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns root nodes in first-seen order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Returns a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this trie.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PathNode<L> {
        &self.nodes[id]
    }

    /// Walks `steps` from the root level, creating missing nodes.
    ///
    /// Returns the node ids along the path, root first.
    pub fn insert_path(&mut self, steps: &[PathStep<'_>]) -> Vec<NodeId> {
        let mut parent = NO_PARENT;
        let mut visited = Vec::with_capacity(steps.len());
        for step in steps {
            let id = self.child_or_insert(parent, step);
            if self.track_counts {
                self.nodes[id].count += 1;
            }
            visited.push(id);
            parent = id;
        }
        visited
    }

    /// Attaches a leaf payload under `node`.
    pub fn attach(&mut self, node: NodeId, leaf: L) {
        self.nodes[node].leaves.push(leaf);
    }

    /// Returns the number of children of `id`'s parent (or of the root
    /// level), including `id` itself.
    #[must_use]
    pub fn sibling_count(&self, id: NodeId) -> usize {
        self.nodes[id]
            .parent
            .map_or(self.roots.len(), |p| self.nodes[p].children.len())
    }

    fn child_or_insert(&mut self, parent: NodeId, step: &PathStep<'_>) -> NodeId {
        let lookup = (parent, step.key.to_string(), step.canonical.to_string());
        if let Some(&id) = self.index.get(&lookup) {
            return id;
        }

        let id = self.nodes.len();
        self.nodes.push(PathNode {
            key: step.key.to_string(),
            value: EdgeValue::from(step.value),
            count: 0,
            parent: (parent != NO_PARENT).then_some(parent),
            children: Vec::new(),
            leaves: Vec::new(),
        });
        if parent == NO_PARENT {
            self.roots.push(id);
        } else {
            self.nodes[parent].children.push(id);
        }
        self.index.insert(lookup, id);
        id
    }
}

impl PathTrie<LeafRecord> {
    /// Converts the trie into an encoded forest.
    ///
    /// With `prune_empty`, internal nodes whose subtree holds no leaf are
    /// dropped.
    #[must_use]
    pub fn into_forest(self, prune_empty: bool) -> Vec<TrieNode> {
        let roots = self.roots;
        let mut slots: Vec<Option<PathNode<LeafRecord>>> =
            self.nodes.into_iter().map(Some).collect();
        roots
            .into_iter()
            .filter_map(|id| build_node(id, &mut slots, prune_empty))
            .collect()
    }
}

fn build_node(
    id: NodeId,
    slots: &mut [Option<PathNode<LeafRecord>>],
    prune_empty: bool,
) -> Option<TrieNode> {
    let node = slots[id].take()?;
    let mut children: Vec<TrieNode> = node.leaves.into_iter().map(TrieNode::Leaf).collect();
    children.extend(
        node.children
            .into_iter()
            .filter_map(|child| build_node(child, slots, prune_empty)),
    );
    if prune_empty && children.is_empty() {
        return None;
    }
    Some(TrieNode::Internal {
        key: node.key,
        value: node.value,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step<'a>(key: &'a str, value: &'a Value, canonical: &'a str) -> PathStep<'a> {
        PathStep {
            key,
            value: Some(value),
            canonical,
        }
    }

    #[test]
    fn shares_prefixes() {
        let name = Value::from("GET");
        let prod = Value::from("prod");
        let dev = Value::from("dev");

        let mut trie: PathTrie<u32> = PathTrie::new(false);
        let a = trie.insert_path(&[step("name", &name, "\"GET\""), step("attr_0", &prod, "\"prod\"")]);
        let b = trie.insert_path(&[step("name", &name, "\"GET\""), step("attr_0", &prod, "\"prod\"")]);
        let c = trie.insert_path(&[step("name", &name, "\"GET\""), step("attr_0", &dev, "\"dev\"")]);

        assert_eq!(a, b);
        assert_eq!(a[0], c[0]);
        assert_ne!(a[1], c[1]);
        assert_eq!(trie.len(), 3);
        assert_eq!(trie.roots().len(), 1);
        assert_eq!(trie.sibling_count(c[1]), 2);
        assert_eq!(trie.node(a[1]).count, 0);
    }

    #[test]
    fn counts_visits_when_tracking() {
        let name = Value::from("GET");
        let mut trie: PathTrie<()> = PathTrie::new(true);
        for _ in 0..3 {
            trie.insert_path(&[step("name", &name, "\"GET\"")]);
        }
        let root = trie.roots()[0];
        assert_eq!(trie.node(root).count, 3);
    }

    #[test]
    fn absent_and_null_are_distinct_edges() {
        let name = Value::from("op");
        let null = Value::Null;
        let mut trie: PathTrie<()> = PathTrie::new(false);

        let absent = trie.insert_path(&[
            step("name", &name, "\"op\""),
            PathStep {
                key: "attr_0",
                value: None,
                canonical: "",
            },
        ]);
        let present = trie.insert_path(&[step("name", &name, "\"op\""), step("attr_0", &null, "null")]);

        assert_ne!(absent[1], present[1]);
        assert_eq!(trie.node(absent[1]).value, EdgeValue::Absent);
    }

    #[test]
    fn into_forest_prunes_empty_branches() {
        let name = Value::from("op");
        let a = Value::from("a");
        let b = Value::from("b");
        let mut trie: PathTrie<LeafRecord> = PathTrie::new(false);

        let kept = trie.insert_path(&[step("name", &name, "\"op\""), step("attr_0", &a, "\"a\"")]);
        trie.insert_path(&[step("name", &name, "\"op\""), step("attr_0", &b, "\"b\"")]);
        trie.attach(kept[1], LeafRecord::default());

        let pruned = trie.clone().into_forest(true);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].internal_count(), 2);
        assert_eq!(pruned[0].leaf_count(), 1);

        let full = trie.into_forest(false);
        assert_eq!(full[0].internal_count(), 3);
    }
}

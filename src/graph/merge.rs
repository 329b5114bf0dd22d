use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

use super::DagNode;

/// Canonicalizes DAG nodes so that structurally equal subgraphs share one
/// node instance.
///
/// Merging is bottom-up: each node is rebuilt over the canonical versions
/// of its children, then looked up in the pool. The first node seen for a
/// structure becomes its canonical instance.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{DagNode, MergePool};
///
/// let a = DagNode::<&str, u8>::builder("root").add_edge(DagNode::singleton("leaf"), 0).build();
/// let b = DagNode::<&str, u8>::builder("root").add_edge(DagNode::singleton("leaf"), 0).build();
///
/// let mut pool = MergePool::new();
/// let first = pool.merge(&a);
/// let second = pool.merge(&b);
/// assert!(first.ptr_eq(&second));
/// assert_eq!(pool.len(), 2);
/// ```
pub struct MergePool<V, E> {
    pool: AHashSet<DagNode<V, E>>,
}

impl<V, E> MergePool<V, E>
where
    V: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self { pool: AHashSet::new() }
    }

    /// Returns the canonical node equal to `node`, adding it and any new
    /// subgraphs to the pool.
    pub fn merge(&mut self, node: &DagNode<V, E>) -> DagNode<V, E> {
        let mut merged: AHashMap<DagNode<V, E>, DagNode<V, E>> = AHashMap::new();
        for original in node.sorted_nodes() {
            if merged.contains_key(original) {
                continue;
            }
            let mut changed = false;
            let mut builder = DagNode::builder(original.label().clone());
            for (label, child) in original.edges() {
                let canonical = merged.get(child).cloned().unwrap_or_else(|| child.clone());
                changed |= !canonical.ptr_eq(child);
                builder = builder.add_edge(canonical, label.clone());
            }
            let candidate = if changed { builder.build() } else { original.clone() };
            let canonical = match self.pool.get(&candidate) {
                Some(existing) => existing.clone(),
                None => {
                    self.pool.insert(candidate.clone());
                    candidate
                }
            };
            merged.insert(original.clone(), canonical);
        }
        merged.get(node).cloned().unwrap_or_else(|| node.clone())
    }

    pub fn contains(&self, node: &DagNode<V, E>) -> bool {
        self.pool.contains(node)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl<V, E> Default for MergePool<V, E>
where
    V: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = DagNode<&'static str, u32>;

    #[test]
    fn test_shared_children_become_identical() {
        let mut pool = MergePool::new();
        let left = Node::builder("l").add_edge(Node::singleton("x"), 0).build();
        let right = Node::builder("r").add_edge(Node::singleton("x"), 0).build();
        let root = Node::builder("root").add_edge(left, 0).add_edge(right, 1).build();

        let merged = pool.merge(&root);
        let children: Vec<&Node> = merged.adjacent_nodes().collect();
        let x1 = &children[0].edges()[0].1;
        let x2 = &children[1].edges()[0].1;
        assert!(x1.ptr_eq(x2));
        assert_eq!(merged, root);
    }

    #[test]
    fn test_first_node_is_canonical() {
        let mut pool = MergePool::new();
        let first = Node::singleton("a");
        let canonical = pool.merge(&first);
        assert!(canonical.ptr_eq(&first));
        assert!(pool.merge(&Node::singleton("a")).ptr_eq(&first));
        assert!(pool.contains(&Node::singleton("a")));
    }
}

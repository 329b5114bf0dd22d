//! Immutable, structurally hashed DAG used for resolved object graphs.
//!
//! Nodes are reference counted and never mutated. Each node caches its
//! structural hash at construction, so equality checks between distinct
//! nodes are cheap to reject and [`MergePool`] can deduplicate whole
//! subgraphs by hashing.

mod merge;

pub use merge::MergePool;

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet, AHasher};
use once_cell::sync::OnceCell;
use smallvec::SmallVec;

type Edges<V, E> = SmallVec<[(E, DagNode<V, E>); 4]>;

struct NodeInner<V, E> {
    label: V,
    edges: Edges<V, E>,
    hash: u64,
    reachable: OnceCell<AHashSet<DagNode<V, E>>>,
    sorted: OnceCell<Vec<DagNode<V, E>>>,
}

/// A node of an immutable DAG: a label plus a set of labelled edges.
///
/// Two nodes are equal when their labels are equal and their outgoing
/// edge sets are equal, recursively. Edge order does not matter.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::DagNode;
///
/// let leaf = DagNode::<&str, u8>::singleton("leaf");
/// let a = DagNode::builder("root").add_edge(leaf.clone(), 1).build();
/// let b = DagNode::builder("root").add_edge(DagNode::singleton("leaf"), 1).build();
///
/// assert_eq!(a, b);
/// assert!(!a.ptr_eq(&b));
/// assert_eq!(a.reachable_nodes().len(), 2);
/// ```
pub struct DagNode<V, E>(Arc<NodeInner<V, E>>);

impl<V, E> Clone for DagNode<V, E> {
    fn clone(&self) -> Self {
        DagNode(self.0.clone())
    }
}

impl<V, E> DagNode<V, E>
where
    V: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    /// A node without edges.
    pub fn singleton(label: V) -> Self {
        Self::builder(label).build()
    }

    pub fn builder(label: V) -> DagNodeBuilder<V, E> {
        DagNodeBuilder { label, edges: SmallVec::new() }
    }

    /// A builder preloaded with this node's label and edges.
    pub fn copy_builder(&self) -> DagNodeBuilder<V, E> {
        DagNodeBuilder {
            label: self.0.label.clone(),
            edges: self.0.edges.clone(),
        }
    }

    pub fn label(&self) -> &V {
        &self.0.label
    }

    /// Outgoing edges as `(label, tail)` pairs.
    pub fn edges(&self) -> &[(E, DagNode<V, E>)] {
        &self.0.edges
    }

    pub fn outgoing_edges(&self) -> Vec<DagEdge<V, E>> {
        self.0
            .edges
            .iter()
            .map(|(label, tail)| DagEdge::new(self.clone(), tail.clone(), label.clone()))
            .collect()
    }

    /// The first outgoing edge whose label satisfies `pred`.
    pub fn outgoing_edge(&self, pred: impl Fn(&E) -> bool) -> Option<DagEdge<V, E>> {
        self.0
            .edges
            .iter()
            .find(|(label, _)| pred(label))
            .map(|(label, tail)| DagEdge::new(self.clone(), tail.clone(), label.clone()))
    }

    pub fn adjacent_nodes(&self) -> impl Iterator<Item = &DagNode<V, E>> {
        self.0.edges.iter().map(|(_, tail)| tail)
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Every node reachable from this one, including itself.
    pub fn reachable_nodes(&self) -> &AHashSet<DagNode<V, E>> {
        self.0.reachable.get_or_init(|| self.sorted_nodes().iter().cloned().collect())
    }

    /// Every reachable node in topological order, leaves first and this
    /// node last.
    pub fn sorted_nodes(&self) -> &[DagNode<V, E>] {
        self.0.sorted.get_or_init(|| {
            let mut visited = AHashSet::new();
            let mut order = Vec::new();
            // Explicit stack: (node, next edge index)
            let mut stack: Vec<(DagNode<V, E>, usize)> = vec![(self.clone(), 0)];
            visited.insert(self.clone());
            while let Some((node, index)) = stack.pop() {
                match node.0.edges.get(index).map(|(_, child)| child.clone()) {
                    Some(child) => {
                        stack.push((node, index + 1));
                        if visited.insert(child.clone()) {
                            stack.push((child, 0));
                        }
                    }
                    None => order.push(node),
                }
            }
            order
        })
    }

    /// Breadth-first search for a node satisfying `pred`.
    pub fn find_node_bfs(&self, pred: impl Fn(&DagNode<V, E>) -> bool) -> Option<DagNode<V, E>> {
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([self.clone()]);
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node.clone()) {
                continue;
            }
            if pred(&node) {
                return Some(node);
            }
            queue.extend(node.adjacent_nodes().cloned());
        }
        None
    }

    /// Breadth-first search for an edge satisfying `pred`.
    pub fn find_edge_bfs(&self, pred: impl Fn(&DagEdge<V, E>) -> bool) -> Option<DagEdge<V, E>> {
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([self.clone()]);
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node.clone()) {
                continue;
            }
            for edge in node.outgoing_edges() {
                if pred(&edge) {
                    return Some(edge);
                }
            }
            queue.extend(node.adjacent_nodes().cloned());
        }
        None
    }

    /// Replaces every occurrence of `old` below (and including) this node
    /// with `new`, rebuilding the ancestors on each path to it.
    ///
    /// `memo` maps each visited node to its replacement; callers use it to
    /// translate references into the old graph.
    pub fn replace_node(
        &self,
        old: &DagNode<V, E>,
        new: &DagNode<V, E>,
        memo: &mut AHashMap<DagNode<V, E>, DagNode<V, E>>,
    ) -> DagNode<V, E> {
        if let Some(done) = memo.get(self) {
            return done.clone();
        }
        let result = if self == old {
            new.clone()
        } else if !self.reachable_nodes().contains(old) {
            self.clone()
        } else {
            let mut builder = DagNode::builder(self.0.label.clone());
            for (label, child) in &self.0.edges {
                builder = builder.add_edge(child.replace_node(old, new, memo), label.clone());
            }
            builder.build()
        };
        memo.insert(self.clone(), result.clone());
        result
    }

    /// Rebuilds the graph, replacing each edge for which `f` returns a
    /// replacement. Replacement tails are taken as-is; other edges are
    /// transformed recursively.
    pub fn transform_edges(&self, f: &dyn Fn(&DagEdge<V, E>) -> Option<DagEdge<V, E>>) -> DagNode<V, E> {
        let mut memo = AHashMap::new();
        self.transform_edges_memo(f, &mut memo)
    }

    fn transform_edges_memo(
        &self,
        f: &dyn Fn(&DagEdge<V, E>) -> Option<DagEdge<V, E>>,
        memo: &mut AHashMap<DagNode<V, E>, DagNode<V, E>>,
    ) -> DagNode<V, E> {
        if let Some(done) = memo.get(self) {
            return done.clone();
        }
        let mut changed = false;
        let mut builder = DagNode::builder(self.0.label.clone());
        for (label, child) in &self.0.edges {
            let edge = DagEdge::new(self.clone(), child.clone(), label.clone());
            let (tail, label) = match f(&edge) {
                Some(replacement) => (replacement.tail, replacement.label),
                None => (child.transform_edges_memo(f, memo), label.clone()),
            };
            changed |= !tail.ptr_eq(child) || &label != edge.label();
            builder = builder.add_edge(tail, label);
        }
        let result = if changed { builder.build() } else { self.clone() };
        memo.insert(self.clone(), result.clone());
        result
    }

    pub(crate) fn structural_hash(&self) -> u64 {
        self.0.hash
    }
}

impl<V: PartialEq, E: PartialEq> PartialEq for DagNode<V, E> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.hash == b.hash
            && a.edges.len() == b.edges.len()
            && a.label == b.label
            && a.edges.iter().all(|edge| b.edges.iter().any(|other| edge == other))
    }
}

impl<V: Eq, E: Eq> Eq for DagNode<V, E> {}

impl<V, E> Hash for DagNode<V, E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl<V: fmt::Debug, E: fmt::Debug> fmt::Debug for DagNode<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagNode")
            .field("label", &self.0.label)
            .field("edges", &self.0.edges.iter().map(|(label, _)| label).collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`DagNode`]. Duplicate edges are ignored.
pub struct DagNodeBuilder<V, E> {
    label: V,
    edges: Edges<V, E>,
}

impl<V, E> DagNodeBuilder<V, E>
where
    V: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    pub fn set_label(mut self, label: V) -> Self {
        self.label = label;
        self
    }

    pub fn add_edge(mut self, tail: DagNode<V, E>, label: E) -> Self {
        if !self.edges.iter().any(|(l, t)| *l == label && *t == tail) {
            self.edges.push((label, tail));
        }
        self
    }

    /// Removes every edge whose label satisfies `pred`.
    pub fn remove_edges(mut self, pred: impl Fn(&E) -> bool) -> Self {
        self.edges.retain(|(label, _)| !pred(label));
        self
    }

    pub fn build(self) -> DagNode<V, E> {
        let edge_sum = self.edges.iter().fold(0u64, |acc, (label, tail)| {
            let mut hasher = AHasher::default();
            label.hash(&mut hasher);
            tail.0.hash.hash(&mut hasher);
            acc.wrapping_add(hasher.finish())
        });
        let mut hasher = AHasher::default();
        self.label.hash(&mut hasher);
        self.edges.len().hash(&mut hasher);
        edge_sum.hash(&mut hasher);
        DagNode(Arc::new(NodeInner {
            label: self.label,
            edges: self.edges,
            hash: hasher.finish(),
            reachable: OnceCell::new(),
            sorted: OnceCell::new(),
        }))
    }
}

/// A labelled edge from `head` to `tail`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DagEdge<V, E> {
    head: DagNode<V, E>,
    tail: DagNode<V, E>,
    label: E,
}

impl<V, E> DagEdge<V, E> {
    pub fn new(head: DagNode<V, E>, tail: DagNode<V, E>, label: E) -> Self {
        Self { head, tail, label }
    }

    pub fn head(&self) -> &DagNode<V, E> {
        &self.head
    }

    pub fn tail(&self) -> &DagNode<V, E> {
        &self.tail
    }

    pub fn label(&self) -> &E {
        &self.label
    }
}

impl<V: fmt::Debug, E: fmt::Debug> fmt::Debug for DagEdge<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagEdge")
            .field("head", self.head.label_ref())
            .field("tail", self.tail.label_ref())
            .field("label", &self.label)
            .finish()
    }
}

impl<V, E> DagNode<V, E> {
    fn label_ref(&self) -> &V {
        &self.0.label
    }
}

//! Export of resolved graphs for visualization and debugging.
//!
//! [`GraphExporter`] flattens a solver graph and its back-edges into a
//! [`DependencyGraph`], which renders as Graphviz DOT and, with the
//! `graph-export` feature, as JSON or YAML.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use ahash::{AHashMap, AHashSet};
#[cfg(feature = "graph-export")]
use serde::{Deserialize, Serialize};

use crate::cache_policy::CachePolicy;
use crate::solver::{BackEdgeMap, DependencySolver, Graph};

/// Export format version.
pub const EXPORT_VERSION: &str = "1.0";

/// One component of the exported graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphNode {
    /// Unique identifier within the export
    pub id: String,
    /// Type produced by the component
    pub type_name: String,
    /// Satisfaction kind (class, instance, provider...)
    pub kind: String,
    pub cache_policy: String,
    pub label: String,
    pub metadata: BTreeMap<String, String>,
}

/// One dependency between exported components.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphLink {
    /// Id of the depending component
    pub from: String,
    /// Id of the component injected
    pub to: String,
    /// Injection point the dependency satisfies
    pub injection_point: String,
    pub qualifier: Option<String>,
    pub fixed: bool,
    /// Closes a provider-mediated cycle
    pub back_edge: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphMetadata {
    pub node_count: usize,
    pub edge_count: usize,
    pub back_edge_count: usize,
    /// Number of resolved root desires
    pub root_count: usize,
    pub memoized_count: usize,
    pub exported_at: String,
    pub version: String,
}

/// A flattened, serializable view of a resolved graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphLink>,
    pub metadata: GraphMetadata,
}

impl DependencyGraph {
    /// Renders Graphviz DOT. Back-edges are dashed, memoized components
    /// filled.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph DependencyGraph {\n");
        out.push_str("  rankdir=TB;\n");
        out.push_str("  node [shape=box];\n\n");

        for node in &self.nodes {
            let shape = if node.id == "root" { "circle" } else { "box" };
            let fill = match node.cache_policy.as_str() {
                "memoize" => "lightblue",
                "new_instance" => "lightyellow",
                _ => "white",
            };
            let _ = writeln!(
                out,
                "  \"{}\" [label=\"{}\", shape={}, fillcolor={}, style=filled];",
                node.id,
                escape(&node.label),
                shape,
                fill
            );
        }
        out.push('\n');

        for edge in &self.edges {
            let style = if edge.back_edge { "dashed" } else { "solid" };
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [label=\"{}\", style={}];",
                edge.from,
                edge.to,
                escape(&edge.injection_point),
                style
            );
        }

        out.push_str("}\n");
        out
    }

    #[cfg(feature = "graph-export")]
    pub fn to_json(&self) -> crate::DiResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::DiError::InvalidGraph(format!("JSON serialization failed: {}", e)))
    }

    #[cfg(feature = "graph-export")]
    pub fn to_yaml(&self) -> crate::DiResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| crate::DiError::InvalidGraph(format!("YAML serialization failed: {}", e)))
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Nodes whose type name is `type_name`.
    pub fn nodes_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes.iter().filter(move |node| node.type_name == type_name)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Builds [`DependencyGraph`]s from resolved graphs.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{GraphExporter, InjectorBuilder, TypeCatalog, TypeKey, TypeSpec};
///
/// let mut types = TypeCatalog::builder();
/// types.add(TypeSpec::class("Clock"));
/// types.add(TypeSpec::class("Scheduler").inject("clock", "Clock"));
/// let injector = InjectorBuilder::new(types.build()).build();
/// injector.instantiator(None, &TypeKey::named("Scheduler")).unwrap();
///
/// let graph = injector.with_solver(|solver| GraphExporter::new().from_solver(solver));
/// assert_eq!(graph.metadata.root_count, 1);
/// assert!(graph.to_dot().contains("Scheduler"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphExporter {
    include_root: bool,
}

impl GraphExporter {
    pub fn new() -> Self {
        Self { include_root: true }
    }

    /// Whether the synthetic root node and its edges are exported.
    pub fn include_root(mut self, include: bool) -> Self {
        self.include_root = include;
        self
    }

    pub fn from_solver(&self, solver: &DependencySolver) -> DependencyGraph {
        self.export(solver.graph(), solver.back_edges())
    }

    /// Flattens `graph` and the `back_edges` closing its cycles.
    pub fn export(&self, graph: &Graph, back_edges: &BackEdgeMap) -> DependencyGraph {
        // Leaves first, then subgraphs only reachable through back-edges
        let mut order: Vec<Graph> = Vec::new();
        let mut seen: AHashSet<Graph> = AHashSet::new();
        let mut pending = vec![graph.clone()];
        while let Some(start) = pending.pop() {
            for node in start.sorted_nodes() {
                if seen.insert(node.clone()) {
                    order.push(node.clone());
                    if let Some(extra) = back_edges.get(node) {
                        pending.extend(extra.iter().map(|edge| edge.tail().clone()));
                    }
                }
            }
        }

        let mut ids: AHashMap<Graph, String> = AHashMap::new();
        let mut nodes = Vec::new();
        for node in &order {
            let component = node.label();
            if component.is_root() && !self.include_root {
                continue;
            }
            let id = if component.is_root() { "root".to_string() } else { format!("n{}", nodes.len()) };
            let satisfaction = component.satisfaction();
            let mut metadata = BTreeMap::new();
            metadata.insert("dependencies".to_string(), node.edges().len().to_string());
            if let Some(extra) = back_edges.get(node) {
                metadata.insert("back_edges".to_string(), extra.len().to_string());
            }
            nodes.push(GraphNode {
                id: id.clone(),
                type_name: satisfaction.erased_type().to_string(),
                kind: format!("{:?}", satisfaction.kind()),
                cache_policy: component.cache_policy().to_string(),
                label: component.to_string(),
                metadata,
            });
            ids.insert(node.clone(), id);
        }

        let mut edges = Vec::new();
        let mut back_edge_count = 0;
        for node in &order {
            let Some(from) = ids.get(node) else {
                continue;
            };
            for (dep, child) in node.edges() {
                if let Some(to) = ids.get(child) {
                    edges.push(link(from, to, dep, false));
                }
            }
            for edge in back_edges.get(node).into_iter().flatten() {
                if let Some(to) = ids.get(edge.tail()) {
                    edges.push(link(from, to, edge.label(), true));
                    back_edge_count += 1;
                }
            }
        }

        let metadata = GraphMetadata {
            node_count: nodes.len(),
            edge_count: edges.len(),
            back_edge_count,
            root_count: graph.edges().len(),
            memoized_count: nodes
                .iter()
                .filter(|node| node.cache_policy == CachePolicy::Memoize.to_string())
                .count(),
            exported_at: timestamp(),
            version: EXPORT_VERSION.to_string(),
        };
        tracing::debug!(nodes = metadata.node_count, edges = metadata.edge_count, "exported graph");

        DependencyGraph { nodes, edges, metadata }
    }
}

fn link(from: &str, to: &str, dep: &crate::component::Dependency, back_edge: bool) -> GraphLink {
    let ip = dep.initial_desire().injection_point();
    GraphLink {
        from: from.to_string(),
        to: to.to_string(),
        injection_point: ip.to_string(),
        qualifier: ip.qualifier().map(|q| q.to_string()),
        fixed: dep.is_fixed(),
        back_edge,
    }
}

#[cfg(feature = "graph-export")]
fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(not(feature = "graph-export"))]
fn timestamp() -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingFunctionBuilder;
    use crate::catalog::{TypeCatalog, TypeSpec};
    use crate::key::TypeKey;

    fn solver_for(specs: Vec<TypeSpec>, root: &str) -> DependencySolver {
        let mut types = TypeCatalog::builder();
        for spec in specs {
            types.add(spec);
        }
        let catalog = types.build();
        let rules = BindingFunctionBuilder::new(catalog.clone());
        let mut solver = DependencySolver::builder(catalog.clone()).standard_functions(&rules).build();
        solver.resolve(catalog.root_desire(&TypeKey::named(root), None)).unwrap();
        solver
    }

    #[test]
    fn test_export_counts_shared_nodes_once() {
        let solver = solver_for(
            vec![
                TypeSpec::class("Pool"),
                TypeSpec::class("A").inject("pool", "Pool"),
                TypeSpec::class("B").inject("pool", "Pool"),
                TypeSpec::class("App").inject("a", "A").inject("b", "B"),
            ],
            "App",
        );
        let graph = GraphExporter::new().from_solver(&solver);

        // root, App, A, B, Pool
        assert_eq!(graph.metadata.node_count, 5);
        assert_eq!(graph.metadata.edge_count, 5);
        assert_eq!(graph.nodes_of_type("Pool").count(), 1);
        assert!(graph.node("root").is_some());

        let without_root = GraphExporter::new().include_root(false).from_solver(&solver);
        assert_eq!(without_root.metadata.node_count, 4);
        assert_eq!(without_root.metadata.edge_count, 4);
    }

    #[test]
    fn test_back_edges_are_dashed() {
        let solver = solver_for(
            vec![
                TypeSpec::class("A").inject("b", TypeKey::provider_of(&TypeKey::named("B"))),
                TypeSpec::class("B").inject("a", "A"),
            ],
            "A",
        );
        let graph = GraphExporter::new().from_solver(&solver);
        assert_eq!(graph.metadata.back_edge_count, 1);

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph DependencyGraph {"));
        assert!(dot.contains("style=dashed"));
    }

    #[cfg(feature = "graph-export")]
    #[test]
    fn test_json_round_trip() {
        let solver = solver_for(vec![TypeSpec::class("Solo")], "Solo");
        let graph = GraphExporter::new().from_solver(&solver);
        let json = graph.to_json().unwrap();
        let back: DependencyGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
        assert!(graph.to_yaml().unwrap().contains("Solo"));
    }
}

//! The dependency solver: builds the resolved object graph.
//!
//! Every root desire is resolved by running the binding functions until a
//! satisfaction is reached, then recursing into that satisfaction's
//! dependencies with an extended context. Subgraphs are merged into a
//! shared pool so identical components share a node.
//!
//! # Deferral and back-edges
//!
//! Bindings may defer the resolution of a node's dependencies (provider
//! injection always does). Deferred nodes enter the graph without children
//! and are expanded after the root resolution completes. If expanding one
//! leads back to the node itself, the cycle is closed with a back-edge kept
//! in a side map instead of the DAG.
//!
//! # Backtracking
//!
//! When a dependency of a skippable resolution cannot be resolved, the
//! last binding is undone and the previous desire in the chain is used
//! instead, provided it is instantiable.

mod resolution;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};

use crate::binding::{
    BindingFunction, BindingFunctionBuilder, DefaultDesireBindingFunction, ProviderBindingFunction, RuleSet,
};
use crate::cache_policy::CachePolicy;
use crate::catalog::TypeCatalog;
use crate::component::{Component, Dependency};
use crate::config::ResolverConfig;
use crate::context::{ContextFrame, InjectionContext};
use crate::desire::{Desire, DesireChain};
use crate::error::{DiError, DiResult};
use crate::graph::{DagEdge, DagNode, MergePool};
use crate::observer::{Observers, ResolutionObserver};
use resolution::Resolution;

/// A node of a resolved graph.
pub type Graph = DagNode<Component, Dependency>;

/// An edge of a resolved graph.
pub type GraphEdge = DagEdge<Component, Dependency>;

/// Back-edges closing provider-mediated cycles, keyed by their head node.
pub type BackEdgeMap = AHashMap<Graph, Vec<GraphEdge>>;

/// Default cap on context depth.
pub const DEFAULT_MAX_DEPTH: usize = 100;

struct Deferral {
    node: Graph,
    context: InjectionContext,
}

/// Resolves desires into a graph of components.
///
/// A solver accumulates every root it resolves into one graph whose root
/// node is [`Component::root`]. It is not reentrant: callers that share a
/// solver between threads must hold a lock around [`resolve`](Self::resolve).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{
///     BindRule, BindingFunctionBuilder, ContextPattern, DependencySolver, TypeCatalog, TypeKey, TypeSpec,
/// };
///
/// let mut types = TypeCatalog::builder();
/// types.add(TypeSpec::interface("Greeter"));
/// types.add(TypeSpec::class("English").extends("Greeter"));
/// let catalog = types.build();
///
/// let mut rules = BindingFunctionBuilder::new(catalog.clone());
/// rules.bind(ContextPattern::any(), BindRule::bind("Greeter").to("English").build(&catalog).unwrap());
///
/// let mut solver = DependencySolver::builder(catalog.clone()).standard_functions(&rules).build();
/// solver.resolve(catalog.root_desire(&TypeKey::named("Greeter"), None)).unwrap();
///
/// let node = solver.root_node(&catalog.root_desire(&TypeKey::named("Greeter"), None)).unwrap();
/// assert_eq!(node.label().satisfaction().erased_type(), &TypeKey::named("English"));
/// ```
pub struct DependencySolver {
    catalog: Arc<TypeCatalog>,
    functions: Vec<Arc<dyn BindingFunction>>,
    triggers: Vec<Arc<dyn BindingFunction>>,
    default_policy: CachePolicy,
    max_depth: usize,
    graph: Graph,
    back_edges: Arc<BackEdgeMap>,
    merge_pool: MergePool<Component, Dependency>,
    observers: Observers,
}

impl DependencySolver {
    pub fn builder(catalog: Arc<TypeCatalog>) -> DependencySolverBuilder {
        DependencySolverBuilder::new(catalog)
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// The graph of everything resolved so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn back_edges(&self) -> &Arc<BackEdgeMap> {
        &self.back_edges
    }

    /// The back-edge target from `parent` for `desire`, if any.
    pub fn back_edge(&self, parent: &Graph, desire: &Desire) -> Option<Graph> {
        self.back_edges
            .get(parent)?
            .iter()
            .find(|edge| edge.label().initial_desire() == desire)
            .map(|edge| edge.tail().clone())
    }

    /// The node a root desire was resolved to, if it has been resolved.
    pub fn root_node(&self, desire: &Desire) -> Option<Graph> {
        self.graph
            .outgoing_edge(|dep| dep.initial_desire() == desire)
            .map(|edge| edge.tail().clone())
    }

    /// Resolves `desire` and links the result under the graph root.
    ///
    /// On failure the graph is left as it was.
    pub fn resolve(&mut self, desire: Desire) -> DiResult<()> {
        let started = Instant::now();
        self.observers.resolving(&desire);
        tracing::info!(desire = %desire, "resolving root desire");

        match self.resolve_root(desire.clone()) {
            Ok(component) => {
                let elapsed = started.elapsed();
                tracing::info!(desire = %desire, component = %component, ?elapsed, "resolved root desire");
                self.observers.resolved(&desire, &component, elapsed);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(desire = %desire, error = %err, "resolution failed");
                self.observers.failed(&desire, &err);
                Err(err)
            }
        }
    }

    fn resolve_root(&mut self, desire: Desire) -> DiResult<Component> {
        let mut queue = VecDeque::new();
        let (tree, dep) = self.resolve_fully(desire, &InjectionContext::initial(), &mut queue)?;
        let node = self.merge_pool.merge(&tree);

        let mut graph = self.graph.copy_builder().add_edge(node.clone(), dep).build();
        let mut back_edges = BackEdgeMap::clone(&self.back_edges);
        self.process_deferrals(&mut queue, &mut graph, &mut back_edges)?;

        self.graph = graph;
        self.back_edges = Arc::new(back_edges);
        Ok(node.label().clone())
    }

    /// Re-resolves the subtrees of `graph` selected by the trigger
    /// functions, returning the rewritten graph.
    ///
    /// Each non-fixed edge is offered to the triggers with its initial
    /// desire. When a trigger has an opinion, the desire is resolved again
    /// with the normal binding functions and replaces the edge's subtree;
    /// otherwise the walk continues below it. The result is merged against
    /// the original graph so unchanged subtrees stay shared.
    pub fn rewrite(&mut self, graph: &Graph) -> DiResult<Graph> {
        if !graph.label().is_root() {
            return Err(DiError::InvalidGraph(format!(
                "{} is not a solver root node",
                graph.label()
            )));
        }
        tracing::info!(triggers = self.triggers.len(), "rewriting graph");

        let mut replacements: AHashMap<GraphEdge, GraphEdge> = AHashMap::new();
        let mut back_edges = BackEdgeMap::clone(&self.back_edges);
        let mut visited = AHashSet::new();
        self.rewrite_node(&mut replacements, &mut back_edges, &mut visited, &InjectionContext::initial(), graph)?;

        let staged = graph.transform_edges(&|edge: &GraphEdge| replacements.get(edge).cloned());
        let mut pool = MergePool::new();
        pool.merge(graph);
        let rewritten = pool.merge(&staged);

        tracing::info!(replaced = replacements.len(), "graph rewritten");
        self.back_edges = Arc::new(back_edges);
        Ok(rewritten)
    }

    fn rewrite_node(
        &mut self,
        replacements: &mut AHashMap<GraphEdge, GraphEdge>,
        back_edges: &mut BackEdgeMap,
        visited: &mut AHashSet<(Graph, Vec<ContextFrame>)>,
        context: &InjectionContext,
        node: &Graph,
    ) -> DiResult<()> {
        // Shared subtrees are walked once per context.
        if !visited.insert((node.clone(), context.frames().to_vec())) {
            return Ok(());
        }
        for edge in node.outgoing_edges() {
            if replacements.contains_key(&edge) {
                continue;
            }
            let dep = edge.label();
            if !dep.is_fixed() && self.triggered(context, dep.initial_desire())? {
                tracing::debug!(desire = %dep.initial_desire(), "trigger fired, re-resolving");
                let mut queue = VecDeque::new();
                let (tree, repl_dep) = self.resolve_fully(dep.initial_desire().clone(), context, &mut queue)?;
                let mut replacement = self.merge_pool.merge(&tree);
                self.process_deferrals(&mut queue, &mut replacement, back_edges)?;
                replacements.insert(edge.clone(), DagEdge::new(node.clone(), replacement, repl_dep));
                continue;
            }
            let tail = edge.tail();
            let child_context = context.extend(
                tail.label().satisfaction().clone(),
                dep.chain().current_desire().qualifier().cloned(),
            );
            self.rewrite_node(replacements, back_edges, visited, &child_context, tail)?;
        }
        Ok(())
    }

    fn triggered(&self, context: &InjectionContext, desire: &Desire) -> DiResult<bool> {
        let chain = DesireChain::singleton(desire.clone());
        for trigger in &self.triggers {
            if trigger.bind(context, &chain)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Expands deferred nodes reachable from `root`.
    fn process_deferrals(
        &mut self,
        queue: &mut VecDeque<Deferral>,
        root: &mut Graph,
        back_edges: &mut BackEdgeMap,
    ) -> DiResult<()> {
        // Children found for each node expanded in this pass
        let mut expanded: AHashMap<Graph, Vec<(Dependency, Graph)>> = AHashMap::new();

        while let Some(Deferral { node: parent, context }) = queue.pop_front() {
            if back_edges.contains_key(&parent) || !root.reachable_nodes().contains(&parent) {
                continue;
            }
            if let Some(children) = expanded.get(&parent) {
                // Seen again below its own expansion; point it at the same children.
                let edges = children
                    .iter()
                    .map(|(dep, child)| DagEdge::new(parent.clone(), child.clone(), dep.clone()))
                    .collect();
                back_edges.insert(parent.clone(), edges);
                continue;
            }

            tracing::debug!(node = %parent.label(), "expanding deferred node");
            let mut current = parent.clone();
            let mut children = Vec::new();
            for desire in parent.label().satisfaction().dependencies(&self.catalog) {
                let (tree, dep) = self.resolve_fully(desire, &context, queue)?;
                let child = self.merge_pool.merge(&tree);
                if child.reachable_nodes().contains(&parent) {
                    tracing::debug!(from = %current.label(), to = %child.label(), "closing cycle with back-edge");
                    self.observers.back_edge(current.label(), child.label());
                    back_edges
                        .entry(current.clone())
                        .or_default()
                        .push(DagEdge::new(current.clone(), child.clone(), dep.clone()));
                } else {
                    let replacement = current.copy_builder().add_edge(child.clone(), dep.clone()).build();
                    replace_node(root, back_edges, &current, &replacement);
                    current = replacement;
                }
                children.push((dep, child));
            }
            expanded.insert(parent, children);
        }
        Ok(())
    }

    fn resolve_fully(
        &self,
        desire: Desire,
        context: &InjectionContext,
        queue: &mut VecDeque<Deferral>,
    ) -> DiResult<(Graph, Dependency)> {
        if context.depth() > self.max_depth {
            return Err(DiError::Cyclic {
                desire,
                satisfaction: context.tail().map(|frame| frame.satisfaction().clone()),
                max_depth: self.max_depth,
            });
        }

        let resolution = self.resolve_desire(desire, context)?;
        tracing::debug!(
            satisfaction = %resolution.satisfaction,
            depth = context.depth(),
            deferred = resolution.deferred,
            "resolved desire"
        );

        if resolution.deferred {
            let node = Graph::singleton(resolution.component(&self.catalog, self.default_policy));
            self.observers.deferred(node.label());
            queue.push_back(Deferral {
                node: node.clone(),
                context: context.extend(resolution.satisfaction.clone(), resolution.qualifier()),
            });
            return Ok((node, resolution.dependency()));
        }

        self.resolve_deps_and_make_node(resolution, context, queue)
    }

    fn resolve_deps_and_make_node(
        &self,
        resolution: Resolution,
        context: &InjectionContext,
        queue: &mut VecDeque<Deferral>,
    ) -> DiResult<(Graph, Dependency)> {
        let child_context = context.extend(resolution.satisfaction.clone(), resolution.qualifier());
        let mut builder = Graph::builder(resolution.component(&self.catalog, self.default_policy));

        for desire in resolution.satisfaction.dependencies(&self.catalog) {
            match self.resolve_fully(desire.clone(), &child_context, queue) {
                Ok((child, dep)) => builder = builder.add_edge(child, dep),
                Err(err) => {
                    if is_unresolvable(&err, &desire) {
                        if let Some(previous) = resolution.backtrack() {
                            tracing::debug!(
                                abandoned = %resolution.chain.current_desire(),
                                restored = %previous.chain.current_desire(),
                                "backtracking"
                            );
                            self.observers.backtracked(&resolution.chain, &previous.chain);
                            return self.resolve_deps_and_make_node(previous, context, queue);
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok((builder.build(), resolution.dependency()))
    }

    /// Runs binding rounds on `desire` until a terminal, instantiable
    /// desire is reached or no function has an opinion.
    fn resolve_desire(&self, desire: Desire, context: &InjectionContext) -> DiResult<Resolution> {
        let mut chain = DesireChain::singleton(desire);
        let mut policy = CachePolicy::NoPreference;
        let mut fixed = false;
        let mut deferred = false;
        let mut skippable = false;
        let mut terminal = false;

        loop {
            if terminal && chain.current_desire().is_instantiable() {
                break;
            }
            let mut offered = None;
            for function in &self.functions {
                if let Some(result) = function.bind(context, &chain)? {
                    // A desire seen earlier in the chain would rebind forever.
                    if !chain.previous_desires().contains(result.desire()) {
                        offered = Some(result);
                        break;
                    }
                }
            }
            let Some(result) = offered else {
                break;
            };

            chain = chain.extend(result.desire().clone());
            policy = policy.max(result.cache_policy());
            fixed |= result.is_fixed();
            deferred |= result.is_deferred();
            skippable = result.is_skippable();
            terminal = result.is_terminal();
            self.observers.binding_applied(&chain, context);
        }

        match chain.current_desire().satisfaction().cloned() {
            Some(satisfaction) => Ok(Resolution { satisfaction, policy, chain, fixed, deferred, skippable }),
            None => Err(DiError::Unresolvable { chain, context: context.clone() }),
        }
    }
}

fn is_unresolvable(err: &DiError, desire: &Desire) -> bool {
    matches!(err, DiError::Unresolvable { chain, .. } if chain.initial_desire() == desire)
}

/// Replaces `old` with `new` in `root` and re-keys back-edges whose nodes
/// were rebuilt.
fn replace_node(root: &mut Graph, back_edges: &mut BackEdgeMap, old: &Graph, new: &Graph) {
    let mut memo = AHashMap::new();
    *root = root.replace_node(old, new, &mut memo);
    if back_edges.is_empty() {
        return;
    }
    let translate = |node: &Graph| memo.get(node).cloned().unwrap_or_else(|| node.clone());
    let previous = std::mem::take(back_edges);
    for (head, edges) in previous {
        let head = translate(&head);
        let entry = back_edges.entry(head.clone()).or_default();
        for edge in edges {
            entry.push(DagEdge::new(head.clone(), translate(edge.tail()), edge.label().clone()));
        }
    }
}

impl fmt::Debug for DependencySolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencySolver")
            .field("functions", &self.functions)
            .field("triggers", &self.triggers)
            .field("default_policy", &self.default_policy)
            .field("max_depth", &self.max_depth)
            .field("roots", &self.graph.edges().len())
            .field("back_edges", &self.back_edges.len())
            .finish()
    }
}

/// Builder for [`DependencySolver`].
pub struct DependencySolverBuilder {
    catalog: Arc<TypeCatalog>,
    functions: Vec<Arc<dyn BindingFunction>>,
    triggers: Vec<Arc<dyn BindingFunction>>,
    default_policy: CachePolicy,
    max_depth: usize,
    observers: Observers,
}

impl DependencySolverBuilder {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            functions: Vec::new(),
            triggers: Vec::new(),
            default_policy: CachePolicy::NoPreference,
            max_depth: DEFAULT_MAX_DEPTH,
            observers: Observers::new(),
        }
    }

    /// Appends a binding function; earlier functions take priority.
    pub fn add_binding_function(mut self, function: impl BindingFunction + 'static) -> Self {
        self.functions.push(Arc::new(function));
        self
    }

    /// Appends a trigger function consulted by [`DependencySolver::rewrite`].
    pub fn add_trigger_function(mut self, function: impl BindingFunction + 'static) -> Self {
        self.triggers.push(Arc::new(function));
        self
    }

    /// Adds the standard chain: explicit rules, generated intermediate-type
    /// and super-type rules, provider injection and catalog defaults.
    pub fn standard_functions(self, rules: &BindingFunctionBuilder) -> Self {
        let catalog = self.catalog.clone();
        self.add_binding_function(rules.build(RuleSet::Explicit))
            .add_binding_function(rules.build(RuleSet::IntermediateTypes))
            .add_binding_function(rules.build(RuleSet::SuperTypes))
            .add_binding_function(ProviderBindingFunction::new(catalog.clone()))
            .add_binding_function(DefaultDesireBindingFunction::new(catalog))
    }

    pub fn default_policy(mut self, policy: CachePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Applies the solver settings of `config`.
    pub fn config(self, config: &ResolverConfig) -> Self {
        self.max_depth(config.max_depth).default_policy(config.default_policy)
    }

    pub fn observer(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> DependencySolver {
        DependencySolver {
            catalog: self.catalog,
            functions: self.functions,
            triggers: self.triggers,
            default_policy: self.default_policy,
            max_depth: self.max_depth,
            graph: Graph::singleton(Component::root()),
            back_edges: Arc::new(BackEdgeMap::new()),
            merge_pool: MergePool::new(),
            observers: self.observers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeSpec;
    use crate::key::TypeKey;

    fn solver(catalog: &Arc<TypeCatalog>) -> DependencySolver {
        let rules = BindingFunctionBuilder::new(catalog.clone());
        DependencySolver::builder(catalog.clone()).standard_functions(&rules).build()
    }

    #[test]
    fn test_shared_dependencies_are_merged() {
        let mut types = TypeCatalog::builder();
        types
            .add(TypeSpec::class("Pool"))
            .add(TypeSpec::class("Users").inject("pool", "Pool"))
            .add(TypeSpec::class("Orders").inject("pool", "Pool"))
            .add(TypeSpec::class("App").inject("users", "Users").inject("orders", "Orders"));
        let catalog = types.build();
        let mut solver = solver(&catalog);

        solver.resolve(catalog.root_desire(&TypeKey::named("App"), None)).unwrap();
        let app = solver.root_node(&catalog.root_desire(&TypeKey::named("App"), None)).unwrap();
        let pools: Vec<Graph> = app
            .adjacent_nodes()
            .map(|child| child.edges()[0].1.clone())
            .collect();
        assert_eq!(pools.len(), 2);
        assert!(pools[0].ptr_eq(&pools[1]));
    }

    #[test]
    fn test_failure_leaves_graph_untouched() {
        let mut types = TypeCatalog::builder();
        types
            .add(TypeSpec::interface("Missing"))
            .add(TypeSpec::class("Broken").inject("missing", "Missing"))
            .add(TypeSpec::class("Fine"));
        let catalog = types.build();
        let mut solver = solver(&catalog);

        solver.resolve(catalog.root_desire(&TypeKey::named("Fine"), None)).unwrap();
        let before = solver.graph().clone();
        let err = solver
            .resolve(catalog.root_desire(&TypeKey::named("Broken"), None))
            .unwrap_err();

        assert!(matches!(err, DiError::Unresolvable { .. }));
        assert!(solver.graph().ptr_eq(&before));
    }

    #[test]
    fn test_rewrite_rejects_non_root() {
        let catalog = TypeCatalog::builder().build();
        let mut solver = solver(&catalog);
        let stray = Graph::singleton(Component::new(
            crate::satisfaction::Satisfaction::Class(TypeKey::named("X")),
            CachePolicy::NoPreference,
        ));
        assert!(matches!(solver.rewrite(&stray), Err(DiError::InvalidGraph(_))));
    }
}

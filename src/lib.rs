//! # ferrous-resolver
//!
//! Context-sensitive dependency graph resolution for Rust.
//!
//! ## Features
//!
//! - **Context-sensitive bindings**: bind rules scoped by patterns over the
//!   chain of components being built
//! - **Prioritized rule selection**: closest context, then most specific
//!   match, then nearest type and most specific qualifier
//! - **Provider-safe cycles**: `Provider<T>` dependencies are resolved
//!   after the rest of the graph, closing cycles with back-edges
//! - **Hash-consed graphs**: structurally identical subgraphs share one node
//!   and, when memoized, one instance
//! - **Graph rewriting**: re-resolve only the parts of a graph affected by
//!   new bindings
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolver::{
//!     AnyArc, BindRule, ContextPattern, ElementMatcher, InjectorBuilder, TypeCatalog, TypeKey,
//!     TypeSpec,
//! };
//! use std::sync::Arc;
//!
//! trait Store: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//! struct MemoryStore;
//! impl Store for MemoryStore {
//!     fn name(&self) -> &'static str { "memory" }
//! }
//! struct DiskStore;
//! impl Store for DiskStore {
//!     fn name(&self) -> &'static str { "disk" }
//! }
//! struct Reports {
//!     store: Arc<Box<dyn Store>>,
//! }
//!
//! let mut types = TypeCatalog::builder();
//! types
//!     .add(TypeSpec::interface("Store"))
//!     .add(TypeSpec::class("MemoryStore").extends("Store").constructor(|_| {
//!         Ok(Arc::new(Box::new(MemoryStore) as Box<dyn Store>) as AnyArc)
//!     }))
//!     .add(TypeSpec::class("DiskStore").extends("Store").constructor(|_| {
//!         Ok(Arc::new(Box::new(DiskStore) as Box<dyn Store>) as AnyArc)
//!     }))
//!     .add(TypeSpec::class("Reports").inject("store", "Store").constructor(|deps| {
//!         Ok(Arc::new(Reports { store: deps.require::<Box<dyn Store>>("store")? }) as AnyArc)
//!     }));
//! let catalog = types.build();
//!
//! let injector = InjectorBuilder::new(catalog.clone())
//!     .bind(ContextPattern::any(), BindRule::bind("Store").to("MemoryStore").build(&catalog).unwrap())
//!     .bind(
//!         ContextPattern::any().within(ElementMatcher::of_type("Reports")),
//!         BindRule::bind("Store").to("DiskStore").build(&catalog).unwrap(),
//!     )
//!     .build();
//!
//! let plain = injector.instance::<Box<dyn Store>>(&TypeKey::named("Store")).unwrap();
//! assert_eq!(plain.name(), "memory");
//!
//! let reports = injector.instance::<Reports>(&TypeKey::named("Reports")).unwrap();
//! assert_eq!(reports.store.name(), "disk");
//! ```
//!
//! ## Cache Policies
//!
//! - **Memoize**: one instance per container
//! - **NewInstance**: a fresh instance for every use
//! - **NoPreference**: the type's own policy, then the configured defaults
//!
//! ## Layers
//!
//! [`TypeCatalog`] describes the types, [`BindRule`]s and
//! [`BindingFunction`]s decide what satisfies each [`Desire`], the
//! [`DependencySolver`] builds the [`Graph`], and the
//! [`InjectionContainer`] turns graph nodes into [`Instantiator`]s.
//! [`Injector`] wires them together.

pub mod binding;
pub mod cache_policy;
pub mod catalog;
pub mod component;
pub mod config;
pub mod container;
pub mod context;
pub mod desire;
pub mod error;
pub mod graph;
pub mod graph_export;
pub mod injector;
pub mod key;
pub mod lifecycle;
pub mod observer;
pub mod qualifier;
pub mod rules;
pub mod satisfaction;
pub mod solver;

pub use binding::{
    BindingFunction, BindingFunctionBuilder, BindingResult, DefaultDesireBindingFunction, ProviderBindingFunction,
    RuleBasedBindingFunction, RuleSet,
};
pub use cache_policy::CachePolicy;
pub use catalog::{Constructor, Defaults, ProviderConstructor, QualifierSpec, TypeCatalog, TypeCatalogBuilder, TypeInfo, TypeSpec};
pub use component::{Component, Dependency};
pub use config::{ConfigSource, EnvironmentConfigSource, ResolverConfig};
pub use container::{Dependencies, InjectionContainer, Instantiator};
pub use context::{
    ContextFrame, ContextKey, ContextMatch, ContextPattern, ElementMatcher, InjectionContext, Multiplicity,
    QualifierMatcher,
};
pub use desire::{ChainKey, Desire, DesireChain, InjectionPoint};
pub use error::{DiError, DiResult};
pub use graph::{DagEdge, DagNode, DagNodeBuilder, MergePool};
pub use graph_export::{DependencyGraph, GraphExporter, GraphLink, GraphMetadata, GraphNode};
pub use injector::{Injector, InjectorBuilder};
pub use key::{key_of_type, TypeKey};
pub use lifecycle::{Dispose, LifecycleManager};
pub use observer::{LoggingObserver, MetricsObserver, ResolutionObserver};
pub use qualifier::Qualifier;
pub use rules::{BindFlags, BindRule, BindRuleBuilder, BindTarget};
pub use satisfaction::{AnyArc, Provider, Satisfaction, SatisfactionKind};
pub use solver::{BackEdgeMap, DependencySolver, DependencySolverBuilder, Graph, GraphEdge};

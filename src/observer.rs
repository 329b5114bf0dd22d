//! Diagnostic observers for resolution events.
//!
//! Observers receive synchronous callbacks while the solver works, which is
//! useful for tracing why a particular binding was chosen or where a
//! resolution failed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::component::Component;
use crate::context::InjectionContext;
use crate::desire::{Desire, DesireChain};
use crate::error::DiError;

/// Observer trait for resolution events.
///
/// Every hook except [`resolving`](ResolutionObserver::resolving) has an
/// empty default implementation, so observers only override what they
/// care about.
///
/// # Performance
///
/// Hooks run synchronously while the solver holds its lock. Keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Desire, ResolutionObserver};
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct Recorder {
///     roots: Mutex<Vec<String>>,
/// }
///
/// impl ResolutionObserver for Recorder {
///     fn resolving(&self, desire: &Desire) {
///         self.roots.lock().unwrap().push(desire.desired_type().to_string());
///     }
/// }
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// A root desire is about to be resolved.
    fn resolving(&self, desire: &Desire);

    /// A root desire was resolved and linked into the graph.
    fn resolved(&self, _desire: &Desire, _node: &Component, _duration: Duration) {}

    /// A root resolution failed.
    fn failed(&self, _desire: &Desire, _error: &DiError) {}

    /// A binding function rewrote the chain to `chain.current_desire()`.
    fn binding_applied(&self, _chain: &DesireChain, _context: &InjectionContext) {}

    /// Dependency resolution of a node was postponed.
    fn deferred(&self, _node: &Component) {}

    /// A skippable binding was undone.
    fn backtracked(&self, _abandoned: &DesireChain, _restored: &DesireChain) {}

    /// A cycle was closed with a back-edge from `from` to `to`.
    fn back_edge(&self, _from: &Component, _to: &Component) {}
}

/// Container for registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, desire: &Desire) {
        for observer in &self.observers {
            observer.resolving(desire);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, desire: &Desire, node: &Component, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(desire, node, duration);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, desire: &Desire, error: &DiError) {
        for observer in &self.observers {
            observer.failed(desire, error);
        }
    }

    #[inline]
    pub(crate) fn binding_applied(&self, chain: &DesireChain, context: &InjectionContext) {
        for observer in &self.observers {
            observer.binding_applied(chain, context);
        }
    }

    #[inline]
    pub(crate) fn deferred(&self, node: &Component) {
        for observer in &self.observers {
            observer.deferred(node);
        }
    }

    #[inline]
    pub(crate) fn backtracked(&self, abandoned: &DesireChain, restored: &DesireChain) {
        for observer in &self.observers {
            observer.backtracked(abandoned, restored);
        }
    }

    #[inline]
    pub(crate) fn back_edge(&self, from: &Component, to: &Component) {
        for observer in &self.observers {
            observer.back_edge(from, to);
        }
    }
}

/// Built-in observer that emits `tracing` events.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{InjectorBuilder, LoggingObserver, TypeCatalog};
/// use std::sync::Arc;
///
/// let catalog = TypeCatalog::builder().build();
/// let injector = InjectorBuilder::new(catalog)
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self { prefix: "ferrous-resolver".to_string() }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionObserver for LoggingObserver {
    fn resolving(&self, desire: &Desire) {
        tracing::info!(prefix = %self.prefix, desire = %desire, "resolving");
    }

    fn resolved(&self, desire: &Desire, node: &Component, duration: Duration) {
        tracing::info!(prefix = %self.prefix, desire = %desire, node = %node, ?duration, "resolved");
    }

    fn failed(&self, desire: &Desire, error: &DiError) {
        tracing::warn!(prefix = %self.prefix, desire = %desire, error = %error, "resolution failed");
    }

    fn binding_applied(&self, chain: &DesireChain, context: &InjectionContext) {
        tracing::debug!(
            prefix = %self.prefix,
            desire = %chain.current_desire(),
            context = %context,
            "binding applied"
        );
    }

    fn deferred(&self, node: &Component) {
        tracing::debug!(prefix = %self.prefix, node = %node, "dependencies deferred");
    }

    fn backtracked(&self, abandoned: &DesireChain, restored: &DesireChain) {
        tracing::debug!(
            prefix = %self.prefix,
            abandoned = %abandoned.current_desire(),
            restored = %restored.current_desire(),
            "backtracked"
        );
    }

    fn back_edge(&self, from: &Component, to: &Component) {
        tracing::debug!(prefix = %self.prefix, from = %from, to = %to, "back edge");
    }
}

/// Observer that counts resolution events.
pub struct MetricsObserver {
    pub resolution_count: AtomicU64,
    pub failure_count: AtomicU64,
    pub total_resolution_time: AtomicU64,
    pub binding_count: AtomicU64,
    pub backtrack_count: AtomicU64,
    pub back_edge_count: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self {
            resolution_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_resolution_time: AtomicU64::new(0),
            binding_count: AtomicU64::new(0),
            backtrack_count: AtomicU64::new(0),
            back_edge_count: AtomicU64::new(0),
        }
    }

    pub fn resolution_count(&self) -> u64 {
        self.resolution_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn binding_count(&self) -> u64 {
        self.binding_count.load(Ordering::Relaxed)
    }

    pub fn backtrack_count(&self) -> u64 {
        self.backtrack_count.load(Ordering::Relaxed)
    }

    pub fn back_edge_count(&self) -> u64 {
        self.back_edge_count.load(Ordering::Relaxed)
    }

    /// Average time per successful root resolution.
    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        let total_ns = self.total_resolution_time.load(Ordering::Relaxed);
        Some(Duration::from_nanos(total_ns / count))
    }

    pub fn reset(&self) {
        for counter in [
            &self.resolution_count,
            &self.failure_count,
            &self.total_resolution_time,
            &self.binding_count,
            &self.backtrack_count,
            &self.back_edge_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionObserver for MetricsObserver {
    fn resolving(&self, _desire: &Desire) {}

    fn resolved(&self, _desire: &Desire, _node: &Component, duration: Duration) {
        self.resolution_count.fetch_add(1, Ordering::Relaxed);
        self.total_resolution_time
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn failed(&self, _desire: &Desire, _error: &DiError) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn binding_applied(&self, _chain: &DesireChain, _context: &InjectionContext) {
        self.binding_count.fetch_add(1, Ordering::Relaxed);
    }

    fn backtracked(&self, _abandoned: &DesireChain, _restored: &DesireChain) {
        self.backtrack_count.fetch_add(1, Ordering::Relaxed);
    }

    fn back_edge(&self, _from: &Component, _to: &Component) {
        self.back_edge_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Skippable bindings fall back when their target cannot be built

use ferrous_resolver::*;
use std::sync::Arc;

fn logging_catalog() -> Arc<TypeCatalog> {
    let mut types = TypeCatalog::builder();
    types
        .add(TypeSpec::interface("Path"))
        .add(TypeSpec::class("Logger"))
        .add(TypeSpec::class("FileLogger").extends("Logger").inject("path", "Path"))
        .add(TypeSpec::class("Service").inject("logger", "Logger"));
    types.build()
}

fn solver_with(catalog: &Arc<TypeCatalog>, rule: BindRule, metrics: Arc<MetricsObserver>) -> DependencySolver {
    let mut rules = BindingFunctionBuilder::new(catalog.clone());
    rules.bind(ContextPattern::any(), rule);
    DependencySolver::builder(catalog.clone())
        .standard_functions(&rules)
        .observer(metrics)
        .build()
}

#[test]
fn test_skippable_binding_falls_back() {
    let catalog = logging_catalog();
    let metrics = Arc::new(MetricsObserver::new());
    let rule = BindRule::bind("Logger").to("FileLogger").skippable().build(&catalog).unwrap();
    let mut solver = solver_with(&catalog, rule, metrics.clone());

    let root = catalog.root_desire(&TypeKey::named("Service"), None);
    solver.resolve(root.clone()).unwrap();

    let service = solver.root_node(&root).unwrap();
    let (dep, logger) = &service.edges()[0];
    assert_eq!(logger.label().satisfaction(), &Satisfaction::Class(TypeKey::named("Logger")));
    assert!(logger.edges().is_empty());
    // The recorded chain stops at the restored desire
    assert_eq!(dep.chain().len(), 1);
    assert_eq!(metrics.backtrack_count(), 1);
}

#[test]
fn test_non_skippable_binding_fails() {
    let catalog = logging_catalog();
    let metrics = Arc::new(MetricsObserver::new());
    let rule = BindRule::bind("Logger").to("FileLogger").build(&catalog).unwrap();
    let mut solver = solver_with(&catalog, rule, metrics.clone());

    let err = solver
        .resolve(catalog.root_desire(&TypeKey::named("Service"), None))
        .unwrap_err();
    match &err {
        DiError::Unresolvable { chain, .. } => {
            assert_eq!(chain.initial_desire().desired_type(), &TypeKey::named("Path"));
        }
        other => panic!("expected unresolvable, got {other}"),
    }
    assert_eq!(metrics.backtrack_count(), 0);
    assert_eq!(metrics.failure_count(), 1);
}

#[test]
fn test_backtracking_needs_instantiable_source() {
    let mut types = TypeCatalog::builder();
    types
        .add(TypeSpec::interface("Path"))
        .add(TypeSpec::interface("Sink"))
        .add(TypeSpec::class("FileSink").extends("Sink").inject("path", "Path"));
    let catalog = types.build();
    let rule = BindRule::bind("Sink").to("FileSink").skippable().build(&catalog).unwrap();
    let mut solver = solver_with(&catalog, rule, Arc::new(MetricsObserver::new()));

    // Sink itself is an interface, so there is nothing to fall back to
    let err = solver.resolve(catalog.root_desire(&TypeKey::named("Sink"), None)).unwrap_err();
    assert!(err.is_resolution_error());
}

#[test]
fn test_skippable_binding_kept_when_resolvable() {
    let mut types = TypeCatalog::builder();
    types
        .add(TypeSpec::class("Path"))
        .add(TypeSpec::class("Logger"))
        .add(TypeSpec::class("FileLogger").extends("Logger").inject("path", "Path"));
    let catalog = types.build();
    let metrics = Arc::new(MetricsObserver::new());
    let rule = BindRule::bind("Logger").to("FileLogger").skippable().build(&catalog).unwrap();
    let mut solver = solver_with(&catalog, rule, metrics.clone());

    let root = catalog.root_desire(&TypeKey::named("Logger"), None);
    solver.resolve(root.clone()).unwrap();
    let logger = solver.root_node(&root).unwrap();
    assert_eq!(logger.label().satisfaction().erased_type(), &TypeKey::named("FileLogger"));
    assert_eq!(metrics.backtrack_count(), 0);
}

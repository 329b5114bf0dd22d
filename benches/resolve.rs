use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ferrous_resolver::*;
use std::sync::Arc;

struct Leaf;

/// A layered graph: each level depends on every type of the level below.
fn layered_catalog(levels: usize, width: usize) -> Arc<TypeCatalog> {
    let mut types = TypeCatalog::builder();
    for level in 0..levels {
        for i in 0..width {
            let mut spec = TypeSpec::class(TypeKey::named(format!("L{level}_{i}")))
                .constructor(|_| Ok(Arc::new(Leaf) as AnyArc));
            if level + 1 < levels {
                for j in 0..width {
                    spec = spec.inject(&format!("d{j}"), TypeKey::named(format!("L{}_{j}", level + 1)));
                }
            }
            types.add(spec);
        }
    }
    let mut root = TypeSpec::class("Root").constructor(|_| Ok(Arc::new(Leaf) as AnyArc));
    for j in 0..width {
        root = root.inject(&format!("d{j}"), TypeKey::named(format!("L0_{j}")));
    }
    types.add(root);
    types.build()
}

fn solver(catalog: &Arc<TypeCatalog>) -> DependencySolver {
    let rules = BindingFunctionBuilder::new(catalog.clone());
    DependencySolver::builder(catalog.clone()).standard_functions(&rules).build()
}

// ===== Resolution =====

fn bench_resolve_layered(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_layered");
    for levels in [2usize, 4, 8] {
        let catalog = layered_catalog(levels, 3);
        let root = catalog.root_desire(&TypeKey::named("Root"), None);
        group.bench_with_input(BenchmarkId::new("levels", levels), &levels, |b, _| {
            b.iter_batched(
                || solver(&catalog),
                |mut solver| {
                    solver.resolve(root.clone()).unwrap();
                    black_box(solver.graph().sorted_nodes().len());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_context_rules(c: &mut Criterion) {
    let mut types = TypeCatalog::builder();
    types
        .add(TypeSpec::interface("Store"))
        .add(TypeSpec::class("MemoryStore").extends("Store"))
        .add(TypeSpec::class("DiskStore").extends("Store"))
        .add(TypeSpec::class("Reports").inject("store", "Store"))
        .add(TypeSpec::class("App").inject("reports", "Reports").inject("store", "Store"));
    let catalog = types.build();
    let mut rules = BindingFunctionBuilder::new(catalog.clone());
    rules
        .bind(ContextPattern::any(), BindRule::bind("Store").to("MemoryStore").build(&catalog).unwrap())
        .bind(
            ContextPattern::any().within(ElementMatcher::of_type("Reports")),
            BindRule::bind("Store").to("DiskStore").build(&catalog).unwrap(),
        );
    let root = catalog.root_desire(&TypeKey::named("App"), None);

    c.bench_function("resolve_context_rules", |b| {
        b.iter_batched(
            || DependencySolver::builder(catalog.clone()).standard_functions(&rules).build(),
            |mut solver| {
                solver.resolve(root.clone()).unwrap();
                black_box(solver.graph().edges().len());
            },
            BatchSize::SmallInput,
        )
    });
}

// ===== Instantiation =====

fn bench_instantiate(c: &mut Criterion) {
    let mut group = c.benchmark_group("instantiate");
    for policy in [CachePolicy::NewInstance, CachePolicy::Memoize] {
        let catalog = layered_catalog(4, 3);
        let injector = InjectorBuilder::new(catalog)
            .config(ResolverConfig::default().with_container_policy(policy))
            .build();
        // Resolve once up front
        injector.instance::<Leaf>(&TypeKey::named("Root")).unwrap();

        group.bench_function(policy.to_string(), |b| {
            b.iter(|| black_box(injector.instance::<Leaf>(&TypeKey::named("Root")).unwrap()))
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let catalog = layered_catalog(6, 4);
    let mut solver = solver(&catalog);
    solver.resolve(catalog.root_desire(&TypeKey::named("Root"), None)).unwrap();
    let graph = solver.graph().clone();

    c.bench_function("merge_resolved_graph", |b| {
        b.iter(|| {
            let mut pool = MergePool::new();
            black_box(pool.merge(&graph));
        })
    });
}

criterion_group!(
    benches,
    bench_resolve_layered,
    bench_context_rules,
    bench_instantiate,
    bench_merge
);
criterion_main!(benches);

/// Concurrent access integration tests
///
/// Verify that one injector can be shared across threads: roots resolve
/// once, memoized components are built once, and shutdown hooks run once.

use crossbeam_utils::thread;
use ferrous_resolver::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier, Mutex};

// ===== Test Services =====

pub struct SharedPool {
    id: u32,
}

pub struct Worker {
    pool: Arc<SharedPool>,
}

fn pool_catalog(built: Arc<AtomicU32>) -> Arc<TypeCatalog> {
    let mut types = TypeCatalog::builder();
    types
        .add(TypeSpec::class("SharedPool").cache_policy(CachePolicy::Memoize).constructor(move |_| {
            Ok(Arc::new(SharedPool { id: built.fetch_add(1, Ordering::SeqCst) }) as AnyArc)
        }))
        .add(TypeSpec::class("Worker").inject("pool", "SharedPool").constructor(|deps| {
            Ok(Arc::new(Worker { pool: deps.require::<SharedPool>("pool")? }) as AnyArc)
        }));
    types.build()
}

#[test]
fn test_memoized_component_shared_across_threads() {
    const THREADS: usize = 8;
    let built = Arc::new(AtomicU32::new(0));
    let metrics = Arc::new(MetricsObserver::new());
    let injector = InjectorBuilder::new(pool_catalog(built.clone()))
        .observer(metrics.clone())
        .build();
    let barrier = Barrier::new(THREADS);
    let pools = Mutex::new(Vec::new());

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                let worker = injector.instance::<Worker>(&TypeKey::named("Worker")).unwrap();
                pools.lock().unwrap().push(worker.pool.clone());
            });
        }
    })
    .unwrap();

    let pools = pools.into_inner().unwrap();
    assert_eq!(pools.len(), THREADS);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
    assert_eq!(pools[0].id, 0);
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.resolution_count(), 1);
}

#[test]
fn test_distinct_roots_resolved_concurrently() {
    let built = Arc::new(AtomicU32::new(0));
    let injector = InjectorBuilder::new(pool_catalog(built.clone())).build();

    thread::scope(|s| {
        s.spawn(|_| injector.instance::<Worker>(&TypeKey::named("Worker")).unwrap());
        s.spawn(|_| injector.instance::<SharedPool>(&TypeKey::named("SharedPool")).unwrap());
    })
    .unwrap();

    assert_eq!(injector.with_solver(|solver| solver.graph().edges().len()), 2);
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

// ===== Lifecycle =====

struct Tracked {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Dispose for Tracked {
    fn dispose(&self) {
        self.log.lock().unwrap().push(self.name);
    }
}

fn tracked(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> TypeSpec {
    TypeSpec::class(name).cache_policy(CachePolicy::Memoize).constructor(move |deps| {
        let component = Arc::new(Tracked { name, log: log.clone() });
        deps.lifecycle().register_disposer(component.clone());
        Ok(component as AnyArc)
    })
}

#[test]
fn test_close_runs_hooks_in_reverse_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut types = TypeCatalog::builder();
    types
        .add(tracked("Database", log.clone()))
        .add(tracked("Cache", log.clone()).inject("db", "Database"));
    let injector = InjectorBuilder::new(types.build()).build();

    // Cache's constructor never touches db, so Database is built second
    injector.instance::<Tracked>(&TypeKey::named("Cache")).unwrap();
    injector.instance::<Tracked>(&TypeKey::named("Database")).unwrap();
    assert_eq!(injector.container().lifecycle().len(), 2);

    injector.close();
    injector.close();
    assert_eq!(*log.lock().unwrap(), vec!["Database", "Cache"]);
    assert_eq!(injector.container().cached(), 0);
}

#[test]
fn test_dependencies_built_before_dependents_dispose_last() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let db_log = log.clone();
    let mut types = TypeCatalog::builder();
    types
        .add(tracked("Database", log.clone()))
        .add(
            TypeSpec::class("Cache")
                .inject("db", "Database")
                .cache_policy(CachePolicy::Memoize)
                .constructor(move |deps| {
                    deps.require::<Tracked>("db")?;
                    let component = Arc::new(Tracked { name: "Cache", log: db_log.clone() });
                    deps.lifecycle().register_disposer(component.clone());
                    Ok(component as AnyArc)
                }),
        );
    let injector = InjectorBuilder::new(types.build()).build();

    injector.instance::<Tracked>(&TypeKey::named("Cache")).unwrap();
    injector.close();
    assert_eq!(*log.lock().unwrap(), vec!["Cache", "Database"]);
}

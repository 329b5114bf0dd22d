/// Environment-driven configuration
///
/// These tests mutate process environment variables, so they run serially.

use ferrous_resolver::*;
use serial_test::serial;
use std::env;
use std::sync::Arc;

const KEYS: [&str; 3] = [
    "FERROUS_RESOLVER_MAX_DEPTH",
    "FERROUS_RESOLVER_DEFAULT_POLICY",
    "FERROUS_RESOLVER_CONTAINER_POLICY",
];

fn clear_env() {
    for key in KEYS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = ResolverConfig::from_env().unwrap();
    assert_eq!(config, ResolverConfig::default());
}

#[test]
#[serial]
fn test_from_env_reads_prefixed_keys() {
    clear_env();
    env::set_var("FERROUS_RESOLVER_MAX_DEPTH", "12");
    env::set_var("FERROUS_RESOLVER_DEFAULT_POLICY", "new-instance");
    env::set_var("FERROUS_RESOLVER_CONTAINER_POLICY", "Memoize");

    let config = ResolverConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.max_depth, 12);
    assert_eq!(config.default_policy, CachePolicy::NewInstance);
    assert_eq!(config.container_policy, CachePolicy::Memoize);
}

#[test]
#[serial]
fn test_from_env_rejects_bad_values() {
    clear_env();
    env::set_var("FERROUS_RESOLVER_MAX_DEPTH", "deep");
    let depth = ResolverConfig::from_env();
    clear_env();
    assert!(matches!(depth, Err(DiError::Config(_))));

    env::set_var("FERROUS_RESOLVER_CONTAINER_POLICY", "sometimes");
    let policy = ResolverConfig::from_env();
    clear_env();
    match policy {
        Err(DiError::Config(message)) => assert!(message.contains("sometimes")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_custom_prefix_source() {
    env::set_var("MYAPP_MAX_DEPTH", "7");
    let config = ResolverConfig::load(&EnvironmentConfigSource::with_prefix("myapp")).unwrap();
    env::remove_var("MYAPP_MAX_DEPTH");
    assert_eq!(config.max_depth, 7);
}

#[test]
#[serial]
fn test_env_config_drives_injector() {
    clear_env();
    env::set_var("FERROUS_RESOLVER_CONTAINER_POLICY", "memoize");
    let config = ResolverConfig::from_env().unwrap();
    clear_env();

    struct Clock;
    let mut types = TypeCatalog::builder();
    types.add(TypeSpec::class("Clock").constructor(|_| Ok(Arc::new(Clock) as AnyArc)));
    let injector = InjectorBuilder::new(types.build()).config(config).build();

    let a = injector.instance::<Clock>(&TypeKey::named("Clock")).unwrap();
    let b = injector.instance::<Clock>(&TypeKey::named("Clock")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

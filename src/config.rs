//! Resolver configuration.
//!
//! Settings come from a [`ConfigSource`], by default the process
//! environment with the `FERROUS_RESOLVER` prefix, and can be
//! (de)serialized with the `config` feature.

use std::env;
use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::cache_policy::CachePolicy;
use crate::error::{DiError, DiResult};
use crate::solver::DEFAULT_MAX_DEPTH;

/// Prefix of the environment variables read by [`ResolverConfig::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_RESOLVER";

/// A source of raw configuration values.
pub trait ConfigSource {
    /// The value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads keys from environment variables, upper-cased and optionally
/// prefixed: key `max_depth` with prefix `APP` reads `APP_MAX_DEPTH`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.env_key(key)).ok()
    }
}

struct LookupSource<F>(F);

impl<F> ConfigSource for LookupSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }
}

/// Settings for the solver and container built by an
/// [`InjectorBuilder`](crate::InjectorBuilder).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{CachePolicy, ResolverConfig};
///
/// let config = ResolverConfig::from_lookup(|key: &str| match key {
///     "max_depth" => Some("20".to_string()),
///     "container_policy" => Some("memoize".to_string()),
///     _ => None,
/// })
/// .unwrap();
///
/// assert_eq!(config.max_depth, 20);
/// assert_eq!(config.default_policy, CachePolicy::NoPreference);
/// assert_eq!(config.container_policy, CachePolicy::Memoize);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ResolverConfig {
    /// Deepest context allowed before a resolution is treated as cyclic
    pub max_depth: usize,
    /// Policy given by the solver to components without one
    pub default_policy: CachePolicy,
    /// Policy the container applies to components still without one
    pub container_policy: CachePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_policy: CachePolicy::NoPreference,
            container_policy: CachePolicy::NoPreference,
        }
    }
}

impl ResolverConfig {
    /// Loads settings from `source`, keeping defaults for missing keys.
    ///
    /// Keys: `max_depth`, `default_policy`, `container_policy`.
    pub fn load(source: &dyn ConfigSource) -> DiResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = source.get("max_depth") {
            config.max_depth = raw
                .trim()
                .parse()
                .map_err(|_| DiError::Config(format!("max_depth must be a positive integer, got '{}'", raw)))?;
            if config.max_depth == 0 {
                return Err(DiError::Config("max_depth must be at least 1".to_string()));
            }
        }
        if let Some(raw) = source.get("default_policy") {
            config.default_policy = raw.parse()?;
        }
        if let Some(raw) = source.get("container_policy") {
            config.container_policy = raw.parse()?;
        }
        tracing::debug!(config = %config, "loaded resolver configuration");
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(&LookupSource(lookup))
    }

    /// Loads from `FERROUS_RESOLVER_MAX_DEPTH`,
    /// `FERROUS_RESOLVER_DEFAULT_POLICY` and
    /// `FERROUS_RESOLVER_CONTAINER_POLICY`.
    pub fn from_env() -> DiResult<Self> {
        Self::load(&EnvironmentConfigSource::with_prefix(ENV_PREFIX))
    }

    /// Parses a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Config(e.to_string()))
    }

    #[cfg(feature = "config")]
    pub fn to_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiError::Config(e.to_string()))
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_default_policy(mut self, policy: CachePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_container_policy(mut self, policy: CachePolicy) -> Self {
        self.container_policy = policy;
        self
    }
}

impl fmt::Display for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_depth={} default_policy={} container_policy={}",
            self.max_depth, self.default_policy, self.container_policy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = ResolverConfig::from_lookup(source(&[])).unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.max_depth, 100);
    }

    #[test]
    fn test_policies_parse() {
        let config = ResolverConfig::from_lookup(source(&[
            ("default_policy", "new_instance"),
            ("container_policy", "Memoize"),
        ]))
        .unwrap();
        assert_eq!(config.default_policy, CachePolicy::NewInstance);
        assert_eq!(config.container_policy, CachePolicy::Memoize);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            ResolverConfig::from_lookup(source(&[("max_depth", "deep")])),
            Err(DiError::Config(_))
        ));
        assert!(matches!(
            ResolverConfig::from_lookup(source(&[("max_depth", "0")])),
            Err(DiError::Config(_))
        ));
        assert!(matches!(
            ResolverConfig::from_lookup(source(&[("default_policy", "sometimes")])),
            Err(DiError::Config(_))
        ));
    }

    #[test]
    fn test_env_key_prefixing() {
        let plain = EnvironmentConfigSource::new();
        let prefixed = EnvironmentConfigSource::with_prefix("app");
        assert_eq!(plain.env_key("max_depth"), "MAX_DEPTH");
        assert_eq!(prefixed.env_key("max_depth"), "APP_MAX_DEPTH");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_json_partial_document() {
        let config = ResolverConfig::from_json(r#"{ "default_policy": "memoize" }"#).unwrap();
        assert_eq!(config.default_policy, CachePolicy::Memoize);
        assert_eq!(config.max_depth, 100);

        let back = ResolverConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}

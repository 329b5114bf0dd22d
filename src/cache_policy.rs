//! Cache policies controlling whether resolved components are shared.

use std::fmt;
use std::str::FromStr;

use crate::error::DiError;

/// Cache policy of a resolved component.
///
/// Policies are ordered by strength: when several bindings contribute a
/// policy to one resolution, the strongest one wins
/// (`NoPreference < Memoize < NewInstance`).
///
/// - **NoPreference**: defer to the satisfaction's own default, then to the
///   solver and container defaults
/// - **Memoize**: one instance per injection container (singleton-like)
/// - **NewInstance**: a fresh instance every time the dependency is needed
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::CachePolicy;
///
/// assert!(CachePolicy::NewInstance > CachePolicy::Memoize);
/// assert_eq!("memoize".parse::<CachePolicy>().unwrap(), CachePolicy::Memoize);
/// assert_eq!(CachePolicy::default(), CachePolicy::NoPreference);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum CachePolicy {
    /// No opinion; resolved against defaults later
    #[default]
    NoPreference,
    /// Share a single instance per container
    Memoize,
    /// Create a new instance for every use
    NewInstance,
}

impl CachePolicy {
    /// Returns `self` unless it is `NoPreference`, in which case `fallback`.
    pub fn or(self, fallback: CachePolicy) -> CachePolicy {
        match self {
            CachePolicy::NoPreference => fallback,
            other => other,
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CachePolicy::NoPreference => "no_preference",
            CachePolicy::Memoize => "memoize",
            CachePolicy::NewInstance => "new_instance",
        };
        f.write_str(name)
    }
}

impl FromStr for CachePolicy {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "no_preference" | "none" => Ok(CachePolicy::NoPreference),
            "memoize" | "singleton" => Ok(CachePolicy::Memoize),
            "new_instance" | "transient" => Ok(CachePolicy::NewInstance),
            other => Err(DiError::Config(format!("unknown cache policy '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_falls_back_only_without_preference() {
        assert_eq!(CachePolicy::NoPreference.or(CachePolicy::Memoize), CachePolicy::Memoize);
        assert_eq!(CachePolicy::NewInstance.or(CachePolicy::Memoize), CachePolicy::NewInstance);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for policy in [CachePolicy::NoPreference, CachePolicy::Memoize, CachePolicy::NewInstance] {
            assert_eq!(policy.to_string().parse::<CachePolicy>().unwrap(), policy);
        }
        assert!("sometimes".parse::<CachePolicy>().is_err());
        assert_eq!("New-Instance".parse::<CachePolicy>().unwrap(), CachePolicy::NewInstance);
    }
}

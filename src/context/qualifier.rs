//! Qualifier matchers used by bind rules and context patterns.

use std::fmt;
use std::sync::Arc;

use crate::qualifier::Qualifier;

/// A predicate over an optional qualifier, with a fixed priority.
///
/// Lower priorities are more specific and win ranking ties between
/// otherwise equivalent rules.
///
/// | Matcher    | Matches                                          | Priority |
/// |------------|--------------------------------------------------|----------|
/// | `Instance` | exactly that qualifier value                     | 0        |
/// | `Null`     | only the absence of a qualifier                  | 0        |
/// | `Kind`     | any qualifier of that kind                       | 1        |
/// | `Any`      | anything, including no qualifier                 | 2        |
/// | `Default`  | no qualifier, or one that allows default binding | 3        |
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{Qualifier, QualifierMatcher};
///
/// let fast = Qualifier::new("Fast").allowing_default();
/// assert!(QualifierMatcher::Default.matches(Some(&fast)));
/// assert!(QualifierMatcher::Default.matches(None));
/// assert!(!QualifierMatcher::Default.matches(Some(&Qualifier::named("x"))));
/// assert!(QualifierMatcher::kind("Named").matches(Some(&Qualifier::named("x"))));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum QualifierMatcher {
    Instance(Qualifier),
    Kind(Arc<str>),
    Any,
    Default,
    Null,
}

impl QualifierMatcher {
    pub fn kind(kind: impl AsRef<str>) -> Self {
        QualifierMatcher::Kind(Arc::from(kind.as_ref()))
    }

    pub fn matches(&self, qualifier: Option<&Qualifier>) -> bool {
        match self {
            QualifierMatcher::Instance(expected) => qualifier == Some(expected),
            QualifierMatcher::Kind(kind) => qualifier.map_or(false, |q| q.kind() == &**kind),
            QualifierMatcher::Any => true,
            QualifierMatcher::Default => qualifier.map_or(true, Qualifier::allows_default),
            QualifierMatcher::Null => qualifier.is_none(),
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            QualifierMatcher::Instance(_) | QualifierMatcher::Null => 0,
            QualifierMatcher::Kind(_) => 1,
            QualifierMatcher::Any => 2,
            QualifierMatcher::Default => 3,
        }
    }
}

impl From<Qualifier> for QualifierMatcher {
    fn from(qualifier: Qualifier) -> Self {
        QualifierMatcher::Instance(qualifier)
    }
}

impl fmt::Display for QualifierMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualifierMatcher::Instance(q) => write!(f, "{}", q),
            QualifierMatcher::Kind(kind) => write!(f, "@{}(*)", kind),
            QualifierMatcher::Any => f.write_str("<any>"),
            QualifierMatcher::Default => f.write_str("<default>"),
            QualifierMatcher::Null => f.write_str("<none>"),
        }
    }
}

impl fmt::Debug for QualifierMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_only_matches_absence() {
        assert!(QualifierMatcher::Null.matches(None));
        assert!(!QualifierMatcher::Null.matches(Some(&Qualifier::new("A").allowing_default())));
    }

    #[test]
    fn test_instance_is_exact() {
        let m = QualifierMatcher::from(Qualifier::named("a"));
        assert!(m.matches(Some(&Qualifier::named("a"))));
        assert!(!m.matches(Some(&Qualifier::named("b"))));
        assert!(!m.matches(None));
    }

    #[test]
    fn test_priorities() {
        let ordered = [
            QualifierMatcher::from(Qualifier::named("a")),
            QualifierMatcher::kind("Named"),
            QualifierMatcher::Any,
            QualifierMatcher::Default,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
        assert_eq!(QualifierMatcher::Null.priority(), 0);
    }
}

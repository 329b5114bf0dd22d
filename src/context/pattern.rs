use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use super::{ContextFrame, QualifierMatcher};
use crate::catalog::TypeCatalog;
use crate::key::TypeKey;
use crate::qualifier::Qualifier;

/// Matches a single context frame by type and qualifier.
///
/// A frame matches when its type is assignable to the matcher's type (any
/// type if none is given) and its qualifier is accepted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ElementMatcher {
    ty: Option<TypeKey>,
    qualifier: QualifierMatcher,
}

impl ElementMatcher {
    /// Matches frames of `ty` (or a subtype) with a default-compatible
    /// qualifier.
    pub fn of_type(ty: impl Into<TypeKey>) -> Self {
        Self { ty: Some(ty.into()), qualifier: QualifierMatcher::Default }
    }

    /// Matches frames of `ty` requested with exactly `qualifier`.
    pub fn qualified(ty: impl Into<TypeKey>, qualifier: Qualifier) -> Self {
        Self { ty: Some(ty.into()), qualifier: QualifierMatcher::Instance(qualifier) }
    }

    /// Matches every frame.
    pub fn any() -> Self {
        Self { ty: None, qualifier: QualifierMatcher::Any }
    }

    pub fn with_qualifier(mut self, qualifier: QualifierMatcher) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn ty(&self) -> Option<&TypeKey> {
        self.ty.as_ref()
    }

    pub fn qualifier(&self) -> &QualifierMatcher {
        &self.qualifier
    }

    fn is_universal(&self) -> bool {
        self.ty.is_none() && self.qualifier == QualifierMatcher::Any
    }

    /// The type distance of a matching frame, or `None`.
    fn match_frame(&self, catalog: &TypeCatalog, frame: &ContextFrame) -> Option<usize> {
        if !self.qualifier.matches(frame.qualifier()) {
            return None;
        }
        match &self.ty {
            Some(ty) => catalog.type_distance(frame.ty(), ty),
            None => Some(0),
        }
    }
}

impl fmt::Display for ElementMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_universal() {
            return f.write_str("*");
        }
        if self.qualifier != QualifierMatcher::Default {
            write!(f, "{} ", self.qualifier)?;
        }
        match &self.ty {
            Some(ty) => write!(f, "{}", ty),
            None => f.write_str("_"),
        }
    }
}

impl fmt::Debug for ElementMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    /// Exactly one frame
    One,
    /// Any number of consecutive frames
    ZeroOrMore,
}

/// A regular-expression-like pattern over context frames.
///
/// Every pattern has an implicit leading wildcard, so it may start matching
/// anywhere below the root. Unless it is anchored, it may also leave
/// trailing (innermost) frames unmatched.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{ContextPattern, ElementMatcher};
///
/// // Somewhere inside a Service, and somewhere below that inside a Handler.
/// let nested = ContextPattern::any()
///     .within(ElementMatcher::of_type("Service"))
///     .within(ElementMatcher::of_type("Handler"));
/// assert_eq!(nested.to_string(), "[Service, *, Handler]");
///
/// // Directly inside a Handler.
/// let direct = ContextPattern::any().at(ElementMatcher::of_type("Handler"));
/// assert_eq!(direct.to_string(), "[Handler]$");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ContextPattern {
    elements: Vec<(ElementMatcher, Multiplicity)>,
    anchored: bool,
}

impl ContextPattern {
    /// Matches every context.
    pub fn any() -> Self {
        Self::default()
    }

    /// Appends `matcher`, allowing any frames between it and the previous
    /// element. The pattern becomes unanchored.
    pub fn within(mut self, matcher: ElementMatcher) -> Self {
        if !self.elements.is_empty() {
            self.elements.push((ElementMatcher::any(), Multiplicity::ZeroOrMore));
        }
        self.elements.push((matcher, Multiplicity::One));
        self.anchored = false;
        self
    }

    /// Appends `matcher` directly after the previous element and anchors it
    /// to the innermost frame.
    pub fn at(mut self, matcher: ElementMatcher) -> Self {
        self.elements.push((matcher, Multiplicity::One));
        self.anchored = true;
        self
    }

    /// Appends an arbitrary element.
    pub fn push(mut self, matcher: ElementMatcher, multiplicity: Multiplicity) -> Self {
        self.elements.push((matcher, multiplicity));
        self
    }

    pub fn anchored(mut self, anchored: bool) -> Self {
        self.anchored = anchored;
        self
    }

    pub fn elements(&self) -> &[(ElementMatcher, Multiplicity)] {
        &self.elements
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Matches the pattern against `frames` (root first), returning the
    /// best alignment when several exist.
    pub fn matches(&self, catalog: &TypeCatalog, frames: &[ContextFrame]) -> Option<ContextMatch> {
        let mut best = None;
        let mut matched = SmallVec::new();
        let ends = if self.anchored { frames.len()..=frames.len() } else { 0..=frames.len() };
        for end in ends {
            self.walk(catalog, frames, self.elements.len(), end, &mut matched, &mut best);
        }
        best
    }

    // Matches elements[..ei] against frames[..fi], innermost first. Every
    // complete alignment is compared against `best`; `out` is restored on return.
    fn walk(
        &self,
        catalog: &TypeCatalog,
        frames: &[ContextFrame],
        ei: usize,
        fi: usize,
        out: &mut SmallVec<[MatchedFrame; 4]>,
        best: &mut Option<ContextMatch>,
    ) {
        if ei == 0 {
            let candidate = ContextMatch { frames: out.clone(), context_len: frames.len() };
            if best.as_ref().map_or(true, |current| candidate < *current) {
                *best = Some(candidate);
            }
            return;
        }
        let (matcher, multiplicity) = &self.elements[ei - 1];
        let record = !matcher.is_universal();
        let mark = out.len();
        match multiplicity {
            Multiplicity::One => {
                if fi == 0 {
                    return;
                }
                let Some(distance) = matcher.match_frame(catalog, &frames[fi - 1]) else {
                    return;
                };
                if record {
                    out.push(MatchedFrame { index: fi - 1, type_distance: distance, qualifier_priority: matcher.qualifier.priority() });
                }
                self.walk(catalog, frames, ei - 1, fi - 1, out, best);
            }
            Multiplicity::ZeroOrMore => {
                // Run of matching frames ending at fi, innermost first.
                let mut run: SmallVec<[MatchedFrame; 4]> = SmallVec::new();
                while run.len() < fi {
                    let index = fi - 1 - run.len();
                    match matcher.match_frame(catalog, &frames[index]) {
                        Some(distance) => run.push(MatchedFrame {
                            index,
                            type_distance: distance,
                            qualifier_priority: matcher.qualifier.priority(),
                        }),
                        None => break,
                    }
                }
                for take in 0..=run.len() {
                    out.truncate(mark);
                    if record {
                        out.extend_from_slice(&run[..take]);
                    }
                    self.walk(catalog, frames, ei - 1, fi - take, out, best);
                }
            }
        }
        out.truncate(mark);
    }
}

impl fmt::Display for ContextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (matcher, multiplicity)) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", matcher)?;
            if *multiplicity == Multiplicity::ZeroOrMore && !matcher.is_universal() {
                f.write_str("*")?;
            }
        }
        f.write_str("]")?;
        if self.anchored {
            f.write_str("$")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatchedFrame {
    index: usize,
    type_distance: usize,
    qualifier_priority: u8,
}

/// How well a pattern matched a context; ordered best first.
///
/// Matches are compared by, in order: closeness of the matched frames to
/// the innermost frame, number of matched frames, type distance of each
/// matched frame, and qualifier matcher priority. Only matches against the
/// same context are comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMatch {
    frames: SmallVec<[MatchedFrame; 4]>,
    context_len: usize,
}

impl ContextMatch {
    /// Number of frames matched by non-wildcard elements.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn distance_to_end(&self, frame: &MatchedFrame) -> usize {
        self.context_len - 1 - frame.index
    }
}

impl Ord for ContextMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        let pairs = || self.frames.iter().zip(other.frames.iter());

        for (a, b) in pairs() {
            let ord = self.distance_to_end(a).cmp(&other.distance_to_end(b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        let ord = other.frames.len().cmp(&self.frames.len());
        if ord != Ordering::Equal {
            return ord;
        }
        for (a, b) in pairs() {
            let ord = a.type_distance.cmp(&b.type_distance);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        for (a, b) in pairs() {
            let ord = a.qualifier_priority.cmp(&b.qualifier_priority);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for ContextMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

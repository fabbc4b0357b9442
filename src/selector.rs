//! Control selectors
//!
//! A selector is compiled from an attribute value such as
//! `hiddencontrols="codes !codes:generate"` and answers whether a given
//! control path is selected.
//!
//! ## Syntax
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `codes` | `codes` (and its descendants unless matching exactly) |
//! | `codes:form:foo` | one nested control; `.` works as a separator too |
//! | `codes:*` | any direct child of `codes` |
//! | `codes:**` | `codes` and everything below it, even in exact mode |
//! | `!codes:generate` | excludes `codes:generate` and its descendants |
//!
//! Any matching positive token selects a path; any matching negated token
//! overrides them.
//!
//! ```rust
//! use nucleon::ControlSelector;
//!
//! let hidden = ControlSelector::compile("codes !codes:generate").unwrap();
//! assert!(hidden.matches("codes:other", false));
//! assert!(!hidden.matches("codes:generate:form:x", false));
//! ```

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{NucleonError, Result};

static SEGMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("segment pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Name(String),
    /// `*`: exactly one segment
    Any,
    /// `**`: zero or more trailing segments
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    negated: bool,
    segments: Vec<Segment>,
}

impl Token {
    fn parse(raw: &str) -> Result<Self> {
        let (negated, body) = match raw.strip_prefix('!') {
            Some(body) => (true, body),
            None => (false, raw),
        };
        if body.is_empty() {
            return Err(invalid(raw, "negation needs a path"));
        }

        let parts: Vec<&str> = split_path(body).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (idx, part) in parts.iter().enumerate() {
            let segment = match *part {
                "" => return Err(invalid(raw, "empty path segment")),
                "*" => Segment::Any,
                "**" if idx + 1 == parts.len() => Segment::Rest,
                "**" => return Err(invalid(raw, "'**' must be the last segment")),
                name if SEGMENT_PATTERN.is_match(name) => Segment::Name(name.to_string()),
                name => {
                    let reason = format!("segment '{}' has characters outside [A-Za-z0-9_-]", name);
                    return Err(invalid(raw, &reason));
                }
            };
            segments.push(segment);
        }

        Ok(Self { negated, segments })
    }

    fn covers(&self, path: &[&str], exact: bool) -> bool {
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => return true,
                Segment::Any if idx < path.len() => {}
                Segment::Name(name) if path.get(idx) == Some(&name.as_str()) => {}
                _ => return false,
            }
        }
        !exact || path.len() == self.segments.len()
    }

    /// Strip one leading segment, or drop the token if it cannot apply below `name`
    fn zoom(&self, name: &str) -> Option<Self> {
        let rest = match self.segments.first()? {
            Segment::Rest => return Some(self.clone()),
            Segment::Any => &self.segments[1..],
            Segment::Name(n) if n == name => &self.segments[1..],
            Segment::Name(_) => return None,
        };
        let segments = if rest.is_empty() {
            vec![Segment::Rest]
        } else {
            rest.to_vec()
        };
        Some(Self {
            negated: self.negated,
            segments,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str(":")?;
            }
            match segment {
                Segment::Name(name) => f.write_str(name)?,
                Segment::Any => f.write_str("*")?,
                Segment::Rest => f.write_str("**")?,
            }
        }
        Ok(())
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(|c| c == ':' || c == '.')
}

fn invalid(token: &str, reason: &str) -> NucleonError {
    NucleonError::InvalidSelector {
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

/// Compiled selector over control paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlSelector {
    tokens: Vec<Token>,
}

impl ControlSelector {
    /// Compile a space-separated token list. Blank input matches nothing.
    pub fn compile(raw: &str) -> Result<Self> {
        let tokens = raw
            .split_whitespace()
            .map(Token::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tokens })
    }

    /// Selector that matches nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Selector that matches every control
    pub fn all() -> Self {
        Self {
            tokens: vec![Token {
                negated: false,
                segments: vec![Segment::Rest],
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether `path` is selected.
    ///
    /// With `exact = false` a token also selects every descendant of the
    /// path it names; with `exact = true` it selects only that path.
    /// Negated tokens always apply to descendants.
    pub fn matches(&self, path: &str, exact: bool) -> bool {
        if path.is_empty() {
            return false;
        }
        let segments: Vec<&str> = split_path(path).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return false;
        }

        let excluded = self
            .tokens
            .iter()
            .filter(|t| t.negated)
            .any(|t| t.covers(&segments, false));
        if excluded {
            return false;
        }

        self.tokens
            .iter()
            .filter(|t| !t.negated)
            .any(|t| t.covers(&segments, exact))
    }

    /// Re-root the selector below `path`, keeping only the tokens that
    /// can apply to its descendants (with `path` stripped from them).
    pub fn zoom(&self, path: &str) -> Self {
        let mut tokens = self.tokens.clone();
        for name in split_path(path).filter(|s| !s.is_empty()) {
            tokens = tokens.iter().filter_map(|t| t.zoom(name)).collect();
        }
        Self { tokens }
    }

    /// Merge two selectors (union of their tokens)
    pub fn union(&self, other: &ControlSelector) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.extend(other.tokens.iter().cloned());
        Self { tokens }
    }
}

impl FromStr for ControlSelector {
    type Err = NucleonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}

impl fmt::Display for ControlSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, token) in self.tokens.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(raw: &str) -> ControlSelector {
        ControlSelector::compile(raw).unwrap()
    }

    #[test]
    fn test_exactness() {
        let s = sel("codes");
        assert!(s.matches("codes", true));
        assert!(s.matches("codes", false));
        assert!(s.matches("codes:form:foo", false));
        assert!(!s.matches("codes:form:foo", true));
    }

    #[test]
    fn test_descendant_token_does_not_match_ancestor() {
        let s = sel("codes:form:foo");
        assert!(!s.matches("codes", false));
        assert!(!s.matches("codes:form", false));
        assert!(s.matches("codes:form:foo", true));
    }

    #[test]
    fn test_negation_precedence() {
        let s = sel("codes !codes:generate");
        assert!(!s.matches("codes:generate:form:x", false));
        assert!(!s.matches("codes:generate", true));
        assert!(s.matches("codes:other", false));
        assert!(s.matches("codes", true));
    }

    #[test]
    fn test_negation_alone_matches_nothing() {
        let s = sel("!codes");
        assert!(!s.matches("codes", false));
        assert!(!s.matches("other", false));
    }

    #[test]
    fn test_single_segment_wildcard() {
        let s = sel("codes:*");
        assert!(s.matches("codes:form", true));
        assert!(s.matches("codes:generate", true));
        assert!(!s.matches("codes", false));
        assert!(!s.matches("codes:form:foo", true));
        assert!(s.matches("codes:form:foo", false));
    }

    #[test]
    fn test_rest_wildcard_matches_self_and_below_in_exact_mode() {
        let s = sel("codes:**");
        assert!(s.matches("codes", true));
        assert!(s.matches("codes:form:foo", true));
        assert!(!s.matches("other", false));
    }

    #[test]
    fn test_dot_and_colon_are_interchangeable() {
        let s = sel("codes.form");
        assert!(s.matches("codes:form", true));
        assert!(s.matches("codes.form.foo", false));
    }

    #[test]
    fn test_or_semantics_for_overlapping_positives() {
        let s = sel("codes codes:form");
        assert!(s.matches("codes:form:foo", false));
        assert!(s.matches("codes:form", true));
    }

    #[test]
    fn test_empty_selector_matches_nothing() {
        let s = sel("   ");
        assert!(s.is_empty());
        assert!(!s.matches("codes", false));
        assert!(!ControlSelector::none().matches("anything", false));
    }

    #[test]
    fn test_all_matches_everything() {
        let s = ControlSelector::all();
        assert!(s.matches("codes", true));
        assert!(s.matches("codes:form:foo", true));
        assert_eq!(s.to_string(), "**");
    }

    #[test]
    fn test_empty_path_never_matches() {
        let s = ControlSelector::all();
        assert!(!s.matches("", false));
        assert!(!s.matches("codes::foo", false));
    }

    #[test]
    fn test_invalid_tokens_are_rejected() {
        for raw in ["!", "codes::foo", "codes:**:foo", "codes:f@o", ":codes"] {
            let err = ControlSelector::compile(raw).unwrap_err();
            assert!(
                matches!(err, NucleonError::InvalidSelector { .. }),
                "expected selector error for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_zoom_strips_prefix() {
        let s = sel("codes:form:foo other !codes:generate");
        let zoomed = s.zoom("codes");
        assert_eq!(zoomed.to_string(), "form:foo !generate");
        assert!(zoomed.matches("form:foo", true));
        assert!(!zoomed.matches("generate:form", false));
    }

    #[test]
    fn test_zoom_on_named_control_selects_whole_subtree() {
        let zoomed = sel("codes").zoom("codes");
        assert_eq!(zoomed.to_string(), "**");
        assert!(zoomed.matches("form", true));
        assert!(zoomed.matches("form:foo", true));
    }

    #[test]
    fn test_zoom_through_wildcard_and_nested_prefix() {
        let s = sel("*:form:foo codes:generate:**");
        let zoomed = s.zoom("codes:generate");
        assert_eq!(zoomed.to_string(), "**");

        let zoomed = s.zoom("items:form");
        assert_eq!(zoomed.to_string(), "foo");
    }

    #[test]
    fn test_display_round_trips_canonical_form() {
        let s = sel("codes.form  !codes:generate\t*:x");
        assert_eq!(s.to_string(), "codes:form !codes:generate *:x");
        assert_eq!(sel(&s.to_string()), s);
    }

    #[test]
    fn test_union() {
        let s = sel("codes").union(&sel("!codes:form"));
        assert!(s.matches("codes:other", false));
        assert!(!s.matches("codes:form", false));
    }
}

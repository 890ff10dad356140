//! XSD constraining facets
//!
//! A [`FacetSet`] holds every facet that applies to a simple type after its
//! restriction chain has been merged: the most derived value wins for
//! enumeration and white space, length and digit bounds only tighten, and
//! pattern facets of successive derivation steps are all kept (each must
//! match).
//!
//! Reference: https://www.w3.org/TR/xmlschema11-2/#rf-facets

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// White space normalization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from the XSD attribute value
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(Error::Value(format!(
                "Invalid whiteSpace value: '{}'. Must be 'preserve', 'replace', or 'collapse'",
                s
            ))),
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s
                .split([' ', '\t', '\n', '\r'])
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Check that a value is already in normal form for this mode
    pub fn is_normalized(&self, value: &str) -> bool {
        match self {
            WhiteSpace::Preserve => true,
            WhiteSpace::Replace => !value.contains(['\t', '\n', '\r']),
            WhiteSpace::Collapse => self.normalize(value) == value,
        }
    }

    /// The stricter of two modes
    fn tighter(self, other: WhiteSpace) -> WhiteSpace {
        fn rank(ws: WhiteSpace) -> u8 {
            match ws {
                WhiteSpace::Preserve => 0,
                WhiteSpace::Replace => 1,
                WhiteSpace::Collapse => 2,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

/// Facets of a simple type
///
/// Value bounds are kept in lexical form; they are interpreted by the
/// built-in type at the root of the derivation chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetSet {
    /// Exact length (characters, octets or list items)
    pub length: Option<usize>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Inclusive lower bound
    pub min_inclusive: Option<String>,
    /// Inclusive upper bound
    pub max_inclusive: Option<String>,
    /// Exclusive lower bound
    pub min_exclusive: Option<String>,
    /// Exclusive upper bound
    pub max_exclusive: Option<String>,
    /// Maximum number of significant digits
    pub total_digits: Option<u32>,
    /// Maximum number of fraction digits
    pub fraction_digits: Option<u32>,
    /// Allowed values; `Some(vec![])` is a schema defect
    pub enumeration: Option<Vec<String>>,
    /// Patterns in XSD regex syntax, all of which must match
    pub patterns: Vec<String>,
    /// White space handling
    pub white_space: Option<WhiteSpace>,
}

impl FacetSet {
    /// Empty facet set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the exact length
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the minimum length
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Set the maximum length
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Set the inclusive lower bound
    pub fn min_inclusive(mut self, value: impl Into<String>) -> Self {
        self.min_inclusive = Some(value.into());
        self
    }

    /// Set the inclusive upper bound
    pub fn max_inclusive(mut self, value: impl Into<String>) -> Self {
        self.max_inclusive = Some(value.into());
        self
    }

    /// Set the exclusive lower bound
    pub fn min_exclusive(mut self, value: impl Into<String>) -> Self {
        self.min_exclusive = Some(value.into());
        self
    }

    /// Set the exclusive upper bound
    pub fn max_exclusive(mut self, value: impl Into<String>) -> Self {
        self.max_exclusive = Some(value.into());
        self
    }

    /// Set totalDigits
    pub fn total_digits(mut self, digits: u32) -> Self {
        self.total_digits = Some(digits);
        self
    }

    /// Set fractionDigits
    pub fn fraction_digits(mut self, digits: u32) -> Self {
        self.fraction_digits = Some(digits);
        self
    }

    /// Set the enumeration
    pub fn enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Add a pattern
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Set the white space mode
    pub fn white_space(mut self, ws: WhiteSpace) -> Self {
        self.white_space = Some(ws);
        self
    }

    /// Whether any value bound is present
    pub fn has_bounds(&self) -> bool {
        self.min_inclusive.is_some()
            || self.max_inclusive.is_some()
            || self.min_exclusive.is_some()
            || self.max_exclusive.is_some()
    }

    /// Effective length window `[min, max]`
    pub fn length_window(&self) -> (usize, Option<usize>) {
        match self.length {
            Some(len) => (len, Some(len)),
            None => (self.min_length.unwrap_or(0), self.max_length),
        }
    }

    /// Merge a derived restriction on top of these (base) facets
    pub fn restrict(&self, derived: &FacetSet) -> FacetSet {
        FacetSet {
            length: derived.length.or(self.length),
            min_length: max_opt(self.min_length, derived.min_length),
            max_length: min_opt(self.max_length, derived.max_length),
            min_inclusive: derived.min_inclusive.clone().or_else(|| self.min_inclusive.clone()),
            max_inclusive: derived.max_inclusive.clone().or_else(|| self.max_inclusive.clone()),
            min_exclusive: derived.min_exclusive.clone().or_else(|| self.min_exclusive.clone()),
            max_exclusive: derived.max_exclusive.clone().or_else(|| self.max_exclusive.clone()),
            total_digits: min_opt(self.total_digits, derived.total_digits),
            fraction_digits: min_opt(self.fraction_digits, derived.fraction_digits),
            enumeration: derived.enumeration.clone().or_else(|| self.enumeration.clone()),
            patterns: self
                .patterns
                .iter()
                .chain(derived.patterns.iter())
                .cloned()
                .collect(),
            white_space: match (self.white_space, derived.white_space) {
                (Some(base), Some(d)) => Some(base.tighter(d)),
                (base, d) => d.or(base),
            },
        }
    }

    /// Check a length (in the type's length unit) against the length facets
    pub fn check_length(&self, len: usize) -> std::result::Result<(), String> {
        if let Some(expected) = self.length {
            if len != expected {
                return Err(format!("length {} differs from required length {}", len, expected));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(format!("length {} is less than minLength {}", len, min));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(format!("length {} exceeds maxLength {}", len, max));
            }
        }
        Ok(())
    }

    /// Check that the length facets admit at least one length
    pub fn check_length_consistency(&self, type_name: &str) -> Result<()> {
        let (min, max) = self.length_window();
        let lower = max_opt(Some(min), self.min_length).unwrap_or(min);
        let upper = min_opt(max, self.max_length);
        match upper {
            Some(upper) if lower > upper => Err(Error::ConflictingFacets {
                type_name: type_name.to_string(),
                reason: format!("length window [{}, {}] is empty", lower, upper),
            }),
            _ => Ok(()),
        }
    }
}

fn max_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_normalize() {
        assert_eq!(WhiteSpace::Preserve.normalize("  a\tb  "), "  a\tb  ");
        assert_eq!(WhiteSpace::Replace.normalize("a\tb\nc"), "a b c");
        assert_eq!(WhiteSpace::Collapse.normalize("  a \t\n b  "), "a b");
        assert!(WhiteSpace::Collapse.is_normalized("a b"));
        assert!(!WhiteSpace::Collapse.is_normalized(" a"));
        assert!(WhiteSpace::parse("bogus").is_err());
    }

    #[test]
    fn test_restrict_tightens_lengths() {
        let base = FacetSet::new().min_length(2).max_length(10).pattern("[a-z]+");
        let derived = FacetSet::new().min_length(1).max_length(5).pattern("a.*");
        let merged = base.restrict(&derived);
        assert_eq!(merged.min_length, Some(2));
        assert_eq!(merged.max_length, Some(5));
        assert_eq!(merged.patterns, vec!["[a-z]+".to_string(), "a.*".to_string()]);
    }

    #[test]
    fn test_restrict_enumeration_most_derived() {
        let base = FacetSet::new().enumeration(["a", "b", "c"]);
        let derived = FacetSet::new().enumeration(["a"]);
        assert_eq!(base.restrict(&derived).enumeration, Some(vec!["a".to_string()]));
        assert_eq!(base.restrict(&FacetSet::new()).enumeration.map(|e| e.len()), Some(3));
    }

    #[test]
    fn test_restrict_white_space_never_loosens() {
        let base = FacetSet::new().white_space(WhiteSpace::Collapse);
        let derived = FacetSet::new().white_space(WhiteSpace::Preserve);
        assert_eq!(base.restrict(&derived).white_space, Some(WhiteSpace::Collapse));
    }

    #[test]
    fn test_check_length() {
        let facets = FacetSet::new().min_length(2).max_length(4);
        assert!(facets.check_length(1).is_err());
        assert!(facets.check_length(3).is_ok());
        assert!(facets.check_length(5).is_err());
        assert!(FacetSet::new().length(3).check_length(2).is_err());
    }

    #[test]
    fn test_length_consistency() {
        let facets = FacetSet::new().min_length(5).max_length(3);
        let err = facets.check_length_consistency("T").unwrap_err();
        assert!(matches!(err, Error::ConflictingFacets { .. }));
        assert!(FacetSet::new().length(3).check_length_consistency("T").is_ok());
    }
}

//! XSD Particle Schema Components
//!
//! Particles describe allowed content structure: an element declaration or
//! reference, a model group (sequence, choice, all), a named group reference
//! or a wildcard, each with occurrence bounds (minOccurs, maxOccurs).
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#p

use crate::error::{Error, Result};
use crate::namespaces::QName;
use serde::{Deserialize, Serialize};

use super::elements::ElementDecl;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawOccurs")]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

#[derive(Deserialize)]
struct RawOccurs {
    #[serde(default = "one")]
    min: u32,
    #[serde(default = "some_one")]
    max: Option<u32>,
}

fn one() -> u32 {
    1
}

fn some_one() -> Option<u32> {
    Some(1)
}

impl TryFrom<RawOccurs> for Occurs {
    type Error = Error;

    fn try_from(raw: RawOccurs) -> Result<Self> {
        Occurs::new(raw.min, raw.max)
    }
}

impl Occurs {
    /// Create occurrence bounds, rejecting `min > max`
    pub fn new(min: u32, max: Option<u32>) -> Result<Self> {
        match max {
            Some(max) if min > max => Err(Error::Schema(format!(
                "minOccurs ({}) must be lesser or equal than maxOccurs ({})",
                min, max
            ))),
            _ => Ok(Self { min, max }),
        }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Exactly n occurrences
    pub fn exactly(n: u32) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// At least n occurrences (unbounded)
    pub fn at_least(n: u32) -> Self {
        Self { min: n, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if maxOccurs is unbounded
    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }

    /// Check if an occurrence count lies within the bounds
    pub fn contains(&self, count: u32) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Check if occurrence count is at or over the maximum
    pub fn is_over(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count >= max,
            None => false,
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// How wildcard content is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessContents {
    /// Content must match a global declaration
    #[default]
    Strict,
    /// Validate when a declaration exists
    Lax,
    /// No validation
    Skip,
}

/// Namespaces admitted by a wildcard
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceConstraint {
    /// `##any`
    #[default]
    Any,
    /// `##other`: any namespace except the given one, and not absent
    Other(Option<String>),
    /// Explicit list; `None` stands for `##local`
    Enumerated(Vec<Option<String>>),
}

impl NamespaceConstraint {
    /// Check whether a namespace is admitted
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        match self {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(excluded) => {
                namespace.is_some() && namespace != excluded.as_deref()
            }
            NamespaceConstraint::Enumerated(list) => {
                list.iter().any(|ns| ns.as_deref() == namespace)
            }
        }
    }
}

/// Wildcard (`xs:any`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Wildcard {
    /// Admitted namespaces
    #[serde(default)]
    pub namespaces: NamespaceConstraint,
    /// Validation mode for matched content
    #[serde(default)]
    pub process_contents: ProcessContents,
}

/// The structural part of a particle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// Local element declaration
    Element(ElementDecl),
    /// Reference to a global element (substitution groups apply)
    ElementRef(QName),
    /// Ordered content
    Sequence(Vec<Particle>),
    /// Exactly one branch per occurrence
    Choice {
        /// Alternatives
        branches: Vec<Particle>,
        /// Optional selection weights, parallel to `branches`
        #[serde(default)]
        weights: Option<Vec<u32>>,
    },
    /// Every child within its own bounds, any order
    All(Vec<Particle>),
    /// Reference to a named model group
    GroupRef(QName),
    /// Wildcard
    Any(Wildcard),
}

/// A term with occurrence bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Content structure
    pub term: Term,
    /// Occurrence bounds
    #[serde(default)]
    pub occurs: Occurs,
}

impl Particle {
    /// Wrap a term with default (1, 1) occurrence
    pub fn new(term: Term) -> Self {
        Self {
            term,
            occurs: Occurs::once(),
        }
    }

    /// Local element declaration
    pub fn element(decl: ElementDecl) -> Self {
        Self::new(Term::Element(decl))
    }

    /// Reference to a global element
    pub fn element_ref(name: QName) -> Self {
        Self::new(Term::ElementRef(name))
    }

    /// Sequence group
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::new(Term::Sequence(particles))
    }

    /// Choice group with uniform weights
    pub fn choice(branches: Vec<Particle>) -> Self {
        Self::new(Term::Choice {
            branches,
            weights: None,
        })
    }

    /// Choice group with explicit weights
    pub fn weighted_choice(branches: Vec<(Particle, u32)>) -> Self {
        let (branches, weights) = branches.into_iter().unzip();
        Self::new(Term::Choice {
            branches,
            weights: Some(weights),
        })
    }

    /// All group
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::new(Term::All(particles))
    }

    /// Named group reference
    pub fn group(name: QName) -> Self {
        Self::new(Term::GroupRef(name))
    }

    /// Wildcard
    pub fn any(wildcard: Wildcard) -> Self {
        Self::new(Term::Any(wildcard))
    }

    /// Replace the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Check structural invariants of this particle tree
    pub fn check(&self) -> Result<()> {
        Occurs::new(self.occurs.min, self.occurs.max)?;
        match &self.term {
            Term::Element(decl) => decl.check(),
            Term::ElementRef(_) | Term::GroupRef(_) | Term::Any(_) => Ok(()),
            Term::Sequence(ps) | Term::All(ps) => ps.iter().try_for_each(Particle::check),
            Term::Choice { branches, weights } => {
                if let Some(w) = weights {
                    if w.len() != branches.len() {
                        return Err(Error::Schema(format!(
                            "choice has {} branches but {} weights",
                            branches.len(),
                            w.len()
                        )));
                    }
                }
                branches.iter().try_for_each(Particle::check)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_creation() {
        let occurs = Occurs::new(1, Some(5)).unwrap();
        assert_eq!(occurs.min, 1);
        assert_eq!(occurs.max, Some(5));
        assert!(Occurs::new(5, Some(3)).is_err());
        assert!(Occurs::new(5, None).is_ok());
    }

    #[test]
    fn test_occurs_presets() {
        assert_eq!(Occurs::once(), Occurs::exactly(1));
        assert_eq!(Occurs::optional(), Occurs::new(0, Some(1)).unwrap());
        assert_eq!(Occurs::zero_or_more(), Occurs::at_least(0));
        assert_eq!(Occurs::one_or_more(), Occurs::at_least(1));
    }

    #[test]
    fn test_occurs_predicates() {
        let occurs = Occurs::new(2, Some(5)).unwrap();
        assert!(!occurs.contains(1));
        assert!(occurs.contains(2));
        assert!(occurs.contains(5));
        assert!(!occurs.contains(6));
        assert!(occurs.is_over(5));
        assert!(!occurs.is_over(4));

        assert!(Occurs::zero_or_more().is_emptiable());
        assert!(Occurs::zero_or_more().is_unbounded());
        assert!(Occurs::zero_or_more().contains(1_000_000));
    }

    #[test]
    fn test_occurs_serde() {
        let occurs: Occurs = serde_json::from_str(r#"{"min": 0, "max": null}"#).unwrap();
        assert_eq!(occurs, Occurs::zero_or_more());

        let occurs: Occurs = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(occurs, Occurs::once());

        assert!(serde_json::from_str::<Occurs>(r#"{"min": 3, "max": 2}"#).is_err());
    }

    #[test]
    fn test_namespace_constraint() {
        assert!(NamespaceConstraint::Any.allows(None));
        let other = NamespaceConstraint::Other(Some("urn:t".into()));
        assert!(other.allows(Some("urn:x")));
        assert!(!other.allows(Some("urn:t")));
        assert!(!other.allows(None));
        let list = NamespaceConstraint::Enumerated(vec![None, Some("urn:a".into())]);
        assert!(list.allows(None));
        assert!(list.allows(Some("urn:a")));
        assert!(!list.allows(Some("urn:b")));
    }

    #[test]
    fn test_choice_weights_checked() {
        let bad = Particle::new(Term::Choice {
            branches: vec![Particle::element_ref(QName::local("a"))],
            weights: Some(vec![1, 2]),
        });
        assert!(bad.check().is_err());

        let good = Particle::weighted_choice(vec![
            (Particle::element_ref(QName::local("a")), 3),
            (Particle::element_ref(QName::local("b")), 1),
        ]);
        assert!(good.check().is_ok());
    }
}

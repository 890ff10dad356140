//! Error types for xmlschema-arbitrary
//!
//! This module defines all error types used throughout the library. Generation
//! failures are grouped by the stage that raises them: leaf synthesis
//! (patterns), scalar resolution (facets) and structural derivation.

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for generation and checking
#[derive(Error, Debug)]
pub enum Error {
    /// No string matching the pattern can be synthesized
    #[error("pattern '{pattern}' is unsatisfiable: {reason}")]
    PatternUnsatisfiable {
        /// Offending pattern
        pattern: String,
        /// Why no string matches
        reason: String,
    },

    /// Synthesis exceeded its work budget
    #[error("pattern '{pattern}' is too complex: gave up after {steps} steps")]
    PatternTooComplex {
        /// Offending pattern
        pattern: String,
        /// Steps spent before giving up
        steps: usize,
    },

    /// Pattern syntax could not be parsed
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Parser message
        reason: String,
    },

    /// Facets could not be satisfied together within the retry budget
    #[error("conflicting facets on {type_name}: {reason}")]
    ConflictingFacets {
        /// Type carrying the facets
        type_name: String,
        /// Which facets clashed
        reason: String,
    },

    /// Enumeration facet without values
    #[error("empty enumeration on {type_name}")]
    EmptyEnumeration {
        /// Type carrying the facet
        type_name: String,
    },

    /// Abstract element or type without a concrete replacement
    #[error("no concrete substitute for abstract {component}")]
    NoConcreteSubstitute {
        /// Abstract element or type
        component: String,
    },

    /// Recursive type graph cannot terminate under the depth policy
    #[error("unbounded recursion in {component} at depth {depth}")]
    UnboundedRecursion {
        /// Element or type where recursion was detected
        component: String,
        /// Depth reached
        depth: u32,
    },

    /// Construct that the engine does not model
    #[error("unsupported schema construct: {0}")]
    SchemaUnsupportedConstruct(String),

    /// Malformed schema model (e.g. minOccurs > maxOccurs)
    #[error("schema error: {0}")]
    Schema(String),

    /// Global element not declared in the schema
    #[error("unknown element: {0}")]
    UnknownElement(String),

    /// Type not declared in the schema
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// XML validation error
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Value error (invalid lexical value for a type)
    #[error("value error: {0}")]
    Value(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Generator configuration value out of range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fieldless discriminant of [`Error`], handy for matching in reports and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::PatternUnsatisfiable`]
    PatternUnsatisfiable,
    /// See [`Error::PatternTooComplex`]
    PatternTooComplex,
    /// See [`Error::InvalidPattern`]
    InvalidPattern,
    /// See [`Error::ConflictingFacets`]
    ConflictingFacets,
    /// See [`Error::EmptyEnumeration`]
    EmptyEnumeration,
    /// See [`Error::NoConcreteSubstitute`]
    NoConcreteSubstitute,
    /// See [`Error::UnboundedRecursion`]
    UnboundedRecursion,
    /// See [`Error::SchemaUnsupportedConstruct`]
    SchemaUnsupportedConstruct,
    /// See [`Error::Config`]
    Config,
    /// Schema model, lookup and lexical errors
    Schema,
    /// Validation errors
    Validation,
    /// XML, I/O and JSON errors
    Io,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PatternUnsatisfiable { .. } => ErrorKind::PatternUnsatisfiable,
            Error::PatternTooComplex { .. } => ErrorKind::PatternTooComplex,
            Error::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Error::ConflictingFacets { .. } => ErrorKind::ConflictingFacets,
            Error::EmptyEnumeration { .. } => ErrorKind::EmptyEnumeration,
            Error::NoConcreteSubstitute { .. } => ErrorKind::NoConcreteSubstitute,
            Error::UnboundedRecursion { .. } => ErrorKind::UnboundedRecursion,
            Error::SchemaUnsupportedConstruct(_) => ErrorKind::SchemaUnsupportedConstruct,
            Error::Config(_) => ErrorKind::Config,
            Error::Schema(_)
            | Error::UnknownElement(_)
            | Error::UnknownType(_)
            | Error::Value(_)
            | Error::Name(_)
            | Error::Namespace(_) => ErrorKind::Schema,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Xml(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn unsatisfiable(pattern: &str, reason: impl Into<String>) -> Self {
        Error::PatternUnsatisfiable {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validation failure with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Path to the element that failed validation
    pub path: Option<String>,
    /// Original reason
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: ", path)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(ref reason) = self.reason {
            write!(f, " ({})", reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("unexpected element 'foo'")
            .with_reason("expected 'bar'")
            .with_path("/root/foo");

        assert_eq!(err.to_string(), "/root/foo: unexpected element 'foo' (expected 'bar')");
    }

    #[test]
    fn test_error_kind() {
        let err = Error::unsatisfiable("[^\\s\\S]", "empty class");
        assert_eq!(err.kind(), ErrorKind::PatternUnsatisfiable);
        assert!(err.to_string().contains("[^\\s\\S]"));

        let err = Error::UnboundedRecursion {
            component: "Formula".into(),
            depth: 12,
        };
        assert_eq!(err.kind(), ErrorKind::UnboundedRecursion);
    }

    #[test]
    fn test_error_conversion() {
        let val_err = ValidationError::new("test");
        let err: Error = val_err.into();
        assert!(matches!(err, Error::Validation(_)));
    }
}

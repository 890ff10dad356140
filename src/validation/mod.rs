//! Validation of generated instances
//!
//! Validators are plain values implementing [`Validator`]; a validation
//! failure is data ([`ValidationOutcome::Failure`]) rather than an error.
//! [`SchemaValidator`] checks instances against a [`SchemaModel`](crate::schema::SchemaModel)
//! and [`RoundTripChecker`] runs a validator over a whole batch.

pub mod checker;
mod content;
mod validator;

pub use checker::{
    check_schema, ElementCheck, GenerationFailure, RoundTripChecker, RoundTripReport, SampleOutcome,
};
pub use validator::SchemaValidator;

use crate::documents::Element;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Result of validating one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "messages", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The instance is valid
    Success,
    /// The instance is invalid; messages in document order
    Failure(Vec<String>),
}

impl ValidationOutcome {
    /// Outcome for a list of collected errors
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            ValidationOutcome::Success
        } else {
            ValidationOutcome::Failure(errors.iter().map(|e| e.to_string()).collect())
        }
    }

    /// Whether the instance was valid
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success)
    }

    /// Failure messages (empty on success)
    pub fn messages(&self) -> &[String] {
        match self {
            ValidationOutcome::Success => &[],
            ValidationOutcome::Failure(messages) => messages,
        }
    }
}

/// Anything that can judge an instance
pub trait Validator {
    /// Validate one instance without modifying it
    fn validate(&self, instance: &Element) -> ValidationOutcome;
}

impl<F> Validator for F
where
    F: Fn(&Element) -> ValidationOutcome,
{
    fn validate(&self, instance: &Element) -> ValidationOutcome {
        self(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;

    #[test]
    fn test_outcome_from_errors() {
        assert!(ValidationOutcome::from_errors(Vec::new()).is_success());
        let error = ValidationError::new("missing attribute 'id'").with_path("/order");
        let outcome = ValidationOutcome::from_errors(vec![error]);
        assert_eq!(outcome.messages(), ["/order: missing attribute 'id'".to_string()]);
    }

    #[test]
    fn test_closure_validator() {
        let named_order = |e: &Element| {
            if e.local_name() == "order" {
                ValidationOutcome::Success
            } else {
                ValidationOutcome::Failure(vec![format!("unexpected root {}", e.name)])
            }
        };
        assert!(named_order.validate(&Element::new(QName::local("order"))).is_success());
        assert!(!named_order.validate(&Element::new(QName::local("memo"))).is_success());
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_string(&ValidationOutcome::Failure(vec!["bad".into()])).unwrap();
        assert_eq!(json, r#"{"status":"failure","messages":["bad"]}"#);
    }
}

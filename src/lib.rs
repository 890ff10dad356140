//! # xmlschema-arbitrary
//!
//! Random, schema-conformant XML instances for property-based tests.
//!
//! Given an in-memory XML Schema model, this library derives a generator for
//! any global element. Generated instances respect cardinality, substitution
//! groups, abstract types, facets and patterns, and grow with a size
//! parameter so one batch exercises both minimal and deep documents.
//!
//! ## Features
//!
//! - Pattern-driven string synthesis (XSD and plain regex dialects)
//! - Facet-aware scalar values for the XSD built-in types
//! - Terminating generation over recursive type graphs
//! - Caller-owned overrides for specific elements
//! - Reproducible sampling from seeds, sequential or parallel
//! - Round-trip checking against a reference validator
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlschema_arbitrary::{ElementGenerator, CustomGenerators, GeneratorConfig, QName, Schema};
//! use xmlschema_arbitrary::{RoundTripChecker, SchemaValidator};
//!
//! let schema = Schema::from_file("purchase-order.json")?;
//! let root = QName::namespaced("urn:po", "purchaseOrder");
//! let generator =
//!     ElementGenerator::new(&schema, &root, CustomGenerators::new(), GeneratorConfig::default())?;
//!
//! let batch = generator.sample(10, 20);
//! let report = RoundTripChecker::new(SchemaValidator::new(&schema)).check(&batch);
//! assert!(report.is_success(), "{}", report.summary());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and documents
pub mod namespaces;
pub mod names;
pub mod documents;

// Schema model
pub mod schema;
pub mod builtins;

// Generation and checking
pub mod generators;
pub mod validation;

// Re-exports for convenience
pub use documents::{Element, Node};
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use generators::{
    Batch, CustomGenerators, ElementGenerator, Gen, GenContext, PatternGenerator, RandomSource,
    Sample, Tier,
};
pub use limits::{ChoiceWeighting, GeneratorConfig};
pub use namespaces::QName;
pub use schema::{Schema, SchemaModel};
pub use validation::{
    check_schema, ElementCheck, RoundTripChecker, RoundTripReport, SchemaValidator,
    ValidationOutcome, Validator,
};

/// Version of the xmlschema-arbitrary library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = namespaces::XSD_NAMESPACE;

//! Round-trip checking of generated batches
//!
//! Each generated instance is serialized, parsed back and handed to a
//! [`Validator`]. Serialization is part of the check: an instance that only
//! validates as an in-memory tree is not a usable test input.
//!
//! [`check_schema`] runs the whole workflow for every global element of a
//! schema: derive a generator, sample it across growth tiers and check the
//! batch against the schema's own validator.

use crate::documents::Element;
use crate::error::Result;
use crate::generators::{Batch, CustomGenerators, ElementGenerator, RandomSource, Tier};
use crate::limits::GeneratorConfig;
use crate::namespaces::QName;
use crate::schema::SchemaModel;
use serde::Serialize;

use super::{SchemaValidator, ValidationOutcome, Validator};

/// Outcome for one sample of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleOutcome {
    /// Position in the batch
    pub index: usize,
    /// Size the sample was drawn at
    pub size: u32,
    /// Seed that reproduces the sample
    pub seed: u64,
    /// Validation outcome
    pub outcome: ValidationOutcome,
}

/// A sample that could not be generated at all
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationFailure {
    /// Position in the batch
    pub index: usize,
    /// Size the sample was drawn at
    pub size: u32,
    /// Seed that reproduces the failure
    pub seed: u64,
    /// Error message
    pub error: String,
}

/// Outcome of checking a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundTripReport {
    /// One entry per generated sample, in batch order
    pub outcomes: Vec<SampleOutcome>,
    /// Samples whose generation failed
    pub generation_failures: Vec<GenerationFailure>,
}

impl RoundTripReport {
    /// Number of checked samples
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing was checked
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of samples that validated
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    /// Number of samples that did not validate
    pub fn failed(&self) -> usize {
        self.len() - self.passed()
    }

    /// Samples that did not validate
    pub fn failures(&self) -> impl Iterator<Item = &SampleOutcome> {
        self.outcomes.iter().filter(|o| !o.outcome.is_success())
    }

    /// Every sample was generated and validated
    pub fn is_success(&self) -> bool {
        self.generation_failures.is_empty() && self.failed() == 0
    }

    /// One line summary
    pub fn summary(&self) -> String {
        format!(
            "{} checked, {} passed, {} failed, {} not generated",
            self.len(),
            self.passed(),
            self.failed(),
            self.generation_failures.len()
        )
    }

    /// Pretty JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs a validator over generated instances
#[derive(Debug, Clone)]
pub struct RoundTripChecker<V> {
    validator: V,
    reparse: bool,
}

impl<V: Validator> RoundTripChecker<V> {
    /// Checker that serializes and reparses every instance
    pub fn new(validator: V) -> Self {
        Self {
            validator,
            reparse: true,
        }
    }

    /// Validate the in-memory tree directly when `reparse` is false
    pub fn with_reparse(mut self, reparse: bool) -> Self {
        self.reparse = reparse;
        self
    }

    /// The wrapped validator
    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Check one instance
    pub fn check_one(&self, instance: &Element) -> ValidationOutcome {
        if !self.reparse {
            return self.validator.validate(instance);
        }
        let reparsed = instance.to_xml().and_then(|xml| Element::from_xml(&xml));
        match reparsed {
            Ok(element) => self.validator.validate(&element),
            Err(e) => ValidationOutcome::Failure(vec![format!(
                "serialization round trip failed: {}",
                e
            )]),
        }
    }

    /// Check every sample of a batch
    pub fn check(&self, batch: &Batch<Element>) -> RoundTripReport {
        let mut report = RoundTripReport::default();
        for (index, entry) in batch.entries.iter().enumerate() {
            match entry {
                Ok(sample) => {
                    let outcome = self.check_one(&sample.value);
                    if !outcome.is_success() {
                        tracing::warn!(
                            index,
                            size = sample.size,
                            seed = sample.seed,
                            messages = ?outcome.messages(),
                            "generated instance failed validation"
                        );
                    }
                    report.outcomes.push(SampleOutcome {
                        index,
                        size: sample.size,
                        seed: sample.seed,
                        outcome,
                    });
                }
                Err(failure) => report.generation_failures.push(GenerationFailure {
                    index,
                    size: failure.size,
                    seed: failure.seed,
                    error: failure.error.to_string(),
                }),
            }
        }
        tracing::info!(summary = %report.summary(), "round trip check finished");
        report
    }

    /// Check bare instances, numbered in order; size and seed are reported as zero
    pub fn check_values<'a>(
        &self,
        instances: impl IntoIterator<Item = &'a Element>,
    ) -> RoundTripReport {
        let outcomes = instances
            .into_iter()
            .enumerate()
            .map(|(index, instance)| SampleOutcome {
                index,
                size: 0,
                seed: 0,
                outcome: self.check_one(instance),
            })
            .collect();
        RoundTripReport {
            outcomes,
            generation_failures: Vec::new(),
        }
    }
}

/// Result of checking one global element
#[derive(Debug)]
pub struct ElementCheck {
    /// The global element used as root
    pub element: QName,
    /// The batch report, or why no generator could be derived
    pub result: Result<RoundTripReport>,
}

impl ElementCheck {
    /// Derived, generated and validated without a single failure
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_ok_and(|report| report.is_success())
    }
}

/// Derive, sample and check every global element of `schema`
///
/// Derivation errors are reported once per element and do not stop the
/// sweep. Each element samples from its own child of `source`.
pub fn check_schema<S: SchemaModel + ?Sized>(
    schema: &S,
    customs: &CustomGenerators,
    config: &GeneratorConfig,
    tiers: &[Tier],
    mut source: RandomSource,
) -> Vec<ElementCheck> {
    let checker = RoundTripChecker::new(SchemaValidator::new(schema));
    let names: Vec<QName> = schema.global_elements().iter().map(|d| d.name.clone()).collect();
    names
        .into_iter()
        .map(|element| {
            let element_source = RandomSource::from_seed(source.next_seed());
            let result = ElementGenerator::new(schema, &element, customs.clone(), config.clone())
                .map(|gen| {
                    let (batch, _) = gen.sample_tiers(tiers, element_source);
                    checker.check(&batch)
                });
            match &result {
                Ok(report) if !report.is_success() => tracing::warn!(
                    element = %element,
                    summary = %report.summary(),
                    "element failed round trip"
                ),
                Ok(_) => tracing::debug!(element = %element, "element passed round trip"),
                Err(e) => tracing::warn!(element = %element, error = %e, "no generator derived"),
            }
            ElementCheck { element, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::generators::{Gen, RandomSource};
    use crate::namespaces::QName;
    use rand::Rng;

    fn non_empty(e: &Element) -> ValidationOutcome {
        if e.text().is_empty() {
            ValidationOutcome::Failure(vec!["empty".to_string()])
        } else {
            ValidationOutcome::Success
        }
    }

    #[test]
    fn test_check_values() {
        let checker = RoundTripChecker::new(non_empty);
        let good = Element::new(QName::local("a")).with_text("x & <y>");
        let bad = Element::new(QName::local("a"));
        let report = checker.check_values([&good, &bad]);
        assert_eq!(report.len(), 2);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failures().next().map(|o| o.index), Some(1));
        assert!(!report.is_success());
        assert_eq!(report.summary(), "2 checked, 1 passed, 1 failed, 0 not generated");
    }

    #[test]
    fn test_check_batch_with_generation_failures() {
        let gen: Gen<Element> = Gen::from_fn(|ctx| {
            if ctx.rng.random_bool(0.8) {
                Ok(Element::new(QName::local("a")).with_text("ok"))
            } else {
                Err(Error::EmptyEnumeration { type_name: "T".into() })
            }
        });
        let (batch, _) = crate::generators::sample(&gen, 3, 30, RandomSource::from_seed(11));
        let report = RoundTripChecker::new(non_empty).check(&batch);
        assert_eq!(report.len() + report.generation_failures.len(), 30);
        assert_eq!(report.failed(), 0);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"generation_failures\""));
    }

    #[test]
    fn test_check_schema_reports_each_element() {
        use crate::error::ErrorKind;
        use crate::schema::{ElementDecl, Schema, TypeRef};

        let schema = Schema::new(None)
            .with_element(ElementDecl::new(
                QName::local("count"),
                TypeRef::builtin("nonNegativeInteger"),
            ))
            .with_element(ElementDecl::untyped(QName::local("Shape")).abstract_element());
        let checks = check_schema(
            &schema,
            &CustomGenerators::new(),
            &GeneratorConfig::default(),
            &Tier::default_growth(),
            RandomSource::from_seed(13),
        );
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].element, QName::local("count"));
        assert!(checks[0].is_success());
        assert_eq!(checks[0].result.as_ref().map(|r| r.len()).ok(), Some(10));
        assert_eq!(checks[1].element, QName::local("Shape"));
        let err = checks[1].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoConcreteSubstitute);
        assert!(!checks[1].is_success());
    }

    #[test]
    fn test_without_reparse_checks_the_tree() {
        let whitespace_only = Element::new(QName::local("a")).with_text("   ");
        let direct = RoundTripChecker::new(non_empty).with_reparse(false);
        assert!(direct.check_one(&whitespace_only).is_success());
    }
}

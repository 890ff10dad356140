//! Lexical values of simple types
//!
//! A [`ScalarGenerator`] is built once per resolved simple type. It picks a
//! strategy from the type's facets: an enumeration is drawn from directly,
//! pattern facets drive a [`PatternGenerator`] (steered by the length
//! window), lists and unions delegate to their item and member types, and
//! everything else falls back to the built-in synthesizer. Every candidate
//! other than an enumerated value is checked against the full facet set and
//! redrawn up to `max_facet_attempts` times.
//!
//! A pattern on a built-in whose value space is not plain text (numbers,
//! dates) or that also carries range or digit facets rarely matches those
//! facets by chance. Such types alternate between pattern candidates and
//! built-in candidates, the latter offered in every equivalent spelling
//! (leading zeros, explicit sign) and at shrinking sizes.

use crate::builtins::{BuiltinType, LengthUnit};
use crate::error::{Error, ErrorKind, Result};
use crate::limits::GeneratorConfig;
use crate::schema::{resolve_simple_type, ResolvedSimpleType, SchemaModel, TypeRef, Variety};
use rand::Rng;
use std::sync::Arc;

use super::pattern::PatternGenerator;
use super::Gen;

#[derive(Debug, Clone)]
enum Strategy {
    Enumeration(Vec<String>),
    Pattern {
        pattern: PatternGenerator,
        /// Built-in whose synthesized values are tried on alternate attempts
        fallback: Option<BuiltinType>,
    },
    Builtin(BuiltinType),
    List(Box<ScalarGenerator>),
    Union(Vec<ScalarGenerator>),
}

/// Generator of values for one simple type
#[derive(Debug, Clone)]
pub struct ScalarGenerator {
    ty: Arc<ResolvedSimpleType>,
    strategy: Strategy,
    config: Arc<GeneratorConfig>,
}

impl ScalarGenerator {
    /// Build a generator for a resolved type
    pub fn new(ty: ResolvedSimpleType, config: Arc<GeneratorConfig>) -> Result<Self> {
        let strategy = if let Some(values) = &ty.facets.enumeration {
            if values.is_empty() {
                return Err(Error::EmptyEnumeration {
                    type_name: ty.name.clone(),
                });
            }
            Strategy::Enumeration(values.clone())
        } else if let Some(pattern) = ty.facets.patterns.last() {
            Strategy::Pattern {
                pattern: PatternGenerator::xsd(pattern, &config)?,
                fallback: pattern_fallback(&ty),
            }
        } else {
            match &ty.variety {
                Variety::Atomic(builtin) => Strategy::Builtin(*builtin),
                Variety::List(item) => Strategy::List(Box::new(ScalarGenerator::new(
                    (**item).clone(),
                    Arc::clone(&config),
                )?)),
                Variety::Union(members) => Strategy::Union(
                    members
                        .iter()
                        .map(|m| ScalarGenerator::new(m.clone(), Arc::clone(&config)))
                        .collect::<Result<Vec<_>>>()?,
                ),
            }
        };
        Ok(Self {
            ty: Arc::new(ty),
            strategy,
            config,
        })
    }

    /// Resolve a type reference and build its generator
    pub fn for_type<S: SchemaModel + ?Sized>(
        schema: &S,
        type_ref: &TypeRef,
        config: Arc<GeneratorConfig>,
    ) -> Result<Self> {
        let resolved = resolve_simple_type(schema, type_ref)?;
        tracing::debug!(type_name = %resolved.name, "derived scalar generator");
        Self::new(resolved, config)
    }

    /// The type this generator produces values for
    pub fn simple_type(&self) -> &ResolvedSimpleType {
        &self.ty
    }

    /// Draw one value satisfying every facet of the type
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, size: u32) -> Result<String> {
        if let Strategy::Enumeration(values) = &self.strategy {
            return Ok(values[rng.random_range(0..values.len())].clone());
        }
        let size = self.config.leaf_size(size);
        let attempts = self.config.max_facet_attempts.max(1);
        let mut last_reason = String::new();
        for attempt in 0..attempts {
            let candidates = match &self.strategy {
                Strategy::Pattern {
                    fallback: Some(builtin),
                    ..
                } if attempt % 2 == 1 => {
                    let shrunk = size.checked_shr(attempt / 2).unwrap_or(0);
                    let value = builtin.synthesize(rng, shrunk, &self.ty.facets)?;
                    builtin.lexical_variants(&value)
                }
                _ => vec![self.candidate(rng, size)?],
            };
            for candidate in candidates {
                let candidate = self.ty.white_space().normalize(&candidate);
                match self.ty.validate(&candidate) {
                    Ok(()) => return Ok(candidate),
                    Err(reason) => {
                        tracing::trace!(type_name = %self.ty.name, %reason, "rejected candidate");
                        last_reason = reason;
                    }
                }
            }
        }
        Err(Error::ConflictingFacets {
            type_name: self.ty.name.clone(),
            reason: format!(
                "no value satisfied every facet in {} attempts ({})",
                attempts, last_reason
            ),
        })
    }

    fn candidate<R: Rng + ?Sized>(&self, rng: &mut R, size: u32) -> Result<String> {
        match &self.strategy {
            Strategy::Enumeration(values) => Ok(values[rng.random_range(0..values.len())].clone()),
            Strategy::Pattern { pattern, .. } => {
                let window = self.ty.char_length_window();
                pattern.generate(rng, size, window).map_err(|e| match e.kind() {
                    ErrorKind::PatternUnsatisfiable if window.is_some() => {
                        Error::ConflictingFacets {
                            type_name: self.ty.name.clone(),
                            reason: e.to_string(),
                        }
                    }
                    _ => e,
                })
            }
            Strategy::Builtin(builtin) => builtin.synthesize(rng, size, &self.ty.facets),
            Strategy::List(item) => {
                let (lo, hi) = self.ty.facets.length_window();
                let soft_hi =
                    lo.saturating_add(size.min(self.config.max_unbounded_occurs) as usize);
                let hi = hi.map_or(soft_hi, |h| h.min(soft_hi.max(lo)));
                let count = if hi <= lo { lo } else { rng.random_range(lo..=hi) };
                let items = (0..count)
                    .map(|_| item.generate(rng, size))
                    .collect::<Result<Vec<_>>>()?;
                Ok(items.join(" "))
            }
            Strategy::Union(members) => {
                members[rng.random_range(0..members.len())].generate(rng, size)
            }
        }
    }

    /// Generator drawing values at the context's size
    pub fn to_gen(&self) -> Gen<String> {
        let this = self.clone();
        Gen::from_fn(move |ctx| {
            let size = ctx.size;
            this.generate(&mut *ctx.rng, size)
        })
    }
}

/// Built-in to alternate with a pattern, when pattern output alone seldom
/// lands in the type's value space
fn pattern_fallback(ty: &ResolvedSimpleType) -> Option<BuiltinType> {
    let builtin = ty.builtin()?;
    let textual = builtin.length_unit() == LengthUnit::Chars;
    let steered = ty.facets.has_bounds()
        || ty.facets.total_digits.is_some()
        || ty.facets.fraction_digits.is_some();
    (!textual || steered).then_some(builtin)
}

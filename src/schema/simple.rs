//! Resolved simple types
//!
//! A simple type reference is resolved by walking its derivation chain down
//! to a built-in, merging facets on the way. The result carries compiled
//! patterns and is used both to check lexical values and to steer value
//! synthesis.

use crate::builtins::{decimal_digits, BuiltinType, LengthUnit};
use crate::error::{Error, Result};
use crate::namespaces::QName;
use regex::Regex;
use std::cmp::Ordering;

use super::facets::{FacetSet, WhiteSpace};
use super::patterns;
use super::types::{SimpleDerivation, SimpleType, TypeDefinition, TypeRef};
use super::SchemaModel;

const MAX_DERIVATION_DEPTH: usize = 64;

/// Variety of a simple type
#[derive(Debug, Clone)]
pub enum Variety {
    /// Atomic value of a built-in primitive family
    Atomic(BuiltinType),
    /// Whitespace separated list of items
    List(Box<ResolvedSimpleType>),
    /// Value of any member type
    Union(Vec<ResolvedSimpleType>),
}

/// A simple type with its derivation chain flattened
#[derive(Debug, Clone)]
pub struct ResolvedSimpleType {
    /// Name for messages
    pub name: String,
    /// Variety and item/member types
    pub variety: Variety,
    /// Effective facets
    pub facets: FacetSet,
    patterns: Vec<Regex>,
}

impl ResolvedSimpleType {
    fn atomic(builtin: BuiltinType) -> Self {
        Self {
            name: format!("xs:{}", builtin.name()),
            variety: Variety::Atomic(builtin),
            facets: builtin.implicit_facets(),
            patterns: Vec::new(),
        }
    }

    /// White space mode applied before checking
    pub fn white_space(&self) -> WhiteSpace {
        match (&self.variety, self.facets.white_space) {
            (_, Some(ws)) => ws,
            (Variety::List(_), None) => WhiteSpace::Collapse,
            (_, None) => WhiteSpace::Preserve,
        }
    }

    /// Built-in at the root of an atomic type
    pub fn builtin(&self) -> Option<BuiltinType> {
        match self.variety {
            Variety::Atomic(b) => Some(b),
            _ => None,
        }
    }

    /// Whether any pattern facet applies
    pub fn has_patterns(&self) -> bool {
        !self.facets.patterns.is_empty()
    }

    /// Length window in characters, when length facets translate to one
    pub fn char_length_window(&self) -> Option<(usize, Option<usize>)> {
        let has_lengths = self.facets.length.is_some()
            || self.facets.min_length.is_some()
            || self.facets.max_length.is_some();
        match self.builtin()?.length_unit() {
            LengthUnit::Chars if has_lengths => {
                let (lo, hi) = self.facets.length_window();
                let lo = lo.max(self.facets.min_length.unwrap_or(0));
                let hi = match (hi, self.facets.max_length) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                Some((lo, hi))
            }
            _ => None,
        }
    }

    /// Check a lexical value; on failure the message names the violated facet
    pub fn validate(&self, value: &str) -> std::result::Result<(), String> {
        let normalized = self.white_space().normalize(value);
        if let Some(values) = &self.facets.enumeration {
            let ws = self.white_space();
            if !values.iter().any(|v| ws.normalize(v) == normalized) {
                return Err(format!(
                    "'{}' is not one of the enumerated values of {}",
                    normalized, self.name
                ));
            }
        }
        for (source, regex) in self.facets.patterns.iter().zip(&self.patterns) {
            if !regex.is_match(&normalized) {
                return Err(format!("'{}' does not match pattern '{}'", normalized, source));
            }
        }
        match &self.variety {
            Variety::Atomic(builtin) => self.validate_atomic(*builtin, &normalized),
            Variety::List(item) => {
                let items: Vec<&str> = normalized.split(' ').filter(|s| !s.is_empty()).collect();
                self.facets
                    .check_length(items.len())
                    .map_err(|e| format!("{} of {}", e, self.name))?;
                items.iter().try_for_each(|it| item.validate(it))
            }
            Variety::Union(members) => {
                if members.iter().any(|m| m.validate(&normalized).is_ok()) {
                    Ok(())
                } else {
                    Err(format!("'{}' matches no member type of {}", normalized, self.name))
                }
            }
        }
    }

    fn validate_atomic(
        &self,
        builtin: BuiltinType,
        value: &str,
    ) -> std::result::Result<(), String> {
        builtin.validate_lexical(value)?;
        if let Some(len) = builtin.value_length(value) {
            self.facets
                .check_length(len)
                .map_err(|e| format!("'{}': {}", value, e))?;
        }
        if builtin.is_decimal() {
            let (total, fraction) = decimal_digits(value);
            if let Some(limit) = self.facets.total_digits {
                if total > limit {
                    return Err(format!("'{}' has more than {} total digits", value, limit));
                }
            }
            if let Some(limit) = self.facets.fraction_digits {
                if fraction > limit {
                    return Err(format!("'{}' has more than {} fraction digits", value, limit));
                }
            }
        }
        let bounds: [(&Option<String>, &str, fn(Ordering) -> bool); 4] = [
            (&self.facets.min_inclusive, "minInclusive", |o| o != Ordering::Less),
            (&self.facets.max_inclusive, "maxInclusive", |o| o != Ordering::Greater),
            (&self.facets.min_exclusive, "minExclusive", |o| o == Ordering::Greater),
            (&self.facets.max_exclusive, "maxExclusive", |o| o == Ordering::Less),
        ];
        for (bound, facet, admits) in bounds {
            if let Some(bound) = bound {
                match builtin.compare(value, bound) {
                    Some(order) if admits(order) => {}
                    _ => return Err(format!("'{}' violates {} {}", value, facet, bound)),
                }
            }
        }
        Ok(())
    }
}

/// Resolve a simple type reference against a schema
pub fn resolve_simple_type<S: SchemaModel + ?Sized>(
    schema: &S,
    type_ref: &TypeRef,
) -> Result<ResolvedSimpleType> {
    resolve(schema, type_ref, 0)
}

fn resolve<S: SchemaModel + ?Sized>(
    schema: &S,
    type_ref: &TypeRef,
    depth: usize,
) -> Result<ResolvedSimpleType> {
    if depth > MAX_DERIVATION_DEPTH {
        return Err(Error::Schema(format!(
            "simple type derivation of {} is circular",
            type_ref.label()
        )));
    }
    match type_ref {
        TypeRef::Named(name) if name.is_xsd() => resolve_builtin(name),
        TypeRef::Named(name) => match schema.type_definition(name) {
            Some(TypeDefinition::Simple(st)) => resolve_definition(schema, st, depth),
            Some(TypeDefinition::Complex(_)) => Err(Error::Schema(format!(
                "{} is a complex type where a simple type is required",
                name
            ))),
            None => Err(Error::UnknownType(name.to_string())),
        },
        TypeRef::Anonymous(def) => match def.as_ref() {
            TypeDefinition::Simple(st) => resolve_definition(schema, st, depth),
            TypeDefinition::Complex(_) => Err(Error::Schema(
                "anonymous complex type where a simple type is required".to_string(),
            )),
        },
    }
}

fn resolve_builtin(name: &QName) -> Result<ResolvedSimpleType> {
    if let Some(item) = BuiltinType::list_item_of(&name.local_name) {
        let item = ResolvedSimpleType::atomic(item);
        return Ok(ResolvedSimpleType {
            name: format!("xs:{}", name.local_name),
            variety: Variety::List(Box::new(item)),
            facets: FacetSet::new().min_length(1).white_space(WhiteSpace::Collapse),
            patterns: Vec::new(),
        });
    }
    Ok(ResolvedSimpleType::atomic(BuiltinType::from_local_name(&name.local_name)?))
}

fn resolve_definition<S: SchemaModel + ?Sized>(
    schema: &S,
    st: &SimpleType,
    depth: usize,
) -> Result<ResolvedSimpleType> {
    let own_patterns = st
        .facets
        .patterns
        .iter()
        .map(|p| patterns::compile(p))
        .collect::<Result<Vec<_>>>()?;
    let resolved = match &st.derivation {
        SimpleDerivation::Restriction(base) => {
            let base = resolve(schema, base, depth + 1)?;
            let name = st
                .name
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("restriction of {}", base.name));
            let mut patterns = base.patterns;
            patterns.extend(own_patterns);
            ResolvedSimpleType {
                name,
                facets: base.facets.restrict(&st.facets),
                variety: base.variety,
                patterns,
            }
        }
        SimpleDerivation::List(item) => {
            let item = resolve(schema, item, depth + 1)?;
            if matches!(item.variety, Variety::List(_)) {
                return Err(Error::Schema("list of list types is not allowed".to_string()));
            }
            ResolvedSimpleType {
                name: st
                    .name
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("list of {}", item.name)),
                variety: Variety::List(Box::new(item)),
                facets: st.facets.clone(),
                patterns: own_patterns,
            }
        }
        SimpleDerivation::Union(members) => {
            let members = members
                .iter()
                .map(|m| resolve(schema, m, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            ResolvedSimpleType {
                name: st
                    .name
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "anonymous union".to_string()),
                variety: Variety::Union(members),
                facets: st.facets.clone(),
                patterns: own_patterns,
            }
        }
    };
    check_facets(&resolved)?;
    Ok(resolved)
}

fn check_facets(ty: &ResolvedSimpleType) -> Result<()> {
    if let Some(values) = &ty.facets.enumeration {
        if values.is_empty() {
            return Err(Error::EmptyEnumeration {
                type_name: ty.name.clone(),
            });
        }
    }
    ty.facets.check_length_consistency(&ty.name)?;
    if ty.facets.has_bounds() {
        let ordered = ty.builtin().map_or(false, |b| b.is_ordered());
        if !ordered {
            return Err(Error::SchemaUnsupportedConstruct(format!(
                "value bounds on {}",
                ty.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn schema() -> Schema {
        Schema::new(None)
            .with_simple_type(
                QName::local("Sku"),
                SimpleType::restriction(
                    TypeRef::builtin("string"),
                    FacetSet::new().pattern(r"\d{3}-[A-Z]{2}"),
                ),
            )
            .with_simple_type(
                QName::local("Quantity"),
                SimpleType::restriction(
                    TypeRef::builtin("positiveInteger"),
                    FacetSet::new().max_exclusive("100"),
                ),
            )
            .with_simple_type(
                QName::local("Sizes"),
                SimpleType::list(TypeRef::named(QName::local("Quantity")))
                    .with_facets(FacetSet::new().max_length(3)),
            )
            .with_simple_type(
                QName::local("SizeOrName"),
                SimpleType::union(vec![
                    TypeRef::named(QName::local("Quantity")),
                    TypeRef::builtin("NCName"),
                ]),
            )
    }

    fn resolve_named(schema: &Schema, name: &str) -> ResolvedSimpleType {
        resolve_simple_type(schema, &TypeRef::named(QName::local(name))).unwrap()
    }

    #[test]
    fn test_restriction_with_pattern() {
        let schema = schema();
        let sku = resolve_named(&schema, "Sku");
        assert!(sku.validate("123-AB").is_ok());
        assert!(sku.validate("12-AB").is_err());
        assert_eq!(sku.builtin(), Some(BuiltinType::String));
    }

    #[test]
    fn test_restriction_inherits_implicit_bounds() {
        let schema = schema();
        let qty = resolve_named(&schema, "Quantity");
        assert!(qty.validate("1").is_ok());
        assert!(qty.validate(" 99 ").is_ok());
        assert!(qty.validate("0").is_err());
        assert!(qty.validate("100").is_err());
        assert!(qty.validate("1.5").is_err());
    }

    #[test]
    fn test_list_and_union() {
        let schema = schema();
        let sizes = resolve_named(&schema, "Sizes");
        assert!(sizes.validate("1 2  3").is_ok());
        assert!(sizes.validate("1 2 3 4").is_err());
        assert!(sizes.validate("1 200").is_err());

        let union = resolve_named(&schema, "SizeOrName");
        assert!(union.validate("42").is_ok());
        assert!(union.validate("large").is_ok());
        assert!(union.validate("4 2").is_err());
    }

    #[test]
    fn test_builtin_lists() {
        let schema = Schema::new(None);
        let tokens = resolve_simple_type(&schema, &TypeRef::builtin("NMTOKENS")).unwrap();
        assert!(tokens.validate("a b c").is_ok());
        assert!(tokens.validate("").is_err());
    }

    #[test]
    fn test_schema_defects() {
        let schema = Schema::new(None).with_simple_type(
            QName::local("Nothing"),
            SimpleType::restriction(
                TypeRef::builtin("string"),
                FacetSet::new().enumeration(Vec::<String>::new()),
            ),
        );
        let err =
            resolve_simple_type(&schema, &TypeRef::named(QName::local("Nothing"))).unwrap_err();
        assert!(matches!(err, Error::EmptyEnumeration { .. }));

        let schema = Schema::new(None).with_simple_type(
            QName::local("Bounded"),
            SimpleType::restriction(TypeRef::builtin("string"), FacetSet::new().max_inclusive("z")),
        );
        let err =
            resolve_simple_type(&schema, &TypeRef::named(QName::local("Bounded"))).unwrap_err();
        assert!(matches!(err, Error::SchemaUnsupportedConstruct(_)));

        let err = resolve_simple_type(&Schema::new(None), &TypeRef::builtin("ENTITY")).unwrap_err();
        assert!(matches!(err, Error::SchemaUnsupportedConstruct(_)));
    }
}

//! Schema model
//!
//! The generator and the reference validator read schemas through the
//! [`SchemaModel`] trait. [`Schema`] is the in-memory implementation; it is
//! assembled with builder methods or loaded from a JSON document describing
//! global elements, named types and named model groups.

pub mod elements;
pub mod facets;
pub mod particles;
pub mod patterns;
pub mod simple;
pub mod types;

pub use elements::{AttributeDecl, AttributeUse, ElementDecl};
pub use facets::{FacetSet, WhiteSpace};
pub use particles::{NamespaceConstraint, Occurs, Particle, ProcessContents, Term, Wildcard};
pub use simple::{resolve_simple_type, ResolvedSimpleType, Variety};
pub use types::{ComplexType, ContentModel, SimpleDerivation, SimpleType, TypeDefinition, TypeRef};

use crate::error::{Error, Result};
use crate::namespaces::QName;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Read access to a schema's global components
pub trait SchemaModel: Send + Sync {
    /// Global element declaration by name
    fn global_element(&self, name: &QName) -> Option<&ElementDecl>;

    /// All global element declarations, in declaration order
    fn global_elements(&self) -> Vec<&ElementDecl>;

    /// Named (non built-in) type definition
    fn type_definition(&self, name: &QName) -> Option<&TypeDefinition>;

    /// All named type definitions, in declaration order
    fn type_definitions(&self) -> Vec<&TypeDefinition>;

    /// Named model group
    fn model_group(&self, name: &QName) -> Option<&Particle>;

    /// Members of the substitution group headed by `head`, transitively,
    /// in declaration order (the head itself excluded)
    fn substitution_members(&self, head: &QName) -> Vec<&ElementDecl> {
        let mut members = Vec::new();
        let mut heads: HashSet<&QName> = HashSet::new();
        heads.insert(head);
        // Iterate to a fixpoint so declaration order does not matter
        loop {
            let mut grew = false;
            for decl in self.global_elements() {
                if let Some(group) = &decl.substitution_group {
                    if heads.contains(group) && !heads.contains(&decl.name) {
                        heads.insert(&decl.name);
                        members.push(decl);
                        grew = true;
                    }
                }
            }
            if !grew {
                break;
            }
        }
        let order: Vec<&QName> = self.global_elements().iter().map(|d| &d.name).collect();
        members.sort_by_key(|d| order.iter().position(|n| *n == &d.name));
        members
    }

    /// Named complex types derived from `base`, transitively, in declaration order
    fn derived_types(&self, base: &QName) -> Vec<&QName> {
        self.type_definitions()
            .into_iter()
            .filter_map(|def| match def {
                TypeDefinition::Complex(ct) => ct.name.as_ref(),
                TypeDefinition::Simple(_) => None,
            })
            .filter(|name| *name != base && self.is_derived_from(name, base))
            .collect()
    }

    /// Whether `derived` equals `base` or reaches it through its base chain
    fn is_derived_from(&self, derived: &QName, base: &QName) -> bool {
        let mut current = Some(derived);
        let mut seen = HashSet::new();
        while let Some(name) = current {
            if name == base {
                return true;
            }
            if !seen.insert(name) {
                return false;
            }
            current = match self.type_definition(name) {
                Some(TypeDefinition::Complex(ct)) => ct.base.as_ref(),
                Some(TypeDefinition::Simple(st)) => match &st.derivation {
                    SimpleDerivation::Restriction(TypeRef::Named(b)) => Some(b),
                    _ => None,
                },
                None => None,
            };
        }
        false
    }

    /// Effective type of an element declaration
    ///
    /// Untyped members of a substitution group take their head's type;
    /// otherwise an untyped element is `xs:anyType`.
    fn element_type(&self, decl: &ElementDecl) -> TypeRef {
        let mut current = decl;
        let mut seen = HashSet::new();
        loop {
            if let Some(type_ref) = &current.type_ref {
                return type_ref.clone();
            }
            let next = current
                .substitution_group
                .as_ref()
                .filter(|head| seen.insert((*head).clone()))
                .and_then(|head| self.global_element(head));
            match next {
                Some(head) => current = head,
                None => return TypeRef::builtin("anyType"),
            }
        }
    }
}

/// In-memory schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Target namespace
    pub target_namespace: Option<String>,
    elements: IndexMap<QName, ElementDecl>,
    types: IndexMap<QName, TypeDefinition>,
    groups: IndexMap<QName, Particle>,
}

/// A named model group in the JSON form of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedGroup {
    /// Group name
    pub name: QName,
    /// Group content
    pub particle: Particle,
}

/// JSON form of a schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDocument {
    /// Target namespace
    pub target_namespace: Option<String>,
    /// Global element declarations
    pub elements: Vec<ElementDecl>,
    /// Named type definitions
    pub types: Vec<TypeDefinition>,
    /// Named model groups
    pub groups: Vec<NamedGroup>,
}

impl Schema {
    /// Empty schema for a target namespace
    pub fn new(target_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: target_namespace.map(str::to_string),
            ..Self::default()
        }
    }

    /// Add a global element (replaces an earlier declaration of the same name)
    pub fn with_element(mut self, decl: ElementDecl) -> Self {
        self.elements.insert(decl.name.clone(), decl);
        self
    }

    /// Add a named type; anonymous definitions are rejected by [`Schema::check`]
    pub fn with_type(mut self, def: TypeDefinition) -> Self {
        let key = def
            .name()
            .cloned()
            .unwrap_or_else(|| QName::local(format!("#anonymous{}", self.types.len())));
        self.types.insert(key, def);
        self
    }

    /// Add a named complex type
    pub fn with_complex_type(self, name: QName, ty: ComplexType) -> Self {
        self.with_type(TypeDefinition::Complex(ty.named(name)))
    }

    /// Add a named simple type
    pub fn with_simple_type(self, name: QName, ty: SimpleType) -> Self {
        self.with_type(TypeDefinition::Simple(ty.named(name)))
    }

    /// Add a named model group
    pub fn with_group(mut self, name: QName, particle: Particle) -> Self {
        self.groups.insert(name, particle);
        self
    }

    /// Build from the JSON document form, checking references
    pub fn from_document(doc: SchemaDocument) -> Result<Self> {
        let mut schema = Schema::new(doc.target_namespace.as_deref());
        for decl in doc.elements {
            if schema.elements.contains_key(&decl.name) {
                return Err(Error::Schema(format!("duplicate global element '{}'", decl.name)));
            }
            schema.elements.insert(decl.name.clone(), decl);
        }
        for def in doc.types {
            let name = def
                .name()
                .cloned()
                .ok_or_else(|| Error::Schema("global type without a name".to_string()))?;
            if schema.types.contains_key(&name) {
                return Err(Error::Schema(format!("duplicate type '{}'", name)));
            }
            schema.types.insert(name, def);
        }
        for group in doc.groups {
            schema.groups.insert(group.name, group.particle);
        }
        schema.check()?;
        Ok(schema)
    }

    /// JSON document form of this schema
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            target_namespace: self.target_namespace.clone(),
            elements: self.elements.values().cloned().collect(),
            types: self.types.values().cloned().collect(),
            groups: self
                .groups
                .iter()
                .map(|(name, particle)| NamedGroup {
                    name: name.clone(),
                    particle: particle.clone(),
                })
                .collect(),
        }
    }

    /// Load a schema from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Load a schema from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Check structural invariants and that every named reference resolves
    pub fn check(&self) -> Result<()> {
        for def in self.types.values() {
            if def.name().is_none() {
                return Err(Error::Schema("global type without a name".to_string()));
            }
            def.check()?;
            self.check_type_refs(def)?;
        }
        for decl in self.elements.values() {
            decl.check()?;
            if let Some(head) = &decl.substitution_group {
                if !self.elements.contains_key(head) {
                    return Err(Error::UnknownElement(format!(
                        "{} (substitution group head of {})",
                        head, decl.name
                    )));
                }
            }
            if let Some(type_ref) = &decl.type_ref {
                self.check_type_ref(type_ref)?;
            }
        }
        for particle in self.groups.values() {
            particle.check()?;
            self.check_particle_refs(particle)?;
        }
        Ok(())
    }

    fn check_type_ref(&self, type_ref: &TypeRef) -> Result<()> {
        match type_ref {
            TypeRef::Named(name) if name.is_xsd() => Ok(()),
            TypeRef::Named(name) => {
                if self.types.contains_key(name) {
                    Ok(())
                } else {
                    Err(Error::UnknownType(name.to_string()))
                }
            }
            TypeRef::Anonymous(def) => self.check_type_refs(def),
        }
    }

    fn check_type_refs(&self, def: &TypeDefinition) -> Result<()> {
        match def {
            TypeDefinition::Simple(st) => match &st.derivation {
                SimpleDerivation::Restriction(base) | SimpleDerivation::List(base) => {
                    self.check_type_ref(base)
                }
                SimpleDerivation::Union(members) => {
                    members.iter().try_for_each(|m| self.check_type_ref(m))
                }
            },
            TypeDefinition::Complex(ct) => {
                if let Some(base) = &ct.base {
                    if !base.is_xsd() && !self.types.contains_key(base) {
                        return Err(Error::UnknownType(base.to_string()));
                    }
                }
                for attr in &ct.attributes {
                    self.check_type_ref(&attr.type_ref)?;
                }
                match &ct.content {
                    ContentModel::Empty => Ok(()),
                    ContentModel::Simple(type_ref) => self.check_type_ref(type_ref),
                    ContentModel::Elements(particle) => self.check_particle_refs(particle),
                }
            }
        }
    }

    fn check_particle_refs(&self, particle: &Particle) -> Result<()> {
        match &particle.term {
            Term::Element(decl) => match &decl.type_ref {
                Some(type_ref) => self.check_type_ref(type_ref),
                None => Ok(()),
            },
            Term::ElementRef(name) => {
                if self.elements.contains_key(name) {
                    Ok(())
                } else {
                    Err(Error::UnknownElement(name.to_string()))
                }
            }
            Term::GroupRef(name) => {
                if self.groups.contains_key(name) {
                    Ok(())
                } else {
                    Err(Error::Schema(format!("unknown model group '{}'", name)))
                }
            }
            Term::Sequence(ps) | Term::All(ps) => {
                ps.iter().try_for_each(|p| self.check_particle_refs(p))
            }
            Term::Choice { branches, .. } => {
                branches.iter().try_for_each(|p| self.check_particle_refs(p))
            }
            Term::Any(_) => Ok(()),
        }
    }

    /// QName in the target namespace
    pub fn qname(&self, local_name: &str) -> QName {
        QName::new(self.target_namespace.as_deref(), local_name)
    }
}

impl SchemaModel for Schema {
    fn global_element(&self, name: &QName) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    fn global_elements(&self) -> Vec<&ElementDecl> {
        self.elements.values().collect()
    }

    fn type_definition(&self, name: &QName) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    fn type_definitions(&self) -> Vec<&TypeDefinition> {
        self.types.values().collect()
    }

    fn model_group(&self, name: &QName) -> Option<&Particle> {
        self.groups.get(name)
    }
}

impl<T: SchemaModel + ?Sized> SchemaModel for &T {
    fn global_element(&self, name: &QName) -> Option<&ElementDecl> {
        (**self).global_element(name)
    }

    fn global_elements(&self) -> Vec<&ElementDecl> {
        (**self).global_elements()
    }

    fn type_definition(&self, name: &QName) -> Option<&TypeDefinition> {
        (**self).type_definition(name)
    }

    fn type_definitions(&self) -> Vec<&TypeDefinition> {
        (**self).type_definitions()
    }

    fn model_group(&self, name: &QName) -> Option<&Particle> {
        (**self).model_group(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula_schema() -> Schema {
        let binop = ComplexType::elements(Particle::sequence(vec![
            Particle::element_ref(QName::local("Formula")),
            Particle::element_ref(QName::local("Formula")),
        ]))
        .named(QName::local("BinOp"));
        Schema::new(None)
            .with_type(TypeDefinition::Complex(binop))
            .with_element(ElementDecl::untyped(QName::local("Formula")).abstract_element())
            .with_element(
                ElementDecl::new(QName::local("Const"), TypeRef::builtin("int"))
                    .substitutes(QName::local("Formula")),
            )
            .with_element(
                ElementDecl::new(QName::local("Plus"), TypeRef::named(QName::local("BinOp")))
                    .substitutes(QName::local("Formula")),
            )
            .with_element(
                ElementDecl::untyped(QName::local("Neg")).substitutes(QName::local("Plus")),
            )
    }

    #[test]
    fn test_substitution_members_transitive() {
        let schema = formula_schema();
        let members: Vec<_> = schema
            .substitution_members(&QName::local("Formula"))
            .into_iter()
            .map(|d| d.name.local_name.clone())
            .collect();
        assert_eq!(members, vec!["Const", "Plus", "Neg"]);
        assert!(schema.check().is_ok());
    }

    #[test]
    fn test_element_type_inherited_from_head() {
        let schema = formula_schema();
        let neg = schema.global_element(&QName::local("Neg")).unwrap();
        assert_eq!(schema.element_type(neg), TypeRef::named(QName::local("BinOp")));
        let formula = schema.global_element(&QName::local("Formula")).unwrap();
        assert_eq!(schema.element_type(formula), TypeRef::builtin("anyType"));
    }

    #[test]
    fn test_derived_types() {
        let schema = Schema::new(None)
            .with_complex_type(QName::local("Shape"), ComplexType::empty().abstract_type())
            .with_complex_type(
                QName::local("Circle"),
                ComplexType::empty().derived_from(QName::local("Shape")),
            )
            .with_complex_type(
                QName::local("Disc"),
                ComplexType::empty().derived_from(QName::local("Circle")),
            );
        let derived: Vec<_> = schema.derived_types(&QName::local("Shape"));
        assert_eq!(derived, vec![&QName::local("Circle"), &QName::local("Disc")]);
        assert!(schema.is_derived_from(&QName::local("Disc"), &QName::local("Shape")));
        assert!(!schema.is_derived_from(&QName::local("Shape"), &QName::local("Disc")));
    }

    #[test]
    fn test_check_unknown_references() {
        let schema = Schema::new(None).with_element(ElementDecl::new(
            QName::local("a"),
            TypeRef::named(QName::local("Missing")),
        ));
        assert!(matches!(schema.check(), Err(Error::UnknownType(_))));

        let schema = Schema::new(None).with_element(
            ElementDecl::untyped(QName::local("a")).substitutes(QName::local("nope")),
        );
        assert!(matches!(schema.check(), Err(Error::UnknownElement(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let schema = formula_schema();
        let json = schema.to_json().unwrap();
        let back = Schema::from_json_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_json_rejects_bad_occurs() {
        let json = r#"{
            "elements": [{
                "name": "root",
                "type": {"anonymous": {"complex": {
                    "content": {"elements": {
                        "term": {"element_ref": "root"},
                        "occurs": {"min": 2, "max": 1}
                    }}
                }}}
            }]
        }"#;
        assert!(Schema::from_json_str(json).is_err());
    }
}

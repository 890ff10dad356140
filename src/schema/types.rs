//! Simple and complex type definitions
//!
//! Content models are stored expanded: a complex type derived by extension
//! carries its full particle and attribute list, and `base` is kept only to
//! answer derivation questions (`xsi:type` substitution).

use crate::error::{Error, Result};
use crate::namespaces::QName;
use serde::{Deserialize, Serialize};

use super::elements::AttributeDecl;
use super::facets::FacetSet;
use super::particles::Particle;

/// Reference to a type: by name, or an anonymous inline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// Named type (XSD namespace means a built-in)
    Named(QName),
    /// Anonymous type definition
    Anonymous(Box<TypeDefinition>),
}

impl TypeRef {
    /// Reference a named type
    pub fn named(name: QName) -> Self {
        TypeRef::Named(name)
    }

    /// Reference a built-in type by local name (`"string"`, `"int"`, ...)
    pub fn builtin(local_name: &str) -> Self {
        TypeRef::Named(QName::xsd(local_name))
    }

    /// Inline a simple type
    pub fn simple(ty: SimpleType) -> Self {
        TypeRef::Anonymous(Box::new(TypeDefinition::Simple(ty)))
    }

    /// Inline a complex type
    pub fn complex(ty: ComplexType) -> Self {
        TypeRef::Anonymous(Box::new(TypeDefinition::Complex(ty)))
    }

    /// Name of a named reference
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Anonymous(_) => None,
        }
    }

    /// Human readable label for messages
    pub fn label(&self) -> String {
        match self {
            TypeRef::Named(name) => name.to_string(),
            TypeRef::Anonymous(def) => def.label(),
        }
    }
}

/// Type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDefinition {
    /// Simple type
    Simple(SimpleType),
    /// Complex type
    Complex(ComplexType),
}

impl TypeDefinition {
    /// Name of the definition, if it is global
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeDefinition::Simple(st) => st.name.as_ref(),
            TypeDefinition::Complex(ct) => ct.name.as_ref(),
        }
    }

    /// Human readable label for messages
    pub fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => match self {
                TypeDefinition::Simple(_) => "anonymous simple type".to_string(),
                TypeDefinition::Complex(_) => "anonymous complex type".to_string(),
            },
        }
    }

    /// Whether this is an abstract complex type
    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeDefinition::Complex(ct) if ct.is_abstract)
    }

    /// Check structural invariants
    pub fn check(&self) -> Result<()> {
        match self {
            TypeDefinition::Simple(st) => st.check(),
            TypeDefinition::Complex(ct) => ct.check(),
        }
    }
}

/// How a simple type is derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleDerivation {
    /// Restriction of a base type by facets
    Restriction(TypeRef),
    /// Whitespace-separated list of an item type
    List(TypeRef),
    /// Union of member types
    Union(Vec<TypeRef>),
}

/// Simple type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleType {
    /// Name (None for anonymous types)
    #[serde(default)]
    pub name: Option<QName>,
    /// Derivation
    pub derivation: SimpleDerivation,
    /// Facets added at this derivation step
    #[serde(default)]
    pub facets: FacetSet,
}

impl SimpleType {
    /// Restrict a base type with facets
    pub fn restriction(base: TypeRef, facets: FacetSet) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::Restriction(base),
            facets,
        }
    }

    /// List of an item type
    pub fn list(item: TypeRef) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::List(item),
            facets: FacetSet::default(),
        }
    }

    /// Union of member types
    pub fn union(members: Vec<TypeRef>) -> Self {
        Self {
            name: None,
            derivation: SimpleDerivation::Union(members),
            facets: FacetSet::default(),
        }
    }

    /// Give the type a global name
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Add facets at this derivation step
    pub fn with_facets(mut self, facets: FacetSet) -> Self {
        self.facets = facets;
        self
    }

    fn check(&self) -> Result<()> {
        if let SimpleDerivation::Union(members) = &self.derivation {
            if members.is_empty() {
                return Err(Error::Schema(format!(
                    "union {} has no member types",
                    self.name.as_ref().map(|n| n.to_string()).unwrap_or_default()
                )));
            }
        }
        Ok(())
    }
}

/// Content of a complex type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentModel {
    /// No content
    #[default]
    Empty,
    /// Text content of a simple type
    Simple(TypeRef),
    /// Element content described by a particle
    Elements(Particle),
}

/// Complex type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    /// Name (None for anonymous types)
    #[serde(default)]
    pub name: Option<QName>,
    /// Base type this one is derived from
    #[serde(default)]
    pub base: Option<QName>,
    /// Abstract types never appear without an `xsi:type` replacement
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Whether text may be interleaved with element content
    #[serde(default)]
    pub mixed: bool,
    /// Content model
    #[serde(default)]
    pub content: ContentModel,
    /// Attribute uses
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
}

impl ComplexType {
    /// Complex type with the given content
    pub fn new(content: ContentModel) -> Self {
        Self {
            name: None,
            base: None,
            is_abstract: false,
            mixed: false,
            content,
            attributes: Vec::new(),
        }
    }

    /// Complex type with element content
    pub fn elements(particle: Particle) -> Self {
        Self::new(ContentModel::Elements(particle))
    }

    /// Complex type with simple content
    pub fn simple_content(type_ref: TypeRef) -> Self {
        Self::new(ContentModel::Simple(type_ref))
    }

    /// Empty complex type
    pub fn empty() -> Self {
        Self::new(ContentModel::Empty)
    }

    /// Give the type a global name
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Record the base type
    pub fn derived_from(mut self, base: QName) -> Self {
        self.base = Some(base);
        self
    }

    /// Mark as abstract
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Allow mixed content
    pub fn mixed(mut self) -> Self {
        self.mixed = true;
        self
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn check(&self) -> Result<()> {
        if let ContentModel::Elements(particle) = &self.content {
            particle.check()?;
        }
        let mut seen = std::collections::HashSet::new();
        for attr in &self.attributes {
            if !seen.insert(&attr.name) {
                return Err(Error::Schema(format!("duplicate attribute '{}'", attr.name)));
            }
        }
        Ok(())
    }
}

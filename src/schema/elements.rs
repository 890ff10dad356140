//! Element and attribute declarations
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Element_Declarations

use crate::error::{Error, Result};
use crate::names::is_valid_ncname;
use crate::namespaces::QName;
use serde::{Deserialize, Serialize};

use super::types::TypeRef;

/// Element declaration (global or local)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDecl {
    /// Element name
    pub name: QName,
    /// Declared type; `None` means the type of the substitution group head,
    /// or `xs:anyType` when there is no head
    #[serde(default, rename = "type")]
    pub type_ref: Option<TypeRef>,
    /// Abstract elements never appear in instances
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Head of the substitution group this element belongs to
    #[serde(default)]
    pub substitution_group: Option<QName>,
    /// Fixed value of simple content
    #[serde(default)]
    pub fixed: Option<String>,
}

impl ElementDecl {
    /// Create an element declaration of the given type
    pub fn new(name: QName, type_ref: TypeRef) -> Self {
        Self {
            name,
            type_ref: Some(type_ref),
            is_abstract: false,
            substitution_group: None,
            fixed: None,
        }
    }

    /// Create an untyped element declaration
    pub fn untyped(name: QName) -> Self {
        Self {
            name,
            type_ref: None,
            is_abstract: false,
            substitution_group: None,
            fixed: None,
        }
    }

    /// Mark as abstract
    pub fn abstract_element(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Join a substitution group
    pub fn substitutes(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Set a fixed value
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    /// Check the declaration's own invariants
    pub fn check(&self) -> Result<()> {
        if !is_valid_ncname(&self.name.local_name) {
            return Err(Error::Name(format!(
                "invalid element name '{}'",
                self.name.local_name
            )));
        }
        if let Some(TypeRef::Anonymous(def)) = &self.type_ref {
            def.check()?;
        }
        Ok(())
    }
}

/// Attribute use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeUse {
    /// Attribute is optional
    #[default]
    Optional,
    /// Attribute is required
    Required,
    /// Attribute is prohibited
    Prohibited,
}

/// Attribute declaration as used by a complex type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDecl {
    /// Attribute name
    pub name: QName,
    /// Simple type of the value
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    /// Use
    #[serde(default, rename = "use")]
    pub use_: AttributeUse,
    /// Fixed value
    #[serde(default)]
    pub fixed: Option<String>,
    /// Default value (not emitted by the generator; informational)
    #[serde(default)]
    pub default: Option<String>,
}

impl AttributeDecl {
    /// Optional attribute
    pub fn new(name: QName, type_ref: TypeRef) -> Self {
        Self {
            name,
            type_ref,
            use_: AttributeUse::Optional,
            fixed: None,
            default: None,
        }
    }

    /// Make the attribute required
    pub fn required(mut self) -> Self {
        self.use_ = AttributeUse::Required;
        self
    }

    /// Make the attribute prohibited
    pub fn prohibited(mut self) -> Self {
        self.use_ = AttributeUse::Prohibited;
        self
    }

    /// Set a fixed value
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    /// Whether the attribute must appear
    pub fn is_required(&self) -> bool {
        self.use_ == AttributeUse::Required
    }
}

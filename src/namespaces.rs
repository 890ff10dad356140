//! XML namespace handling
//!
//! This module provides qualified names (QNames) and the scoped prefix
//! mappings used when instances are serialized to and parsed from XML text.

use crate::error::{Error, Result};
use crate::names::{split_qname, validate_ncname};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace (`xsi:type`, `xsi:nil`)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace (`xml:lang`)
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Qualified name (QName) - combination of namespace and local name
///
/// Serialized in Clark notation: `{namespace}local` or `local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()).filter(|s: &String| !s.is_empty()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(Some(namespace), local_name)
    }

    /// Create a QName in the XSD namespace (built-in types)
    pub fn xsd(local_name: impl Into<String>) -> Self {
        Self::namespaced(XSD_NAMESPACE, local_name)
    }

    /// Namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether this name lives in the XSD namespace
    pub fn is_xsd(&self) -> bool {
        self.namespace() == Some(XSD_NAMESPACE)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

impl FromStr for QName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix('{') {
            let (ns, local) = rest
                .split_once('}')
                .ok_or_else(|| Error::Name(format!("Unterminated namespace in '{}'", s)))?;
            if local.is_empty() {
                return Err(Error::Name(format!("Missing local name in '{}'", s)));
            }
            Ok(QName::new(Some(ns), local))
        } else if s.is_empty() {
            Err(Error::Name("Empty qualified name".to_string()))
        } else {
            Ok(QName::local(s))
        }
    }
}

impl TryFrom<String> for QName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(value: QName) -> Self {
        value.to_string()
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix); `Some("")` undeclares it
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Whether this context declares nothing
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }
}

/// Stack of nested namespace contexts, innermost last
#[derive(Debug, Clone, Default)]
pub struct NamespaceScopes {
    scopes: Vec<NamespaceContext>,
}

impl NamespaceScopes {
    /// Create an empty scope stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an element's scope
    pub fn push(&mut self, context: NamespaceContext) {
        self.scopes.push(context);
    }

    /// Leave the innermost scope
    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    fn lookup_prefix(&self, prefix: &str) -> Result<&str> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE);
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|ctx| ctx.get_namespace(prefix))
            .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))
    }

    fn default_namespace(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|ctx| ctx.get_default_namespace())
            .filter(|ns| !ns.is_empty())
    }

    /// Resolve an element name; unprefixed names take the default namespace
    pub fn resolve_element(&self, prefixed_name: &str) -> Result<QName> {
        let (prefix, local) = split_qname(prefixed_name);
        validate_ncname(local)?;
        match prefix {
            Some(prefix) => Ok(QName::namespaced(self.lookup_prefix(prefix)?, local)),
            None => Ok(QName::new(self.default_namespace(), local)),
        }
    }

    /// Resolve an attribute name; unprefixed attributes have no namespace
    pub fn resolve_attribute(&self, prefixed_name: &str) -> Result<QName> {
        let (prefix, local) = split_qname(prefixed_name);
        validate_ncname(local)?;
        match prefix {
            Some(prefix) => Ok(QName::namespaced(self.lookup_prefix(prefix)?, local)),
            None => Ok(QName::local(local)),
        }
    }
}

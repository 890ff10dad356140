//! Element generator overrides
//!
//! A [`CustomGenerators`] value maps qualified element names to generators
//! supplied by the caller. It is owned by the caller and handed to
//! [`ElementGenerator::new`](super::ElementGenerator::new); nothing is
//! registered globally.

use crate::documents::Element;
use crate::namespaces::QName;
use indexmap::IndexMap;
use std::fmt;

use super::Gen;

/// Caller-owned table of element overrides
#[derive(Clone, Default)]
pub struct CustomGenerators {
    entries: IndexMap<QName, Gen<Element>>,
}

impl CustomGenerators {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn for_element(mut self, name: QName, generator: Gen<Element>) -> Self {
        self.register(name, generator);
        self
    }

    /// Register an override, replacing any previous one for `name`
    pub fn register(&mut self, name: QName, generator: Gen<Element>) -> Option<Gen<Element>> {
        tracing::debug!(element = %name, "registered element override");
        self.entries.insert(name, generator)
    }

    /// Override registered for `name`
    pub fn lookup(&self, name: &QName) -> Option<&Gen<Element>> {
        self.entries.get(name)
    }

    /// Names with an override, in registration order
    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.entries.keys()
    }

    /// Number of overrides
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no override is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CustomGenerators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomGenerators")
            .field("elements", &self.entries.keys().map(|n| n.to_string()).collect::<Vec<_>>())
            .finish()
    }
}

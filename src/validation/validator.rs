//! Reference schema validator
//!
//! Checks an instance against the same [`SchemaModel`] the generator reads:
//! root declaration, `xsi:type` derivation, attribute uses, simple values and
//! element content. Errors are collected rather than returned on the first
//! mismatch, so one run reports every problem with its path.

use crate::documents::Element;
use crate::error::ValidationError;
use crate::namespaces::{QName, XML_NAMESPACE, XSI_NAMESPACE};
use crate::schema::{
    resolve_simple_type, AttributeUse, ComplexType, ContentModel, ElementDecl, ProcessContents,
    ResolvedSimpleType, SchemaModel, TypeDefinition, TypeRef,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::content::{Binding, ContentMatcher};
use super::{ValidationOutcome, Validator};

/// Validator for instances of a schema
pub struct SchemaValidator<S: SchemaModel> {
    schema: S,
    simple_types: Mutex<HashMap<QName, Arc<ResolvedSimpleType>>>,
}

/// What an element's effective type turned out to be
enum Resolved<'s> {
    Any,
    Simple(TypeRef),
    Complex(&'s ComplexType),
}

impl<S: SchemaModel> SchemaValidator<S> {
    /// Validator for `schema`
    pub fn new(schema: S) -> Self {
        Self {
            schema,
            simple_types: Mutex::new(HashMap::new()),
        }
    }

    /// The schema instances are checked against
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Every error found in `instance`, in document order
    pub fn errors(&self, instance: &Element) -> Vec<ValidationError> {
        let mut run = Run {
            validator: self,
            errors: Vec::new(),
        };
        let path = format!("/{}", instance.local_name());
        match self.schema.global_element(&instance.name) {
            Some(decl) => run.element(instance, decl, &path),
            None => run.fail(
                &path,
                format!("no global declaration for element '{}'", instance.name),
            ),
        }
        tracing::debug!(root = %instance.name, errors = run.errors.len(), "validated instance");
        run.errors
    }

    /// Whether `instance` is valid
    pub fn is_valid(&self, instance: &Element) -> bool {
        self.errors(instance).is_empty()
    }

    fn simple_type(&self, type_ref: &TypeRef) -> crate::Result<Arc<ResolvedSimpleType>> {
        let name = match type_ref {
            TypeRef::Named(name) => name,
            TypeRef::Anonymous(_) => {
                return Ok(Arc::new(resolve_simple_type(&self.schema, type_ref)?))
            }
        };
        let mut cache = self.simple_types.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(resolved) = cache.get(name) {
            return Ok(Arc::clone(resolved));
        }
        let resolved = Arc::new(resolve_simple_type(&self.schema, type_ref)?);
        cache.insert(name.clone(), Arc::clone(&resolved));
        Ok(resolved)
    }
}

impl<S: SchemaModel> Validator for SchemaValidator<S> {
    fn validate(&self, instance: &Element) -> ValidationOutcome {
        ValidationOutcome::from_errors(self.errors(instance))
    }
}

struct Run<'v, S: SchemaModel> {
    validator: &'v SchemaValidator<S>,
    errors: Vec<ValidationError>,
}

impl<'v, S: SchemaModel> Run<'v, S> {
    fn schema(&self) -> &'v S {
        &self.validator.schema
    }

    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationError::new(message).with_path(path));
    }

    fn element(&mut self, element: &Element, decl: &ElementDecl, path: &str) {
        if decl.is_abstract {
            let message = format!("abstract element '{}' cannot appear in an instance", decl.name);
            self.fail(path, message);
            return;
        }
        let declared = self.schema().element_type(decl);
        let effective = match &element.xsi_type {
            None => declared,
            Some(xsi_type) => match self.xsi_type(xsi_type, &declared) {
                Ok(()) => TypeRef::Named(xsi_type.clone()),
                Err(message) => {
                    self.fail(path, message);
                    return;
                }
            },
        };
        match self.resolve(&effective) {
            Ok(Resolved::Any) => {}
            Ok(Resolved::Simple(type_ref)) => {
                self.no_child_elements(element, path);
                self.foreign_attributes(element, &[], path);
                self.value(&element.text(), &type_ref, decl.fixed.as_deref(), path);
            }
            Ok(Resolved::Complex(ct)) => self.complex(element, ct, decl.fixed.as_deref(), path),
            Err(message) => self.fail(path, message),
        }
    }

    fn xsi_type(&self, xsi_type: &QName, declared: &TypeRef) -> Result<(), String> {
        let known = xsi_type.is_xsd() || self.schema().type_definition(xsi_type).is_some();
        if !known {
            return Err(format!("xsi:type '{}' is not a known type", xsi_type));
        }
        match declared {
            TypeRef::Named(base) if base.is_xsd() && base.local_name == "anyType" => Ok(()),
            TypeRef::Named(base) if self.schema().is_derived_from(xsi_type, base) => Ok(()),
            _ => Err(format!(
                "xsi:type '{}' is not derived from the declared type {}",
                xsi_type,
                declared.label()
            )),
        }
    }

    fn resolve<'t>(&self, type_ref: &'t TypeRef) -> Result<Resolved<'t>, String>
    where
        'v: 't,
    {
        let schema = self.schema();
        let definition = match type_ref {
            TypeRef::Named(name) if name.is_xsd() => {
                return Ok(if name.local_name == "anyType" {
                    Resolved::Any
                } else {
                    Resolved::Simple(type_ref.clone())
                });
            }
            TypeRef::Named(name) => schema
                .type_definition(name)
                .ok_or_else(|| format!("unknown type '{}'", name))?,
            TypeRef::Anonymous(def) => def.as_ref(),
        };
        match definition {
            TypeDefinition::Simple(_) => Ok(Resolved::Simple(type_ref.clone())),
            TypeDefinition::Complex(ct) => Ok(Resolved::Complex(ct)),
        }
    }

    fn complex(&mut self, element: &Element, ct: &ComplexType, fixed: Option<&str>, path: &str) {
        if ct.is_abstract {
            let name = ct.name.as_ref().map(|n| n.to_string()).unwrap_or_default();
            let message = format!("type '{}' is abstract and needs an xsi:type replacement", name);
            self.fail(path, message);
            return;
        }
        self.attributes(element, ct, path);
        match &ct.content {
            ContentModel::Empty => {
                self.no_child_elements(element, path);
                if !ct.mixed && element.has_significant_text() {
                    self.fail(path, "element must be empty");
                }
            }
            ContentModel::Simple(type_ref) => {
                self.no_child_elements(element, path);
                self.value(&element.text(), type_ref, fixed, path);
            }
            ContentModel::Elements(particle) => {
                if !ct.mixed && element.has_significant_text() {
                    self.fail(path, "text is not allowed in element-only content");
                }
                let children: Vec<&Element> = element.child_elements().collect();
                match ContentMatcher::new(self.schema(), children.clone()).run(particle) {
                    Ok(bindings) => {
                        for (index, (child, binding)) in children.iter().zip(bindings).enumerate() {
                            let child_path = child_path(path, &children, index);
                            self.child(child, binding, &child_path);
                        }
                    }
                    Err(message) => {
                        self.errors.push(
                            ValidationError::new("content does not match the content model")
                                .with_path(path)
                                .with_reason(message),
                        );
                    }
                }
            }
        }
    }

    fn child(&mut self, child: &Element, binding: Binding, path: &str) {
        match binding {
            Binding::Element(decl) => self.element(child, &decl, path),
            Binding::Wildcard(ProcessContents::Skip) => {}
            Binding::Wildcard(process) => match self.schema().global_element(&child.name) {
                Some(decl) => self.element(child, decl, path),
                None if process == ProcessContents::Strict => {
                    let message =
                        format!("no global declaration for wildcard element '{}'", child.name);
                    self.fail(path, message);
                }
                None => {}
            },
        }
    }

    fn attributes(&mut self, element: &Element, ct: &ComplexType, path: &str) {
        for attr in &ct.attributes {
            let present = element.attributes.get(&attr.name);
            match (attr.use_, present) {
                (AttributeUse::Prohibited, Some(_)) => {
                    self.fail(path, format!("attribute '{}' is prohibited", attr.name));
                }
                (AttributeUse::Required, None) => {
                    self.fail(path, format!("missing required attribute '{}'", attr.name));
                }
                (_, Some(value)) => {
                    let attr_path = format!("{}/@{}", path, attr.name.local_name);
                    self.value(value, &attr.type_ref, attr.fixed.as_deref(), &attr_path);
                }
                (_, None) => {}
            }
        }
        let declared: Vec<&QName> = ct.attributes.iter().map(|a| &a.name).collect();
        self.foreign_attributes(element, &declared, path);
    }

    fn foreign_attributes(&mut self, element: &Element, declared: &[&QName], path: &str) {
        for name in element.attributes.keys() {
            let reserved = matches!(name.namespace(), Some(XSI_NAMESPACE) | Some(XML_NAMESPACE));
            if !reserved && !declared.contains(&name) {
                self.fail(path, format!("undeclared attribute '{}'", name));
            }
        }
    }

    fn no_child_elements(&mut self, element: &Element, path: &str) {
        if let Some(child) = element.child_elements().next() {
            self.fail(path, format!("unexpected child element '{}' in simple content", child.name));
        }
    }

    fn value(&mut self, text: &str, type_ref: &TypeRef, fixed: Option<&str>, path: &str) {
        let resolved = match self.validator.simple_type(type_ref) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.fail(path, e.to_string());
                return;
            }
        };
        if let Err(reason) = resolved.validate(text) {
            self.errors.push(
                ValidationError::new(format!("invalid value for {}", resolved.name))
                    .with_path(path)
                    .with_reason(reason),
            );
            return;
        }
        if let Some(fixed) = fixed {
            let ws = resolved.white_space();
            if ws.normalize(text) != ws.normalize(fixed) {
                let message = format!("value '{}' differs from the fixed value '{}'", text, fixed);
                self.fail(path, message);
            }
        }
    }
}

fn child_path(parent: &str, siblings: &[&Element], index: usize) -> String {
    let name = &siblings[index].name;
    let same = siblings.iter().filter(|s| &s.name == name).count();
    if same > 1 {
        let position = siblings[..index].iter().filter(|s| &s.name == name).count() + 1;
        format!("{}/{}[{}]", parent, name.local_name, position)
    } else {
        format!("{}/{}", parent, name.local_name)
    }
}

//! XML instance trees
//!
//! Generated samples are materialized as [`Element`] trees. They can be
//! written to XML text and parsed back, which is what the round-trip checker
//! uses to make sure a sample survives serialization unchanged.

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, NamespaceScopes, QName, XML_NAMESPACE, XSI_NAMESPACE};
use indexmap::IndexMap;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::fmt;

/// Content node of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Child element
    Element(Element),
    /// Character data
    Text(String),
}

/// XML Element in an instance tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element qualified name
    pub name: QName,
    /// Attributes in emission order
    pub attributes: IndexMap<QName, String>,
    /// Explicit `xsi:type`, when the element carries a derived type
    pub xsi_type: Option<QName>,
    /// Child content in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Create a new element
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: IndexMap::new(),
            xsi_type: None,
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value.into());
        self
    }

    /// Builder-style text setter
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Builder-style child setter
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Append character data, merging with a preceding text node
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(&text);
        } else {
            self.children.push(Node::Text(text));
        }
    }

    /// Append a child element
    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Get an attribute value by local name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.child_elements()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Concatenated character data directly under this element
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Whether any direct child is non-whitespace text
    pub fn has_significant_text(&self) -> bool {
        self.children.iter().any(|node| match node {
            Node::Text(t) => !t.trim().is_empty(),
            Node::Element(_) => false,
        })
    }

    /// Number of elements in this tree, including self
    pub fn element_count(&self) -> usize {
        1 + self.child_elements().map(Element::element_count).sum::<usize>()
    }

    /// Nesting depth of this tree; a leaf has depth 1
    pub fn depth(&self) -> usize {
        1 + self.child_elements().map(Element::depth).max().unwrap_or(0)
    }

    /// Visit every element of the tree, depth first
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for child in self.child_elements() {
            child.walk(f);
        }
    }

    /// Serialize to XML text
    pub fn to_xml(&self) -> Result<String> {
        let prefixes = PrefixMap::collect(self);
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self, &prefixes, true)?;
        String::from_utf8(writer.into_inner()).map_err(|e| Error::Xml(e.to_string()))
    }

    /// Parse XML text into an element tree
    pub fn from_xml(xml: &str) -> Result<Element> {
        parse_document(xml)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_xml() {
            Ok(xml) => f.write_str(&xml),
            Err(_) => write!(f, "<{}/>", self.name),
        }
    }
}

// =============================================================================
// Serialization
// =============================================================================

/// Namespace to prefix assignment, declared once on the root element
struct PrefixMap {
    prefixes: IndexMap<String, String>,
}

impl PrefixMap {
    fn collect(root: &Element) -> Self {
        let mut prefixes = IndexMap::new();
        let mut add = |ns: Option<&str>| {
            if let Some(ns) = ns {
                if ns == XML_NAMESPACE || prefixes.contains_key(ns) {
                    return;
                }
                let prefix = if ns == XSI_NAMESPACE {
                    "xsi".to_string()
                } else {
                    format!("ns{}", prefixes.len())
                };
                prefixes.insert(ns.to_string(), prefix);
            }
        };
        root.walk(&mut |e| {
            add(e.name.namespace());
            for name in e.attributes.keys() {
                add(name.namespace());
            }
            if let Some(ty) = &e.xsi_type {
                add(Some(XSI_NAMESPACE));
                add(ty.namespace());
            }
        });
        Self { prefixes }
    }

    fn prefixed(&self, name: &QName) -> String {
        match name.namespace() {
            Some(XML_NAMESPACE) => format!("xml:{}", name.local_name),
            Some(ns) => match self.prefixes.get(ns) {
                Some(prefix) => format!("{}:{}", prefix, name.local_name),
                None => name.local_name.clone(),
            },
            None => name.local_name.clone(),
        }
    }
}

fn escape_attribute(value: &str) -> String {
    quick_xml::escape::escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}

fn escape_text(value: &str) -> String {
    quick_xml::escape::escape(value).replace('\r', "&#13;")
}

fn push_raw_attribute(start: &mut BytesStart<'_>, key: &str, escaped: String) {
    start.push_attribute(Attribute {
        key: quick_xml::name::QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    });
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    prefixes: &PrefixMap,
    is_root: bool,
) -> Result<()> {
    let tag = prefixes.prefixed(&element.name);
    let mut start = BytesStart::new(tag.clone());

    if is_root {
        for (ns, prefix) in &prefixes.prefixes {
            push_raw_attribute(&mut start, &format!("xmlns:{}", prefix), escape_attribute(ns));
        }
    }
    if let Some(ty) = &element.xsi_type {
        let value = prefixes.prefixed(ty);
        push_raw_attribute(&mut start, "xsi:type", escape_attribute(&value));
    }
    for (name, value) in &element.attributes {
        push_raw_attribute(&mut start, &prefixes.prefixed(name), escape_attribute(value));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::Xml(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::Xml(e.to_string()))?;
    for node in &element.children {
        match node {
            Node::Element(child) => write_element(writer, child, prefixes, false)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::from_escaped(escape_text(text))))
                .map_err(|e| Error::Xml(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| Error::Xml(e.to_string()))
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut scopes = NamespaceScopes::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = open_element(&e, &mut scopes)?;
                stack.push(element);
            }
            Ok(Event::Empty(e)) => {
                let element = open_element(&e, &mut scopes)?;
                scopes.pop();
                attach(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                scopes.pop();
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("unbalanced end tag".to_string()))?;
                attach(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                match stack.last_mut() {
                    Some(current) => current.push_text(text.into_owned()),
                    None if text.trim().is_empty() => {}
                    None => return Err(Error::Xml("text outside the root element".to_string())),
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| Error::Xml(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.push_text(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "Error parsing XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {} // Ignore other events (comments, processing instructions, etc.)
        }
    }

    if !stack.is_empty() {
        return Err(Error::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| Error::Xml("document has no root element".to_string()))
}

fn attach(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_child(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::Xml("multiple root elements".to_string())),
    }
}

/// Parse a start tag, pushing its namespace scope
fn open_element(start: &BytesStart<'_>, scopes: &mut NamespaceScopes) -> Result<Element> {
    let mut context = NamespaceContext::new();
    let mut raw_attributes = Vec::new();

    for attr_result in start.attributes() {
        let attr =
            attr_result.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
            .into_owned();

        if key == "xmlns" {
            context.set_default_namespace(value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            context.add_prefix(prefix, value);
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.push(context);

    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
        .to_string();
    let mut element = Element::new(scopes.resolve_element(&name)?);

    for (key, value) in raw_attributes {
        let qname = scopes.resolve_attribute(&key)?;
        if qname.namespace() == Some(XSI_NAMESPACE) && qname.local_name == "type" {
            element.xsi_type = Some(scopes.resolve_element(value.trim())?);
        } else {
            element.attributes.insert(qname, value);
        }
    }
    Ok(element)
}

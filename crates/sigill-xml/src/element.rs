#![forbid(unsafe_code)]

//! An owned, mutable XML element tree.
//!
//! `roxmltree` documents are read-only; this tree is the mutable
//! counterpart used to build Signature elements, detach subtrees and hand
//! verified referents back to callers.  Attributes keep their qualified
//! names and source order; namespace declarations are ordinary `xmlns`
//! attributes, as in the documents they came from.

use crate::nodeset::NodeSet;
use crate::qname;
use sigill_core::Error;

/// A child node of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Pi { target: String, data: Option<String> },
}

/// An attribute with its qualified name (e.g. `URI`, `xml:lang`, `xmlns:ds`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// An owned XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    prefix: Option<String>,
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Create an empty element.  An empty `prefix` means no prefix.
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            prefix: if prefix.is_empty() {
                None
            } else {
                Some(prefix.to_owned())
            },
            name: name.to_owned(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The element's prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The element's local name.
    pub fn local_name(&self) -> &str {
        &self.name
    }

    /// The qualified tag name (`prefix:name` or `name`).
    pub fn tag(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.name),
            None => self.name.clone(),
        }
    }

    /// Get an attribute value by qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing any existing one with the same name.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) {
            existing.value = value.to_owned();
        } else {
            self.attributes.push(Attribute {
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }
    }

    /// Remove an attribute by qualified name.  Returns whether it existed.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name != name);
        self.attributes.len() != before
    }

    /// All attributes in source/insertion order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Namespace declarations carried by this element, as (prefix, uri)
    /// pairs; the default namespace has the empty prefix.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().filter_map(|a| {
            if a.name == "xmlns" {
                Some(("", a.value.as_str()))
            } else {
                a.name
                    .strip_prefix("xmlns:")
                    .map(|p| (p, a.value.as_str()))
            }
        })
    }

    /// Child nodes in document order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Append a child element.
    pub fn append_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append a text node.
    pub fn append_text(&mut self, text: &str) {
        self.children.push(Node::Text(text.to_owned()));
    }

    /// Replace the element's content with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        self.children.push(Node::Text(text.to_owned()));
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Find the first child element with the given local name.
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == local_name)
    }

    /// Parse a document and convert its root element into an owned tree.
    pub fn parse(xml: &str) -> Result<Element, Error> {
        let doc = roxmltree::Document::parse_with_options(xml, crate::parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        Self::from_node(doc.root_element())
    }

    /// Convert a parsed element (and its subtree) into an owned tree.
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Result<Element, Error> {
        convert(node, None)
    }

    /// Convert a parsed element, keeping only descendants in the node set.
    pub fn from_node_filtered(
        node: roxmltree::Node<'_, '_>,
        set: &NodeSet,
    ) -> Result<Element, Error> {
        convert(node, Some(set))
    }

    /// Serialize the element subtree to an XML string.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        let tag = self.tag();
        out.push('<');
        out.push_str(&tag);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            escape_attr_into(&attr.value, out);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_into(out),
                Node::Text(t) => escape_text_into(t, out),
                Node::Comment(t) => {
                    out.push_str("<!--");
                    out.push_str(t);
                    out.push_str("-->");
                }
                Node::Pi { target, data } => {
                    out.push_str("<?");
                    out.push_str(target);
                    if let Some(d) = data {
                        if !d.is_empty() {
                            out.push(' ');
                            out.push_str(d);
                        }
                    }
                    out.push_str("?>");
                }
            }
        }
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

fn convert(node: roxmltree::Node<'_, '_>, filter: Option<&NodeSet>) -> Result<Element, Error> {
    if !node.is_element() {
        return Err(Error::XmlStructure("node is not an element".into()));
    }
    let (qname, tokens) = qname::start_tag(node)?;
    let (prefix, local) = match qname.split_once(':') {
        Some((p, l)) => (p, l),
        None => ("", qname.as_str()),
    };
    let mut el = Element::new(prefix, local);

    for token in &tokens {
        if token.qname == "xmlns" || token.qname.starts_with("xmlns:") {
            let decl_prefix = token.qname.strip_prefix("xmlns:").unwrap_or("");
            let uri = lookup_declared_uri(node, decl_prefix);
            el.set_attr(&token.qname, &uri);
        } else {
            let value = lookup_attr_value(node, &token.qname)?;
            el.set_attr(&token.qname, &value);
        }
    }

    for child in node.children() {
        if let Some(set) = filter {
            if !set.contains(&child) {
                continue;
            }
        }
        match child.node_type() {
            roxmltree::NodeType::Element => {
                el.children.push(Node::Element(convert(child, filter)?));
            }
            roxmltree::NodeType::Text => {
                el.children
                    .push(Node::Text(child.text().unwrap_or("").to_owned()));
            }
            roxmltree::NodeType::Comment => {
                el.children
                    .push(Node::Comment(child.text().unwrap_or("").to_owned()));
            }
            roxmltree::NodeType::PI => {
                if let Some(pi) = child.pi() {
                    el.children.push(Node::Pi {
                        target: pi.target.to_owned(),
                        data: pi.value.map(|v| v.to_owned()),
                    });
                }
            }
            roxmltree::NodeType::Root => {}
        }
    }
    Ok(el)
}

/// The URI a declaration on this element binds, or "" for an undeclaration.
fn lookup_declared_uri(node: roxmltree::Node<'_, '_>, prefix: &str) -> String {
    let found = if prefix.is_empty() {
        node.namespaces().find(|d| d.name().is_none())
    } else {
        node.namespaces().find(|d| d.name() == Some(prefix))
    };
    found.map(|d| d.uri().to_owned()).unwrap_or_default()
}

fn lookup_attr_value(node: roxmltree::Node<'_, '_>, qname: &str) -> Result<String, Error> {
    let value = match qname.split_once(':') {
        None => node.attribute(qname),
        Some((prefix, local)) => {
            let uri = qname::resolve_prefix(node, prefix).ok_or_else(|| {
                Error::XmlStructure(format!("unbound attribute prefix: {prefix}"))
            })?;
            node.attribute((uri.as_str(), local))
        }
    };
    value
        .map(ToOwned::to_owned)
        .ok_or_else(|| Error::XmlStructure(format!("attribute {qname} not found")))
}

fn escape_text_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

/// True when an attribute qualified name is a namespace declaration.
pub fn is_ns_decl(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

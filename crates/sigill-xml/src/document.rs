#![forbid(unsafe_code)]

//! Parsing helpers, ID maps and element lookup shared by signing and
//! validation.

use sigill_core::Error;
use std::collections::HashMap;

/// Parse a document with the library's parsing options.
pub fn parse(xml: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse_with_options(xml, crate::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))
}

/// Build the ID → node mapping for the configured ID attribute.
///
/// Duplicate values are rejected outright: signature-wrapping attacks
/// rely on a second element claiming the ID of the signed one.
pub fn build_id_map(
    doc: &roxmltree::Document<'_>,
    id_attr: &str,
) -> Result<HashMap<String, roxmltree::NodeId>, Error> {
    let mut map = HashMap::new();
    for node in doc.descendants() {
        if !node.is_element() {
            continue;
        }
        if let Some(value) = node.attribute(id_attr) {
            if map.insert(value.to_owned(), node.id()).is_some() {
                return Err(Error::DuplicateId(value.to_owned()));
            }
        }
    }
    Ok(map)
}

/// Parse a same-document reference (`#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#')
}

/// Resolve an ID value against a pre-built ID map.
pub fn resolve_id<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    id_map: &HashMap<String, roxmltree::NodeId>,
    id: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    id_map
        .get(id)
        .and_then(|nid| doc.get_node(*nid))
        .ok_or_else(|| Error::MissingId(id.to_owned()))
}

/// Find the first descendant element with the given namespace and local name.
pub fn find_element<'a, 'input>(
    scope: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    scope.descendants().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

/// Find all descendant elements with the given namespace and local name.
pub fn find_elements<'a, 'input>(
    scope: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    scope
        .descendants()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .collect()
}

/// Find the first direct child element with the given namespace and local name.
pub fn find_child_element<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

/// Find all direct child elements with the given namespace and local name.
pub fn find_child_elements<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .collect()
}

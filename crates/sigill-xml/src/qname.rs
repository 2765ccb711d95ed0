#![forbid(unsafe_code)]

//! Qualified-name recovery from the document source.
//!
//! `roxmltree` resolves names to (namespace, local) pairs; canonicalization
//! and element cloning need the prefixes exactly as written.  The start tag
//! of every element is re-tokenized from the input text, which recovers the
//! qualified names unambiguously even when several prefixes are bound to
//! the same URI.

use sigill_core::{ns, Error};

/// One `name="value"` token of a start tag.  The value is the raw source
/// text between the quotes (entities unresolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTagAttr {
    pub qname: String,
    pub raw_value: String,
}

/// Tokenize the start tag of an element node from the document source.
///
/// Returns the element's qualified name and its attributes (namespace
/// declarations included) in source order.
pub fn start_tag(node: roxmltree::Node<'_, '_>) -> Result<(String, Vec<StartTagAttr>), Error> {
    debug_assert!(node.is_element());
    let text = node.document().input_text();
    let src = &text[node.range().start..];

    let bytes = src.as_bytes();
    if bytes.first() != Some(&b'<') {
        return Err(Error::XmlStructure("element does not start with '<'".into()));
    }

    let mut i = 1;
    let name_start = i;
    while i < bytes.len() && !is_name_end(bytes[i]) {
        i += 1;
    }
    let qname = src[name_start..i].to_owned();

    let mut attrs = Vec::new();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            None => return Err(Error::XmlStructure("unterminated start tag".into())),
            Some(b'>') | Some(b'/') => break,
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let attr_name = src[attr_start..i].to_owned();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return Err(Error::XmlStructure(format!(
                "attribute {attr_name} has no value"
            )));
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = match bytes.get(i) {
            Some(q @ (b'"' | b'\'')) => *q,
            _ => {
                return Err(Error::XmlStructure(format!(
                    "attribute {attr_name} value is not quoted"
                )))
            }
        };
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != quote {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::XmlStructure("unterminated attribute value".into()));
        }
        attrs.push(StartTagAttr {
            qname: attr_name,
            raw_value: src[value_start..i].to_owned(),
        });
        i += 1;
    }

    Ok((qname, attrs))
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

/// The qualified name of an element as written in the source.
pub fn element_qname(node: roxmltree::Node<'_, '_>) -> Result<String, Error> {
    Ok(start_tag(node)?.0)
}

/// The prefix of an element's tag name ("" when unprefixed).
pub fn element_prefix(node: roxmltree::Node<'_, '_>) -> Result<String, Error> {
    let qname = element_qname(node)?;
    Ok(match qname.split_once(':') {
        Some((prefix, _)) => prefix.to_owned(),
        None => String::new(),
    })
}

/// The prefix of an attribute, recovered from the source start tag.
///
/// Attributes in the `xml:` namespace always report the `xml` prefix;
/// attributes without a namespace report `None`.
pub fn attr_prefix(
    node: roxmltree::Node<'_, '_>,
    attr: &roxmltree::Attribute<'_, '_>,
) -> Result<Option<String>, Error> {
    let Some(uri) = attr.namespace() else {
        return Ok(None);
    };
    if uri == ns::XML {
        return Ok(Some("xml".to_owned()));
    }

    let (_, tokens) = start_tag(node)?;
    for token in &tokens {
        if token.qname == "xmlns" || token.qname.starts_with("xmlns:") {
            continue;
        }
        if let Some((prefix, local)) = token.qname.split_once(':') {
            if local == attr.name() && resolve_prefix(node, prefix).as_deref() == Some(uri) {
                return Ok(Some(prefix.to_owned()));
            }
        }
    }
    Err(Error::XmlStructure(format!(
        "cannot recover prefix for attribute {}",
        attr.name()
    )))
}

/// The qualified name of an attribute as it should be serialized.
pub fn attr_qname(
    node: roxmltree::Node<'_, '_>,
    attr: &roxmltree::Attribute<'_, '_>,
) -> Result<String, Error> {
    Ok(match attr_prefix(node, attr)? {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
        _ => attr.name().to_owned(),
    })
}

/// Resolve a prefix to its in-scope namespace URI at the given element.
pub fn resolve_prefix(node: roxmltree::Node<'_, '_>, prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(ns::XML.to_owned());
    }
    node.namespaces()
        .find(|decl| decl.name() == Some(prefix))
        .map(|decl| decl.uri().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_prefixed_names() {
        let doc = roxmltree::Document::parse(
            r#"<a:root xmlns:a="urn:a" xmlns:b="urn:b" b:attr = "v" plain="w"/>"#,
        )
        .unwrap();
        let root = doc.root_element();
        assert_eq!(element_qname(root).unwrap(), "a:root");
        assert_eq!(element_prefix(root).unwrap(), "a");

        let b_attr = root.attributes().find(|a| a.name() == "attr").unwrap();
        assert_eq!(attr_qname(root, &b_attr).unwrap(), "b:attr");
        let plain = root.attributes().find(|a| a.name() == "plain").unwrap();
        assert_eq!(attr_qname(root, &plain).unwrap(), "plain");
    }

    #[test]
    fn quotes_inside_other_quotes() {
        let doc = roxmltree::Document::parse(r#"<r a="it's" b='say "hi"'/>"#).unwrap();
        let (_, tokens) = start_tag(doc.root_element()).unwrap();
        assert_eq!(tokens[0].raw_value, "it's");
        assert_eq!(tokens[1].raw_value, r#"say "hi""#);
    }

    #[test]
    fn xml_prefix_is_recognized() {
        let doc = roxmltree::Document::parse(r#"<r xml:lang="en"/>"#).unwrap();
        let root = doc.root_element();
        let lang = root.attributes().next().unwrap();
        assert_eq!(attr_qname(root, &lang).unwrap(), "xml:lang");
    }
}

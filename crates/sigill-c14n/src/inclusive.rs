#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0 REC).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! The canonical form:
//! - renders every in-scope namespace declaration at the apex of the
//!   (sub)tree, inner elements only what they introduce or override
//! - sorts namespace declarations by prefix (default first) and
//!   attributes by (namespace-URI, local-name)
//! - escapes text and attribute values per C14N rules
//! - optionally preserves or strips comments
//! - supports document-subset canonicalization via `NodeSet`

use crate::render::{self, Attr, NsDecl};
use sigill_core::{ns, Error};
use sigill_xml::{qname, NodeSet};
use std::collections::BTreeMap;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    canonicalize_with_options(doc, with_comments, node_set, false)
}

/// Canonicalize with explicit variant options.  `xml11` selects the
/// C14N 1.1 handling of inherited `xml:*` attributes.
pub(crate) fn canonicalize_with_options(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    xml11: bool,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
        xml11,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    xml11: bool,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(node),
        }
    }

    fn process_node(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, inherited_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.process_element(node, output, inherited_ns)?;
            }
            roxmltree::NodeType::Text => {
                // Text cannot occur outside the document element in the
                // XPath data model.
                let at_document_level = node
                    .parent()
                    .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);
                if !at_document_level && self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(render::escape_text(text).as_bytes());
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    render::emit_comment(node, output);
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(&node) {
                    render::emit_pi(node, output);
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Invisible elements contribute nothing themselves; visible
            // descendants are rendered against the nearest visible
            // ancestor's namespace context.
            for child in node.children() {
                self.process_node(child, output, inherited_ns)?;
            }
            return Ok(());
        }

        let current_ns = inscope_namespaces(node);

        // A declaration is rendered when it is new or overrides what the
        // nearest rendered ancestor declared.  At the apex inherited_ns is
        // empty, so every in-scope declaration is rendered.
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for (prefix, uri) in &current_ns {
            if prefix == "xml" {
                continue;
            }
            if inherited_ns.get(prefix) != Some(uri) {
                ns_decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                });
            }
        }

        // The default namespace was undeclared here relative to the
        // rendered ancestor context.
        if let Some(inherited_default) = inherited_ns.get("") {
            if !inherited_default.is_empty() && !current_ns.contains_key("") {
                ns_decls.push(NsDecl {
                    prefix: String::new(),
                    uri: String::new(),
                });
            }
        }
        ns_decls.sort();

        let mut attrs = collect_attrs(node)?;

        // xml:* attributes are inherited onto the apex of a document
        // subset when the element's parent is not itself rendered.
        if self.node_set.is_some() {
            let parent_not_visible = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_not_visible {
                let extra = collect_inherited_xml_attrs(node, &attrs, self.xml11);
                attrs.extend(extra);
            }
        }
        attrs.sort();

        let elem_name = qname::element_qname(node)?;

        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for ns_decl in &ns_decls {
            output.extend_from_slice(ns_decl.render().as_bytes());
        }
        for attr in &attrs {
            output.extend_from_slice(attr.render().as_bytes());
        }
        output.push(b'>');

        let mut child_ns = inherited_ns.clone();
        for (prefix, uri) in &current_ns {
            if prefix != "xml" {
                child_ns.insert(prefix.clone(), uri.clone());
            }
        }
        // Record an undeclared default so children do not re-undeclare.
        if !current_ns.contains_key("") {
            child_ns.remove("");
        }

        for child in node.children() {
            self.process_node(child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

/// All namespace declarations in scope at an element, keyed by prefix.
pub(crate) fn inscope_namespaces(node: roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for decl in node.namespaces() {
        let prefix = decl.name().unwrap_or("").to_owned();
        if decl.uri().is_empty() {
            continue;
        }
        result.insert(prefix, decl.uri().to_owned());
    }
    result
}

/// Collect an element's attributes with recovered qualified names.
pub(crate) fn collect_attrs(node: roxmltree::Node<'_, '_>) -> Result<Vec<Attr>, Error> {
    let mut attrs = Vec::new();
    for attr in node.attributes() {
        let ns_uri = attr.namespace().unwrap_or("");
        attrs.push(Attr {
            ns_uri: ns_uri.to_owned(),
            local_name: attr.name().to_owned(),
            qualified_name: qname::attr_qname(node, &attr)?,
            value: attr.value().to_owned(),
        });
    }
    Ok(attrs)
}

/// For document-subset canonicalization: collect `xml:*` attributes from
/// ancestors, nearest declaration winning, minus those already present on
/// the element.  C14N 1.1 inherits only the simply-inheritable attributes
/// and never `xml:id`.
fn collect_inherited_xml_attrs(
    node: roxmltree::Node<'_, '_>,
    existing_attrs: &[Attr],
    xml11: bool,
) -> Vec<Attr> {
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();

    let mut current = node.parent();
    while let Some(ancestor) = current {
        if ancestor.is_element() {
            for attr in ancestor.attributes() {
                if attr.namespace() == Some(ns::XML) {
                    inherited
                        .entry(attr.name().to_owned())
                        .or_insert_with(|| attr.value().to_owned());
                }
            }
        }
        current = ancestor.parent();
    }

    if xml11 {
        inherited.retain(|name, _| matches!(name.as_str(), "base" | "lang" | "space"));
    }

    inherited
        .into_iter()
        .filter(|(name, _)| {
            !existing_attrs
                .iter()
                .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
        })
        .map(|(name, value)| Attr {
            ns_uri: ns::XML.to_owned(),
            local_name: name.clone(),
            qualified_name: format!("xml:{name}"),
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_xml::parsing_options;

    fn c14n(xml: &str) -> String {
        let doc = roxmltree::Document::parse_with_options(xml, parsing_options()).unwrap();
        String::from_utf8(canonicalize(&doc, false, None).unwrap()).unwrap()
    }

    #[test]
    fn attributes_are_sorted() {
        assert_eq!(
            c14n(r#"<root><a b="1" a="2"/></root>"#),
            r#"<root><a a="2" b="1"></a></root>"#
        );
    }

    #[test]
    fn all_inscope_namespaces_render_at_apex() {
        let out = c14n(r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child/></root>"#);
        assert_eq!(
            out,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn inner_elements_render_only_new_declarations() {
        let out = c14n(r#"<r xmlns:p="urn:1"><c xmlns:p="urn:1"/><d xmlns:p="urn:2"/></r>"#);
        assert_eq!(
            out,
            r#"<r xmlns:p="urn:1"><c></c><d xmlns:p="urn:2"></d></r>"#
        );
    }

    #[test]
    fn default_namespace_undeclaration_is_emitted() {
        let out = c14n(r#"<r xmlns="urn:d"><c xmlns=""/></r>"#);
        assert_eq!(out, r#"<r xmlns="urn:d"><c xmlns=""></c></r>"#);
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(
            c14n(r#"<root>a &amp; b &lt; c</root>"#),
            "<root>a &amp; b &lt; c</root>"
        );
    }

    #[test]
    fn comments_are_stripped_without_comments_mode() {
        assert_eq!(c14n("<r><!-- x --><a/></r>"), "<r><a></a></r>");
    }

    #[test]
    fn comments_kept_in_with_comments_mode() {
        let doc = roxmltree::Document::parse("<r><!-- x --><a/></r>").unwrap();
        let out = String::from_utf8(canonicalize(&doc, true, None).unwrap()).unwrap();
        assert_eq!(out, "<r><!-- x --><a></a></r>");
    }

    #[test]
    fn subset_canonicalization_inherits_ancestor_namespaces() {
        let xml = r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><mid><a:leaf/></mid></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let leaf = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "leaf")
            .unwrap();
        let set = NodeSet::tree_without_comments(leaf);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(out, r#"<a:leaf xmlns:a="urn:a" xmlns:b="urn:b"></a:leaf>"#);
    }

    #[test]
    fn subset_inherits_xml_lang_from_ancestors() {
        let xml = r#"<r xml:lang="en"><mid><leaf attr="v"/></mid></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let leaf = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "leaf")
            .unwrap();
        let set = NodeSet::tree_without_comments(leaf);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(out, r#"<leaf attr="v" xml:lang="en"></leaf>"#);
    }
}

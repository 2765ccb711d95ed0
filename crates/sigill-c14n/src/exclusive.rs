#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N).
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Unlike the inclusive variants, only "visibly utilized" namespace
//! declarations are rendered.  A namespace is visibly utilized at an
//! element when:
//! 1. its prefix is used by the element's tag name, or
//! 2. its prefix is used by one of the element's attribute names, or
//! 3. the prefix appears in the InclusiveNamespaces PrefixList.
//!
//! A declaration an ancestor already rendered identically is not
//! re-rendered.

use crate::inclusive::{collect_attrs, inscope_namespaces};
use crate::render::{self, NsDecl};
use sigill_core::Error;
use sigill_xml::{qname, NodeSet};
use std::collections::{BTreeMap, BTreeSet};

/// Canonicalize a document using Exclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let mut prefix_set: BTreeSet<String> = BTreeSet::new();
    for p in inclusive_prefixes {
        // "#default" names the default namespace in a PrefixList.
        if p == "#default" {
            prefix_set.insert(String::new());
        } else {
            prefix_set.insert(p.clone());
        }
    }

    let mut output = Vec::new();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive_prefixes: prefix_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: BTreeSet<String>,
}

impl ExcC14nContext<'_> {
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
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, rendered_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.process_element(node, output, rendered_ns)?;
            }
            roxmltree::NodeType::Text => {
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
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Namespace declarations are only rendered on visible start
            // tags; invisible elements pass the rendered context through.
            for child in node.children() {
                self.process_node(child, output, rendered_ns)?;
            }
            return Ok(());
        }

        // Prefixes visibly utilized at this element.
        let mut utilized: BTreeSet<String> = BTreeSet::new();
        utilized.insert(qname::element_prefix(node)?);
        for attr in node.attributes() {
            if let Some(prefix) = qname::attr_prefix(node, &attr)? {
                if !prefix.is_empty() {
                    utilized.insert(prefix);
                }
            }
        }
        utilized.extend(self.inclusive_prefixes.iter().cloned());

        let inscope = inscope_namespaces(node);

        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized {
            if prefix == "xml" {
                continue;
            }
            if let Some(uri) = inscope.get(prefix) {
                if rendered_ns.get(prefix) != Some(uri) {
                    ns_decls.push(NsDecl {
                        prefix: prefix.clone(),
                        uri: uri.clone(),
                    });
                }
            } else if prefix.is_empty() {
                // The default namespace became unused where an ancestor
                // rendered a non-empty one: undeclare it.
                if rendered_ns.get("").is_some_and(|u| !u.is_empty()) {
                    ns_decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
            }
        }
        ns_decls.sort();

        let mut attrs = collect_attrs(node)?;
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

        let mut child_rendered_ns = rendered_ns.clone();
        for ns_decl in &ns_decls {
            child_rendered_ns.insert(ns_decl.prefix.clone(), ns_decl.uri.clone());
        }

        for child in node.children() {
            self.process_node(child, output, &child_rendered_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');
        Ok(())
    }
}

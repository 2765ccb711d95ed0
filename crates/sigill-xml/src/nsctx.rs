#![forbid(unsafe_code)]

//! Namespace contexts: the in-scope prefix bindings along an ancestor
//! chain, and the detach operation that copies a subtree together with the
//! declarations it depends on.
//!
//! Contexts are immutable; derivation overlays new declarations onto a
//! copy.  Nothing here back-links a child context to its parent.

use crate::element::{Element, Node};
use sigill_core::Error;
use std::collections::{BTreeMap, BTreeSet};

/// An immutable mapping from prefix to namespace URI.  The default
/// namespace is carried under the empty prefix.
#[derive(Debug, Clone, Default)]
pub struct NsContext {
    bindings: BTreeMap<String, String>,
    /// Prefixes newly declared at the element this context was derived for.
    declared: BTreeSet<String>,
}

impl NsContext {
    /// An empty context (no bindings in scope).
    pub fn new() -> Self {
        Self::default()
    }

    /// The context in scope at the parent of a parsed node: every
    /// declaration of the ancestor chain, nearer ones overriding farther.
    pub fn parent_context(node: roxmltree::Node<'_, '_>) -> Self {
        let mut bindings = BTreeMap::new();
        if let Some(parent) = node.parent().filter(|p| p.is_element()) {
            for decl in parent.namespaces() {
                let prefix = decl.name().unwrap_or("").to_owned();
                bindings.insert(prefix, decl.uri().to_owned());
            }
        }
        Self {
            bindings,
            declared: BTreeSet::new(),
        }
    }

    /// Derive a sub-context by overlaying an element's own declarations.
    /// An empty URI undeclares the prefix.
    pub fn sub_context(&self, el: &Element) -> Self {
        let mut bindings = self.bindings.clone();
        let mut declared = BTreeSet::new();
        for (prefix, uri) in el.namespace_declarations() {
            declared.insert(prefix.to_owned());
            if uri.is_empty() {
                bindings.remove(prefix);
            } else {
                bindings.insert(prefix.to_owned(), uri.to_owned());
            }
        }
        Self { bindings, declared }
    }

    /// Look up the URI bound to a prefix ("" for the default namespace).
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// All bindings in scope.
    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    /// Prefixes declared at the element this context was derived for.
    pub fn declared_prefixes(&self) -> &BTreeSet<String> {
        &self.declared
    }

    /// Produce a standalone copy of `el` whose root explicitly declares
    /// every binding this context has in scope (the element's own
    /// declarations winning over inherited ones).
    ///
    /// Copying the whole scope, not just the prefixes the subtree uses,
    /// is what makes non-exclusive canonicalization of the detached copy
    /// yield the same octets the subtree would produce in place: the
    /// inclusive variants render every in-scope declaration at the apex.
    ///
    /// A prefix used on an element or attribute name inside the subtree
    /// must be bound here or declared within; otherwise the copy would
    /// change meaning and the operation fails.
    pub fn detach(&self, el: &Element) -> Result<Element, Error> {
        let scope = self.sub_context(el);
        let mut detached = el.clone();

        for (prefix, uri) in scope.bindings() {
            if prefix == "xml" {
                continue;
            }
            let attr_name = if prefix.is_empty() {
                "xmlns".to_owned()
            } else {
                format!("xmlns:{prefix}")
            };
            if detached.attr(&attr_name).is_none() {
                detached.set_attr(&attr_name, uri);
            }
        }

        let mut unbound = BTreeSet::new();
        collect_unbound(&detached, &BTreeSet::new(), &mut unbound);
        for prefix in unbound {
            if prefix == "xml" || prefix.is_empty() {
                // Unprefixed names without a default binding stay in no
                // namespace.
                continue;
            }
            return Err(Error::XmlStructure(format!(
                "undeclared namespace prefix: {prefix}"
            )));
        }
        Ok(detached)
    }
}

/// Walk the subtree collecting prefixes used on element or attribute names
/// with no declaration at or above the usage point (within the subtree).
fn collect_unbound(el: &Element, inherited: &BTreeSet<String>, unbound: &mut BTreeSet<String>) {
    let mut declared = inherited.clone();
    for (prefix, _) in el.namespace_declarations() {
        declared.insert(prefix.to_owned());
    }

    let elem_prefix = el.prefix().unwrap_or("");
    if !declared.contains(elem_prefix) {
        unbound.insert(elem_prefix.to_owned());
    }

    for attr in el.attributes() {
        if crate::element::is_ns_decl(&attr.name) {
            continue;
        }
        if let Some((prefix, _)) = attr.name.split_once(':') {
            if prefix != "xml" && !declared.contains(prefix) {
                unbound.insert(prefix.to_owned());
            }
        }
    }

    for child in el.children() {
        if let Node::Element(e) = child {
            collect_unbound(e, &declared, unbound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_of(xml: &str, target: &str) -> (NsContext, Element) {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let node = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == target)
            .unwrap();
        let ctx = NsContext::parent_context(node);
        let el = Element::from_node(node).unwrap();
        (ctx, el)
    }

    #[test]
    fn parent_context_collects_ancestor_declarations() {
        let (ctx, el) = ctx_of(
            r#"<r xmlns:a="urn:a"><mid xmlns:b="urn:b"><a:leaf b:x="1"/></mid></r>"#,
            "leaf",
        );
        assert_eq!(ctx.lookup("a"), Some("urn:a"));
        assert_eq!(ctx.lookup("b"), Some("urn:b"));
        assert_eq!(el.tag(), "a:leaf");
    }

    #[test]
    fn nearer_declarations_override_farther() {
        let (ctx, _) = ctx_of(
            r#"<r xmlns:p="urn:outer"><mid xmlns:p="urn:inner"><p:leaf/></mid></r>"#,
            "leaf",
        );
        assert_eq!(ctx.lookup("p"), Some("urn:inner"));
    }

    #[test]
    fn detach_declares_ancestor_prefixes() {
        let (ctx, el) = ctx_of(
            r#"<r xmlns:a="urn:a"><mid><a:leaf><a:inner/></a:leaf></mid></r>"#,
            "leaf",
        );
        let detached = ctx.detach(&el).unwrap();
        assert_eq!(detached.attr("xmlns:a"), Some("urn:a"));
        // The inner use is covered by the root declaration; nothing else
        // is added.
        assert_eq!(detached.attributes().len(), 1);
    }

    #[test]
    fn detach_preserves_inherited_default_namespace() {
        let (ctx, el) = ctx_of(r#"<r xmlns="urn:d"><leaf><x/></leaf></r>"#, "leaf");
        let detached = ctx.detach(&el).unwrap();
        assert_eq!(detached.attr("xmlns"), Some("urn:d"));
    }

    #[test]
    fn detach_skips_locally_declared_prefixes() {
        let (ctx, el) = ctx_of(
            r#"<r xmlns:a="urn:outer"><a:leaf xmlns:a="urn:local"/></r>"#,
            "leaf",
        );
        let detached = ctx.detach(&el).unwrap();
        assert_eq!(detached.attr("xmlns:a"), Some("urn:local"));
    }

    #[test]
    fn detach_copies_the_entire_scope() {
        // Declarations the subtree never uses are still copied; inclusive
        // canonicalization renders the whole scope at the apex.
        let (ctx, el) = ctx_of(
            r#"<r xmlns:a="urn:a" xmlns:unused="urn:u"><leaf/></r>"#,
            "leaf",
        );
        let detached = ctx.detach(&el).unwrap();
        assert_eq!(detached.attr("xmlns:a"), Some("urn:a"));
        assert_eq!(detached.attr("xmlns:unused"), Some("urn:u"));
    }

    #[test]
    fn detach_rejects_unresolvable_prefix() {
        // Attribute carries a prefix the document never declares anywhere
        // near the subtree root's new location.
        let el = Element::parse(r#"<leaf xmlns:q="urn:q"><q:a/></leaf>"#).unwrap();
        let mut broken = el.clone();
        broken.remove_attr("xmlns:q");
        let ctx = NsContext::new();
        assert!(ctx.detach(&broken).is_err());
    }

    #[test]
    fn sub_context_tracks_declared_prefixes() {
        let el = Element::parse(r#"<r xmlns="urn:d" xmlns:p="urn:p"/>"#).unwrap();
        let ctx = NsContext::new().sub_context(&el);
        assert_eq!(ctx.lookup(""), Some("urn:d"));
        assert_eq!(ctx.lookup("p"), Some("urn:p"));
        assert!(ctx.declared_prefixes().contains(""));
        assert!(ctx.declared_prefixes().contains("p"));
    }
}

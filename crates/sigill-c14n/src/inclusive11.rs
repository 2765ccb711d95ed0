#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.1.
//!
//! Algorithm URI: `http://www.w3.org/2006/12/xml-c14n11`
//! With comments: `http://www.w3.org/2006/12/xml-c14n11#WithComments`
//!
//! C14N 1.1 shares the 1.0 serialization; the difference is the handling
//! of `xml:*` attributes for document subsets: only the simply-inheritable
//! `xml:base`, `xml:lang` and `xml:space` are carried onto the apex, and
//! only when the subtree does not declare them itself.  `xml:id` is never
//! inherited.

use sigill_core::Error;
use sigill_xml::NodeSet;

/// Canonicalize using Inclusive C14N 1.1.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    crate::inclusive::canonicalize_with_options(doc, with_comments, node_set, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_id_is_not_inherited() {
        let xml = r#"<r xml:id="outer" xml:lang="en"><mid><leaf/></mid></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let leaf = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "leaf")
            .unwrap();
        let set = NodeSet::tree_without_comments(leaf);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set)).unwrap()).unwrap();
        assert_eq!(out, r#"<leaf xml:lang="en"></leaf>"#);
    }

    #[test]
    fn whole_document_matches_c14n10() {
        let xml = r#"<r xmlns:a="urn:a" b="2" a="1"><a:c>t</a:c></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let one_one = canonicalize(&doc, false, None).unwrap();
        let one_zero = crate::inclusive::canonicalize(&doc, false, None).unwrap();
        assert_eq!(one_one, one_zero);
    }
}

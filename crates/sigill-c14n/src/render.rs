#![forbid(unsafe_code)]

//! Rendering rules shared by the canonicalization variants: character
//! escaping, namespace/attribute ordering, and the document-level
//! comment/PI emission rules.

// ── Character escaping ───────────────────────────────────────────────
//
// Canonical text keeps markup characters as entity references; attribute
// values additionally turn whitespace characters into character
// references so they survive attribute-value normalization on re-parse.

/// Escape a text node for canonical output.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value for canonical output.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
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
    out
}

/// Escape processing-instruction data; only a carriage return needs a
/// character reference there.
pub fn escape_pi(s: &str) -> String {
    s.replace('\r', "&#xD;")
}

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for the default namespace).
    pub prefix: String,
    /// The namespace URI ("" for an undeclaration).
    pub uri: String,
}

impl NsDecl {
    /// Render this namespace declaration.
    pub fn render(&self) -> String {
        if self.prefix.is_empty() {
            format!(" xmlns=\"{}\"", escape_attr(&self.uri))
        } else {
            format!(" xmlns:{}=\"{}\"", self.prefix, escape_attr(&self.uri))
        }
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Default namespace (empty prefix) sorts first, then prefixes in
        // lexicographic byte order.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    /// The local name.
    pub local_name: String,
    /// The qualified name (prefix:local or just local).
    pub qualified_name: String,
    /// The attribute value.
    pub value: String,
}

impl Attr {
    /// Render this attribute.
    pub fn render(&self) -> String {
        format!(" {}=\"{}\"", self.qualified_name, escape_attr(&self.value))
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Attributes without a namespace come first, ordered by local
        // name; namespaced attributes follow, ordered by (URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Emit a comment node, applying the line breaks required for comments
/// outside the document element.
pub fn emit_comment(node: roxmltree::Node<'_, '_>, output: &mut Vec<u8>) {
    let at_document_level = node
        .parent()
        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

    if at_document_level && has_preceding_element(node) {
        output.push(b'\n');
    }
    output.extend_from_slice(b"<!--");
    output.extend_from_slice(node.text().unwrap_or("").as_bytes());
    output.extend_from_slice(b"-->");
    if at_document_level && has_following_element(node) {
        output.push(b'\n');
    }
}

/// Emit a processing instruction, applying the document-level line breaks.
pub fn emit_pi(node: roxmltree::Node<'_, '_>, output: &mut Vec<u8>) {
    let Some(pi) = node.pi() else { return };

    let at_document_level = node
        .parent()
        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

    if at_document_level && has_preceding_element(node) {
        output.push(b'\n');
    }
    output.extend_from_slice(b"<?");
    output.extend_from_slice(pi.target.as_bytes());
    if let Some(value) = pi.value {
        if !value.is_empty() {
            output.push(b' ');
            output.extend_from_slice(escape_pi(value).as_bytes());
        }
    }
    output.extend_from_slice(b"?>");
    if at_document_level && has_following_element(node) {
        output.push(b'\n');
    }
}

fn has_preceding_element(node: roxmltree::Node<'_, '_>) -> bool {
    node.prev_siblings().any(|s| s.is_element())
}

fn has_following_element(node: roxmltree::Node<'_, '_>) -> bool {
    node.next_siblings().any(|s| s.is_element())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_escaping_covers_markup_and_carriage_returns() {
        assert_eq!(escape_text("plain text"), "plain text");
        assert_eq!(escape_text("1 < 2 && 2 > 1"), "1 &lt; 2 &amp;&amp; 2 &gt; 1");
        assert_eq!(escape_text("cr\rhere"), "cr&#xD;here");
    }

    #[test]
    fn attribute_escaping_keeps_whitespace_as_references() {
        assert_eq!(escape_attr("tab\tnl\ncr\r"), "tab&#x9;nl&#xA;cr&#xD;");
        assert_eq!(escape_attr(r#"say "hi" & run"#), "say &quot;hi&quot; &amp; run");
        assert_eq!(escape_attr("a<b"), "a&lt;b");
    }

    #[test]
    fn default_namespace_sorts_first() {
        let mut decls = vec![
            NsDecl { prefix: "b".into(), uri: "urn:b".into() },
            NsDecl { prefix: String::new(), uri: "urn:d".into() },
            NsDecl { prefix: "a".into(), uri: "urn:a".into() },
        ];
        decls.sort();
        assert_eq!(decls[0].prefix, "");
        assert_eq!(decls[1].prefix, "a");
        assert_eq!(decls[2].prefix, "b");
    }

    #[test]
    fn unqualified_attrs_sort_before_namespaced() {
        let mut attrs = vec![
            Attr {
                ns_uri: "urn:z".into(),
                local_name: "a".into(),
                qualified_name: "z:a".into(),
                value: String::new(),
            },
            Attr {
                ns_uri: String::new(),
                local_name: "z".into(),
                qualified_name: "z".into(),
                value: String::new(),
            },
        ];
        attrs.sort();
        assert_eq!(attrs[0].qualified_name, "z");
        assert_eq!(attrs[1].qualified_name, "z:a");
    }
}

#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for the Sigill XML signature library.
//!
//! Implements the variants XML-DSig signatures in the wild actually use:
//! - Exclusive Canonical XML 1.0 (with and without comments)
//! - Canonical XML 1.0 REC (with and without comments)
//! - Canonical XML 1.1 (with and without comments)
//!
//! Canonical output is deterministic: canonicalizing the same element
//! twice yields byte-identical octets.

pub mod exclusive;
pub mod inclusive;
pub mod inclusive11;
pub mod render;

use sigill_core::{algorithm, Error};
use sigill_xml::{Element, NodeSet};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0 REC
    Inclusive,
    /// Canonical XML 1.0 REC with comments
    InclusiveWithComments,
    /// Canonical XML 1.1
    Inclusive11,
    /// Canonical XML 1.1 with comments
    Inclusive11WithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Inclusive11 => algorithm::C14N11,
            Self::Inclusive11WithComments => algorithm::C14N11_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::C14N11 => Some(Self::Inclusive11),
            algorithm::C14N11_WITH_COMMENTS => Some(Self::Inclusive11WithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments
                | Self::Inclusive11WithComments
                | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// A configured canonicalizer: a mode plus, for the exclusive variants,
/// the `InclusiveNamespaces` prefix list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalizer {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl Canonicalizer {
    /// Create a canonicalizer with an empty prefix list.
    pub fn new(mode: C14nMode) -> Self {
        Self {
            mode,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Exclusive C14N 1.0 with a space-separated `PrefixList`.
    pub fn exclusive_1_0_with_prefix_list(prefix_list: &str) -> Self {
        Self {
            mode: C14nMode::Exclusive,
            inclusive_prefixes: prefix_list
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Canonical XML 1.0 REC.
    pub fn c14n_1_0_rec() -> Self {
        Self::new(C14nMode::Inclusive)
    }

    /// Canonical XML 1.1.
    pub fn c14n_1_1() -> Self {
        Self::new(C14nMode::Inclusive11)
    }

    /// Build a canonicalizer from a Transform/CanonicalizationMethod URI
    /// and the prefixes of an `InclusiveNamespaces` child, if any.
    pub fn from_uri(uri: &str, inclusive_prefixes: Vec<String>) -> Result<Self, Error> {
        let mode = C14nMode::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("canonicalization: {uri}")))?;
        Ok(Self {
            mode,
            inclusive_prefixes,
        })
    }

    /// The algorithm URI this canonicalizer implements.
    pub fn algorithm(&self) -> &'static str {
        self.mode.uri()
    }

    pub fn mode(&self) -> C14nMode {
        self.mode
    }

    pub fn prefix_list(&self) -> &[String] {
        &self.inclusive_prefixes
    }

    /// Canonicalize a whole document given as text.
    pub fn canonicalize_str(&self, xml: &str) -> Result<Vec<u8>, Error> {
        canonicalize(xml, self.mode, None, &self.inclusive_prefixes)
    }

    /// Canonicalize a (subset of a) pre-parsed document.
    pub fn canonicalize_doc(
        &self,
        doc: &roxmltree::Document<'_>,
        node_set: Option<&NodeSet>,
    ) -> Result<Vec<u8>, Error> {
        canonicalize_doc(doc, self.mode, node_set, &self.inclusive_prefixes)
    }

    /// Canonicalize an owned element subtree.
    ///
    /// The element must be self-contained (detached with its namespace
    /// declarations); canonical octets of a dependent subtree are only
    /// meaningful within its document.
    pub fn canonicalize_element(&self, el: &Element) -> Result<Vec<u8>, Error> {
        self.canonicalize_str(&el.to_xml_string())
    }
}

/// Canonicalize an XML document.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `node_set`: optional node set for document-subset canonicalization
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces
///   PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, sigill_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize with a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    match mode {
        C14nMode::Inclusive | C14nMode::InclusiveWithComments => {
            inclusive::canonicalize(doc, mode.with_comments(), node_set)
        }
        C14nMode::Inclusive11 | C14nMode::Inclusive11WithComments => {
            inclusive11::canonicalize(doc, mode.with_comments(), node_set)
        }
        C14nMode::Exclusive | C14nMode::ExclusiveWithComments => {
            exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
        }
    }
}

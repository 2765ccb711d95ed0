#![forbid(unsafe_code)]

//! Reference transform planning and execution.
//!
//! A Reference carries an ordered transform list.  The chain is validated
//! before anything runs: at most one canonicalization, it must come last
//! (canonical octets cannot feed a tree transform), and the whole list is
//! bounded.  An empty list canonicalizes with the default, C14N 1.0 REC.

use crate::enveloped;
use sigill_c14n::{C14nMode, Canonicalizer};
use sigill_core::{algorithm, Error};
use sigill_xml::NodeSet;
use tracing::debug;

/// The kind of a supported transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    EnvelopedSignature,
    Canonicalization(C14nMode),
}

impl TransformKind {
    /// Parse a transform from its algorithm URI.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        if uri == algorithm::ENVELOPED_SIGNATURE {
            return Ok(Self::EnvelopedSignature);
        }
        C14nMode::from_uri(uri)
            .map(Self::Canonicalization)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {uri}")))
    }
}

/// One `<Transform>` entry: the algorithm URI plus the prefixes of an
/// `InclusiveNamespaces` child, if any.
#[derive(Debug, Clone)]
pub struct TransformStep {
    pub uri: String,
    pub prefix_list: Vec<String>,
}

/// A validated transform chain for one Reference.
#[derive(Debug)]
pub struct ReferencePlan {
    kinds: Vec<TransformKind>,
    canonicalizer: Canonicalizer,
}

/// Default number of transforms a validator accepts in one Reference.
pub const DEFAULT_MAX_TRANSFORMS: usize = 4;

impl ReferencePlan {
    /// Validate a transform list and fix the canonicalizer that will
    /// produce the digest octets.
    pub fn plan(steps: &[TransformStep], max_transforms: usize) -> Result<Self, Error> {
        if steps.len() > max_transforms {
            return Err(Error::TransformRejected(format!(
                "{} transforms exceed the allowed {max_transforms}",
                steps.len()
            )));
        }

        let mut kinds = Vec::with_capacity(steps.len());
        let mut canonicalizer = None;
        for step in steps {
            let kind = TransformKind::from_uri(&step.uri)?;
            if let TransformKind::Canonicalization(_) = kind {
                if canonicalizer.is_some() {
                    return Err(Error::TransformRejected(
                        "at most one canonicalization transform is allowed".into(),
                    ));
                }
                canonicalizer = Some(Canonicalizer::from_uri(&step.uri, step.prefix_list.clone())?);
            } else if canonicalizer.is_some() {
                // Canonical octets cannot feed a tree transform.
                return Err(Error::TransformRejected(
                    "canonicalization must be the last transform".into(),
                ));
            }
            kinds.push(kind);
        }

        Ok(Self {
            kinds,
            canonicalizer: canonicalizer.unwrap_or_else(Canonicalizer::c14n_1_0_rec),
        })
    }

    /// The canonicalizer that produces the final octets (declared by the
    /// chain, or the default when no canonicalization transform appears).
    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Execute the chain against a referent.
    ///
    /// `node_set` is the resolved referent subset (`None` means the whole
    /// document without comments); `signature_node_index` addresses the
    /// Signature the enveloped transform removes.  Returns the digest
    /// octets and the node set they were produced from.
    pub fn apply(
        &self,
        xml_text: &str,
        node_set: Option<NodeSet>,
        signature_node_index: usize,
    ) -> Result<(Vec<u8>, NodeSet), Error> {
        let doc = roxmltree::Document::parse_with_options(xml_text, sigill_xml::parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))?;

        let mut set = node_set.unwrap_or_else(|| NodeSet::all_without_comments(&doc));
        for kind in &self.kinds {
            if *kind == TransformKind::EnvelopedSignature {
                enveloped::remove_signature(&doc, signature_node_index, &mut set)?;
                debug!(signature_node_index, "applied enveloped-signature transform");
            }
        }

        let octets = self.canonicalizer.canonicalize_doc(&doc, Some(&set))?;
        debug!(
            algorithm = self.canonicalizer.algorithm(),
            len = octets.len(),
            "canonicalized reference"
        );
        Ok((octets, set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(uri: &str) -> TransformStep {
        TransformStep {
            uri: uri.to_owned(),
            prefix_list: Vec::new(),
        }
    }

    #[test]
    fn empty_chain_defaults_to_c14n_10_rec() {
        let plan = ReferencePlan::plan(&[], DEFAULT_MAX_TRANSFORMS).unwrap();
        assert_eq!(plan.canonicalizer().mode(), C14nMode::Inclusive);
    }

    #[test]
    fn enveloped_then_c14n_is_accepted() {
        let plan = ReferencePlan::plan(
            &[step(algorithm::ENVELOPED_SIGNATURE), step(algorithm::EXC_C14N)],
            DEFAULT_MAX_TRANSFORMS,
        )
        .unwrap();
        assert_eq!(plan.canonicalizer().mode(), C14nMode::Exclusive);
    }

    #[test]
    fn c14n_must_be_last() {
        let err = ReferencePlan::plan(
            &[step(algorithm::EXC_C14N), step(algorithm::ENVELOPED_SIGNATURE)],
            DEFAULT_MAX_TRANSFORMS,
        )
        .unwrap_err();
        match err {
            Error::TransformRejected(reason) => assert!(reason.contains("last")),
            other => panic!("expected TransformRejected, got {other:?}"),
        }
    }

    #[test]
    fn two_canonicalizations_are_rejected() {
        // Consecutive canonicalizations, so the chain fails on the
        // duplicate rather than on ordering.
        let err = ReferencePlan::plan(
            &[step(algorithm::EXC_C14N), step(algorithm::EXC_C14N)],
            DEFAULT_MAX_TRANSFORMS,
        )
        .unwrap_err();
        match err {
            Error::TransformRejected(reason) => assert!(reason.contains("at most one")),
            other => panic!("expected TransformRejected, got {other:?}"),
        }
    }

    #[test]
    fn unknown_transform_is_unsupported() {
        let err = ReferencePlan::plan(
            &[step("http://www.w3.org/TR/1999/REC-xslt-19991116")],
            DEFAULT_MAX_TRANSFORMS,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn oversized_chains_are_rejected() {
        let steps: Vec<_> = (0..5).map(|_| step(algorithm::ENVELOPED_SIGNATURE)).collect();
        let err = ReferencePlan::plan(&steps, DEFAULT_MAX_TRANSFORMS).unwrap_err();
        assert!(matches!(err, Error::TransformRejected(_)));
    }

    #[test]
    fn apply_removes_signature_and_canonicalizes() {
        let xml = r#"<r ID="x"><data>v</data><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo></SignedInfo></Signature></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let sig = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "Signature")
            .unwrap();
        let sig_index = sigill_xml::nodeset::node_index(sig);

        let plan = ReferencePlan::plan(
            &[step(algorithm::ENVELOPED_SIGNATURE), step(algorithm::C14N)],
            DEFAULT_MAX_TRANSFORMS,
        )
        .unwrap();
        let (octets, _) = plan.apply(xml, None, sig_index).unwrap();
        assert_eq!(
            String::from_utf8(octets).unwrap(),
            r#"<r ID="x"><data>v</data></r>"#
        );
    }
}

#![forbid(unsafe_code)]

//! Signature validation.
//!
//! Per-call pipeline: locate the Signature binding the root, parse it,
//! resolve and transform each Reference, compare digests, canonicalize
//! SignedInfo, verify the RSA signature with the embedded certificate,
//! then validate that certificate against the trust store and clock.
//! Any failing step is terminal; only the element returned by
//! [`ValidationContext::validate`] may be trusted.

use crate::types::ParsedSignature;
use sigill_core::{ns, Error};
use sigill_crypto::SigningKey;
use sigill_keys::clock::{Clock, SystemClock};
use sigill_keys::x509::{validate_cert_chain, CertValidationConfig};
use sigill_keys::X509CertificateStore;
use sigill_transforms::{ReferencePlan, DEFAULT_MAX_TRANSFORMS};
use sigill_xml::document::{
    self, build_id_map, find_child_element, find_child_elements, find_elements,
    parse_same_document_ref, resolve_id,
};
use sigill_xml::{Element, NodeSet};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;
use x509_cert::der::{Decode, Encode};

/// Context for verifying signatures.  Configured once, then usable for
/// any number of validation calls.
pub struct ValidationContext {
    cert_store: Arc<dyn X509CertificateStore>,
    id_attribute: String,
    clock: Arc<dyn Clock>,
    max_transforms: usize,
}

impl ValidationContext {
    /// The default profile: `ID` attribute, system clock.
    pub fn new_default(cert_store: Arc<dyn X509CertificateStore>) -> Self {
        Self {
            cert_store,
            id_attribute: ns::DEFAULT_ID_ATTR.to_owned(),
            clock: Arc::new(SystemClock),
            max_transforms: DEFAULT_MAX_TRANSFORMS,
        }
    }

    /// The KYC profile: `id` attribute, system clock.
    pub fn new_kyc(cert_store: Arc<dyn X509CertificateStore>) -> Self {
        Self {
            id_attribute: ns::KYC_ID_ATTR.to_owned(),
            ..Self::new_default(cert_store)
        }
    }

    /// Replace the clock (deterministic validity-window tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cap the number of transforms accepted per Reference.
    pub fn set_max_transforms(&mut self, max_transforms: usize) {
        self.max_transforms = max_transforms;
    }

    /// Validate the signature binding `root` and return the verified
    /// referent subtree.  Callers must consume only the returned element.
    pub fn validate(&self, root: &Element) -> Result<Element, Error> {
        self.validate_xml(&root.to_xml_string())
    }

    /// Validate a document given as XML text.
    pub fn validate_xml(&self, xml: &str) -> Result<Element, Error> {
        let doc = document::parse(xml)?;
        let id_map = build_id_map(&doc, &self.id_attribute)?;
        let root = doc.root_element();

        let sig_node = self.find_signature(root)?;
        let parsed = ParsedSignature::from_node(sig_node)?;
        debug!(
            signature_method = parsed.signed_info.signature_method.uri(),
            canonicalization = parsed.signed_info.canonicalization.algorithm(),
            references = parsed.signed_info.references.len(),
            "located signature"
        );

        // Resolve, transform and digest every Reference; the first one
        // names the referent handed back to the caller.
        let mut referent: Option<Element> = None;
        for reference in &parsed.signed_info.references {
            let (target, initial_set) = if reference.uri.is_empty() {
                (root, None)
            } else if let Some(id) = parse_same_document_ref(&reference.uri) {
                let node = resolve_id(&doc, &id_map, id)?;
                (node, Some(NodeSet::tree_without_comments(node)))
            } else {
                return Err(Error::InvalidUri(format!(
                    "external URI not supported: {}",
                    reference.uri
                )));
            };

            let plan = ReferencePlan::plan(&reference.transforms, self.max_transforms)?;
            let (octets, final_set) = plan.apply(xml, initial_set, parsed.node_index)?;

            let computed =
                sigill_crypto::digest::digest(reference.digest_method.uri(), &octets)?;
            let matches: bool = computed.ct_eq(&reference.digest_value).into();
            if !matches {
                return Err(Error::DigestMismatch(format!(
                    "URI={}",
                    reference.uri
                )));
            }
            debug!(uri = %reference.uri, "reference digest verified");

            if referent.is_none() {
                // The returned subtree is exactly what was digested:
                // the resolved target minus anything the transforms
                // removed.
                referent = Some(Element::from_node_filtered(target, &final_set)?);
            }
        }
        let referent =
            referent.ok_or_else(|| Error::MissingElement(ns::node::REFERENCE.into()))?;

        // Canonicalize SignedInfo by its own declared method.  The node
        // set keeps the Signature's in-scope namespaces visible to the
        // canonicalizer, matching the detached form the signer hashed.
        let signed_info_node = find_child_element(sig_node, ns::DSIG, ns::node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNED_INFO.into()))?;
        let signed_info_set = NodeSet::tree_without_comments(signed_info_node);
        let canonical_signed_info = parsed
            .signed_info
            .canonicalization
            .canonicalize_doc(&doc, Some(&signed_info_set))?;
        debug!(
            len = canonical_signed_info.len(),
            "canonicalized SignedInfo"
        );

        // Verify the RSA signature with the embedded leaf certificate.
        let leaf_der = parsed
            .certificates
            .first()
            .ok_or(Error::MissingCertificates)?;
        let leaf = x509_cert::Certificate::from_der(leaf_der)
            .map_err(|e| Error::Certificate(format!("embedded certificate: {e}")))?;
        let spki_der = leaf
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("SPKI encoding: {e}")))?;
        use spki::DecodePublicKey;
        let public_key = rsa::RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|_| Error::Certificate("certificate public key is not RSA".into()))?;

        let sig_alg =
            sigill_crypto::sign::from_uri(parsed.signed_info.signature_method.uri())?;
        let valid = sig_alg.verify(
            &SigningKey::RsaPublic(public_key),
            &canonical_signed_info,
            &parsed.signature_value,
        )?;
        if !valid {
            return Err(Error::SignatureInvalid(
                "SignedInfo signature does not verify".into(),
            ));
        }
        debug!("signature value verified");

        // Validate the certificate against the trust store and clock.
        let mut trusted = Vec::new();
        for cert in self.cert_store.certificates()? {
            trusted.push(
                cert.to_der()
                    .map_err(|e| Error::Certificate(format!("trust store: {e}")))?,
            );
        }
        let config = CertValidationConfig {
            trusted_certs: &trusted,
            untrusted_certs: &parsed.certificates[1..],
            now: self.clock.now()?,
        };
        validate_cert_chain(leaf_der, &config)?;
        debug!("certificate chain validated");

        Ok(referent)
    }

    /// Find the Signature element this call binds: the unique one whose
    /// References use the empty URI or the root's ID, or the document's
    /// only Signature when none does.
    fn find_signature<'a, 'input>(
        &self,
        root: roxmltree::Node<'a, 'input>,
    ) -> Result<roxmltree::Node<'a, 'input>, Error> {
        let candidates = find_elements(root, ns::DSIG, ns::node::SIGNATURE);
        if candidates.is_empty() {
            return Err(Error::MissingElement(ns::node::SIGNATURE.into()));
        }
        let root_id = root.attribute(self.id_attribute.as_str());
        let mut bound = Vec::new();
        for &sig in &candidates {
            let Some(signed_info) = find_child_element(sig, ns::DSIG, ns::node::SIGNED_INFO)
            else {
                continue;
            };
            let binds_root = find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE)
                .iter()
                .any(|r| {
                    let uri = r.attribute(ns::attr::URI).unwrap_or("");
                    if uri.is_empty() {
                        return true;
                    }
                    match (uri.strip_prefix('#'), root_id) {
                        (Some(fragment), Some(id)) => fragment == id,
                        _ => false,
                    }
                });
            if binds_root {
                bound.push(sig);
            }
        }

        match bound.len() {
            1 => Ok(bound[0]),
            // A single Signature that does not name the root still binds
            // this call; its Reference resolution decides the referent
            // (and fails closed when the URI resolves to nothing).
            0 if candidates.len() == 1 => Ok(candidates[0]),
            0 => Err(Error::XmlStructure(
                "no Signature references the document root".into(),
            )),
            _ => Err(Error::XmlStructure(
                "multiple Signature elements bind the root; validate one at a time".into(),
            )),
        }
    }
}

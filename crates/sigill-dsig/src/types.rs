#![forbid(unsafe_code)]

//! Typed views of a parsed `<Signature>` element.
//!
//! Algorithm URIs are resolved against the registry while parsing, so an
//! unsupported algorithm fails the pipeline before any cryptographic
//! work.

use sigill_c14n::Canonicalizer;
use sigill_core::algorithm::{DigestMethod, SignatureMethod};
use sigill_core::{ns, Error};
use sigill_transforms::TransformStep;
use sigill_xml::document::{find_child_element, find_child_elements};
use sigill_xml::nodeset::node_index;

/// A parsed `<Reference>`.
#[derive(Debug)]
pub struct ParsedReference {
    /// The URI attribute ("" or `#id`).
    pub uri: String,
    /// The ordered transform list.
    pub transforms: Vec<TransformStep>,
    /// The declared digest method.
    pub digest_method: DigestMethod,
    /// The stated digest, base64-decoded.
    pub digest_value: Vec<u8>,
}

/// A parsed `<SignedInfo>`.
#[derive(Debug)]
pub struct ParsedSignedInfo {
    /// The canonicalizer SignedInfo declares for itself.
    pub canonicalization: Canonicalizer,
    /// The declared signature method.
    pub signature_method: SignatureMethod,
    /// The references, in document order (at least one).
    pub references: Vec<ParsedReference>,
}

/// A parsed `<Signature>`.
#[derive(Debug)]
pub struct ParsedSignature {
    /// Node index of the Signature element within its document.
    pub node_index: usize,
    pub signed_info: ParsedSignedInfo,
    /// The SignatureValue, base64-decoded.
    pub signature_value: Vec<u8>,
    /// DER certificates embedded in KeyInfo/X509Data, in document order.
    pub certificates: Vec<Vec<u8>>,
}

impl ParsedSignature {
    /// Parse a `<Signature>` element.
    pub fn from_node(sig_node: roxmltree::Node<'_, '_>) -> Result<Self, Error> {
        let signed_info_node = find_child_element(sig_node, ns::DSIG, ns::node::SIGNED_INFO)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNED_INFO.into()))?;

        let c14n_node =
            find_child_element(signed_info_node, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
                .ok_or_else(|| Error::MissingElement(ns::node::CANONICALIZATION_METHOD.into()))?;
        let c14n_uri = c14n_node.attribute(ns::attr::ALGORITHM).ok_or_else(|| {
            Error::MissingAttribute("Algorithm on CanonicalizationMethod".into())
        })?;
        let canonicalization =
            Canonicalizer::from_uri(c14n_uri, read_inclusive_prefixes(c14n_node))?;

        let sig_method_node =
            find_child_element(signed_info_node, ns::DSIG, ns::node::SIGNATURE_METHOD)
                .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_METHOD.into()))?;
        let sig_method_uri = sig_method_node
            .attribute(ns::attr::ALGORITHM)
            .ok_or_else(|| Error::MissingAttribute("Algorithm on SignatureMethod".into()))?;
        let signature_method = SignatureMethod::from_uri(sig_method_uri)?;

        let mut references = Vec::new();
        for reference_node in find_child_elements(signed_info_node, ns::DSIG, ns::node::REFERENCE)
        {
            references.push(parse_reference(reference_node)?);
        }
        if references.is_empty() {
            return Err(Error::MissingElement(ns::node::REFERENCE.into()));
        }

        let sig_value_node = find_child_element(sig_node, ns::DSIG, ns::node::SIGNATURE_VALUE)
            .ok_or_else(|| Error::MissingElement(ns::node::SIGNATURE_VALUE.into()))?;
        let signature_value = decode_b64(
            sig_value_node.text().unwrap_or(""),
            ns::node::SIGNATURE_VALUE,
        )?;

        let mut certificates = Vec::new();
        if let Some(key_info) = find_child_element(sig_node, ns::DSIG, ns::node::KEY_INFO) {
            if let Some(x509_data) = find_child_element(key_info, ns::DSIG, ns::node::X509_DATA) {
                for cert_node in
                    find_child_elements(x509_data, ns::DSIG, ns::node::X509_CERTIFICATE)
                {
                    certificates.push(decode_b64(
                        cert_node.text().unwrap_or(""),
                        ns::node::X509_CERTIFICATE,
                    )?);
                }
            }
        }

        Ok(Self {
            node_index: node_index(sig_node),
            signed_info: ParsedSignedInfo {
                canonicalization,
                signature_method,
                references,
            },
            signature_value,
            certificates,
        })
    }
}

fn parse_reference(reference_node: roxmltree::Node<'_, '_>) -> Result<ParsedReference, Error> {
    let uri = reference_node
        .attribute(ns::attr::URI)
        .unwrap_or("")
        .to_owned();

    let mut transforms = Vec::new();
    if let Some(transforms_node) =
        find_child_element(reference_node, ns::DSIG, ns::node::TRANSFORMS)
    {
        for transform_node in
            find_child_elements(transforms_node, ns::DSIG, ns::node::TRANSFORM)
        {
            let transform_uri = transform_node
                .attribute(ns::attr::ALGORITHM)
                .ok_or_else(|| Error::MissingAttribute("Algorithm on Transform".into()))?;
            transforms.push(TransformStep {
                uri: transform_uri.to_owned(),
                prefix_list: read_inclusive_prefixes(transform_node),
            });
        }
    }

    let digest_method_node =
        find_child_element(reference_node, ns::DSIG, ns::node::DIGEST_METHOD)
            .ok_or_else(|| Error::MissingElement(ns::node::DIGEST_METHOD.into()))?;
    let digest_uri = digest_method_node
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on DigestMethod".into()))?;
    let digest_method = DigestMethod::from_uri(digest_uri)?;

    let digest_value_node =
        find_child_element(reference_node, ns::DSIG, ns::node::DIGEST_VALUE)
            .ok_or_else(|| Error::MissingElement(ns::node::DIGEST_VALUE.into()))?;
    let digest_value = decode_b64(
        digest_value_node.text().unwrap_or(""),
        ns::node::DIGEST_VALUE,
    )?;

    Ok(ParsedReference {
        uri,
        transforms,
        digest_method,
        digest_value,
    })
}

/// Read the `PrefixList` of an `InclusiveNamespaces` child, if present.
fn read_inclusive_prefixes(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    for child in node.children() {
        if child.is_element() && child.tag_name().name() == ns::node::INCLUSIVE_NAMESPACES {
            if let Some(prefix_list) = child.attribute(ns::attr::PREFIX_LIST) {
                return prefix_list
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect();
            }
        }
    }
    Vec::new()
}

/// Decode base64 text, tolerating embedded whitespace.
pub(crate) fn decode_b64(text: &str, what: &str) -> Result<Vec<u8>, Error> {
    use base64::Engine;
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_core::algorithm;

    const SIGNED: &str = r##"<r ID="x"><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/><ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/><ds:Reference URI="#x"><ds:Transforms><ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/><ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"><ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="xs foo"/></ds:Transform></ds:Transforms><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>aGFzaGhhc2hoYXNoaGFzaGhhc2hoYXNoaGFzaGhhc2g=</ds:DigestValue></ds:Reference></ds:SignedInfo><ds:SignatureValue>c2ln</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>Y2VydA==</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature></r>"##;

    fn parse_signed(xml: &str) -> Result<ParsedSignature, Error> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let sig = sigill_xml::document::find_element(
            doc.root(),
            ns::DSIG,
            ns::node::SIGNATURE,
        )
        .unwrap();
        ParsedSignature::from_node(sig)
    }

    #[test]
    fn parses_a_complete_signature() {
        let parsed = parse_signed(SIGNED).unwrap();
        assert_eq!(
            parsed.signed_info.signature_method,
            SignatureMethod::RsaSha256
        );
        assert_eq!(parsed.signed_info.references.len(), 1);
        let reference = &parsed.signed_info.references[0];
        assert_eq!(reference.uri, "#x");
        assert_eq!(reference.transforms.len(), 2);
        assert_eq!(reference.transforms[1].prefix_list, vec!["xs", "foo"]);
        assert_eq!(reference.digest_method, DigestMethod::Sha256);
        assert_eq!(parsed.certificates, vec![b"cert".to_vec()]);
        assert_eq!(parsed.signature_value, b"sig");
    }

    #[test]
    fn unknown_signature_method_fails_before_crypto() {
        let xml = SIGNED.replace(algorithm::RSA_SHA256, "urn:bogus-method");
        assert!(matches!(
            parse_signed(&xml),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn unknown_canonicalization_fails_before_crypto() {
        let xml = SIGNED.replace(
            "http://www.w3.org/2001/10/xml-exc-c14n#\"/><ds:SignatureMethod",
            "urn:bogus-c14n\"/><ds:SignatureMethod",
        );
        assert!(matches!(
            parse_signed(&xml),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn missing_reference_is_structural() {
        let doc = roxmltree::Document::parse(
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/><ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/></ds:SignedInfo><ds:SignatureValue>c2ln</ds:SignatureValue></ds:Signature>"#,
        )
        .unwrap();
        assert!(matches!(
            ParsedSignature::from_node(doc.root_element()),
            Err(Error::MissingElement(_))
        ));
    }
}

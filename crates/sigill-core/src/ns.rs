#![forbid(unsafe_code)]

//! XML namespace, element and attribute name constants.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Exclusive C14N namespace
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// XML namespace (bound to the `xml:` prefix)
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix emitted on Signature elements by default.
pub const DEFAULT_PREFIX: &str = "ds";

/// Prefix emitted in KYC mode (no prefix, default namespace).
pub const EMPTY_PREFIX: &str = "";

/// ID attribute resolved by `#id` references by default.
pub const DEFAULT_ID_ATTR: &str = "ID";

/// ID attribute resolved in KYC mode.
pub const KYC_ID_ATTR: &str = "id";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const X509_SUBJECT_NAME: &str = "X509SubjectName";
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ALGORITHM: &str = "Algorithm";
    pub const URI: &str = "URI";
    pub const PREFIX_LIST: &str = "PrefixList";
}

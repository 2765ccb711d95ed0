#![forbid(unsafe_code)]

/// Errors produced by the Sigill XML signature library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("reference URI resolves to no element: {0}")]
    MissingId(String),

    #[error("duplicate ID attribute value: {0}")]
    DuplicateId(String),

    #[error("transform chain rejected: {0}")]
    TransformRejected(String),

    #[error("digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("certificate chain does not terminate at a trusted root: {0}")]
    UntrustedCert(String),

    #[error("certificate has expired (notAfter: {0})")]
    CertExpired(String),

    #[error("certificate is not yet valid (notBefore: {0})")]
    CertNotYetValid(String),

    #[error("private key was not RSA")]
    NonRsaKey,

    #[error("no public certificates provided")]
    MissingCertificates,

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#![forbid(unsafe_code)]

//! Algorithm URI constants and registries for XML-DSig.
//!
//! Each constant is the canonical URI string that appears in `Algorithm`
//! attributes.  The closed enums below form the bidirectional registry:
//! `from_uri` rejects anything outside the supported set, there is no
//! fallback.

use crate::error::Error;

// ── Canonicalization ─────────────────────────────────────────────────

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const C14N11: &str = "http://www.w3.org/2006/12/xml-c14n11";
pub const C14N11_WITH_COMMENTS: &str = "http://www.w3.org/2006/12/xml-c14n11#WithComments";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

// ── Digest algorithms ────────────────────────────────────────────────

pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

// ── RSA signature algorithms ─────────────────────────────────────────

pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

// ── Transform algorithms ─────────────────────────────────────────────

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// A digest algorithm supported for `DigestMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMethod {
    Sha1,
    Sha256,
    Sha512,
}

impl DigestMethod {
    /// Get the algorithm URI for this digest method.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Sha1 => SHA1,
            Self::Sha256 => SHA256,
            Self::Sha512 => SHA512,
        }
    }

    /// Parse a digest method from an algorithm URI.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            SHA1 => Ok(Self::Sha1),
            SHA256 => Ok(Self::Sha256),
            SHA512 => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("digest: {uri}"))),
        }
    }

    /// Length of the digest output in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }
}

/// A signature method supported for `SignatureMethod`.
///
/// Only the RSA PKCS#1 v1.5 family is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMethod {
    RsaSha1,
    RsaSha256,
    RsaSha512,
}

impl SignatureMethod {
    /// Get the algorithm URI for this signature method.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha1 => RSA_SHA1,
            Self::RsaSha256 => RSA_SHA256,
            Self::RsaSha512 => RSA_SHA512,
        }
    }

    /// Parse a signature method from an algorithm URI.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            RSA_SHA1 => Ok(Self::RsaSha1),
            RSA_SHA256 => Ok(Self::RsaSha256),
            RSA_SHA512 => Ok(Self::RsaSha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("signature method: {uri}"))),
        }
    }

    /// The digest this signature method hashes with.
    pub fn digest(&self) -> DigestMethod {
        match self {
            Self::RsaSha1 => DigestMethod::Sha1,
            Self::RsaSha256 => DigestMethod::Sha256,
            Self::RsaSha512 => DigestMethod::Sha512,
        }
    }

    /// The signature method implied by a digest choice.
    pub fn for_digest(digest: DigestMethod) -> Self {
        match digest {
            DigestMethod::Sha1 => Self::RsaSha1,
            DigestMethod::Sha256 => Self::RsaSha256,
            DigestMethod::Sha512 => Self::RsaSha512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_registry_round_trips() {
        for m in [DigestMethod::Sha1, DigestMethod::Sha256, DigestMethod::Sha512] {
            assert_eq!(DigestMethod::from_uri(m.uri()).unwrap(), m);
        }
    }

    #[test]
    fn unknown_uris_are_rejected() {
        assert!(DigestMethod::from_uri("http://example.com/not-a-digest").is_err());
        assert!(SignatureMethod::from_uri("http://www.w3.org/2000/09/xmldsig#dsa-sha1").is_err());
    }

    #[test]
    fn signature_method_implies_digest() {
        assert_eq!(SignatureMethod::RsaSha256.digest(), DigestMethod::Sha256);
        assert_eq!(
            SignatureMethod::for_digest(DigestMethod::Sha512),
            SignatureMethod::RsaSha512
        );
    }
}

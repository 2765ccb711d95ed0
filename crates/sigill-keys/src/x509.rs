#![forbid(unsafe_code)]

//! X.509 certificate chain validation.
//!
//! Validates a leaf certificate against trusted roots: validity window
//! against the caller's clock, digitalSignature key usage, and a chain of
//! RSA signatures from the leaf to a trusted root, optionally through
//! untrusted intermediates supplied alongside the signature.

use der::{Decode, Encode};
use sigill_core::Error;
use x509_cert::Certificate;

const KEY_USAGE_OID: &str = "2.5.29.15";

/// Inputs for chain validation.
pub struct CertValidationConfig<'a> {
    /// Trusted root certificates (DER-encoded).
    pub trusted_certs: &'a [Vec<u8>],
    /// Untrusted intermediate certificates (DER-encoded), e.g. the rest
    /// of a KeyInfo chain.
    pub untrusted_certs: &'a [Vec<u8>],
    /// The verification instant.
    pub now: der::DateTime,
}

/// Validate a certificate chain from a leaf cert to a trusted root.
pub fn validate_cert_chain(leaf_der: &[u8], config: &CertValidationConfig<'_>) -> Result<(), Error> {
    let leaf = Certificate::from_der(leaf_der)
        .map_err(|e| Error::Certificate(format!("failed to parse leaf certificate: {e}")))?;

    if config.trusted_certs.is_empty() {
        return Err(Error::UntrustedCert(
            "no trusted certificates available".into(),
        ));
    }

    check_time_validity(&leaf, &config.now)?;
    check_digital_signature_usage(&leaf)?;

    let mut available: Vec<(Certificate, Vec<u8>)> = Vec::new();
    for der in config.untrusted_certs {
        if der.as_slice() == leaf_der {
            continue;
        }
        if let Ok(c) = Certificate::from_der(der) {
            available.push((c, der.clone()));
        }
    }

    let mut trusted: Vec<(Certificate, Vec<u8>)> = Vec::new();
    for der in config.trusted_certs {
        if let Ok(c) = Certificate::from_der(der) {
            trusted.push((c, der.clone()));
        }
    }
    if trusted.is_empty() {
        return Err(Error::UntrustedCert(
            "no trusted certificate could be parsed".into(),
        ));
    }

    build_and_verify_chain(&leaf, leaf_der, &available, &trusted, config)
}

/// Check the validity window of a certificate against the clock instant.
fn check_time_validity(cert: &Certificate, now: &der::DateTime) -> Result<(), Error> {
    let not_before = cert.tbs_certificate.validity.not_before.to_date_time();
    let not_after = cert.tbs_certificate.validity.not_after.to_date_time();

    if *now < not_before {
        return Err(Error::CertNotYetValid(not_before.to_string()));
    }
    if *now > not_after {
        return Err(Error::CertExpired(not_after.to_string()));
    }
    Ok(())
}

/// Require the digitalSignature key usage when the extension is present.
fn check_digital_signature_usage(cert: &Certificate) -> Result<(), Error> {
    use x509_cert::ext::pkix::{KeyUsage, KeyUsages};

    let Some(extensions) = &cert.tbs_certificate.extensions else {
        return Ok(());
    };
    for ext in extensions {
        if ext.extn_id.to_string() != KEY_USAGE_OID {
            continue;
        }
        let usage = KeyUsage::from_der(ext.extn_value.as_bytes())
            .map_err(|e| Error::Certificate(format!("invalid KeyUsage extension: {e}")))?;
        if !usage.0.contains(KeyUsages::DigitalSignature) {
            return Err(Error::Certificate(
                "certificate key usage does not include digitalSignature".into(),
            ));
        }
    }
    Ok(())
}

fn build_and_verify_chain(
    leaf: &Certificate,
    leaf_der: &[u8],
    available: &[(Certificate, Vec<u8>)],
    trusted: &[(Certificate, Vec<u8>)],
    config: &CertValidationConfig<'_>,
) -> Result<(), Error> {
    // The leaf itself may be a trusted (self-signed) certificate.
    for (tc, tc_der) in trusted {
        if tc_der.as_slice() == leaf_der {
            return verify_cert_signature(leaf, &tc.tbs_certificate.subject_public_key_info);
        }
    }

    let leaf_issuer_der = leaf.tbs_certificate.issuer.to_der().unwrap_or_default();
    let leaf_subject_der = leaf.tbs_certificate.subject.to_der().unwrap_or_default();

    // Self-signed but not directly trusted: accept only if a trusted cert
    // carries the same subject and its key verifies the signature.
    if leaf_issuer_der == leaf_subject_der {
        for (tc, _) in trusted {
            let tc_subject = tc.tbs_certificate.subject.to_der().unwrap_or_default();
            if tc_subject == leaf_issuer_der
                && verify_cert_signature(leaf, &tc.tbs_certificate.subject_public_key_info).is_ok()
            {
                return Ok(());
            }
        }
        return Err(Error::UntrustedCert(
            "self-signed certificate not in trusted store".into(),
        ));
    }

    // Walk issuer links until a trusted root signs the chain head.
    let mut current = leaf.clone();
    let mut visited: Vec<Vec<u8>> = vec![leaf_der.to_vec()];
    let max_depth = 10;

    for _ in 0..max_depth {
        let issuer_der = current.tbs_certificate.issuer.to_der().unwrap_or_default();

        for (tc, _) in trusted {
            let tc_subject = tc.tbs_certificate.subject.to_der().unwrap_or_default();
            if tc_subject == issuer_der
                && verify_cert_signature(&current, &tc.tbs_certificate.subject_public_key_info)
                    .is_ok()
            {
                check_time_validity(tc, &config.now)?;
                return Ok(());
            }
        }

        let mut advanced = false;
        for (ic, ic_der) in available {
            if visited.contains(ic_der) {
                continue;
            }
            let ic_subject = ic.tbs_certificate.subject.to_der().unwrap_or_default();
            if ic_subject == issuer_der
                && verify_cert_signature(&current, &ic.tbs_certificate.subject_public_key_info)
                    .is_ok()
            {
                check_time_validity(ic, &config.now)?;
                visited.push(ic_der.clone());
                current = ic.clone();
                advanced = true;
                break;
            }
        }

        if !advanced {
            return Err(Error::UntrustedCert(
                "cannot find issuer certificate (incomplete chain)".into(),
            ));
        }
    }

    Err(Error::UntrustedCert("certificate chain too long".into()))
}

/// Verify a certificate's signature using the issuer's SPKI.
fn verify_cert_signature(
    cert: &Certificate,
    issuer_spki: &spki::SubjectPublicKeyInfoOwned,
) -> Result<(), Error> {
    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode TBS: {e}")))?;
    let sig_bytes = cert
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Certificate("no signature bytes".into()))?;
    let spki_der = issuer_spki
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode issuer SPKI: {e}")))?;

    // sha1WithRSAEncryption .. sha512WithRSAEncryption
    const SHA1_RSA: &str = "1.2.840.113549.1.1.5";
    const SHA256_RSA: &str = "1.2.840.113549.1.1.11";
    const SHA384_RSA: &str = "1.2.840.113549.1.1.12";
    const SHA512_RSA: &str = "1.2.840.113549.1.1.13";

    let oid = cert.signature_algorithm.oid.to_string();
    match oid.as_str() {
        SHA1_RSA => verify_rsa_signature::<sha1::Sha1>(&spki_der, &tbs_der, sig_bytes),
        SHA256_RSA => verify_rsa_signature::<sha2::Sha256>(&spki_der, &tbs_der, sig_bytes),
        SHA384_RSA => verify_rsa_signature::<sha2::Sha384>(&spki_der, &tbs_der, sig_bytes),
        SHA512_RSA => verify_rsa_signature::<sha2::Sha512>(&spki_der, &tbs_der, sig_bytes),
        _ => Err(Error::Certificate(format!(
            "unsupported certificate signature algorithm: {oid}"
        ))),
    }
}

/// Verify an RSA PKCS#1 v1.5 signature.
fn verify_rsa_signature<D>(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature: &[u8],
) -> Result<(), Error>
where
    D: digest::Digest + digest::const_oid::AssociatedOid,
{
    use spki::DecodePublicKey;

    let public_key = rsa::RsaPublicKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid RSA public key: {e}")))?;
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public_key);
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| Error::Certificate(format!("invalid RSA signature: {e}")))?;

    use signature::Verifier;
    verifying_key.verify(tbs_der, &sig).map_err(|e| {
        Error::Certificate(format!("certificate signature verification failed: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock, SystemClock};
    use crate::keystore::{MemoryKeyStore, X509KeyStore};

    fn store_and_der() -> (MemoryKeyStore, Vec<u8>) {
        let store = MemoryKeyStore::random().unwrap();
        let der = store.cert_der().to_vec();
        (store, der)
    }

    #[test]
    fn self_signed_cert_in_trust_store_validates() {
        let (_, der) = store_and_der();
        let config = CertValidationConfig {
            trusted_certs: &[der.clone()],
            untrusted_certs: &[],
            now: SystemClock.now().unwrap(),
        };
        validate_cert_chain(&der, &config).unwrap();
    }

    #[test]
    fn untrusted_cert_is_rejected() {
        let (_, signer) = store_and_der();
        let (_, other) = store_and_der();
        let config = CertValidationConfig {
            trusted_certs: &[other],
            untrusted_certs: &[],
            now: SystemClock.now().unwrap(),
        };
        assert!(matches!(
            validate_cert_chain(&signer, &config),
            Err(Error::UntrustedCert(_))
        ));
    }

    #[test]
    fn expired_cert_is_rejected() {
        let (_, der) = store_and_der();
        let config = CertValidationConfig {
            trusted_certs: &[der.clone()],
            untrusted_certs: &[],
            now: FixedClock::at(2100, 1, 1, 0, 0, 0).unwrap().now().unwrap(),
        };
        assert!(matches!(
            validate_cert_chain(&der, &config),
            Err(Error::CertExpired(_))
        ));
    }

    #[test]
    fn not_yet_valid_cert_is_rejected() {
        let (_, der) = store_and_der();
        let config = CertValidationConfig {
            trusted_certs: &[der.clone()],
            untrusted_certs: &[],
            now: FixedClock::at(2000, 1, 1, 0, 0, 0).unwrap().now().unwrap(),
        };
        assert!(matches!(
            validate_cert_chain(&der, &config),
            Err(Error::CertNotYetValid(_))
        ));
    }

    #[test]
    fn empty_trust_store_is_untrusted() {
        let (_, der) = store_and_der();
        let config = CertValidationConfig {
            trusted_certs: &[],
            untrusted_certs: &[],
            now: SystemClock.now().unwrap(),
        };
        assert!(matches!(
            validate_cert_chain(&der, &config),
            Err(Error::UntrustedCert(_))
        ));
    }

    #[test]
    fn leaf_certificate_test_profile_allows_signing() {
        let (store, _) = store_and_der();
        let (_, cert) = store.key_pair().unwrap();
        check_digital_signature_usage(&cert).unwrap();
    }
}

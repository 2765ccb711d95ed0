#![forbid(unsafe_code)]

//! Key and certificate store capabilities.
//!
//! Producers need a signing key with its leaf certificate; verifiers need
//! a set of trusted roots.  Both are modeled as small traits so callers
//! can plug in memory pairs, TLS-style bundles or hardware-backed
//! providers.  Non-RSA keys are rejected when the store is built, not at
//! signing time.

use der::{Decode, Encode};
use sigill_core::Error;
use x509_cert::Certificate;

/// Yields the signing key and its leaf certificate.
pub trait X509KeyStore: Send + Sync {
    fn key_pair(&self) -> Result<(rsa::RsaPrivateKey, Certificate), Error>;
}

/// Yields additional chain certificates to embed in KeyInfo.
pub trait X509ChainStore: Send + Sync {
    fn chain(&self) -> Result<Vec<Certificate>, Error>;
}

/// Yields the trusted root certificates for verification.
pub trait X509CertificateStore: Send + Sync {
    fn certificates(&self) -> Result<Vec<Certificate>, Error>;
}

/// An in-memory trust store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCertificateStore {
    pub roots: Vec<Certificate>,
}

impl MemoryCertificateStore {
    pub fn new(roots: Vec<Certificate>) -> Self {
        Self { roots }
    }
}

impl X509CertificateStore for MemoryCertificateStore {
    fn certificates(&self) -> Result<Vec<Certificate>, Error> {
        Ok(self.roots.clone())
    }
}

/// An in-memory key store holding one RSA key and its DER certificate.
pub struct MemoryKeyStore {
    private_key: rsa::RsaPrivateKey,
    cert: Vec<u8>,
}

impl MemoryKeyStore {
    pub fn new(private_key: rsa::RsaPrivateKey, cert_der: Vec<u8>) -> Self {
        Self {
            private_key,
            cert: cert_der,
        }
    }

    /// The DER encoding of the stored certificate.
    pub fn cert_der(&self) -> &[u8] {
        &self.cert
    }

    /// Generate a fresh RSA key with a self-signed certificate.
    ///
    /// Intended for tests: the certificate carries the digitalSignature
    /// key usage and is valid for a year from now.
    pub fn random() -> Result<Self, Error> {
        use core::str::FromStr;
        use x509_cert::builder::{Builder, CertificateBuilder, Profile};
        use x509_cert::name::Name;
        use x509_cert::serial_number::SerialNumber;
        use x509_cert::spki::SubjectPublicKeyInfoOwned;
        use x509_cert::time::Validity;

        let mut rng = rand::thread_rng();
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| Error::Key(format!("RSA key generation failed: {e}")))?;

        let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private_key.clone());

        let subject = Name::from_str("CN=sigill test signer")
            .map_err(|e| Error::Certificate(format!("invalid subject: {e}")))?;
        let profile = Profile::Leaf {
            issuer: subject.clone(),
            enable_key_agreement: false,
            enable_key_encipherment: false,
        };
        let serial = SerialNumber::from(1u32);
        let validity = Validity::from_now(std::time::Duration::from_secs(365 * 24 * 3600))
            .map_err(|e| Error::Certificate(format!("validity: {e}")))?;

        use pkcs8::EncodePublicKey;
        let spki_der = private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Error::Certificate(format!("SPKI encoding: {e}")))?;
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())
            .map_err(|e| Error::Certificate(format!("SPKI decoding: {e}")))?;

        let builder = CertificateBuilder::new(profile, serial, validity, subject, spki, &signer)
            .map_err(|e| Error::Certificate(format!("certificate builder: {e}")))?;
        let cert = builder
            .build::<rsa::pkcs1v15::Signature>()
            .map_err(|e| Error::Certificate(format!("certificate signing: {e}")))?;

        let cert_der = cert
            .to_der()
            .map_err(|e| Error::Certificate(format!("certificate encoding: {e}")))?;
        Ok(Self::new(private_key, cert_der))
    }
}

impl X509KeyStore for MemoryKeyStore {
    fn key_pair(&self) -> Result<(rsa::RsaPrivateKey, Certificate), Error> {
        let cert = Certificate::from_der(&self.cert)
            .map_err(|e| Error::Certificate(format!("stored certificate: {e}")))?;
        Ok((self.private_key.clone(), cert))
    }
}

/// A key store over a TLS-style certificate bundle: an ordered list of
/// DER certificates (leaf first) plus the private key.
pub struct TlsCertKeyStore {
    certificate: Vec<Vec<u8>>,
    private_key: rsa::RsaPrivateKey,
}

impl TlsCertKeyStore {
    /// Build from DER certificates and a PKCS#8 DER private key.
    /// Fails with [`Error::NonRsaKey`] unless the key is RSA.
    pub fn new(certificate: Vec<Vec<u8>>, pkcs8_private_key: &[u8]) -> Result<Self, Error> {
        use pkcs8::DecodePrivateKey;
        let private_key = rsa::RsaPrivateKey::from_pkcs8_der(pkcs8_private_key)
            .map_err(|_| Error::NonRsaKey)?;
        Ok(Self {
            certificate,
            private_key,
        })
    }
}

impl X509KeyStore for TlsCertKeyStore {
    fn key_pair(&self) -> Result<(rsa::RsaPrivateKey, Certificate), Error> {
        let leaf_der = self.certificate.first().ok_or(Error::MissingCertificates)?;
        let cert = Certificate::from_der(leaf_der).map_err(|_| Error::MissingCertificates)?;
        Ok((self.private_key.clone(), cert))
    }
}

impl X509ChainStore for TlsCertKeyStore {
    fn chain(&self) -> Result<Vec<Certificate>, Error> {
        let mut certs = Vec::new();
        for der in &self.certificate {
            if let Ok(cert) = Certificate::from_der(der) {
                certs.push(cert);
            }
        }
        Ok(certs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::EncodePrivateKey;

    #[test]
    fn random_store_yields_matching_pair() {
        let store = MemoryKeyStore::random().unwrap();
        let (key, cert) = store.key_pair().unwrap();
        // The certificate's public key must match the private key.
        use pkcs8::EncodePublicKey;
        let expected = key.to_public_key().to_public_key_der().unwrap();
        let embedded = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .unwrap();
        assert_eq!(expected.as_bytes(), embedded.as_slice());
    }

    #[test]
    fn tls_store_requires_certificates() {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pkcs8 = key.to_pkcs8_der().unwrap();
        let store = TlsCertKeyStore::new(Vec::new(), pkcs8.as_bytes()).unwrap();
        assert!(matches!(
            store.key_pair(),
            Err(Error::MissingCertificates)
        ));
    }

    #[test]
    fn tls_store_rejects_non_rsa_keys() {
        // Garbage that is not a PKCS#8 RSA key.
        assert!(matches!(
            TlsCertKeyStore::new(Vec::new(), b"not a key"),
            Err(Error::NonRsaKey)
        ));
    }

    #[test]
    fn tls_store_exposes_the_chain() {
        let store = MemoryKeyStore::random().unwrap();
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pkcs8 = key.to_pkcs8_der().unwrap();
        let tls = TlsCertKeyStore::new(
            vec![store.cert_der().to_vec(), store.cert_der().to_vec()],
            pkcs8.as_bytes(),
        )
        .unwrap();
        assert_eq!(tls.chain().unwrap().len(), 2);
    }
}

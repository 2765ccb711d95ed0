#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signature implementations.

use sigill_core::{algorithm, Error};
use signature::SignatureEncoding;

/// Key material for signature operations.
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA1,
            hash: HashType::Sha1,
        })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA256,
            hash: HashType::Sha256,
        })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA512,
            hash: HashType::Sha512,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {uri}"
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType {
    Sha1,
    Sha256,
    Sha512,
}

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: HashType,
}

impl RsaPkcs1v15 {
    fn sign_with_key(
        &self,
        private_key: &rsa::RsaPrivateKey,
        data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify_with_key(
        &self,
        public_key: &rsa::RsaPublicKey,
        data: &[u8],
        sig_bytes: &[u8],
    ) -> Result<bool, Error> {
        use signature::Verifier;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        match key {
            SigningKey::Rsa(pk) => self.sign_with_key(pk, data),
            _ => Err(Error::Key("RSA private key required".into())),
        }
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let pubk = match key {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
        };
        self.verify_with_key(&pubk, data, sig_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_sign_verify_round_trip() {
        let mut rng = rand::thread_rng();
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let key = SigningKey::Rsa(private_key.clone());
        let public = SigningKey::RsaPublic(private_key.to_public_key());

        for uri in [algorithm::RSA_SHA1, algorithm::RSA_SHA256, algorithm::RSA_SHA512] {
            let alg = from_uri(uri).unwrap();
            let sig = alg.sign(&key, b"payload").unwrap();
            assert!(alg.verify(&public, b"payload", &sig).unwrap());
            assert!(!alg.verify(&public, b"tampered", &sig).unwrap());
        }
    }

    #[test]
    fn unsupported_families_are_rejected() {
        for uri in [
            "http://www.w3.org/2000/09/xmldsig#dsa-sha1",
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
            "http://www.w3.org/2000/09/xmldsig#hmac-sha1",
        ] {
            assert!(from_uri(uri).is_err());
        }
    }
}

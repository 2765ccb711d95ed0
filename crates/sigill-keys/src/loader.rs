#![forbid(unsafe_code)]

//! Key and certificate loading from PEM/DER, used by the CLI.

use sigill_core::Error;
use x509_cert::Certificate;

/// Load an RSA private key from PEM data (PKCS#8 or PKCS#1).
pub fn load_rsa_private_pem(pem_data: &[u8]) -> Result<rsa::RsaPrivateKey, Error> {
    use pkcs8::DecodePrivateKey;
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_pem(pem_str) {
        return Ok(pk);
    }

    use pkcs1::DecodeRsaPrivateKey;
    rsa::RsaPrivateKey::from_pkcs1_pem(pem_str)
        .map_err(|e| Error::Key(format!("failed to parse RSA private key PEM: {e}")))
}

/// Load one or more certificates from PEM data.
pub fn load_certificates_pem(pem_data: &[u8]) -> Result<Vec<Certificate>, Error> {
    use x509_cert::der::DecodePem;

    let certs = Certificate::load_pem_chain(pem_data)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate PEM: {e}")))?;
    if certs.is_empty() {
        // A single certificate without chain framing.
        let single = Certificate::from_pem(pem_data)
            .map_err(|e| Error::Certificate(format!("failed to parse certificate PEM: {e}")))?;
        return Ok(vec![single]);
    }
    Ok(certs)
}

/// Load a certificate from DER data.
pub fn load_certificate_der(der_data: &[u8]) -> Result<Certificate, Error> {
    use der::Decode;
    Certificate::from_der(der_data)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate DER: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::EncodePrivateKey;

    #[test]
    fn pkcs8_pem_round_trip() {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pem = key
            .to_pkcs8_pem(pkcs8::LineEnding::LF)
            .unwrap();
        let loaded = load_rsa_private_pem(pem.as_bytes()).unwrap();
        assert_eq!(loaded, key);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(load_rsa_private_pem(b"-----BEGIN JUNK-----").is_err());
        assert!(load_certificate_der(b"nope").is_err());
    }
}

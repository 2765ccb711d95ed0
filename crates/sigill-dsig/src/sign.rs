#![forbid(unsafe_code)]

//! Signature construction.
//!
//! Builds a `<Signature>` element over a target element: reference digest,
//! SignedInfo assembly, RSA PKCS#1 v1.5 over the canonical SignedInfo,
//! KeyInfo with the signing certificate.

use base64::Engine;
use sigill_c14n::Canonicalizer;
use sigill_core::algorithm::{DigestMethod, SignatureMethod};
use sigill_core::{algorithm, ns, Error};
use sigill_crypto::SigningKey;
use sigill_keys::{X509ChainStore, X509KeyStore};
use sigill_xml::{Element, NsContext};
use std::sync::Arc;
use tracing::debug;
use x509_cert::der::Encode;

/// Context for producing signatures.  Configured once, then usable for
/// any number of signing calls.
pub struct SigningContext {
    digest: DigestMethod,
    key_store: Arc<dyn X509KeyStore>,
    chain_store: Option<Arc<dyn X509ChainStore>>,
    id_attribute: String,
    prefix: String,
    canonicalizer: Canonicalizer,
}

impl SigningContext {
    /// The default profile: SHA-256, `ID` attribute, `ds` prefix,
    /// Canonical XML 1.1.
    pub fn new_default(key_store: Arc<dyn X509KeyStore>) -> Self {
        Self {
            digest: DigestMethod::Sha256,
            key_store,
            chain_store: None,
            id_attribute: ns::DEFAULT_ID_ATTR.to_owned(),
            prefix: ns::DEFAULT_PREFIX.to_owned(),
            canonicalizer: Canonicalizer::c14n_1_1(),
        }
    }

    /// The KYC profile: SHA-1, `id` attribute, no prefix, Canonical XML
    /// 1.0 REC.
    pub fn new_kyc(key_store: Arc<dyn X509KeyStore>) -> Self {
        Self {
            digest: DigestMethod::Sha1,
            key_store,
            chain_store: None,
            id_attribute: ns::KYC_ID_ATTR.to_owned(),
            prefix: ns::EMPTY_PREFIX.to_owned(),
            canonicalizer: Canonicalizer::c14n_1_0_rec(),
        }
    }

    /// Embed additional chain certificates from this store in KeyInfo.
    pub fn with_chain_store(mut self, chain_store: Arc<dyn X509ChainStore>) -> Self {
        self.chain_store = Some(chain_store);
        self
    }

    /// Configure the hash by SignatureMethod URI.  Unknown URIs fail and
    /// leave the context untouched.
    pub fn set_signature_method(&mut self, uri: &str) -> Result<(), Error> {
        let method = SignatureMethod::from_uri(uri)?;
        self.digest = method.digest();
        Ok(())
    }

    /// Replace the canonicalizer.
    pub fn set_canonicalizer(&mut self, canonicalizer: Canonicalizer) {
        self.canonicalizer = canonicalizer;
    }

    /// The signature method implied by the configured hash.
    pub fn signature_method(&self) -> SignatureMethod {
        SignatureMethod::for_digest(self.digest)
    }

    /// The configured digest method.
    pub fn digest_method(&self) -> DigestMethod {
        self.digest
    }

    fn digest(&self, el: &Element) -> Result<Vec<u8>, Error> {
        let canonical = self.canonicalizer.canonicalize_element(el)?;
        debug!(
            algorithm = self.canonicalizer.algorithm(),
            len = canonical.len(),
            "canonicalized for digest"
        );
        sigill_crypto::digest::digest(self.digest.uri(), &canonical)
    }

    fn element(&self, tag: &str) -> Element {
        Element::new(&self.prefix, tag)
    }

    fn construct_signed_info(&self, el: &Element, enveloped: bool) -> Result<Element, Error> {
        let digest = self.digest(el)?;

        let mut signed_info = self.element(ns::node::SIGNED_INFO);

        // /SignedInfo/CanonicalizationMethod
        let mut c14n_method = self.element(ns::node::CANONICALIZATION_METHOD);
        c14n_method.set_attr(ns::attr::ALGORITHM, self.canonicalizer.algorithm());
        signed_info.append_element(c14n_method);

        // /SignedInfo/SignatureMethod
        let mut signature_method = self.element(ns::node::SIGNATURE_METHOD);
        signature_method.set_attr(ns::attr::ALGORITHM, self.signature_method().uri());
        signed_info.append_element(signature_method);

        // /SignedInfo/Reference
        let data_id = el
            .attr(&self.id_attribute)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::MissingAttribute(format!("{} on signed element", self.id_attribute))
            })?
            .to_owned();

        let mut reference = self.element(ns::node::REFERENCE);
        reference.set_attr(ns::attr::URI, &format!("#{data_id}"));

        // /SignedInfo/Reference/Transforms
        //
        // The enveloped transform is a no-op at signing time (the
        // Signature is not inside the target yet) but is declared so the
        // verifier performs the removal.
        let mut transforms = self.element(ns::node::TRANSFORMS);
        if enveloped {
            let mut enveloped_transform = self.element(ns::node::TRANSFORM);
            enveloped_transform.set_attr(ns::attr::ALGORITHM, algorithm::ENVELOPED_SIGNATURE);
            transforms.append_element(enveloped_transform);
        }
        let mut c14n_transform = self.element(ns::node::TRANSFORM);
        c14n_transform.set_attr(ns::attr::ALGORITHM, self.canonicalizer.algorithm());
        transforms.append_element(c14n_transform);
        reference.append_element(transforms);

        // /SignedInfo/Reference/DigestMethod + DigestValue
        let mut digest_method = self.element(ns::node::DIGEST_METHOD);
        digest_method.set_attr(ns::attr::ALGORITHM, self.digest.uri());
        reference.append_element(digest_method);

        let mut digest_value = self.element(ns::node::DIGEST_VALUE);
        digest_value.set_text(&base64::engine::general_purpose::STANDARD.encode(&digest));
        reference.append_element(digest_value);

        signed_info.append_element(reference);
        Ok(signed_info)
    }

    /// Build a `<Signature>` element over `el`.
    pub fn construct_signature(&self, el: &Element, enveloped: bool) -> Result<Element, Error> {
        let signed_info = self.construct_signed_info(el, enveloped)?;

        let mut sig = self.element(ns::node::SIGNATURE);
        let xmlns = if self.prefix.is_empty() {
            "xmlns".to_owned()
        } else {
            format!("xmlns:{}", self.prefix)
        };
        sig.set_attr(&xmlns, ns::DSIG);
        sig.append_element(signed_info.clone());

        // For non-exclusive canonicalization the canonical form of
        // SignedInfo must declare every namespace in scope at its final
        // enveloped location.  Capture that scope with cascading
        // namespace contexts before serializing:
        //
        // the scope around the target, the target's own declarations,
        // then the declarations of the Signature we just built.
        let root_ctx = NsContext::new();
        let el_ctx = root_ctx.sub_context(el);
        let sig_ctx = el_ctx.sub_context(&sig);
        let detached_signed_info = sig_ctx.detach(&signed_info)?;

        let canonical_signed_info = self
            .canonicalizer
            .canonicalize_element(&detached_signed_info)?;
        debug!(
            len = canonical_signed_info.len(),
            "canonicalized detached SignedInfo"
        );

        let (key, cert) = self.key_store.key_pair()?;
        let sig_alg = sigill_crypto::sign::from_uri(self.signature_method().uri())?;
        let raw_signature = sig_alg.sign(&SigningKey::Rsa(key), &canonical_signed_info)?;

        let mut signature_value = self.element(ns::node::SIGNATURE_VALUE);
        signature_value.set_text(&base64::engine::general_purpose::STANDARD.encode(&raw_signature));
        sig.append_element(signature_value);

        // /Signature/KeyInfo/X509Data
        let leaf_der = cert
            .to_der()
            .map_err(|e| Error::Certificate(format!("certificate encoding: {e}")))?;

        let mut x509_data = self.element(ns::node::X509_DATA);
        let mut x509_certificate = self.element(ns::node::X509_CERTIFICATE);
        x509_certificate.set_text(&base64::engine::general_purpose::STANDARD.encode(&leaf_der));
        x509_data.append_element(x509_certificate);

        let subject = cert.tbs_certificate.subject.to_string();
        if !subject.is_empty() {
            let mut x509_subject = self.element(ns::node::X509_SUBJECT_NAME);
            x509_subject.set_text(&subject);
            x509_data.append_element(x509_subject);
        }

        if let Some(chain_store) = &self.chain_store {
            for chain_cert in chain_store.chain()? {
                let der = chain_cert
                    .to_der()
                    .map_err(|e| Error::Certificate(format!("chain encoding: {e}")))?;
                if der == leaf_der {
                    continue;
                }
                let mut extra = self.element(ns::node::X509_CERTIFICATE);
                extra.set_text(&base64::engine::general_purpose::STANDARD.encode(&der));
                x509_data.append_element(extra);
            }
        }

        let mut key_info = self.element(ns::node::KEY_INFO);
        key_info.append_element(x509_data);
        sig.append_element(key_info);

        Ok(sig)
    }

    /// Return a copy of `el` with a Signature over it appended as the
    /// last child.
    pub fn sign_enveloped(&self, el: &Element) -> Result<Element, Error> {
        let sig = self.construct_signature(el, true)?;
        let mut signed = el.clone();
        signed.append_element(sig);
        Ok(signed)
    }

    /// Hash and RSA-sign raw bytes, without canonicalization.
    ///
    /// Used for the SAML HTTP-Redirect binding, where the signature
    /// covers the deflated query string rather than an XML subtree.
    pub fn sign_string(&self, content: &[u8]) -> Result<Vec<u8>, Error> {
        let (key, _) = self.key_store.key_pair()?;
        let sig_alg = sigill_crypto::sign::from_uri(self.signature_method().uri())?;
        sig_alg.sign(&SigningKey::Rsa(key), content)
    }
}

//! Sign/verify round-trips over every supported (hash, canonicalizer)
//! pair, plus the signing-context failure modes.

use sigill_c14n::Canonicalizer;
use sigill_core::algorithm::{self, SignatureMethod};
use sigill_core::Error;
use sigill_dsig::{SigningContext, ValidationContext};
use sigill_keys::{MemoryCertificateStore, MemoryKeyStore, X509KeyStore};
use sigill_xml::Element;
use std::sync::Arc;

const TARGET: &str = r#"<t:Envelope xmlns:t="urn:test:envelope" xmlns:x="urn:test:extra" ID="env-1"><t:Body x:note="n">payload &amp; more</t:Body></t:Envelope>"#;

fn trust_of(store: &MemoryKeyStore) -> Arc<MemoryCertificateStore> {
    let (_, cert) = store.key_pair().unwrap();
    Arc::new(MemoryCertificateStore::new(vec![cert]))
}

#[test]
fn sign_verify_round_trip_all_combinations() {
    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let trust = trust_of(&store);
    let target = Element::parse(TARGET).unwrap();

    let methods = [
        algorithm::RSA_SHA1,
        algorithm::RSA_SHA256,
        algorithm::RSA_SHA512,
    ];
    let canonicalizers = [
        Canonicalizer::exclusive_1_0_with_prefix_list(""),
        Canonicalizer::c14n_1_0_rec(),
        Canonicalizer::c14n_1_1(),
    ];

    for method in methods {
        for canonicalizer in &canonicalizers {
            let mut ctx = SigningContext::new_default(store.clone());
            ctx.set_signature_method(method).unwrap();
            ctx.set_canonicalizer(canonicalizer.clone());

            let signed = ctx.sign_enveloped(&target).unwrap();
            let vctx = ValidationContext::new_default(trust.clone());
            let verified = vctx
                .validate(&signed)
                .unwrap_or_else(|e| panic!("{method} / {}: {e}", canonicalizer.algorithm()));

            assert_eq!(verified.local_name(), "Envelope");
            assert_eq!(verified.attr("ID"), Some("env-1"));
            let text = verified.to_xml_string();
            assert!(text.contains("payload &amp; more"));
            assert!(!text.contains("Signature"));
        }
    }
}

#[test]
fn signature_carries_expected_structure() {
    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let ctx = SigningContext::new_default(store);
    let target = Element::parse(TARGET).unwrap();

    let sig = ctx.construct_signature(&target, true).unwrap();
    assert_eq!(sig.tag(), "ds:Signature");
    assert_eq!(
        sig.attr("xmlns:ds"),
        Some("http://www.w3.org/2000/09/xmldsig#")
    );

    let text = sig.to_xml_string();
    assert!(text.contains(r##"<ds:Reference URI="#env-1">"##));
    assert!(text.contains(
        r#"<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>"#
    ));
    assert!(text.contains(
        r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#
    ));
    assert!(text.contains("<ds:X509Certificate>"));
    assert!(text.contains("<ds:X509SubjectName>"));
    // SignedInfo is the first child.
    assert_eq!(sig.children().len(), 3);
    assert_eq!(sig.child_elements().next().unwrap().tag(), "ds:SignedInfo");
}

#[test]
fn signing_leaves_the_target_untouched() {
    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let ctx = SigningContext::new_default(store);
    let target = Element::parse(TARGET).unwrap();
    let before = target.to_xml_string();
    let signed = ctx.sign_enveloped(&target).unwrap();
    assert_eq!(target.to_xml_string(), before);
    assert_ne!(signed.to_xml_string(), before);
}

#[test]
fn unknown_signature_method_leaves_context_unchanged() {
    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let mut ctx = SigningContext::new_default(store);
    assert_eq!(ctx.signature_method(), SignatureMethod::RsaSha256);

    let err = ctx
        .set_signature_method("http://www.w3.org/2000/09/xmldsig#dsa-sha1")
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    assert_eq!(ctx.signature_method(), SignatureMethod::RsaSha256);
}

#[test]
fn missing_id_attribute_fails_signing() {
    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let ctx = SigningContext::new_default(store);
    let target = Element::parse(r#"<doc><body/></doc>"#).unwrap();
    assert!(matches!(
        ctx.sign_enveloped(&target),
        Err(Error::MissingAttribute(_))
    ));
}

#[test]
fn sign_string_round_trips_through_rsa() {
    use rsa::signature::Verifier;

    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let ctx = SigningContext::new_default(store.clone());

    let payload = b"SAMLRequest=fZJNb&RelayState=123&SigAlg=rsa-sha256";
    let sig_bytes = ctx.sign_string(payload).unwrap();

    let (key, _) = store.key_pair().unwrap();
    let verifying_key =
        rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(key.to_public_key());
    let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes.as_slice()).unwrap();
    verifying_key.verify(payload, &sig).unwrap();
}

#[test]
fn verification_fails_without_matching_trust_root() {
    let signer = Arc::new(MemoryKeyStore::random().unwrap());
    let other = MemoryKeyStore::random().unwrap();

    let ctx = SigningContext::new_default(signer);
    let signed = ctx.sign_enveloped(&Element::parse(TARGET).unwrap()).unwrap();

    let vctx = ValidationContext::new_default(trust_of(&other));
    assert!(matches!(
        vctx.validate(&signed),
        Err(Error::UntrustedCert(_))
    ));
}

#[test]
fn tampering_after_signing_is_detected() {
    let store = Arc::new(MemoryKeyStore::random().unwrap());
    let ctx = SigningContext::new_default(store.clone());
    let signed = ctx.sign_enveloped(&Element::parse(TARGET).unwrap()).unwrap();
    let tampered = signed
        .to_xml_string()
        .replace("payload &amp; more", "payload &amp; worse");

    let vctx = ValidationContext::new_default(trust_of(&store));
    assert!(matches!(
        vctx.validate_xml(&tampered),
        Err(Error::DigestMismatch(_))
    ));
}

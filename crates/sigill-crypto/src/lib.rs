#![forbid(unsafe_code)]

//! Cryptographic primitives for Sigill, dispatched by XML-DSig algorithm
//! URI.  Only the algorithms the signature pipeline registers are
//! implemented: SHA-1/256/512 digests and RSA PKCS#1 v1.5 signatures.

pub mod digest;
pub mod sign;

pub use sign::{SignatureAlgorithm, SigningKey};

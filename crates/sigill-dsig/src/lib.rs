#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) creation and verification.
//!
//! Producers use a [`SigningContext`]; verifiers use a
//! [`ValidationContext`].  Both are configured once and are safe to share
//! across threads (the stores and clock they hold are `Send + Sync`).
//!
//! # Trusting the result
//!
//! `ValidationContext::validate` returns the exact subtree whose digest
//! and signature were verified.  Consume only that element.  Re-reading
//! the input document after validation re-opens the door to signature
//! wrapping: an attacker can place a second, unsigned element where a
//! naive consumer will look for it.  Duplicate values of the configured
//! ID attribute are rejected outright for the same reason.

pub mod sign;
pub mod types;
pub mod validate;

pub use sign::SigningContext;
pub use types::{ParsedReference, ParsedSignature, ParsedSignedInfo};
pub use validate::ValidationContext;

#![forbid(unsafe_code)]

//! Key and certificate handling for the Sigill XML signature library:
//! store capabilities for producers and verifiers, X.509 chain
//! validation, the clock abstraction, and PEM/DER loading helpers.

pub mod clock;
pub mod keystore;
pub mod loader;
pub mod x509;

pub use clock::{Clock, FixedClock, SystemClock};
pub use keystore::{
    MemoryCertificateStore, MemoryKeyStore, TlsCertKeyStore, X509CertificateStore, X509ChainStore,
    X509KeyStore,
};

#![forbid(unsafe_code)]

//! XML document abstraction for the Sigill XML signature library.
//!
//! Parsing and read-only navigation go through `roxmltree`.  The owned
//! [`Element`] tree covers the mutable side: building Signature elements,
//! detaching subtrees with captured namespace declarations, and returning
//! verified referents to callers.

pub mod document;
pub mod element;
pub mod nodeset;
pub mod nsctx;
pub mod qname;

pub use element::{Attribute, Element, Node};
pub use nodeset::NodeSet;
pub use nsctx::NsContext;

/// Parsing options used across the library.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    }
}

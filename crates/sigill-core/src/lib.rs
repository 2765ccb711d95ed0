#![forbid(unsafe_code)]

//! Core types for the Sigill XML signature library: the error taxonomy,
//! the algorithm-URI registry and the XML-DSig name constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};

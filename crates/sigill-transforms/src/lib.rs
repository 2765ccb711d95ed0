#![forbid(unsafe_code)]

//! Reference transforms for the Sigill XML signature library: the
//! enveloped-signature removal and the canonicalization step, composed
//! through a validated per-Reference plan.

pub mod enveloped;
pub mod pipeline;

pub use pipeline::{ReferencePlan, TransformKind, TransformStep, DEFAULT_MAX_TRANSFORMS};

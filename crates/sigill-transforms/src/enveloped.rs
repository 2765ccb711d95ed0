#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes one `<Signature>` element and its descendants from the node
//! set.  The element is identified by node index, so the removal is
//! scoped to exactly the Signature whose Reference is being processed;
//! other Signature elements in the tree are untouched.

use sigill_core::Error;
use sigill_xml::nodeset::{node_index, NodeSet};

/// Remove the Signature subtree with the given node index from the set.
pub fn remove_signature(
    doc: &roxmltree::Document<'_>,
    signature_node_index: usize,
    node_set: &mut NodeSet,
) -> Result<(), Error> {
    let sig_node = doc
        .descendants()
        .find(|n| node_index(*n) == signature_node_index)
        .ok_or_else(|| {
            Error::Transform("enveloped-signature: Signature node not found".into())
        })?;
    node_set.remove_subtree(sig_node);
    Ok(())
}

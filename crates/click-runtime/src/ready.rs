use crate::dom::{Document, DomError, NodeId};

/// Id of the element appended once the first reconciliation pass completed.
pub const READY_MARKER_ID: &str = "clickManagerReady";

const MARKER_STYLE: &str = "display: none;";

/// Appends the hidden ready marker to `body`.
pub fn append_ready_marker(document: &mut Document) -> Result<NodeId, DomError> {
    let body = document.body();
    let marker = document.append_element(
        body,
        "div",
        [("id", READY_MARKER_ID), ("style", MARKER_STYLE)],
    )?;
    document.set_text(marker, "click manager ready")?;
    Ok(marker)
}

pub fn find_ready_marker(document: &Document) -> Option<NodeId> {
    document.get_element_by_id(READY_MARKER_ID)
}

/// Removes the marker if present. Returns whether one was removed.
pub fn remove_ready_marker(document: &mut Document) -> Result<bool, DomError> {
    match find_ready_marker(document) {
        Some(marker) => document.remove(marker),
        None => Ok(false),
    }
}

//! Ownership policy for edit and delete affordances.
//!
//! Presentation only: the server enforces ownership on every write.

use stockroom_api_models::{Item, RecordId};

/// Whether `viewer` may see edit/delete controls for `item`.
#[must_use]
pub fn can_edit(viewer: Option<RecordId>, item: &Item) -> bool {
    viewer.is_some_and(|viewer| viewer == item.owner.id)
}

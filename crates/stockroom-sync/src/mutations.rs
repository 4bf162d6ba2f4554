//! Create, update and delete flows with cache invalidation and navigation.
//!
//! # Design
//! - Drafts are normalised locally before any request is issued.
//! - Create is not atomic: an upload failure after a successful create is
//!   reported as `PartialFailure` and the item is kept.
//! - Delete requires a `ConfirmedDelete`, which only a `DeleteRequest` can produce.

use std::sync::Arc;

use stockroom_api_models::{ItemDraft, RecordId};

use crate::api::{Asset, InventoryApi};
use crate::auth::expire_on_unauthorized;
use crate::cache::{ItemChange, QueryCache};
use crate::error::SyncError;
use crate::routes::{Navigator, Route};
use crate::session::SessionStore;

/// Result of the image step that follows a create or update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    /// No asset was supplied.
    NotRequested,
    /// The asset was attached.
    Uploaded,
    /// The item was saved but the asset was not attached.
    Failed(SyncError),
}

/// Successful create or update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Item that was written.
    pub item_id: RecordId,
    /// Route navigated to afterwards.
    pub navigated_to: Route,
    /// Image upload result.
    pub upload: UploadStatus,
}

impl MutationOutcome {
    /// Upload failure reported as [`SyncError::PartialFailure`], if any.
    #[must_use]
    pub const fn partial_failure(&self) -> Option<&SyncError> {
        match &self.upload {
            UploadStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Pending delete awaiting confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a delete request does nothing until confirmed"]
pub struct DeleteRequest {
    id: RecordId,
}

impl DeleteRequest {
    /// Item to delete.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Record the user's confirmation.
    #[must_use]
    pub const fn confirm(self) -> ConfirmedDelete {
        ConfirmedDelete { id: self.id }
    }

    /// Ask `confirm`; `None` when the user declines.
    #[must_use]
    pub fn confirm_with(self, confirm: &dyn Confirm) -> Option<ConfirmedDelete> {
        if confirm.confirm(&self) {
            Some(self.confirm())
        } else {
            tracing::info!(item_id = self.id, "delete declined");
            None
        }
    }
}

/// Delete the user has confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmedDelete {
    id: RecordId,
}

impl ConfirmedDelete {
    /// Item to delete.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }
}

/// Source of delete confirmations.
pub trait Confirm {
    /// Whether the user agrees to delete `request`.
    fn confirm(&self, request: &DeleteRequest) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&DeleteRequest) -> bool,
{
    fn confirm(&self, request: &DeleteRequest) -> bool {
        self(request)
    }
}

/// Writes items through the API and keeps cache and navigation in step.
pub struct MutationDispatcher {
    session: Arc<SessionStore>,
    cache: Arc<QueryCache>,
    navigator: Arc<Navigator>,
    api: Arc<dyn InventoryApi>,
}

impl MutationDispatcher {
    /// Dispatcher over the shared session, cache, navigator and API.
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        cache: Arc<QueryCache>,
        navigator: Arc<Navigator>,
        api: Arc<dyn InventoryApi>,
    ) -> Self {
        Self {
            session,
            cache,
            navigator,
            api,
        }
    }

    /// Create an item, then upload `asset` to the id the server assigned.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when there is no session, the draft is invalid, or
    /// the create request fails. Upload failures are reported in the outcome.
    pub async fn create(
        &self,
        draft: ItemDraft,
        asset: Option<Asset>,
    ) -> Result<MutationOutcome, SyncError> {
        self.ensure_session("create", None)?;
        let draft = draft
            .normalized()
            .map_err(|err| self.reject("create", None, err.into()))?;
        let created = self
            .api
            .create_item(&draft)
            .await
            .map_err(|err| self.reject("create", None, err))?;
        tracing::info!(item_id = created.id, "item created");
        self.cache.apply_change(&ItemChange::Created(created.id));

        let upload = self.attach(created.id, asset).await;
        Ok(self.finish(created.id, upload))
    }

    /// Replace the mutable fields of item `id`, then upload `asset` if given.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when there is no session, the draft is invalid, or
    /// the update request fails. Upload failures are reported in the outcome.
    pub async fn update(
        &self,
        id: RecordId,
        draft: ItemDraft,
        asset: Option<Asset>,
    ) -> Result<MutationOutcome, SyncError> {
        self.ensure_session("update", Some(id))?;
        let draft = draft
            .normalized()
            .map_err(|err| self.reject("update", Some(id), err.into()))?;
        let updated = self
            .api
            .update_item(id, &draft)
            .await
            .map_err(|err| self.reject("update", Some(id), err))?;
        tracing::info!(item_id = id, "item updated");
        self.cache.apply_change(&ItemChange::Updated(updated));

        let upload = self.attach(id, asset).await;
        Ok(self.finish(id, upload))
    }

    /// Begin deleting item `id`; nothing is sent until confirmed.
    pub const fn prepare_delete(&self, id: RecordId) -> DeleteRequest {
        DeleteRequest { id }
    }

    /// Delete a confirmed item and refresh the current view.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when there is no session or the request fails.
    pub async fn delete(&self, request: ConfirmedDelete) -> Result<Route, SyncError> {
        let id = request.id();
        self.ensure_session("delete", Some(id))?;
        self.api
            .delete_item(id)
            .await
            .map_err(|err| self.reject("delete", Some(id), err))?;
        tracing::info!(item_id = id, "item deleted");
        self.cache.apply_change(&ItemChange::Removed(id));
        self.navigator.refresh();
        Ok(self.navigator.current())
    }

    async fn attach(&self, id: RecordId, asset: Option<Asset>) -> UploadStatus {
        let Some(asset) = asset else {
            return UploadStatus::NotRequested;
        };
        match self.api.upload_image(id, &asset).await {
            Ok(()) => {
                tracing::info!(item_id = id, file = %asset.file_name, "image uploaded");
                self.cache.apply_change(&ItemChange::Modified(id));
                UploadStatus::Uploaded
            }
            Err(err) => {
                expire_on_unauthorized(&self.session, &self.cache, &err);
                let partial = SyncError::PartialFailure {
                    item_id: id,
                    message: err.user_message(),
                };
                tracing::warn!(item_id = id, error = %err, "image upload failed after save");
                UploadStatus::Failed(partial)
            }
        }
    }

    fn finish(&self, item_id: RecordId, upload: UploadStatus) -> MutationOutcome {
        self.navigator.navigate(Route::Items);
        MutationOutcome {
            item_id,
            navigated_to: Route::Items,
            upload,
        }
    }

    fn ensure_session(&self, operation: &str, item_id: Option<RecordId>) -> Result<(), SyncError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(self.reject(operation, item_id, SyncError::login_required()))
        }
    }

    fn reject(&self, operation: &str, item_id: Option<RecordId>, error: SyncError) -> SyncError {
        tracing::warn!(
            operation,
            item_id,
            retryable = error.is_retryable(),
            error = %error,
            "mutation failed"
        );
        expire_on_unauthorized(&self.session, &self.cache, &error);
        error
    }
}

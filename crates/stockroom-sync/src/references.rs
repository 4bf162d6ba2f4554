//! Cached location, tag and group lists.

use std::sync::Arc;

use stockroom_api_models::{RecordId, ReferenceEntry, ReferenceKind};

use crate::api::InventoryApi;
use crate::cache::{CachePayload, QueryKey};
use crate::coordinator::DependentFetchCoordinator;
use crate::error::SyncError;

/// Reference lists used to populate filters and forms.
pub struct ReferenceCatalog {
    coordinator: Arc<DependentFetchCoordinator>,
    api: Arc<dyn InventoryApi>,
}

impl ReferenceCatalog {
    /// Catalog reading through `coordinator`'s cache.
    #[must_use]
    pub fn new(coordinator: Arc<DependentFetchCoordinator>, api: Arc<dyn InventoryApi>) -> Self {
        Self { coordinator, api }
    }

    /// Entries for `kind`, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] without a session or when the request fails.
    pub async fn load(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, SyncError> {
        self.fetch(kind, false).await
    }

    /// Entries for `kind`, always refetched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] without a session or when the request fails.
    pub async fn refresh(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, SyncError> {
        self.fetch(kind, true).await
    }

    /// Name of entry `id` from the cached `kind` list.
    #[must_use]
    pub fn resolve_name(&self, kind: ReferenceKind, id: RecordId) -> Option<String> {
        match self.coordinator.cache().payload(&QueryKey::References(kind))? {
            CachePayload::References(entries) => entries
                .into_iter()
                .find(|entry| entry.id == id)
                .map(|entry| entry.name),
            _ => None,
        }
    }

    async fn fetch(
        &self,
        kind: ReferenceKind,
        force: bool,
    ) -> Result<Vec<ReferenceEntry>, SyncError> {
        if !self.coordinator.session().is_authenticated() {
            return Err(SyncError::login_required());
        }
        let key = QueryKey::References(kind);
        let payload = self
            .coordinator
            .cached(key.clone(), force, || async {
                self.api
                    .list_references(kind)
                    .await
                    .map(CachePayload::References)
            })
            .await?;
        match payload {
            CachePayload::References(entries) => {
                tracing::debug!(kind = kind.as_str(), count = entries.len(), "references loaded");
                Ok(entries)
            }
            other => Err(SyncError::network(format!(
                "unexpected cached payload for {key}: {other:?}"
            ))),
        }
    }
}

//! Identity-before-data sequencing and the per-view state machines.
//!
//! # Design
//! - Every view walks `Idle -> LoadingIdentity -> LoadingData -> Ready | Error`.
//! - Transitions happen only when a fetch completes; each load carries an epoch
//!   and a completion whose epoch is no longer current leaves the view untouched.
//! - Cached payloads are stored through tickets, so a superseded response still
//!   lands in its own key's entry without reaching visible state.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stockroom_api_models::{Identity, Item, RecordId};

use crate::api::InventoryApi;
use crate::auth::expire_on_unauthorized;
use crate::cache::{CacheEntry, CachePayload, ITEMS_RESOURCE, QueryCache, QueryKey};
use crate::error::SyncError;
use crate::filters::{FilterCriteria, FilterState};
use crate::ownership::can_edit;
use crate::session::SessionStore;

/// Lifecycle of a data-backed view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewPhase {
    /// Nothing requested; also the resting state without a session.
    Idle,
    /// Waiting for `users/me/`.
    LoadingIdentity,
    /// Identity known; waiting for the view's data.
    LoadingData,
    /// Data applied.
    Ready,
    /// Last relevant fetch failed.
    Error(SyncError),
}

impl ViewPhase {
    /// Whether data has been applied.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Failure carried by the `Error` phase.
    #[must_use]
    pub const fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Shared collaborators for identity-gated fetches.
pub struct DependentFetchCoordinator {
    session: Arc<SessionStore>,
    cache: Arc<QueryCache>,
    api: Arc<dyn InventoryApi>,
}

impl DependentFetchCoordinator {
    /// Coordinator over the given session, cache and remote API.
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        cache: Arc<QueryCache>,
        api: Arc<dyn InventoryApi>,
    ) -> Self {
        Self {
            session,
            cache,
            api,
        }
    }

    /// Session consulted before every fetch.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Cache the coordinator writes through.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Resolve the signed-in user, reusing the cached identity for this session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthFailure`] without a session, or the failure of
    /// the identity request.
    pub async fn resolve_identity(&self) -> Result<Identity, SyncError> {
        if !self.session.is_authenticated() {
            return Err(SyncError::login_required());
        }
        let payload = self
            .cached(QueryKey::Identity, false, || async {
                self.api
                    .current_identity()
                    .await
                    .map(CachePayload::Identity)
            })
            .await?;
        match payload {
            CachePayload::Identity(identity) => Ok(identity),
            other => Err(unexpected_payload(&QueryKey::Identity, &other)),
        }
    }

    /// Fetch the item list for `criteria`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the list request.
    pub async fn fetch_items(
        &self,
        criteria: &FilterCriteria,
        force: bool,
    ) -> Result<Vec<Item>, SyncError> {
        let key = QueryKey::list(ITEMS_RESOURCE, criteria);
        match self
            .cached(key.clone(), force, || async {
                self.api.list_items(criteria).await.map(CachePayload::Items)
            })
            .await?
        {
            CachePayload::Items(items) => Ok(items),
            other => Err(unexpected_payload(&key, &other)),
        }
    }

    /// Fetch item `id`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the detail request.
    pub async fn fetch_item(&self, id: RecordId, force: bool) -> Result<Item, SyncError> {
        let key = QueryKey::detail(ITEMS_RESOURCE, id);
        match self
            .cached(key.clone(), force, || async {
                self.api.get_item(id).await.map(CachePayload::Item)
            })
            .await?
        {
            CachePayload::Item(item) => Ok(item),
            other => Err(unexpected_payload(&key, &other)),
        }
    }

    /// Serve a fresh entry for `key` or issue `fetch` under a new ticket.
    pub(crate) async fn cached<F, Fut>(
        &self,
        key: QueryKey,
        force: bool,
        fetch: F,
    ) -> Result<CachePayload, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachePayload, SyncError>>,
    {
        if !force
            && let Some(payload) = self
                .cache
                .get(&key)
                .filter(CacheEntry::is_fresh)
                .and_then(|entry| entry.payload)
        {
            tracing::trace!(key = %key, "serving cached payload");
            return Ok(payload);
        }

        let ticket = self.cache.begin(key);
        let result = fetch().await;
        self.cache.resolve(&ticket, result.clone());
        if let Err(error) = &result {
            tracing::warn!(key = %ticket.key(), error = %error, "fetch failed");
            self.handle_failure(error);
        }
        result
    }

    /// Apply the mid-session expiry policy to `error`.
    pub fn handle_failure(&self, error: &SyncError) -> bool {
        expire_on_unauthorized(&self.session, &self.cache, error)
    }
}

fn unexpected_payload(key: &QueryKey, payload: &CachePayload) -> SyncError {
    tracing::error!(key = %key, ?payload, "cache entry holds a payload of the wrong kind");
    SyncError::network(format!("unexpected cached payload for {key}"))
}

#[derive(Debug)]
struct ViewState<T> {
    phase: ViewPhase,
    data: Option<T>,
    viewer: Option<Identity>,
    epoch: u64,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            phase: ViewPhase::Idle,
            data: None,
            viewer: None,
            epoch: 0,
        }
    }
}

impl<T> ViewState<T> {
    /// Start a load; `None` when there is no session to load for.
    fn enter(&mut self, authenticated: bool, identity_cached: bool) -> Option<u64> {
        self.epoch += 1;
        if !authenticated {
            self.phase = ViewPhase::Idle;
            self.data = None;
            self.viewer = None;
            return None;
        }
        self.phase = if identity_cached {
            ViewPhase::LoadingData
        } else {
            ViewPhase::LoadingIdentity
        };
        Some(self.epoch)
    }

    fn identity_resolved(&mut self, epoch: u64, identity: Identity) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.viewer = Some(identity);
        self.phase = ViewPhase::LoadingData;
        true
    }

    fn settle(&mut self, epoch: u64, result: Result<T, SyncError>) -> ViewPhase {
        if self.epoch != epoch {
            tracing::debug!(epoch, current = self.epoch, "discarding superseded completion");
            return self.phase.clone();
        }
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.phase = ViewPhase::Ready;
            }
            Err(error) => {
                self.data = None;
                self.phase = ViewPhase::Error(error);
            }
        }
        self.phase.clone()
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Filterable item list.
pub struct ItemListView {
    coordinator: Arc<DependentFetchCoordinator>,
    filters: Mutex<FilterState>,
    state: Mutex<ViewState<Vec<Item>>>,
}

impl ItemListView {
    /// List view starting from `criteria`.
    #[must_use]
    pub fn new(coordinator: Arc<DependentFetchCoordinator>, criteria: FilterCriteria) -> Self {
        let mut filters = FilterState::default();
        filters.set(criteria);
        Self {
            coordinator,
            filters: Mutex::new(filters),
            state: Mutex::new(ViewState::default()),
        }
    }

    /// Mount the view.
    pub async fn start(&self) -> ViewPhase {
        self.load(false).await
    }

    /// Replace the filters; fetches only when the key changed or nothing is shown.
    pub async fn set_filters(&self, criteria: FilterCriteria) -> ViewPhase {
        let changed = lock(&self.filters).set(criteria);
        if !changed {
            let phase = self.phase();
            if phase.is_ready() {
                return phase;
            }
        }
        self.load(false).await
    }

    /// Re-run the failed step; a no-op outside `Error`.
    pub async fn retry(&self) -> ViewPhase {
        let phase = self.phase();
        if phase.error().is_none() {
            return phase;
        }
        self.load(false).await
    }

    /// Refetch the current key even when cached.
    pub async fn refresh(&self) -> ViewPhase {
        self.load(true).await
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ViewPhase {
        lock(&self.state).phase.clone()
    }

    /// Items currently shown.
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        lock(&self.state).data.clone().unwrap_or_default()
    }

    /// Active filter criteria.
    #[must_use]
    pub fn filters(&self) -> FilterCriteria {
        lock(&self.filters).criteria().clone()
    }

    /// Cache key of the active filters.
    #[must_use]
    pub fn key(&self) -> QueryKey {
        lock(&self.filters).key()
    }

    /// Identity the shown data was loaded for.
    #[must_use]
    pub fn viewer(&self) -> Option<Identity> {
        lock(&self.state).viewer
    }

    /// Whether edit/delete controls render for `item`.
    #[must_use]
    pub fn can_edit(&self, item: &Item) -> bool {
        can_edit(self.viewer().map(|viewer| viewer.id), item)
    }

    async fn load(&self, force: bool) -> ViewPhase {
        let coordinator = &self.coordinator;
        let entered = lock(&self.state).enter(
            coordinator.session().is_authenticated(),
            coordinator.cache().identity().is_some(),
        );
        let Some(epoch) = entered else {
            tracing::debug!("item list idle without a session");
            return ViewPhase::Idle;
        };

        let identity = match coordinator.resolve_identity().await {
            Ok(identity) => identity,
            Err(error) => return lock(&self.state).settle(epoch, Err(error)),
        };
        if !lock(&self.state).identity_resolved(epoch, identity) {
            return self.phase();
        }

        let criteria = self.filters();
        let result = coordinator.fetch_items(&criteria, force).await;
        if let Ok(items) = &result {
            tracing::debug!(count = items.len(), key = %QueryKey::list(ITEMS_RESOURCE, &criteria), "item list loaded");
        }
        lock(&self.state).settle(epoch, result)
    }
}

/// Single item view keyed by id.
pub struct ItemDetailView {
    coordinator: Arc<DependentFetchCoordinator>,
    id: RecordId,
    state: Mutex<ViewState<Item>>,
}

impl ItemDetailView {
    /// Detail view for item `id`.
    #[must_use]
    pub fn new(coordinator: Arc<DependentFetchCoordinator>, id: RecordId) -> Self {
        Self {
            coordinator,
            id,
            state: Mutex::new(ViewState::default()),
        }
    }

    /// Item id shown by this view.
    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    /// Mount the view.
    pub async fn start(&self) -> ViewPhase {
        self.load(false).await
    }

    /// Re-run the failed step; a no-op outside `Error`.
    pub async fn retry(&self) -> ViewPhase {
        let phase = self.phase();
        if phase.error().is_none() {
            return phase;
        }
        self.load(false).await
    }

    /// Refetch even when cached.
    pub async fn refresh(&self) -> ViewPhase {
        self.load(true).await
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ViewPhase {
        lock(&self.state).phase.clone()
    }

    /// Item currently shown.
    #[must_use]
    pub fn item(&self) -> Option<Item> {
        lock(&self.state).data.clone()
    }

    /// Identity the item was loaded for.
    #[must_use]
    pub fn viewer(&self) -> Option<Identity> {
        lock(&self.state).viewer
    }

    /// Whether edit/delete controls render for the shown item.
    #[must_use]
    pub fn can_edit(&self) -> bool {
        let state = lock(&self.state);
        state
            .data
            .as_ref()
            .is_some_and(|item| can_edit(state.viewer.map(|viewer| viewer.id), item))
    }

    async fn load(&self, force: bool) -> ViewPhase {
        let coordinator = &self.coordinator;
        let entered = lock(&self.state).enter(
            coordinator.session().is_authenticated(),
            coordinator.cache().identity().is_some(),
        );
        let Some(epoch) = entered else {
            return ViewPhase::Idle;
        };

        let identity = match coordinator.resolve_identity().await {
            Ok(identity) => identity,
            Err(error) => return lock(&self.state).settle(epoch, Err(error)),
        };
        if !lock(&self.state).identity_resolved(epoch, identity) {
            return self.phase();
        }

        let result = coordinator.fetch_item(self.id, force).await;
        lock(&self.state).settle(epoch, result)
    }
}

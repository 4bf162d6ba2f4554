//! Startup wiring for the synchronisation layer.

use std::sync::Arc;

use stockroom_api_models::RecordId;
use tokio::task::JoinHandle;

use crate::api::{HttpInventoryApi, InventoryApi};
use crate::auth::authenticate;
use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::coordinator::{DependentFetchCoordinator, ItemDetailView, ItemListView};
use crate::error::SyncError;
use crate::filters::FilterCriteria;
use crate::guard::{GuardDecision, RouteGuard};
use crate::mutations::MutationDispatcher;
use crate::references::ReferenceCatalog;
use crate::routes::{Navigator, Route};
use crate::session::{SessionStore, TokenStore};

/// Session, navigation, cache and API shared by every view.
pub struct SyncContext {
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    cache: Arc<QueryCache>,
    api: Arc<dyn InventoryApi>,
    guard: RouteGuard,
    coordinator: Arc<DependentFetchCoordinator>,
}

impl SyncContext {
    /// Restore the persisted session and connect to the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the HTTP client cannot be built.
    pub fn open(config: &ClientConfig, token_store: Box<dyn TokenStore>) -> Result<Self, SyncError> {
        let session = Arc::new(SessionStore::initialize(token_store));
        let api = HttpInventoryApi::new(config, Arc::clone(&session))?;
        tracing::info!(api = %api.base_url(), "sync context opened");
        Ok(Self::with_api(session, Arc::new(api)))
    }

    /// Assemble a context around an existing session and API.
    #[must_use]
    pub fn with_api(session: Arc<SessionStore>, api: Arc<dyn InventoryApi>) -> Self {
        let initial = if session.is_authenticated() {
            Route::Items
        } else {
            Route::Login
        };
        let cache = Arc::new(QueryCache::new());
        let coordinator = Arc::new(DependentFetchCoordinator::new(
            Arc::clone(&session),
            Arc::clone(&cache),
            Arc::clone(&api),
        ));
        Self {
            guard: RouteGuard::new(Arc::clone(&session)),
            navigator: Arc::new(Navigator::new(initial)),
            session,
            cache,
            api,
            coordinator,
        }
    }

    /// Session store.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Navigation history.
    #[must_use]
    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    /// Query cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Route currently shown.
    #[must_use]
    pub fn current_route(&self) -> Route {
        self.navigator.current()
    }

    /// Navigate to `path` and apply the guard.
    pub fn visit(&self, path: &str) -> GuardDecision {
        self.navigator.navigate(Route::parse(path));
        self.guard.enforce(&self.navigator)
    }

    /// Go back one history entry and apply the guard.
    pub fn back(&self) -> GuardDecision {
        self.navigator.back();
        self.guard.enforce(&self.navigator)
    }

    /// Go forward one history entry and apply the guard.
    pub fn forward(&self) -> GuardDecision {
        self.navigator.forward();
        self.guard.enforce(&self.navigator)
    }

    /// Exchange credentials and land on the item list.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] raised by the credential exchange.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), SyncError> {
        authenticate(self.api.as_ref(), &self.session, username, password).await?;
        self.cache.clear();
        if matches!(self.navigator.current(), Route::Login | Route::NotFound) {
            self.navigator.navigate(Route::Items);
        }
        Ok(())
    }

    /// End the session, drop cached data and apply the guard.
    pub fn logout(&self) -> GuardDecision {
        self.session.logout();
        self.cache.clear();
        self.guard.enforce(&self.navigator)
    }

    /// List view over `criteria`.
    #[must_use]
    pub fn item_list_view(&self, criteria: FilterCriteria) -> ItemListView {
        ItemListView::new(Arc::clone(&self.coordinator), criteria)
    }

    /// Detail view for item `id`.
    #[must_use]
    pub fn item_detail_view(&self, id: RecordId) -> ItemDetailView {
        ItemDetailView::new(Arc::clone(&self.coordinator), id)
    }

    /// Mutation dispatcher sharing this context's state.
    #[must_use]
    pub fn mutations(&self) -> MutationDispatcher {
        MutationDispatcher::new(
            Arc::clone(&self.session),
            Arc::clone(&self.cache),
            Arc::clone(&self.navigator),
            Arc::clone(&self.api),
        )
    }

    /// Reference catalog sharing this context's cache.
    #[must_use]
    pub fn references(&self) -> ReferenceCatalog {
        ReferenceCatalog::new(Arc::clone(&self.coordinator), Arc::clone(&self.api))
    }

    /// Run the guard in the background so auth changes redirect immediately.
    #[must_use]
    pub fn spawn_guard(&self) -> JoinHandle<()> {
        tokio::spawn(self.guard.clone().watch(Arc::clone(&self.navigator)))
    }

    /// Tear the context down. Token writes are synchronous, so nothing is flushed.
    pub fn shutdown(self) {
        tracing::info!(
            route = %self.navigator.current(),
            authenticated = self.session.is_authenticated(),
            cached_entries = self.cache.len(),
            "sync context closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Asset;
    use crate::cache::{CachePayload, ITEMS_RESOURCE, QueryKey};
    use crate::config::parse_base_url;
    use crate::coordinator::ViewPhase;
    use crate::mutations::DeleteRequest;
    use crate::session::MemoryTokenStore;
    use crate::testing::{FakeApi, item, session};
    use stockroom_api_models::{ItemCreated, ItemDraft, ReferenceKind};
    use std::time::Duration;

    fn context(api: &Arc<FakeApi>, token: Option<&str>) -> SyncContext {
        SyncContext::with_api(session(token), Arc::clone(api) as Arc<dyn InventoryApi>)
    }

    #[tokio::test]
    async fn scenario_login_then_empty_list() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(&api, None);
        assert_eq!(ctx.current_route(), Route::Login);

        assert_eq!(ctx.visit("/items"), GuardDecision::Redirect(Route::Login));
        let view = ctx.item_list_view(FilterCriteria::default());
        assert_eq!(view.start().await, ViewPhase::Idle);
        assert!(api.calls().is_empty());

        ctx.login("alice", "secret").await.expect("login");
        assert_eq!(ctx.current_route(), Route::Items);
        assert_eq!(view.start().await, ViewPhase::Ready);
        assert!(view.items().is_empty());
        assert_eq!(api.calls(), vec!["token:alice", "identity", "list"]);
    }

    #[tokio::test]
    async fn scenario_location_filter() {
        let api = Arc::new(FakeApi::new());
        api.set_list(FilterCriteria::by_location(3), Ok(vec![item(7, 1)]));
        let ctx = context(&api, Some("tok"));
        let view = ctx.item_list_view(FilterCriteria::default());
        view.start().await;

        view.set_filters(FilterCriteria::by_location(3)).await;

        assert_eq!(api.calls().last().map(String::as_str), Some("list?location=3"));
        assert_eq!(view.items(), vec![item(7, 1)]);
        assert!(
            ctx.cache()
                .get(&QueryKey::list(ITEMS_RESOURCE, &FilterCriteria::default()))
                .is_some()
        );
    }

    #[tokio::test]
    async fn scenario_create_with_image() {
        let api = Arc::new(FakeApi::new());
        api.set_created(Ok(ItemCreated { id: 9 }));
        let ctx = context(&api, Some("tok"));
        assert!(ctx.visit("/items/new").is_allowed());

        let draft = ItemDraft {
            name: "Hammer".into(),
            ..ItemDraft::default()
        };
        let outcome = ctx
            .mutations()
            .create(draft, Some(Asset::new("hammer.jpg", vec![1, 2])))
            .await
            .expect("create");

        assert_eq!(outcome.item_id, 9);
        assert_eq!(api.calls(), vec!["create", "upload:9"]);
        assert_eq!(ctx.navigator().current_path(), "/items");
    }

    #[tokio::test]
    async fn scenario_delete_after_confirmation() {
        let api = Arc::new(FakeApi::new());
        api.set_list(FilterCriteria::default(), Ok(vec![item(9, 1), item(4, 1)]));
        let ctx = context(&api, Some("tok"));
        let view = ctx.item_list_view(FilterCriteria::default());
        view.start().await;

        let mutations = ctx.mutations();
        let confirmed = mutations
            .prepare_delete(9)
            .confirm_with(&|_: &DeleteRequest| true)
            .expect("confirmed");
        mutations.delete(confirmed).await.expect("delete");

        assert_eq!(
            ctx.cache()
                .payload(&QueryKey::list(ITEMS_RESOURCE, &FilterCriteria::default())),
            Some(CachePayload::Items(vec![item(4, 1)]))
        );
        assert_eq!(ctx.current_route(), Route::Items);
        assert_eq!(api.count("delete:9"), 1);
    }

    #[tokio::test]
    async fn delete_during_in_flight_list_fetch_keeps_item_out_of_next_render() {
        let api = Arc::new(FakeApi::new());
        api.set_list(FilterCriteria::default(), Ok(vec![item(5, 1), item(6, 1)]));
        let release_list = api.gate_list(FilterCriteria::default());
        let ctx = context(&api, Some("tok"));
        let view = ctx.item_list_view(FilterCriteria::default());
        let mutations = ctx.mutations();

        let (phase, deleted) = tokio::join!(view.start(), async {
            let deleted = mutations.delete(mutations.prepare_delete(5).confirm()).await;
            release_list.send(()).expect("list request still waiting");
            deleted
        });
        assert_eq!(phase, ViewPhase::Ready);
        deleted.expect("delete");
        assert_eq!(api.calls(), vec!["identity", "list", "delete:5"]);

        api.set_list(FilterCriteria::default(), Ok(vec![item(6, 1)]));
        let next = ctx.item_list_view(FilterCriteria::default());
        assert_eq!(next.start().await, ViewPhase::Ready);
        assert_eq!(next.items(), vec![item(6, 1)]);
        assert_eq!(api.count("list"), 2);
    }

    #[tokio::test]
    async fn logout_blocks_protected_routes_across_history() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(&api, Some("tok"));
        assert!(ctx.visit("/items/4").is_allowed());
        assert!(ctx.visit("/items/4/edit").is_allowed());

        assert_eq!(ctx.logout(), GuardDecision::Redirect(Route::Login));
        assert_eq!(ctx.current_route(), Route::Login);
        assert!(ctx.cache().is_empty());

        assert_eq!(ctx.back(), GuardDecision::Redirect(Route::Login));
        assert_eq!(ctx.current_route(), Route::Login);
        assert_eq!(ctx.forward(), GuardDecision::Allow(Route::Login));
        assert_eq!(ctx.visit("/items"), GuardDecision::Redirect(Route::Login));
        assert!(ctx.visit("/login").is_allowed());
    }

    #[tokio::test]
    async fn background_guard_redirects_on_mid_session_expiry() {
        let api = Arc::new(FakeApi::new());
        api.set_list(FilterCriteria::default(), Err(SyncError::auth("token expired")));
        let ctx = context(&api, Some("tok"));
        let guard = ctx.spawn_guard();
        let mut changes = ctx.navigator().subscribe();

        let phase = ctx.item_list_view(FilterCriteria::default()).start().await;
        assert!(phase.error().is_some_and(SyncError::is_unauthorized));

        tokio::time::timeout(Duration::from_secs(1), async {
            while ctx.current_route() != Route::Login {
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .expect("guard redirected");
        guard.abort();
        ctx.shutdown();
    }

    #[test]
    fn open_builds_an_http_backed_context() {
        let config = ClientConfig::new(
            parse_base_url("http://127.0.0.1:9/api").expect("valid"),
            "req-ctx",
        );
        let ctx = SyncContext::open(&config, Box::new(MemoryTokenStore::with_token("tok")))
            .expect("open");
        assert!(ctx.session().is_authenticated());
        assert_eq!(ctx.current_route(), Route::Items);
        let refs = ctx.references();
        assert_eq!(refs.resolve_name(ReferenceKind::Tags, 1), None);
        assert!(ctx.item_detail_view(3).item().is_none());
    }
}

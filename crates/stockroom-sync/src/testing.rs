//! Fixtures and a recording [`InventoryApi`] fake for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use stockroom_api_models::{
    Identity, Item, ItemCreated, ItemDraft, RecordId, Reference, ReferenceEntry, ReferenceKind,
    TokenRequest, TokenResponse,
};
use tokio::sync::oneshot;

use crate::api::{Asset, InventoryApi};
use crate::error::SyncError;
use crate::filters::FilterCriteria;
use crate::session::{MemoryTokenStore, SessionStore};

/// Item `id` owned by user `owner`.
pub(crate) fn item(id: RecordId, owner: RecordId) -> Item {
    Item {
        id,
        name: format!("item-{id}"),
        description: String::new(),
        location: None,
        group: None,
        tags: Vec::new(),
        images: Vec::new(),
        owner: Reference::id(owner),
        created_at: Utc
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

/// Session store holding `token`, if any.
pub(crate) fn session(token: Option<&str>) -> Arc<SessionStore> {
    let store = token.map_or_else(MemoryTokenStore::default, MemoryTokenStore::with_token);
    Arc::new(SessionStore::initialize(Box::new(store)))
}

struct Script {
    token: Result<TokenResponse, SyncError>,
    identity: Result<Identity, SyncError>,
    lists: HashMap<FilterCriteria, Result<Vec<Item>, SyncError>>,
    gates: HashMap<FilterCriteria, oneshot::Receiver<()>>,
    details: HashMap<RecordId, Result<Item, SyncError>>,
    created: Result<ItemCreated, SyncError>,
    updated: Option<SyncError>,
    deleted: Result<(), SyncError>,
    uploaded: Result<(), SyncError>,
    references: HashMap<ReferenceKind, Vec<ReferenceEntry>>,
}

/// Scripted API that records every call in order.
pub(crate) struct FakeApi {
    calls: Mutex<Vec<String>>,
    script: Mutex<Script>,
}

impl FakeApi {
    /// Identity 1, empty lists, create answering id 9.
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(Script {
                token: Ok(TokenResponse {
                    access: "issued-token".into(),
                    refresh: None,
                }),
                identity: Ok(Identity { id: 1 }),
                lists: HashMap::new(),
                gates: HashMap::new(),
                details: HashMap::new(),
                created: Ok(ItemCreated { id: 9 }),
                updated: None,
                deleted: Ok(()),
                uploaded: Ok(()),
                references: HashMap::new(),
            }),
        }
    }

    pub(crate) fn set_token(&self, result: Result<TokenResponse, SyncError>) {
        self.script().token = result;
    }

    pub(crate) fn set_identity(&self, result: Result<Identity, SyncError>) {
        self.script().identity = result;
    }

    pub(crate) fn set_list(&self, criteria: FilterCriteria, result: Result<Vec<Item>, SyncError>) {
        self.script().lists.insert(criteria, result);
    }

    /// Hold the next list call for `criteria` until the sender fires.
    pub(crate) fn gate_list(&self, criteria: FilterCriteria) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().gates.insert(criteria, rx);
        tx
    }

    pub(crate) fn set_detail(&self, id: RecordId, result: Result<Item, SyncError>) {
        self.script().details.insert(id, result);
    }

    pub(crate) fn set_created(&self, result: Result<ItemCreated, SyncError>) {
        self.script().created = result;
    }

    pub(crate) fn fail_update(&self, error: SyncError) {
        self.script().updated = Some(error);
    }

    pub(crate) fn set_deleted(&self, result: Result<(), SyncError>) {
        self.script().deleted = result;
    }

    pub(crate) fn set_upload(&self, result: Result<(), SyncError>) {
        self.script().uploaded = result;
    }

    pub(crate) fn set_references(&self, kind: ReferenceKind, entries: Vec<ReferenceEntry>) {
        self.script().references.insert(kind, entries);
    }

    /// Calls recorded so far.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.into());
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn list_call(criteria: &FilterCriteria) -> String {
    let query: Vec<String> = criteria
        .query_pairs()
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    if query.is_empty() {
        "list".to_string()
    } else {
        format!("list?{}", query.join("&"))
    }
}

#[async_trait]
impl InventoryApi for FakeApi {
    async fn obtain_token(&self, request: &TokenRequest) -> Result<TokenResponse, SyncError> {
        self.record(format!("token:{}", request.username));
        self.script().token.clone()
    }

    async fn current_identity(&self) -> Result<Identity, SyncError> {
        self.record("identity");
        self.script().identity.clone()
    }

    async fn list_items(&self, filters: &FilterCriteria) -> Result<Vec<Item>, SyncError> {
        self.record(list_call(filters));
        let gate = self.script().gates.remove(filters);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.script()
            .lists
            .get(filters)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_item(&self, id: RecordId) -> Result<Item, SyncError> {
        self.record(format!("detail:{id}"));
        self.script().details.get(&id).cloned().unwrap_or_else(|| {
            Err(SyncError::NetworkFailure {
                message: "Not found.".into(),
                status: Some(404),
            })
        })
    }

    async fn create_item(&self, _draft: &ItemDraft) -> Result<ItemCreated, SyncError> {
        self.record("create");
        self.script().created.clone()
    }

    async fn update_item(&self, id: RecordId, draft: &ItemDraft) -> Result<Item, SyncError> {
        self.record(format!("update:{id}"));
        let script = self.script();
        if let Some(error) = &script.updated {
            return Err(error.clone());
        }
        let mut updated = match script.details.get(&id) {
            Some(Ok(existing)) => existing.clone(),
            _ => item(id, 1),
        };
        drop(script);
        updated.name.clone_from(&draft.name);
        updated.description.clone_from(&draft.description);
        updated.location = draft.location.map(Reference::id);
        updated.group = draft.group.map(Reference::id);
        updated.tags = draft.tags.iter().copied().map(Reference::id).collect();
        Ok(updated)
    }

    async fn delete_item(&self, id: RecordId) -> Result<(), SyncError> {
        self.record(format!("delete:{id}"));
        self.script().deleted.clone()
    }

    async fn upload_image(&self, id: RecordId, _asset: &Asset) -> Result<(), SyncError> {
        self.record(format!("upload:{id}"));
        self.script().uploaded.clone()
    }

    async fn list_references(
        &self,
        kind: ReferenceKind,
    ) -> Result<Vec<ReferenceEntry>, SyncError> {
        self.record(format!("references:{}", kind.as_str()));
        Ok(self
            .script()
            .references
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }
}

//! Keyed query cache with per-key ordering and item-level invalidation.
//!
//! # Design
//! - Keys are composite tuples: one entry per distinct filter combination or detail id.
//! - Every fetch takes a [`Ticket`]; only the latest ticket for a key may resolve it.
//! - Entries for inactive filter keys are retained, never evicted by filter changes.
//! - Mutations patch list payloads in place and replace or evict detail entries.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use stockroom_api_models::{Identity, Item, RecordId, ReferenceEntry, ReferenceKind};

use crate::error::SyncError;
use crate::filters::FilterCriteria;

/// Resource name used in item keys.
pub const ITEMS_RESOURCE: &str = "items";

/// Composite cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    /// Signed-in user identity.
    Identity,
    /// `(resource, location, tag, group, search)`
    List {
        /// Resource name.
        resource: &'static str,
        /// Location filter.
        location: Option<RecordId>,
        /// Tag filter.
        tag: Option<RecordId>,
        /// Group filter.
        group: Option<RecordId>,
        /// Search filter.
        search: Option<String>,
    },
    /// `(resource, id)`
    Detail {
        /// Resource name.
        resource: &'static str,
        /// Record id.
        id: RecordId,
    },
    /// Reference list for forms and filters.
    References(ReferenceKind),
}

impl QueryKey {
    /// List key for `criteria`.
    #[must_use]
    pub fn list(resource: &'static str, criteria: &FilterCriteria) -> Self {
        Self::List {
            resource,
            location: criteria.location,
            tag: criteria.tag,
            group: criteria.group,
            search: criteria.search.clone(),
        }
    }

    /// Detail key for `id`.
    #[must_use]
    pub const fn detail(resource: &'static str, id: RecordId) -> Self {
        Self::Detail { resource, id }
    }

    const fn is_list(&self) -> bool {
        matches!(self, Self::List { .. })
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn part<T: fmt::Display>(value: Option<&T>) -> String {
            value.map_or_else(|| "-".to_string(), ToString::to_string)
        }
        match self {
            Self::Identity => f.write_str("identity"),
            Self::List {
                resource,
                location,
                tag,
                group,
                search,
            } => write!(
                f,
                "{resource}({},{},{},{})",
                part(location.as_ref()),
                part(tag.as_ref()),
                part(group.as_ref()),
                part(search.as_ref()),
            ),
            Self::Detail { resource, id } => write!(f, "{resource}/{id}"),
            Self::References(kind) => write!(f, "references/{}", kind.as_str()),
        }
    }
}

/// Typed payload stored under a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachePayload {
    /// Identity resolution result.
    Identity(Identity),
    /// Item list.
    Items(Vec<Item>),
    /// Item detail.
    Item(Item),
    /// Reference list.
    References(Vec<ReferenceEntry>),
}

impl CachePayload {
    fn mentions(&self, id: RecordId) -> bool {
        match self {
            Self::Items(items) => items.iter().any(|item| item.id == id),
            Self::Item(item) => item.id == id,
            Self::Identity(_) | Self::References(_) => false,
        }
    }
}

/// Fetch status of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// A request is in flight.
    Pending,
    /// Last request succeeded.
    Success,
    /// Last request failed.
    Error,
}

/// Latest result recorded for one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Entry key.
    pub key: QueryKey,
    /// Fetch status.
    pub status: CacheStatus,
    /// Last successful payload, kept while a refetch is pending.
    pub payload: Option<CachePayload>,
    /// Failure from the last request.
    pub error: Option<SyncError>,
    /// When the latest request was issued.
    pub issued_at: DateTime<Utc>,
    /// Set when a mutation may have changed the payload's membership.
    pub stale: bool,
    generation: u64,
}

impl CacheEntry {
    /// Whether the payload can be served without refetching.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self.status, CacheStatus::Success) && !self.stale
    }
}

/// Handle for one issued fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    key: QueryKey,
    generation: u64,
}

impl Ticket {
    /// Key the fetch was issued for.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

/// Change applied by a successful mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemChange {
    /// A new item exists; list membership may have changed.
    Created(RecordId),
    /// An item was replaced by the server's copy.
    Updated(Item),
    /// An item changed server-side in a way the client cannot reproduce.
    Modified(RecordId),
    /// An item no longer exists.
    Removed(RecordId),
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<QueryKey, CacheEntry>,
    next_generation: u64,
}

impl CacheInner {
    /// Retire in-flight tickets for keys matching `affected`; their responses predate a mutation.
    fn supersede_pending(&mut self, affected: impl Fn(&QueryKey) -> bool) {
        for entry in self.entries.values_mut() {
            if entry.status == CacheStatus::Pending && affected(&entry.key) {
                self.next_generation += 1;
                entry.generation = self.next_generation;
                entry.stale = true;
                tracing::debug!(key = %entry.key, "in-flight fetch superseded by mutation");
            }
        }
    }
}

/// Thread-safe query cache.
#[derive(Debug, Default)]
pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

impl QueryCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` pending and hand out a ticket newer than any before it.
    pub fn begin(&self, key: QueryKey) -> Ticket {
        let mut inner = self.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let now = Utc::now();
        inner
            .entries
            .entry(key.clone())
            .and_modify(|entry| {
                entry.status = CacheStatus::Pending;
                entry.issued_at = now;
                entry.generation = generation;
            })
            .or_insert_with(|| CacheEntry {
                key: key.clone(),
                status: CacheStatus::Pending,
                payload: None,
                error: None,
                issued_at: now,
                stale: false,
                generation,
            });
        tracing::trace!(key = %key, generation, "fetch issued");
        Ticket { key, generation }
    }

    /// Record a result; ignored unless `ticket` is the latest for its key.
    pub fn resolve(&self, ticket: &Ticket, result: Result<CachePayload, SyncError>) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner
            .entries
            .get_mut(&ticket.key)
            .filter(|entry| entry.generation == ticket.generation)
        else {
            tracing::debug!(key = %ticket.key, generation = ticket.generation, "dropping superseded response");
            return false;
        };
        match result {
            Ok(payload) => {
                entry.status = CacheStatus::Success;
                entry.payload = Some(payload);
                entry.error = None;
                entry.stale = false;
            }
            Err(error) => {
                entry.status = CacheStatus::Error;
                entry.error = Some(error);
            }
        }
        true
    }

    /// Whether `ticket` is still the latest for its key.
    #[must_use]
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.lock()
            .entries
            .get(&ticket.key)
            .is_some_and(|entry| entry.generation == ticket.generation)
    }

    /// Copy of the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Payload stored for `key`.
    #[must_use]
    pub fn payload(&self, key: &QueryKey) -> Option<CachePayload> {
        self.lock()
            .entries
            .get(key)
            .and_then(|entry| entry.payload.clone())
    }

    /// Resolved identity, if the last identity fetch succeeded.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        let inner = self.lock();
        let entry = inner.entries.get(&QueryKey::Identity)?;
        match (&entry.status, &entry.payload) {
            (CacheStatus::Success, Some(CachePayload::Identity(identity))) => Some(*identity),
            _ => None,
        }
    }

    /// Evict one entry; in-flight tickets for it will be dropped.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let removed = self.lock().entries.remove(key).is_some();
        if removed {
            tracing::debug!(key = %key, "cache entry evicted");
        }
        removed
    }

    /// Apply a mutation to every entry that embeds the affected item.
    ///
    /// Fetches still in flight for affected keys are superseded, so a response
    /// issued before the mutation can never land as fresh data.
    pub fn apply_change(&self, change: &ItemChange) {
        let mut inner = self.lock();
        let touched = match change {
            ItemChange::Created(_) => None,
            ItemChange::Updated(item) => Some(item.id),
            ItemChange::Modified(id) | ItemChange::Removed(id) => Some(*id),
        };
        inner.supersede_pending(|key| {
            key.is_list() || touched.is_some_and(|id| *key == QueryKey::detail(ITEMS_RESOURCE, id))
        });
        match change {
            ItemChange::Removed(id) => {
                inner
                    .entries
                    .remove(&QueryKey::detail(ITEMS_RESOURCE, *id));
                for entry in inner.entries.values_mut() {
                    if let Some(CachePayload::Items(items)) = &mut entry.payload {
                        items.retain(|item| item.id != *id);
                    }
                }
            }
            ItemChange::Updated(updated) => {
                for entry in inner.entries.values_mut() {
                    if let Some(CachePayload::Items(items)) = &mut entry.payload {
                        for item in items.iter_mut().filter(|item| item.id == updated.id) {
                            *item = updated.clone();
                        }
                    }
                    if entry.key == QueryKey::detail(ITEMS_RESOURCE, updated.id) {
                        entry.status = CacheStatus::Success;
                        entry.payload = Some(CachePayload::Item(updated.clone()));
                        entry.error = None;
                        entry.stale = false;
                    }
                    if entry.key.is_list() {
                        entry.stale = true;
                    }
                }
            }
            ItemChange::Modified(id) => {
                inner
                    .entries
                    .remove(&QueryKey::detail(ITEMS_RESOURCE, *id));
                for entry in inner.entries.values_mut() {
                    if entry.payload.as_ref().is_some_and(|p| p.mentions(*id)) {
                        entry.stale = true;
                    }
                }
            }
            ItemChange::Created(_) => {
                for entry in inner.entries.values_mut().filter(|e| e.key.is_list()) {
                    entry.stale = true;
                }
            }
        }
        tracing::debug!(?change, entries = inner.entries.len(), "cache invalidated");
    }

    /// Keys whose payload mentions item `id`.
    #[must_use]
    pub fn keys_mentioning(&self, id: RecordId) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .lock()
            .entries
            .values()
            .filter(|entry| entry.payload.as_ref().is_some_and(|p| p.mentions(id)))
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::item;

    fn list_key(location: Option<RecordId>) -> QueryKey {
        QueryKey::list(
            ITEMS_RESOURCE,
            &FilterCriteria {
                location,
                ..FilterCriteria::default()
            },
        )
    }

    #[test]
    fn distinct_criteria_produce_distinct_keys() {
        let variants = [
            FilterCriteria::default(),
            FilterCriteria::by_location(3),
            FilterCriteria {
                tag: Some(3),
                ..FilterCriteria::default()
            },
            FilterCriteria {
                group: Some(3),
                ..FilterCriteria::default()
            },
            FilterCriteria {
                search: Some("3".into()),
                ..FilterCriteria::default()
            },
            FilterCriteria {
                location: Some(3),
                tag: Some(3),
                ..FilterCriteria::default()
            },
        ];
        for (i, a) in variants.iter().enumerate() {
            for (j, b) in variants.iter().enumerate() {
                let same = QueryKey::list(ITEMS_RESOURCE, a) == QueryKey::list(ITEMS_RESOURCE, b);
                assert_eq!(same, i == j, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn payloads_for_different_keys_do_not_interfere() {
        let cache = QueryCache::new();
        let a = cache.begin(list_key(None));
        let b = cache.begin(list_key(Some(3)));
        assert!(cache.resolve(&a, Ok(CachePayload::Items(vec![item(1, 1)]))));
        assert!(cache.resolve(&b, Ok(CachePayload::Items(vec![item(7, 1)]))));

        assert_eq!(
            cache.payload(&list_key(None)),
            Some(CachePayload::Items(vec![item(1, 1)]))
        );
        assert_eq!(
            cache.payload(&list_key(Some(3))),
            Some(CachePayload::Items(vec![item(7, 1)]))
        );
    }

    #[test]
    fn only_the_latest_ticket_resolves_a_key() {
        let cache = QueryCache::new();
        let first = cache.begin(list_key(None));
        let second = cache.begin(list_key(None));
        assert!(!cache.is_current(&first));

        assert!(cache.resolve(&second, Ok(CachePayload::Items(vec![item(2, 1)]))));
        assert!(!cache.resolve(&first, Ok(CachePayload::Items(vec![item(1, 1)]))));
        assert_eq!(
            cache.payload(&list_key(None)),
            Some(CachePayload::Items(vec![item(2, 1)]))
        );
    }

    #[test]
    fn errors_keep_the_previous_payload() {
        let cache = QueryCache::new();
        let ok = cache.begin(list_key(None));
        cache.resolve(&ok, Ok(CachePayload::Items(vec![item(1, 1)])));
        let failed = cache.begin(list_key(None));
        assert_eq!(
            cache.get(&list_key(None)).map(|e| e.status),
            Some(CacheStatus::Pending)
        );
        cache.resolve(&failed, Err(SyncError::network("down")));

        let entry = cache.get(&list_key(None)).expect("entry");
        assert_eq!(entry.status, CacheStatus::Error);
        assert_eq!(entry.payload, Some(CachePayload::Items(vec![item(1, 1)])));
        assert!(!entry.is_fresh());
    }

    #[test]
    fn removal_patches_lists_and_evicts_detail() {
        let cache = QueryCache::new();
        let list = cache.begin(list_key(None));
        cache.resolve(&list, Ok(CachePayload::Items(vec![item(5, 1), item(6, 1)])));
        let other = cache.begin(list_key(Some(2)));
        cache.resolve(&other, Ok(CachePayload::Items(vec![item(5, 1)])));
        let detail = cache.begin(QueryKey::detail(ITEMS_RESOURCE, 5));
        cache.resolve(&detail, Ok(CachePayload::Item(item(5, 1))));
        assert_eq!(cache.keys_mentioning(5).len(), 3);

        cache.apply_change(&ItemChange::Removed(5));

        assert!(cache.keys_mentioning(5).is_empty());
        assert!(cache.get(&QueryKey::detail(ITEMS_RESOURCE, 5)).is_none());
        assert_eq!(
            cache.payload(&list_key(None)),
            Some(CachePayload::Items(vec![item(6, 1)]))
        );
        assert_eq!(
            cache.payload(&list_key(Some(2))),
            Some(CachePayload::Items(vec![]))
        );
    }

    #[test]
    fn update_replaces_copies_and_marks_lists_stale() {
        let cache = QueryCache::new();
        let list = cache.begin(list_key(None));
        cache.resolve(&list, Ok(CachePayload::Items(vec![item(5, 1)])));
        let detail = cache.begin(QueryKey::detail(ITEMS_RESOURCE, 5));
        cache.resolve(&detail, Ok(CachePayload::Item(item(5, 1))));

        let mut renamed = item(5, 1);
        renamed.name = "Mallet".into();
        cache.apply_change(&ItemChange::Updated(renamed.clone()));

        assert_eq!(
            cache.payload(&QueryKey::detail(ITEMS_RESOURCE, 5)),
            Some(CachePayload::Item(renamed.clone()))
        );
        let entry = cache.get(&list_key(None)).expect("list");
        assert_eq!(entry.payload, Some(CachePayload::Items(vec![renamed])));
        assert!(entry.stale);
        assert!(
            cache
                .get(&QueryKey::detail(ITEMS_RESOURCE, 5))
                .is_some_and(|e| e.is_fresh())
        );
    }

    #[test]
    fn creation_marks_only_lists_stale() {
        let cache = QueryCache::new();
        let list = cache.begin(list_key(None));
        cache.resolve(&list, Ok(CachePayload::Items(vec![])));
        let identity = cache.begin(QueryKey::Identity);
        cache.resolve(&identity, Ok(CachePayload::Identity(Identity { id: 1 })));

        cache.apply_change(&ItemChange::Created(9));

        assert!(cache.get(&list_key(None)).is_some_and(|e| e.stale));
        assert_eq!(cache.identity(), Some(Identity { id: 1 }));
    }

    #[test]
    fn modification_evicts_detail_and_stales_lists_holding_the_item() {
        let cache = QueryCache::new();
        let holding = cache.begin(list_key(None));
        cache.resolve(&holding, Ok(CachePayload::Items(vec![item(5, 1)])));
        let other = cache.begin(list_key(Some(8)));
        cache.resolve(&other, Ok(CachePayload::Items(vec![item(6, 1)])));
        let detail = cache.begin(QueryKey::detail(ITEMS_RESOURCE, 5));
        cache.resolve(&detail, Ok(CachePayload::Item(item(5, 1))));

        cache.apply_change(&ItemChange::Modified(5));

        assert!(cache.get(&QueryKey::detail(ITEMS_RESOURCE, 5)).is_none());
        assert!(cache.get(&list_key(None)).is_some_and(|e| e.stale));
        assert!(cache.get(&list_key(Some(8))).is_some_and(|e| e.is_fresh()));
    }

    #[test]
    fn mutations_supersede_list_fetches_already_in_flight() {
        let cache = QueryCache::new();
        let list = cache.begin(list_key(None));
        let unrelated = cache.begin(QueryKey::References(ReferenceKind::Tags));

        cache.apply_change(&ItemChange::Removed(5));

        assert!(!cache.is_current(&list));
        assert!(!cache.resolve(&list, Ok(CachePayload::Items(vec![item(5, 1), item(6, 1)]))));
        let entry = cache.get(&list_key(None)).expect("entry");
        assert_eq!(entry.status, CacheStatus::Pending);
        assert!(!entry.is_fresh());
        assert!(cache.keys_mentioning(5).is_empty());
        assert!(cache.is_current(&unrelated));
    }

    #[test]
    fn update_wins_over_a_detail_fetch_already_in_flight() {
        let cache = QueryCache::new();
        let key = QueryKey::detail(ITEMS_RESOURCE, 5);
        let detail = cache.begin(key.clone());
        let mut renamed = item(5, 1);
        renamed.name = "Mallet".into();

        cache.apply_change(&ItemChange::Updated(renamed.clone()));

        assert!(!cache.resolve(&detail, Ok(CachePayload::Item(item(5, 1)))));
        let entry = cache.get(&key).expect("entry");
        assert!(entry.is_fresh());
        assert_eq!(entry.payload, Some(CachePayload::Item(renamed)));
    }

    #[test]
    fn evicted_keys_drop_in_flight_responses() {
        let cache = QueryCache::new();
        let key = QueryKey::detail(ITEMS_RESOURCE, 4);
        let ticket = cache.begin(key.clone());
        assert!(cache.invalidate(&key));
        assert!(!cache.resolve(&ticket, Ok(CachePayload::Item(item(4, 1)))));
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_render_as_tuples() {
        assert_eq!(list_key(Some(3)).to_string(), "items(3,-,-,-)");
        assert_eq!(QueryKey::detail(ITEMS_RESOURCE, 9).to_string(), "items/9");
        assert_eq!(
            QueryKey::References(ReferenceKind::Tags).to_string(),
            "references/tags"
        );
    }
}

#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::multiple_crate_versions, clippy::redundant_pub_crate)]

//! Session-gated, filter-keyed data synchronisation for the Stockroom inventory API.
//!
//! Layout:
//! - `session.rs`, `auth.rs`: token ownership, credential exchange, expiry policy
//! - `routes.rs`, `guard.rs`: route surface, history, and the protected-route gate
//! - `filters.rs`, `cache.rs`: filter criteria and the keyed query cache
//! - `coordinator.rs`: identity-before-data sequencing and view state machines
//! - `mutations.rs`: create/update/delete with invalidation and navigation
//! - `references.rs`: location/tag/group lists
//! - `api.rs`, `config.rs`: the remote collaborator seam and its reqwest client
//! - `context.rs`: startup wiring

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod filters;
pub mod guard;
pub mod mutations;
pub mod ownership;
pub mod references;
pub mod routes;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{Asset, HttpInventoryApi, InventoryApi};
pub use auth::{INVALID_CREDENTIALS, authenticate, expire_on_unauthorized};
pub use cache::{CacheEntry, CachePayload, CacheStatus, ItemChange, QueryCache, QueryKey, Ticket};
pub use config::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, parse_base_url};
pub use context::SyncContext;
pub use coordinator::{DependentFetchCoordinator, ItemDetailView, ItemListView, ViewPhase};
pub use error::SyncError;
pub use filters::{FilterCriteria, FilterState};
pub use guard::{GuardDecision, RouteGuard};
pub use mutations::{
    Confirm, ConfirmedDelete, DeleteRequest, MutationDispatcher, MutationOutcome, UploadStatus,
};
pub use ownership::can_edit;
pub use references::ReferenceCatalog;
pub use routes::{NavigationEvent, NavigationKind, Navigator, Route};
pub use session::{FileTokenStore, MemoryTokenStore, Session, SessionStore, TokenStore};

//! Route surface and in-process navigation history.
//!
//! # Design
//! - Only the five application paths are recognised; everything else is `NotFound`.
//! - `Navigator` exposes the "navigate" and "current path" primitives plus
//!   back/forward, and broadcasts every change so the guard can re-evaluate.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use stockroom_api_models::RecordId;
use tokio::sync::watch;

/// Application routes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/login`
    Login,
    /// `/items`
    Items,
    /// `/items/new`
    NewItem,
    /// `/items/:id`
    ItemDetail {
        /// Item id.
        id: RecordId,
    },
    /// `/items/:id/edit`
    EditItem {
        /// Item id.
        id: RecordId,
    },
    /// Any unrecognised path.
    NotFound,
}

impl Route {
    /// Parse a path; query strings and trailing slashes are ignored.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["login"] => Self::Login,
            ["items"] => Self::Items,
            ["items", "new"] => Self::NewItem,
            ["items", id] => parse_id(id).map_or(Self::NotFound, |id| Self::ItemDetail { id }),
            ["items", id, "edit"] => {
                parse_id(id).map_or(Self::NotFound, |id| Self::EditItem { id })
            }
            _ => Self::NotFound,
        }
    }

    /// Canonical path for this route.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Items => "/items".to_string(),
            Self::NewItem => "/items/new".to_string(),
            Self::ItemDetail { id } => format!("/items/{id}"),
            Self::EditItem { id } => format!("/items/{id}/edit"),
            Self::NotFound => "/404".to_string(),
        }
    }

    /// Whether the route requires an authenticated session.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        matches!(
            self,
            Self::Items | Self::NewItem | Self::ItemDetail { .. } | Self::EditItem { .. }
        )
    }
}

fn parse_id(raw: &str) -> Option<RecordId> {
    raw.parse::<RecordId>().ok().filter(|id| *id > 0)
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// How the current route was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationKind {
    /// Initial route.
    Initial,
    /// New history entry.
    Push,
    /// Current entry replaced.
    Replace,
    /// Same route requested again.
    Refresh,
    /// History moved backwards.
    Back,
    /// History moved forwards.
    Forward,
}

/// Notification emitted for every navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationEvent {
    /// Route now current.
    pub route: Route,
    /// Cause of the change.
    pub kind: NavigationKind,
    /// Monotonic sequence number.
    pub seq: u64,
}

#[derive(Debug)]
struct History {
    entries: Vec<Route>,
    cursor: usize,
    seq: u64,
}

/// Browser-style history with change notifications.
#[derive(Debug)]
pub struct Navigator {
    history: Mutex<History>,
    changes: watch::Sender<NavigationEvent>,
}

impl Navigator {
    /// History containing only `initial`.
    #[must_use]
    pub fn new(initial: Route) -> Self {
        let (changes, _) = watch::channel(NavigationEvent {
            route: initial.clone(),
            kind: NavigationKind::Initial,
            seq: 0,
        });
        Self {
            history: Mutex::new(History {
                entries: vec![initial],
                cursor: 0,
                seq: 0,
            }),
            changes,
        }
    }

    /// Current route.
    #[must_use]
    pub fn current(&self) -> Route {
        let history = self.lock();
        history.entries[history.cursor].clone()
    }

    /// Current path string.
    #[must_use]
    pub fn current_path(&self) -> String {
        self.current().path()
    }

    /// Push `route`; requesting the current route again is a refresh.
    pub fn navigate(&self, route: Route) {
        let kind = {
            let mut history = self.lock();
            if history.entries[history.cursor] == route {
                NavigationKind::Refresh
            } else {
                let cursor = history.cursor;
                history.entries.truncate(cursor + 1);
                history.entries.push(route.clone());
                history.cursor += 1;
                NavigationKind::Push
            }
        };
        self.publish(route, kind);
    }

    /// Replace the current entry with `route`.
    pub fn replace(&self, route: Route) {
        {
            let mut history = self.lock();
            let cursor = history.cursor;
            history.entries[cursor] = route.clone();
        }
        self.publish(route, NavigationKind::Replace);
    }

    /// Re-announce the current route so its view reloads.
    pub fn refresh(&self) {
        self.publish(self.current(), NavigationKind::Refresh);
    }

    /// Move back one entry.
    pub fn back(&self) -> Option<Route> {
        let route = {
            let mut history = self.lock();
            if history.cursor == 0 {
                return None;
            }
            history.cursor -= 1;
            history.entries[history.cursor].clone()
        };
        self.publish(route.clone(), NavigationKind::Back);
        Some(route)
    }

    /// Move forward one entry.
    pub fn forward(&self) -> Option<Route> {
        let route = {
            let mut history = self.lock();
            if history.cursor + 1 >= history.entries.len() {
                return None;
            }
            history.cursor += 1;
            history.entries[history.cursor].clone()
        };
        self.publish(route.clone(), NavigationKind::Forward);
        Some(route)
    }

    /// Receiver notified on every navigation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NavigationEvent> {
        self.changes.subscribe()
    }

    /// Most recent navigation event.
    #[must_use]
    pub fn last_event(&self) -> NavigationEvent {
        self.changes.borrow().clone()
    }

    fn publish(&self, route: Route, kind: NavigationKind) {
        let seq = {
            let mut history = self.lock();
            history.seq += 1;
            history.seq
        };
        tracing::debug!(route = %route, ?kind, seq, "navigation");
        self.changes.send_replace(NavigationEvent { route, kind, seq });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

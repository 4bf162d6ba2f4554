//! Route guard for protected views.

use std::sync::Arc;

use crate::routes::{Navigator, Route};
use crate::session::SessionStore;

/// Outcome of evaluating a route against the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the route unchanged.
    Allow(Route),
    /// Render nothing of the route and go to the carried route instead.
    Redirect(Route),
}

impl GuardDecision {
    /// Whether the requested route may render.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Gate in front of every `/items*` view.
#[derive(Clone, Debug)]
pub struct RouteGuard {
    session: Arc<SessionStore>,
}

impl RouteGuard {
    /// Guard reading from `session`.
    #[must_use]
    pub const fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// Decide whether `route` may render right now.
    #[must_use]
    pub fn evaluate(&self, route: &Route) -> GuardDecision {
        if route.is_protected() && !self.session.is_authenticated() {
            GuardDecision::Redirect(Route::Login)
        } else {
            GuardDecision::Allow(route.clone())
        }
    }

    /// Evaluate the navigator's current route and apply any redirect.
    pub fn enforce(&self, navigator: &Navigator) -> GuardDecision {
        let current = navigator.current();
        let decision = self.evaluate(&current);
        if let GuardDecision::Redirect(target) = &decision {
            tracing::info!(from = %current, to = %target, "redirecting unauthenticated visit");
            navigator.replace(target.clone());
        }
        decision
    }

    /// Re-enforce on every session or navigation change; runs until the task is aborted.
    pub async fn watch(self, navigator: Arc<Navigator>) {
        let mut session_rx = self.session.subscribe();
        let mut nav_rx = navigator.subscribe();
        self.enforce(&navigator);
        loop {
            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = nav_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            self.enforce(&navigator);
        }
        tracing::debug!("route guard stopped");
    }
}

//! Route-level access decisions that follow the live session.

use backoffice_access::{AccessGuard, GuardDecision, SessionView};
use tokio::sync::watch;

use crate::manager::AuthSessionManager;

/// An [`AccessGuard`] bound to a route and to a manager's session.
///
/// The decision is re-evaluated whenever the session changes, so a protected
/// screen shows a loading state during restore and is replaced by a redirect
/// as soon as the session ends.
#[derive(Debug)]
pub struct GuardedView {
    guard: AccessGuard,
    route: String,
    views: watch::Receiver<SessionView>,
}

impl GuardedView {
    /// Binds `guard` to `route` and to the manager's session.
    #[must_use]
    pub fn new(manager: &AuthSessionManager, guard: AccessGuard, route: impl Into<String>) -> Self {
        Self {
            guard,
            route: route.into(),
            views: manager.subscribe(),
        }
    }

    /// Returns the decision for the current session.
    #[must_use]
    pub fn decision(&self) -> GuardDecision {
        self.guard.evaluate(&self.views.borrow(), &self.route)
    }

    /// Returns the route being guarded.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Moves the view to another route and returns the new decision.
    pub fn navigate(&mut self, route: impl Into<String>) -> GuardDecision {
        self.route = route.into();
        self.decision()
    }

    /// Waits until the decision differs from the current one.
    ///
    /// Returns `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        let current = self.guard.evaluate(&self.views.borrow_and_update(), &self.route);
        loop {
            self.views.changed().await.ok()?;
            let next = self.guard.evaluate(&self.views.borrow_and_update(), &self.route);
            if next != current {
                return Some(next);
            }
        }
    }
}

//! View gating for protected back-office routes.
//!
//! The guard never answers [`GuardDecision::Render`] before the
//! authentication check has resolved, so protected content cannot flash on
//! screen while a persisted session is still being restored.

use crate::role::{self, Role};
use crate::session::SessionView;

/// Route of the login screen.
pub const LOGIN_ROUTE: &str = "/admin/login";

/// Route users are sent to when they lack the required role.
pub const DEFAULT_ROUTE: &str = "/admin";

/// Outcome of evaluating a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Authentication has not resolved yet; show a loading placeholder.
    Loading,
    /// Nobody is logged in; send the user to the login screen.
    RedirectToLogin {
        /// Login route.
        login_route: String,
        /// Route to return to after logging in.
        return_to: String,
    },
    /// Logged in but the role is insufficient.
    Denied {
        /// Safe route to send the user to.
        redirect_to: String,
        /// Access-denied message to display.
        message: String,
    },
    /// Render the protected content.
    Render,
}

/// Gate in front of a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGuard {
    required_role: Option<Role>,
}

impl AccessGuard {
    /// Creates a guard that only requires an authenticated user.
    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            required_role: None,
        }
    }

    /// Creates a guard requiring at least `role`.
    #[must_use]
    pub fn requiring(role: Role) -> Self {
        Self {
            required_role: Some(role),
        }
    }

    /// Decides what to show for `route` given the current session.
    #[must_use]
    pub fn evaluate(&self, view: &SessionView, route: &str) -> GuardDecision {
        if view.state.is_resolving() || view.is_loading {
            return GuardDecision::Loading;
        }

        let Some(user) = view.user.as_ref().filter(|_| view.state.is_authenticated()) else {
            return GuardDecision::RedirectToLogin {
                login_route: LOGIN_ROUTE.to_string(),
                return_to: route.to_string(),
            };
        };

        if role::satisfies(user.role(), self.required_role.as_ref()) {
            return GuardDecision::Render;
        }

        let required = self
            .required_role
            .as_ref()
            .map_or("an authenticated user", Role::as_str);
        GuardDecision::Denied {
            redirect_to: DEFAULT_ROUTE.to_string(),
            message: format!(
                "Access denied: {route} requires the '{required}' role, you have '{}'",
                user.role()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::user::User;

    fn view(state: SessionState, role: Option<Role>) -> SessionView {
        SessionView {
            state,
            user: role.map(|r| User::new("1", "Test", "test@example.com", r)),
            is_loading: false,
            error: None,
        }
    }

    #[test]
    fn loading_while_restoring() {
        let guard = AccessGuard::requiring(Role::Admin);
        let decision = guard.evaluate(&view(SessionState::Restoring, None), "/admin/users");
        assert_eq!(decision, GuardDecision::Loading);

        let decision = guard.evaluate(&view(SessionState::Uninitialized, None), "/admin/users");
        assert_eq!(decision, GuardDecision::Loading);
    }

    #[test]
    fn loading_while_request_in_flight() {
        let mut v = view(SessionState::Anonymous, None);
        v.is_loading = true;
        assert_eq!(
            AccessGuard::authenticated().evaluate(&v, "/admin"),
            GuardDecision::Loading
        );
    }

    #[test]
    fn anonymous_redirects_to_login_with_return_route() {
        let decision = AccessGuard::authenticated()
            .evaluate(&view(SessionState::Anonymous, None), "/admin/services");
        assert_eq!(
            decision,
            GuardDecision::RedirectToLogin {
                login_route: LOGIN_ROUTE.to_string(),
                return_to: "/admin/services".to_string(),
            }
        );
    }

    #[test]
    fn insufficient_role_is_denied() {
        let guard = AccessGuard::requiring(Role::Admin);
        let decision = guard.evaluate(
            &view(SessionState::Authenticated, Some(Role::User)),
            "/admin/settings",
        );
        match decision {
            GuardDecision::Denied {
                redirect_to,
                message,
            } => {
                assert_eq!(redirect_to, DEFAULT_ROUTE);
                assert!(message.contains("admin"));
                assert!(message.contains("/admin/settings"));
            }
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[test]
    fn sufficient_role_renders() {
        let guard = AccessGuard::requiring(Role::User);
        let decision = guard.evaluate(
            &view(SessionState::Authenticated, Some(Role::Admin)),
            "/admin/contacts",
        );
        assert_eq!(decision, GuardDecision::Render);
    }

    #[test]
    fn refreshing_session_still_renders() {
        let decision = AccessGuard::requiring(Role::User).evaluate(
            &view(SessionState::Refreshing, Some(Role::User)),
            "/admin",
        );
        assert_eq!(decision, GuardDecision::Render);
    }

    #[test]
    fn no_requirement_renders_for_any_logged_in_user() {
        let decision = AccessGuard::authenticated().evaluate(
            &view(SessionState::Authenticated, Some(Role::Viewer)),
            "/admin",
        );
        assert_eq!(decision, GuardDecision::Render);
    }

    #[test]
    fn unknown_role_is_denied() {
        let decision = AccessGuard::requiring(Role::Viewer).evaluate(
            &view(SessionState::Authenticated, Some(Role::from_name("guest"))),
            "/admin",
        );
        assert!(matches!(decision, GuardDecision::Denied { .. }));
    }
}

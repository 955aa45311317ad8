//! Console commands and their output.

use backoffice_access::{AccessGuard, GuardDecision, Role, User, UserPatch};
use backoffice_session::{AuthSessionManager, GuardedView, ValidationOutcome};
use std::fmt;

pub const USAGE: &str = "usage: backoffice-admin <command>

commands:
  login <email> <password>   log in and persist the session
  logout                     end the session
  whoami                     validate and show the logged-in user
  refresh                    exchange the refresh token for a new pair
  profile <display-name>     change the display name
  guard <route> [role]       show what a protected route would do";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    Whoami,
    Refresh,
    Profile { display_name: String },
    Guard { route: String, role: Option<Role> },
}

/// The command line did not match any command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    message: String,
}

impl UsageError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{USAGE}", self.message)
    }
}

impl std::error::Error for UsageError {}

impl Command {
    /// Parses the arguments that follow the program name.
    ///
    /// # Errors
    ///
    /// Returns a [`UsageError`] for unknown commands or wrong arity.
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let Some((name, rest)) = args.split_first() else {
            return Err(UsageError::new("missing command"));
        };

        match (name.as_str(), rest) {
            ("login", [email, password]) => Ok(Self::Login {
                email: email.clone(),
                password: password.clone(),
            }),
            ("logout", []) => Ok(Self::Logout),
            ("whoami", []) => Ok(Self::Whoami),
            ("refresh", []) => Ok(Self::Refresh),
            ("profile", [_, ..]) => Ok(Self::Profile {
                display_name: rest.join(" "),
            }),
            ("guard", [route]) => Ok(Self::Guard {
                route: route.clone(),
                role: None,
            }),
            ("guard", [route, role]) => Ok(Self::Guard {
                route: route.clone(),
                role: Some(Role::from_name(role)),
            }),
            ("login" | "logout" | "whoami" | "refresh" | "profile" | "guard", _) => {
                Err(UsageError::new(format!("wrong arguments for '{name}'")))
            }
            _ => Err(UsageError::new(format!("unknown command '{name}'"))),
        }
    }

    /// Runs the command against a started manager and returns what to print.
    ///
    /// # Errors
    ///
    /// Returns the user-facing message of a failed operation.
    pub async fn run(self, manager: &AuthSessionManager) -> Result<String, String> {
        match self {
            Self::Login { email, password } => manager
                .login(&email, &password)
                .await
                .map(|user| format!("logged in as {}", describe(&user)))
                .map_err(|e| e.user_message()),
            Self::Logout => {
                manager.logout().await;
                Ok("logged out".to_string())
            }
            Self::Whoami => match manager.validate().await {
                ValidationOutcome::NoSession => Ok("not logged in".to_string()),
                ValidationOutcome::Expired => {
                    Err(manager.view().error.unwrap_or_else(|| "session ended".to_string()))
                }
                ValidationOutcome::Valid
                | ValidationOutcome::Refreshed
                | ValidationOutcome::Unresolved => match manager.current_user() {
                    Some(user) => Ok(describe(&user)),
                    None => Ok("not logged in".to_string()),
                },
            },
            Self::Refresh => manager
                .refresh()
                .await
                .map(|user| format!("tokens refreshed for {}", describe(&user)))
                .map_err(|e| e.user_message()),
            Self::Profile { display_name } => manager
                .update_profile(&UserPatch::display_name(display_name))
                .await
                .map(|user| format!("profile updated: {}", describe(&user)))
                .map_err(|e| e.user_message()),
            Self::Guard { route, role } => {
                let guard = match role {
                    Some(role) => AccessGuard::requiring(role),
                    None => AccessGuard::authenticated(),
                };
                let view = GuardedView::new(manager, guard, route);
                Ok(describe_decision(&view.decision()))
            }
        }
    }
}

fn describe(user: &User) -> String {
    format!("{} <{}> ({})", user.display_name(), user.email(), user.role())
}

fn describe_decision(decision: &GuardDecision) -> String {
    match decision {
        GuardDecision::Loading => "loading".to_string(),
        GuardDecision::RedirectToLogin {
            login_route,
            return_to,
        } => format!("redirect to {login_route} (return to {return_to})"),
        GuardDecision::Denied {
            redirect_to,
            message,
        } => format!("denied: {message} (redirect to {redirect_to})"),
        GuardDecision::Render => "render".to_string(),
    }
}

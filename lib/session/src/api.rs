//! Client for the remote authentication API.
//!
//! Every call is a single request/response with no client-side retry.
//! Responses use the envelope `{ success, message, data }`.

use async_trait::async_trait;
use backoffice_access::{ApiError, TokenPair, User, UserFields, UserPatch};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::ApiConfig;

/// A successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// The authenticated user.
    pub user: User,
    /// Freshly issued tokens.
    pub tokens: TokenPair,
}

/// The four calls the session manager makes to the server.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a user and a token pair.
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError>;

    /// Exchanges a refresh token for a new user and token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError>;

    /// Checks whether the access token is still accepted.
    async fn validate(&self, access_token: &str) -> Result<(), ApiError>;

    /// Updates the current user's profile and returns the fields the server changed.
    async fn update_profile(
        &self,
        access_token: &str,
        patch: &UserPatch,
    ) -> Result<UserFields, ApiError>;
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    user: User,
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

impl From<SessionData> for AuthResponse {
    fn from(data: SessionData) -> Self {
        Self {
            user: data.user,
            tokens: TokenPair::new(data.token, data.refresh_token),
        }
    }
}

/// [`AuthApi`] over HTTP using reqwest.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpAuthApi {
    /// Creates a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Network {
                details: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a client reusing an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    /// Returns the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Sends a request and turns non-2xx statuses into typed errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Network {
            details: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|m| !m.trim().is_empty());
        debug!(status = status.as_u16(), "request rejected");

        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized { message })
        } else {
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Decodes the `data` member of a successful envelope.
    async fn data<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let envelope: Envelope<T> =
            response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse {
                    details: e.to_string(),
                })?;

        if !envelope.success {
            return Err(ApiError::Rejected {
                status,
                message: envelope.message,
            });
        }

        envelope.data.ok_or_else(|| ApiError::InvalidResponse {
            details: "response has no data".to_string(),
        })
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = self
            .client
            .post(self.config.endpoint("/auth/login"))
            .json(&json!({ "email": email, "senha": password }));
        let data: SessionData = Self::data(self.send(request).await?).await?;
        Ok(data.into())
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let request = self
            .client
            .post(self.config.endpoint("/auth/refresh"))
            .bearer_auth(refresh_token);
        let data: SessionData = Self::data(self.send(request).await?).await?;
        Ok(data.into())
    }

    #[instrument(skip_all)]
    async fn validate(&self, access_token: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .get(self.config.endpoint("/auth/me"))
            .bearer_auth(access_token);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn update_profile(
        &self,
        access_token: &str,
        patch: &UserPatch,
    ) -> Result<UserFields, ApiError> {
        let request = self
            .client
            .put(self.config.endpoint("/admin/profile"))
            .bearer_auth(access_token)
            .json(patch);
        Self::data(self.send(request).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use backoffice_access::Role;
    use serde_json::Value;

    async fn serve(router: Router) -> HttpAuthApi {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .await
                .expect("stub server");
        });
        HttpAuthApi::new(ApiConfig::new(format!("http://{addr}"))).expect("client")
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    }

    fn session_body(role: &str, token: &str) -> Value {
        json!({
            "success": true,
            "message": "ok",
            "data": {
                "user": {
                    "id": 1,
                    "nome": "Admin",
                    "email": "admin@x.com",
                    "role": role,
                    "ativo": true,
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:00Z"
                },
                "token": token,
                "refreshToken": format!("{token}-refresh")
            }
        })
    }

    #[tokio::test]
    async fn login_posts_credentials_and_decodes_session() {
        let router = Router::new().route(
            "/auth/login",
            post(|Json(body): Json<Value>| async move {
                if body["email"] == "admin@x.com" && body["senha"] == "secret123" {
                    (axum::http::StatusCode::OK, Json(session_body("admin", "t1")))
                } else {
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "success": false, "message": "Credenciais inválidas" })),
                    )
                }
            }),
        );
        let api = serve(router).await;

        let response = api.login("admin@x.com", "secret123").await.expect("login");
        assert_eq!(response.user.role(), &Role::Admin);
        assert_eq!(response.tokens.access_token(), "t1");
        assert_eq!(response.tokens.refresh_token(), "t1-refresh");

        let err = api.login("admin@x.com", "wrong").await.expect_err("rejected");
        assert_eq!(
            err,
            ApiError::Unauthorized {
                message: Some("Credenciais inválidas".to_string())
            }
        );
    }

    #[tokio::test]
    async fn refresh_sends_refresh_token_as_bearer() {
        let router = Router::new().route(
            "/auth/refresh",
            post(|headers: HeaderMap| async move {
                match bearer(&headers).as_deref() {
                    Some("r-1") => (axum::http::StatusCode::OK, Json(session_body("user", "t2"))),
                    _ => (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "message": "refresh token expired" })),
                    ),
                }
            }),
        );
        let api = serve(router).await;

        let response = api.refresh("r-1").await.expect("refresh");
        assert_eq!(response.tokens.access_token(), "t2");

        let err = api.refresh("stale").await.expect_err("expired");
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn validate_distinguishes_unauthorized_from_other_statuses() {
        let router = Router::new().route(
            "/auth/me",
            get(|headers: HeaderMap| async move {
                match bearer(&headers).as_deref() {
                    Some("good") => (axum::http::StatusCode::OK, Json(json!({ "success": true }))),
                    Some("broken") => (
                        axum::http::StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({})),
                    ),
                    _ => (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "message": "token expirado" })),
                    ),
                }
            }),
        );
        let api = serve(router).await;

        api.validate("good").await.expect("valid");
        assert!(api.validate("expired").await.expect_err("401").is_unauthorized());
        assert_eq!(
            api.validate("broken").await.expect_err("503"),
            ApiError::Rejected {
                status: 503,
                message: None
            }
        );
    }

    #[tokio::test]
    async fn update_profile_returns_server_fields() {
        let router = Router::new().route(
            "/admin/profile",
            put(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(bearer(&headers).as_deref(), Some("t1"));
                Json(json!({
                    "success": true,
                    "message": "Perfil atualizado",
                    "data": { "nome": body["nome"].clone() }
                }))
            }),
        );
        let api = serve(router).await;

        let fields = api
            .update_profile("t1", &UserPatch::display_name("New Name"))
            .await
            .expect("update");
        assert_eq!(fields.get("nome"), Some(&json!("New Name")));
    }

    #[tokio::test]
    async fn success_false_is_a_rejection_with_message() {
        let router = Router::new().route(
            "/admin/profile",
            put(|| async {
                Json(json!({ "success": false, "message": "Email já cadastrado" }))
            }),
        );
        let api = serve(router).await;

        let err = api
            .update_profile("t1", &UserPatch::default())
            .await
            .expect_err("rejected");
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 200,
                message: Some("Email já cadastrado".to_string())
            }
        );
    }

    #[tokio::test]
    async fn server_error_without_body_uses_no_message() {
        let router = Router::new().route(
            "/auth/login",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let api = serve(router).await;

        let err = api.login("a@b.c", "pw").await.expect_err("500");
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 500,
                message: None
            }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let api = HttpAuthApi::new(ApiConfig::new(format!("http://{addr}"))).expect("client");
        let err = api.validate("t").await.expect_err("no server");
        assert!(matches!(err, ApiError::Network { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let router = Router::new().route("/auth/refresh", post(|| async { "not json" }));
        let api = serve(router).await;

        let err = api.refresh("r").await.expect_err("invalid");
        assert!(matches!(err, ApiError::InvalidResponse { .. }));
    }
}

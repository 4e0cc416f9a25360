//! Client/server contract for the nutrisnap backend.
//!
//! Every route takes a JSON body over `POST` and answers with JSON. Failures
//! carry an [`ApiErrorBody`] whose `code` is one of the values in [`codes`].
//! [`Backend`] abstracts the calls so the sync loop and the auth session can
//! run against the HTTP client or an in-process fake.

mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{HistoryData, NutritionGoals, PartialGoals};

pub use http::HttpBackend;

/// Route paths, relative to the backend base URL.
pub mod routes {
    /// Create an account.
    pub const SIGNUP: &str = "/auth/signup";
    /// Exchange credentials for a session token.
    pub const LOGIN: &str = "/auth/login";
    /// Resolve a session token to its user.
    pub const PROFILE: &str = "/auth/profile";
    /// Overwrite the caller's goals and history.
    pub const NUTRITION_SYNC: &str = "/nutrition/sync";
    /// Fetch the caller's goals and history.
    pub const NUTRITION_GET: &str = "/nutrition/get";
    /// Liveness probe (`GET`).
    pub const HEALTH: &str = "/health";
}

/// Error codes reported in [`ApiErrorBody::code`].
pub mod codes {
    /// Input failed validation.
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    /// Missing, unknown or expired session token, or wrong password.
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// No such user.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// The email is already registered.
    pub const CONFLICT: &str = "CONFLICT";
    /// Anything else.
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Body of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// One of [`codes`].
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// `POST /auth/signup` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    /// Account email; must look like an address.
    pub email: String,
    /// At least six characters.
    pub password: String,
    /// Display name; must not be empty.
    pub name: String,
}

/// `POST /auth/login` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Input of the routes that only need a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Session token from signup or login.
    pub token: String,
}

/// A user as the backend reports it. The password never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user id.
    pub id: String,
    /// Account email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
}

/// Output of signup and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The signed-in user.
    pub user: User,
    /// Session token for subsequent calls.
    pub token: String,
}

/// `POST /nutrition/sync` input: the whole client state, which replaces
/// whatever the server held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Session token.
    pub token: String,
    /// Current goals.
    pub goals: NutritionGoals,
    /// Every daily log the client knows about.
    pub history: HistoryData,
}

/// `POST /nutrition/sync` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Always `true` on a 2xx response.
    pub success: bool,
}

/// Goals and history as one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionSnapshot {
    /// Goals.
    pub goals: NutritionGoals,
    /// History keyed by date.
    #[serde(default)]
    pub history: HistoryData,
}

/// `POST /nutrition/get` output as the client decodes it. Goal fields may be
/// missing and are filled from local defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteNutrition {
    /// Goals, possibly partial.
    #[serde(default)]
    pub goals: PartialGoals,
    /// History keyed by date.
    #[serde(default)]
    pub history: HistoryData,
}

/// `GET /health` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when the server is up.
    pub status: String,
}

/// Calls the nutrisnap backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create an account and sign in.
    async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse>;

    /// Sign in with existing credentials.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse>;

    /// Resolve `token` to its user.
    async fn profile(&self, token: &str) -> Result<User>;

    /// Fetch the stored goals and history for `token`'s user.
    async fn get_nutrition(&self, token: &str) -> Result<RemoteNutrition>;

    /// Replace the stored goals and history for `token`'s user.
    async fn sync_nutrition(&self, token: &str, snapshot: &NutritionSnapshot) -> Result<()>;
}

//! `reqwest` implementation of [`Backend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{
    codes, routes, ApiErrorBody, AuthResponse, Backend, HealthResponse, LoginRequest,
    NutritionSnapshot, RemoteNutrition, SignupRequest, SyncRequest, SyncResponse, TokenRequest,
    User,
};
use crate::error::{Error, Result};

/// Talks to a nutrisnap backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the backend answers its health probe.
    pub async fn health(&self) -> bool {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, routes::HEALTH))
            .send()
            .await;
        match response {
            Ok(r) if r.status().is_success() => r
                .json::<HealthResponse>()
                .await
                .is_ok_and(|body| body.status == "ok"),
            _ => false,
        }
    }

    async fn post<Req, Resp>(&self, route: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!("POST {}{}", self.base_url, route);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, route))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text));
        }

        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into [`Error::Api`], using the body's code when
/// the server sent one.
fn error_from_response(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => Error::api(parsed.code, parsed.message),
        Err(_) => {
            let code = match status {
                StatusCode::BAD_REQUEST => codes::BAD_REQUEST,
                StatusCode::UNAUTHORIZED => codes::UNAUTHORIZED,
                StatusCode::NOT_FOUND => codes::NOT_FOUND,
                StatusCode::CONFLICT => codes::CONFLICT,
                _ => codes::INTERNAL_SERVER_ERROR,
            };
            let message = if body.is_empty() {
                format!("backend returned {status}")
            } else {
                format!("backend returned {status}: {body}")
            };
            Error::api(code, message)
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse> {
        self.post(routes::SIGNUP, request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.post(routes::LOGIN, request).await
    }

    async fn profile(&self, token: &str) -> Result<User> {
        let request = TokenRequest {
            token: token.to_string(),
        };
        self.post(routes::PROFILE, &request).await
    }

    async fn get_nutrition(&self, token: &str) -> Result<RemoteNutrition> {
        let request = TokenRequest {
            token: token.to_string(),
        };
        self.post(routes::NUTRITION_GET, &request).await
    }

    async fn sync_nutrition(&self, token: &str, snapshot: &NutritionSnapshot) -> Result<()> {
        let request = SyncRequest {
            token: token.to_string(),
            goals: snapshot.goals,
            history: snapshot.history.clone(),
        };
        let response: SyncResponse = self.post(routes::NUTRITION_SYNC, &request).await?;
        if response.success {
            Ok(())
        } else {
            Err(Error::api(
                codes::INTERNAL_SERVER_ERROR,
                "backend did not accept the sync",
            ))
        }
    }
}

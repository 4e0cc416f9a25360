//! Route handlers. Each decodes its body, calls into [`AppState`] and
//! encodes the result.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use nutrisnap::api::{
    AuthResponse, HealthResponse, LoginRequest, NutritionSnapshot, SignupRequest, SyncRequest,
    SyncResponse, TokenRequest, User,
};
use tracing::debug;

use crate::error::Result;
use crate::state::AppState;

/// `POST /auth/signup`
pub async fn signup(
    State(state): State<AppState>,
    body: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(request) = body?;
    debug!("signup {}", request.email);
    Ok(Json(state.signup(request).await?))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(request) = body?;
    debug!("login {}", request.email);
    Ok(Json(state.login(request).await?))
}

/// `POST /auth/profile`
pub async fn profile(
    State(state): State<AppState>,
    body: std::result::Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<User>> {
    let Json(request) = body?;
    debug!("profile lookup");
    Ok(Json(state.profile(&request.token).await?))
}

/// `POST /nutrition/get`
pub async fn get_nutrition(
    State(state): State<AppState>,
    body: std::result::Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<NutritionSnapshot>> {
    let Json(request) = body?;
    debug!("nutrition get");
    Ok(Json(state.nutrition(&request.token).await?))
}

/// `POST /nutrition/sync`
pub async fn sync_nutrition(
    State(state): State<AppState>,
    body: std::result::Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>> {
    let Json(request) = body?;
    debug!("nutrition sync ({} days)", request.history.len());
    let snapshot = NutritionSnapshot {
        goals: request.goals,
        history: request.history,
    };
    state.sync(&request.token, snapshot).await?;
    Ok(Json(SyncResponse { success: true }))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    debug!("health check");
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

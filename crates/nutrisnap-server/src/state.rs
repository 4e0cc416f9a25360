//! In-memory accounts, sessions and nutrition data.
//!
//! One store backs every route, so a user created by signup can log in and
//! sync. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use nutrisnap::api::{AuthResponse, LoginRequest, NutritionSnapshot, SignupRequest, User};
use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, Result};

const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Check that `email` looks like an address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// A salted BLAKE3 password digest.
#[derive(Debug, Clone)]
struct PasswordDigest {
    salt: String,
    hash: blake3::Hash,
}

impl PasswordDigest {
    fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let hash = Self::digest(&salt, password);
        Self { salt, hash }
    }

    fn digest(salt: &str, password: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize()
    }

    /// `blake3::Hash` equality is constant time.
    fn verify(&self, password: &str) -> bool {
        Self::digest(&self.salt, password) == self.hash
    }
}

#[derive(Debug)]
struct Account {
    user: User,
    password: PasswordDigest,
}

#[derive(Debug, Default)]
struct Store {
    /// Accounts by user id.
    accounts: HashMap<String, Account>,
    /// User id by lowercased email.
    emails: HashMap<String, String>,
    /// User id by session token.
    sessions: HashMap<String, String>,
    /// Last synced state by user id.
    nutrition: HashMap<String, NutritionSnapshot>,
}

impl Store {
    fn user_for(&self, token: &str) -> Result<&Account> {
        self.sessions
            .get(token)
            .and_then(|id| self.accounts.get(id))
            .ok_or_else(ApiError::invalid_token)
    }

    fn open_session(&mut self, user_id: &str) -> String {
        let token = format!("token_{}", Uuid::new_v4().simple());
        self.sessions.insert(token.clone(), user_id.to_string());
        token
    }
}

/// Shared backend state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
}

impl AppState {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new account and open a session for it.
    ///
    /// # Errors
    ///
    /// `BAD_REQUEST` for an invalid email, short password or empty name,
    /// `CONFLICT` if the email is taken.
    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse> {
        let email = request.email.trim().to_string();
        let name = request.name.trim().to_string();
        if !is_valid_email(&email) {
            return Err(ApiError::BadRequest("Invalid email address".to_string()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if name.is_empty() {
            return Err(ApiError::BadRequest("Name is required".to_string()));
        }

        let mut store = self.store.write().await;
        let key = email.to_lowercase();
        if store.emails.contains_key(&key) {
            return Err(ApiError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: format!("user_{}", Uuid::new_v4().simple()),
            email,
            name,
            created_at: now,
            updated_at: now,
        };
        store.emails.insert(key, user.id.clone());
        store.accounts.insert(
            user.id.clone(),
            Account {
                user: user.clone(),
                password: PasswordDigest::new(&request.password),
            },
        );
        let token = store.open_session(&user.id);

        info!("Registered {} as {}", user.email, user.id);
        Ok(AuthResponse { user, token })
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// `BAD_REQUEST` for an invalid email, `NOT_FOUND` for an unknown one and
    /// `UNAUTHORIZED` for a wrong password.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let email = request.email.trim();
        if !is_valid_email(email) {
            return Err(ApiError::BadRequest("Invalid email address".to_string()));
        }

        let mut store = self.store.write().await;
        let user = {
            let account = store
                .emails
                .get(&email.to_lowercase())
                .and_then(|id| store.accounts.get(id))
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
            if !account.password.verify(&request.password) {
                return Err(ApiError::Unauthorized("Invalid password".to_string()));
            }
            account.user.clone()
        };
        let token = store.open_session(&user.id);

        info!("{} logged in", user.id);
        Ok(AuthResponse { user, token })
    }

    /// The user behind `token`.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` if the token is unknown.
    pub async fn profile(&self, token: &str) -> Result<User> {
        let store = self.store.read().await;
        Ok(store.user_for(token)?.user.clone())
    }

    /// The stored goals and history, or defaults if nothing was synced.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` if the token is unknown.
    pub async fn nutrition(&self, token: &str) -> Result<NutritionSnapshot> {
        let store = self.store.read().await;
        let account = store.user_for(token)?;
        let snapshot = store
            .nutrition
            .get(&account.user.id)
            .cloned()
            .unwrap_or_default();
        debug!(
            "Serving {} days of history to {}",
            snapshot.history.len(),
            account.user.id
        );
        Ok(snapshot)
    }

    /// Replace the stored goals and history.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` if the token is unknown, `BAD_REQUEST` if the goals are
    /// negative or not finite.
    pub async fn sync(&self, token: &str, snapshot: NutritionSnapshot) -> Result<()> {
        snapshot
            .goals
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let mut store = self.store.write().await;
        let user_id = store.user_for(token)?.user.id.clone();
        info!(
            "Stored {} days of history for {}",
            snapshot.history.len(),
            user_id
        );
        store.nutrition.insert(user_id, snapshot);
        Ok(())
    }
}

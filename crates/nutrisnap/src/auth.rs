//! Signed-in session state.
//!
//! The session token and the user profile are kept in the local store so a
//! later run can pick the session up again with [`AuthSession::restore`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{AuthResponse, Backend, LoginRequest, SignupRequest, User};
use crate::error::{Error, Result};
use crate::storage::{keys, Storage};

/// The current user's session, if any.
#[derive(Debug)]
pub struct AuthSession {
    storage: Arc<Storage>,
    token: Option<String>,
    user: Option<User>,
}

impl AuthSession {
    /// Start signed out.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            token: None,
            user: None,
        }
    }

    /// Read the stored session without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn load(storage: Arc<Storage>) -> Result<Self> {
        let token = storage.get_item(keys::AUTH_TOKEN)?;
        let user = storage.get_json::<User>(keys::USER_DATA)?;
        let mut session = Self::new(storage);
        if let (Some(token), Some(user)) = (token, user) {
            session.token = Some(token);
            session.user = Some(user);
        }
        Ok(session)
    }

    /// Pick up a stored session and check it with the backend.
    ///
    /// Both the token and the user must be stored. If the backend does not
    /// accept the token, the stored session is cleared and the result is a
    /// signed-out session.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local store fails.
    pub async fn restore(storage: Arc<Storage>, backend: &dyn Backend) -> Result<Self> {
        let mut session = Self::new(storage);

        let token = session.storage.get_item(keys::AUTH_TOKEN)?;
        let user = session.storage.get_json::<User>(keys::USER_DATA)?;
        let (Some(token), Some(_)) = (token, user) else {
            debug!("No stored session");
            return Ok(session);
        };

        match backend.profile(&token).await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                session.storage.set_json(keys::USER_DATA, &user)?;
                session.token = Some(token);
                session.user = Some(user);
            }
            Err(e) => {
                warn!("Stored session is no longer valid: {}", e);
                session.clear()?;
            }
        }
        Ok(session)
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, e.g. `CONFLICT` if the email is taken.
    pub async fn signup(
        &mut self,
        backend: &dyn Backend,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<&User> {
        let request = SignupRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            name: name.trim().to_string(),
        };
        let response = backend.signup(&request).await?;
        info!("Signed up as {}", response.user.email);
        self.store(response)
    }

    /// Sign in with existing credentials.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, `NOT_FOUND` for an unknown email and
    /// `UNAUTHORIZED` for a wrong password.
    pub async fn login(&mut self, backend: &dyn Backend, email: &str, password: &str) -> Result<&User> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = backend.login(&request).await?;
        info!("Logged in as {}", response.user.email);
        self.store(response)
    }

    /// Forget the session locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails.
    pub fn logout(&mut self) -> Result<()> {
        if let Some(user) = &self.user {
            info!("Logged out {}", user.email);
        }
        self.clear()
    }

    /// The session token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The session token, or [`Error::NotAuthenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] when signed out.
    pub fn require_token(&self) -> Result<&str> {
        self.token().ok_or(Error::NotAuthenticated)
    }

    /// Whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    fn store(&mut self, response: AuthResponse) -> Result<&User> {
        self.storage.set_items(&[
            (keys::AUTH_TOKEN, response.token.clone()),
            (keys::USER_DATA, serde_json::to_string(&response.user)?),
        ])?;
        self.token = Some(response.token);
        Ok(self.user.insert(response.user))
    }

    fn clear(&mut self) -> Result<()> {
        self.storage
            .remove_items(&[keys::AUTH_TOKEN, keys::USER_DATA])?;
        self.token = None;
        self.user = None;
        Ok(())
    }
}

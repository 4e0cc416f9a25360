//! Error types for nutrisnap.
//!
//! This module defines all error types used throughout the nutrisnap crate,
//! covering the local store, configuration, food log validation and the
//! backend and food-database HTTP clients.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for nutrisnap operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Food Log Errors ===
    /// A food entry failed validation.
    #[error("invalid food entry: {message}")]
    InvalidFood {
        /// Description of the validation failure.
        message: String,
    },

    /// Nutrition goals failed validation.
    #[error("invalid goals: {message}")]
    InvalidGoals {
        /// Description of the validation failure.
        message: String,
    },

    /// No food with this id is logged for today.
    #[error("no food with id '{id}' in today's log")]
    FoodNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A date string could not be parsed.
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input.
        value: String,
    },

    // === Backend Errors ===
    /// The backend rejected a request.
    #[error("{code}: {message}")]
    Api {
        /// Error code reported by the backend (e.g. `UNAUTHORIZED`).
        code: String,
        /// Human-readable message from the backend.
        message: String,
    },

    /// An HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The online food database returned an error.
    #[error("food search failed: {0}")]
    FoodSearch(String),

    /// The operation needs a signed-in session.
    #[error("not signed in")]
    NotAuthenticated,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for nutrisnap operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a backend error from a code and message.
    #[must_use]
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a food validation error.
    #[must_use]
    pub fn invalid_food(message: impl Into<String>) -> Self {
        Self::InvalidFood {
            message: message.into(),
        }
    }

    /// Create a goals validation error.
    #[must_use]
    pub fn invalid_goals(message: impl Into<String>) -> Self {
        Self::InvalidGoals {
            message: message.into(),
        }
    }

    /// The backend error code, if this error came from the backend.
    #[must_use]
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this error means the session token was rejected.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::NotAuthenticated) || self.api_code() == Some("UNAUTHORIZED")
    }

    /// Check if the backend could not be reached at all.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

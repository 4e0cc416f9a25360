//! `nutrisnap` - Calorie and protein tracking with optional backend sync
//!
//! This library keeps a daily food log in a local key-value store, tracks
//! progress against nutrition goals, and pushes and pulls the whole log to a
//! nutrisnap backend when the user is signed in.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod food_search;
pub mod i18n;
pub mod logging;
pub mod model;
pub mod storage;
pub mod sync;
pub mod tracker;

pub use api::{Backend, HttpBackend};
pub use auth::AuthSession;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{DailyLog, FoodItem, HistoryData, NutritionGoals};
pub use storage::{Storage, StorageStats};
pub use tracker::Tracker;

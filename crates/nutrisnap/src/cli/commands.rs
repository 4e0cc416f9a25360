//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::dates::Period;
use crate::i18n::Language;
use crate::model::FoodPatch;
use crate::tracker::Metric;

/// Quick-add arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Meal name
    pub name: String,

    /// Calories (kcal)
    pub calories: f64,

    /// Protein (g)
    pub protein: f64,

    /// Portion size in grams
    #[arg(short = 'g', long)]
    pub quantity: Option<f64>,
}

/// Log a portion of a food found with `search`.
#[derive(Debug, Args)]
pub struct PortionCommand {
    /// Food id from the search results
    pub food_id: String,

    /// Portion size in grams
    pub grams: u32,

    /// Look the id up in the built-in food list instead of the online database
    #[arg(short, long)]
    pub local: bool,
}

/// Edit arguments. Omitted fields keep their value.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Id of the food to edit
    pub id: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New calories (kcal)
    #[arg(long)]
    pub calories: Option<f64>,

    /// New protein (g)
    #[arg(long)]
    pub protein: Option<f64>,

    /// New portion size in grams
    #[arg(short = 'g', long)]
    pub quantity: Option<f64>,
}

impl EditCommand {
    /// The changes requested on the command line.
    #[must_use]
    pub fn patch(&self) -> FoodPatch {
        FoodPatch {
            name: self.name.clone(),
            calories: self.calories,
            protein: self.protein,
            quantity: self.quantity,
        }
    }
}

/// Today's log.
#[derive(Debug, Args)]
pub struct TodayCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Goal commands.
#[derive(Debug, Subcommand)]
pub enum GoalsCommand {
    /// Show the current goals
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Change one or both goals
    Set {
        /// Daily calories (kcal)
        #[arg(long)]
        calories: Option<f64>,

        /// Daily protein (g)
        #[arg(long)]
        protein: Option<f64>,
    },
}

/// History arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Window to show
    #[arg(short, long, value_enum, default_value = "weekly")]
    pub period: PeriodArg,

    /// Total to chart
    #[arg(short, long, value_enum, default_value = "calories")]
    pub metric: MetricArg,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Food search arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Food name to look for
    pub query: String,

    /// Search the built-in food list instead of the online database
    #[arg(short, long)]
    pub local: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Account commands.
#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Create an account
    Signup {
        /// Account email
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least six characters)
        #[arg(short, long)]
        password: String,
    },

    /// Sign in
    Login {
        /// Account email
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },

    /// Sign out on this device
    Logout,

    /// Show who is signed in
    Status,
}

/// Sync commands.
#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Send the local log to the backend
    Push,

    /// Replace the local log with the backend's copy
    Pull,

    /// Keep syncing until interrupted
    Run,
}

/// Language commands.
#[derive(Debug, Subcommand)]
pub enum LanguageCommand {
    /// Show the current language
    Show,

    /// Change the language
    Set {
        /// Language code
        #[arg(value_enum)]
        language: LanguageArg,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// History window argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeriodArg {
    /// Today only
    Daily,
    /// Last seven days
    Weekly,
    /// Last thirty days
    Monthly,
}

impl From<PeriodArg> for Period {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Daily => Self::Daily,
            PeriodArg::Weekly => Self::Weekly,
            PeriodArg::Monthly => Self::Monthly,
        }
    }
}

/// Chart metric argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    /// Calories
    Calories,
    /// Protein
    Protein,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Calories => Self::Calories,
            MetricArg::Protein => Self::Protein,
        }
    }
}

/// Language argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LanguageArg {
    /// English
    En,
    /// Arabic
    Ar,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::En => Self::En,
            LanguageArg::Ar => Self::Ar,
        }
    }
}

//! Command-line interface for nutrisnap.
//!
//! This module provides the CLI structure for the `nutrisnap` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, AuthCommand, ConfigCommand, EditCommand, GoalsCommand, HistoryCommand,
    LanguageArg, LanguageCommand, MetricArg, PeriodArg, PortionCommand, SearchCommand,
    SyncCommand, TodayCommand,
};

use crate::logging::Verbosity;

/// nutrisnap - Track calories and protein from the terminal
///
/// Keeps a daily food log locally and, when signed in, syncs goals and
/// history with a nutrisnap backend.
#[derive(Debug, Parser)]
#[command(name = "nutrisnap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log a meal with known calories and protein
    Add(AddCommand),

    /// Log a portion of a food from the food database
    Portion(PortionCommand),

    /// Change a food logged today
    Edit(EditCommand),

    /// Remove a food logged today
    Delete {
        /// Id of the food to remove
        id: String,
    },

    /// Show today's foods, totals and progress
    Today(TodayCommand),

    /// Show or change daily goals
    #[command(subcommand)]
    Goals(GoalsCommand),

    /// Show past days
    History(HistoryCommand),

    /// Search for foods
    Search(SearchCommand),

    /// Manage the backend account
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Sync with the backend
    #[command(subcommand)]
    Sync(SyncCommand),

    /// Show or change the display language
    #[command(subcommand)]
    Language(LanguageCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

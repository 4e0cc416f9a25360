//! Tracing setup shared by the `nutrisnap` CLI and the `nutrisnapd` backend.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much log output to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Pick a verbosity from `-q` and the number of `-v` flags.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// The most detailed level shown.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive for the log target `crate_name`, e.g. `nutrisnap=debug`.
    #[must_use]
    pub fn directive(self, crate_name: &str) -> String {
        format!("{crate_name}={}", self.level())
    }
}

/// Initialize logging for the `nutrisnap` crate.
///
/// `RUST_LOG` takes precedence over `verbosity` when set.
///
/// # Examples
///
/// ```no_run
/// use nutrisnap::logging::{init_logging, Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    init_logging_for(&["nutrisnap"], verbosity);
}

/// Initialize logging with `verbosity` applied to each of `crate_names`.
///
/// Calling this more than once is harmless; only the first call installs a
/// subscriber.
pub fn init_logging_for(crate_names: &[&str], verbosity: Verbosity) {
    let default_filter = crate_names
        .iter()
        .map(|name| verbosity.directive(name))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

//! Logging setup.
//!
//! Modules import the macros through [`prelude`] so the whole crate logs the
//! same way. [`init`] picks journald when the daemon runs under systemd and a
//! human-readable stdout format otherwise.

use std::env;

use time::macros::format_description;
use tracing_subscriber::{
    EnvFilter, fmt::time::LocalTime, layer::SubscriberExt, util::SubscriberInitExt,
};

pub mod prelude {
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Safe to call once per process; later calls are ignored with a warning.
pub fn init() {
    let registry = tracing_subscriber::registry().with(env_filter());

    // systemd sets JOURNAL_STREAM for services whose stdout goes to the journal
    if env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                if registry.with(journald).try_init().is_err() {
                    warn!("Tracing subscriber already installed");
                }
                return;
            }
            Err(e) => eprintln!("journald unavailable, logging to stdout: {e}"),
        }
    }

    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));
    let stdout = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(false);
    if tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout)
        .try_init()
        .is_err()
    {
        warn!("Tracing subscriber already installed");
    }
}

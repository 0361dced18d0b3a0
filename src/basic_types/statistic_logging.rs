//! Responsible for logging statistics in a uniform `<prefix> <name>=<value>`
//! format so that downstream tooling can scrape them from the log stream.

use std::fmt::Display;

use log::info;
use once_cell::sync::OnceCell;

static STATISTIC_PREFIX: OnceCell<String> = OnceCell::new();

const DEFAULT_PREFIX: &str = "%%";

/// Set the prefix prepended to every logged statistic. May be called at most
/// once; later calls are ignored and report failure.
pub fn configure_statistic_logging(prefix: &str) -> bool {
    STATISTIC_PREFIX.set(prefix.to_owned()).is_ok()
}

/// Emit a single statistic at info level.
pub fn log_statistic(name: &str, value: impl Display) {
    let prefix = STATISTIC_PREFIX
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_PREFIX);
    info!("{prefix} {name}={value}");
}

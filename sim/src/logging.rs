//! Logger setup for hosts and demos.

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install `env_logger` as the global logger.
///
/// `RUST_LOG` wins when set. Otherwise `verbose` selects debug output for
/// this crate on top of info for everything else.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let filter = format!("info,burrow_sim={level}");

    // A logger may already be installed (tests, embedding hosts).
    let _ = Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init();
}

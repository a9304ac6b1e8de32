use std::env;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

/// Install a fmt subscriber for the current test binary. The level is taken from
/// `RUST_LOG` and logging stays off when it is unset or invalid. Safe to call from
/// every test.
pub fn setup() {
    let log_filter = match env::var("RUST_LOG") {
        Ok(level) => LevelFilter::from_str(&level.to_lowercase()).unwrap_or(LevelFilter::OFF),
        Err(_) => LevelFilter::OFF,
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(log_filter)
        .with_test_writer()
        .try_init();
}

use eyre::eyre;
use tracing::level_filters::LevelFilter;

use crate::config::LogLevel;

/// Installs the global fmt subscriber used by every sample binary.
pub fn init_tracing(level: LogLevel) -> eyre::Result<()> {
    tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_target(false)
        .with_max_level(LevelFilter::from(level))
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))
}

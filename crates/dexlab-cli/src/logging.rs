//! Log output for the binary. Libraries only emit `tracing` events; this is
//! the one place a subscriber is installed.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "dexlab=info";
const VERBOSE_FILTER: &str = "dexlab=debug";

/// `RUST_LOG` wins when set; otherwise `--verbose` picks debug output.
pub fn init(verbose: bool) -> Result<()> {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|e| anyhow!("invalid log filter: {e}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

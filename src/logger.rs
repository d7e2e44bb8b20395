//! Ambient logging init (§10.2): a thin one-shot wrapper around
//! `env_logger`, so the reference collector binary has one place that
//! decides how the `log` facade is wired up.

use log::LevelFilter;
use std::str::FromStr;

/// Initialize the global logger at `level` (e.g. `"info"`, `"debug"`).
/// Falls back to `Info` on an unparseable level rather than panicking —
/// a malformed config value shouldn't keep the collector from starting.
pub fn init(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter(None, filter)
        .init();
}

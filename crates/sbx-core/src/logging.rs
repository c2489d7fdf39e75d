//! Logging setup: console output plus an optional file sink, with noisy
//! transitive crates suppressed below `warn`.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber for the `sharebox` binary.
///
/// `log_level` is the default filter directive (e.g. "info", "debug");
/// `log_file`, if present, receives plain (non-colorized) output in addition
/// to the console.
pub fn init(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(format!(
        "{log_level},opendal=warn,reqsign=warn,notify=warn,fuse3=warn"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_target(false).with_ansi(atty_is_tty());

    let registry = tracing_subscriber::registry().with(filter).with(console_layer);

    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        let file_layer = fmt::layer().with_ansi(false).with_writer(file);
        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    Ok(())
}

fn atty_is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

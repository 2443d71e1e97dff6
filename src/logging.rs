use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

pub const LOG_ENV: &str = "TAPDRILL_LOG";

/// Send tracing output to `path`; the terminal belongs to the TUI.
///
/// `TAPDRILL_LOG` takes precedence over `default_level`. Calling this twice is
/// harmless, the second subscriber is simply not installed.
pub fn init(path: &Path, default_level: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_log_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("tapdrill.log");
        init(&path, "debug").unwrap();
        assert!(path.exists());
        // A second call must not fail even though a subscriber is set
        init(&path, "info").unwrap();
    }
}

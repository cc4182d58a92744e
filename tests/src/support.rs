use std::sync::Once;

use anyhow::Result;
use fs_sandbox::{FileSystemConfig, FileSystemPlugin};
use tempfile::{tempdir, TempDir};

pub fn temp_workspace() -> Result<TempDir> {
    Ok(tempdir()?)
}

/// Installs a fmt subscriber once per test binary, filtered by `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

/// Plugin rooted at `name` inside a temp workspace.
pub fn plugin_in(workspace: &TempDir, name: &str, auto_clean: bool) -> Result<FileSystemPlugin> {
    let config = FileSystemConfig::new(workspace.path().join(name)).with_auto_clean(auto_clean);
    Ok(FileSystemPlugin::new(config)?)
}

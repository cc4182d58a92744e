//! Per-test lifecycle: build a sandbox before the test body, clean it up after.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::assert::{Assert, AssertionCounter};
use crate::config::FileSystemConfig;
use crate::errors::Result;
use crate::fs::{self, FileSystem, RemoveOptions};
use crate::macros::MacroRegistry;

#[derive(Clone, Debug)]
pub struct FileSystemPlugin {
    base_path: PathBuf,
    auto_clean: bool,
    fs_macros: Arc<MacroRegistry<FileSystem>>,
    assert_macros: Arc<MacroRegistry<Assert>>,
}

impl FileSystemPlugin {
    pub fn new(config: FileSystemConfig) -> Result<Self> {
        Ok(Self {
            base_path: config.resolve_base_path()?,
            auto_clean: config.auto_clean,
            fs_macros: Arc::new(MacroRegistry::new()),
            assert_macros: Arc::new(MacroRegistry::new()),
        })
    }

    /// Every context created afterwards sees these registries.
    pub fn with_registries(
        mut self,
        fs_macros: Arc<MacroRegistry<FileSystem>>,
        assert_macros: Arc<MacroRegistry<Assert>>,
    ) -> Self {
        self.fs_macros = fs_macros;
        self.assert_macros = assert_macros;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn auto_clean(&self) -> bool {
        self.auto_clean
    }

    pub fn setup(&self) -> Result<TestContext> {
        let fs = FileSystem::with_macros(&self.base_path, self.fs_macros.clone())?;
        let counter = AssertionCounter::new();
        let assert = Assert::with_macros(fs.clone(), counter.clone(), self.assert_macros.clone());
        debug!(
            base = %self.base_path.display(),
            auto_clean = self.auto_clean,
            "test context created"
        );
        Ok(TestContext {
            fs,
            assert,
            counter,
            auto_clean: self.auto_clean,
            torn_down: false,
        })
    }

    /// Runs `body` between `setup` and `teardown`. A panicking body still
    /// gets its sandbox removed through the context's drop guard.
    pub async fn run<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(FileSystem, Assert) -> Fut,
        Fut: Future<Output = T>,
    {
        let context = self.setup()?;
        let output = body(context.fs.clone(), context.assert.clone()).await;
        context.teardown().await?;
        Ok(output)
    }
}

/// Sandbox, assert and counter handed to one test.
///
/// With auto-clean on, the base directory is removed by [`teardown`] or, if
/// the context is dropped first, synchronously on drop.
///
/// [`teardown`]: TestContext::teardown
#[derive(Debug)]
pub struct TestContext {
    fs: FileSystem,
    assert: Assert,
    counter: AssertionCounter,
    auto_clean: bool,
    torn_down: bool,
}

impl TestContext {
    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    pub fn assert(&self) -> &Assert {
        &self.assert
    }

    pub fn assertions(&self) -> usize {
        self.counter.total()
    }

    pub async fn teardown(mut self) -> Result<()> {
        self.torn_down = true;
        if !self.auto_clean {
            return Ok(());
        }
        debug!(base = %self.fs.base_path().display(), "cleaning up test context");
        self.fs.cleanup().await
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if self.torn_down || !self.auto_clean {
            return;
        }

        let reason = if std::thread::panicking() {
            "test panicked"
        } else {
            "context dropped without teardown"
        };
        debug!(base = %self.fs.base_path().display(), reason, "cleaning up test context on drop");
        if let Err(err) = fs::remove_blocking(self.fs.base_path(), &RemoveOptions::for_cleanup()) {
            error!(
                base = %self.fs.base_path().display(),
                error = %err,
                "failed to clean up test context"
            );
        }
    }
}

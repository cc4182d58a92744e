//! Disposable per-test filesystem sandboxes and assertions over their
//! contents.
//!
//! A [`FileSystem`] owns one base directory and resolves every relative path
//! under it. [`Assert`] checks files and directories inside that sandbox and
//! reports mismatches as structured [`AssertionFailure`] records. The
//! [`FileSystemPlugin`] ties both to a test's lifecycle so the directory is
//! removed after every test, including failing ones.

pub mod assert;
pub mod config;
pub mod errors;
pub mod failure;
pub mod fs;
pub mod json;
pub mod macros;
pub mod path;
pub mod plugin;

pub use assert::{Assert, AssertResult, AssertionCounter, AssertionError, Needle, Substrings};
pub use config::{BasePath, FileSystemConfig, AUTO_CLEAN_ENV, BASE_PATH_ENV};
pub use errors::{Result, SandboxError};
pub use failure::{AssertionFailure, AssertionValue, Operator};
pub use fs::{
    DirEntry, FileKind, FileStats, FileSystem, MkdirOptions, RemoveOptions, StatOptions,
    WriteOptions,
};
pub use json::{Indent, JsonOptions};
pub use macros::{Macro, MacroRegistry};
pub use plugin::{FileSystemPlugin, TestContext};

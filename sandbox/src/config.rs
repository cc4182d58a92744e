use std::path::PathBuf;

use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::errors::{Result, SandboxError};
use crate::path;

pub const BASE_PATH_ENV: &str = "FS_SANDBOX_BASE_PATH";
pub const AUTO_CLEAN_ENV: &str = "FS_SANDBOX_AUTO_CLEAN";

/// Where the sandbox lives: a filesystem path or a `file://` url.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(from = "String")]
pub enum BasePath {
    Path(PathBuf),
    Url(Url),
}

impl BasePath {
    /// `file:` strings become urls (falling back to a path if they do not
    /// parse), everything else is a path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("file:") {
            if let Ok(url) = Url::parse(raw) {
                return BasePath::Url(url);
            }
        }
        BasePath::Path(PathBuf::from(raw))
    }

    pub fn to_path(&self) -> Result<PathBuf> {
        match self {
            BasePath::Path(path) => Ok(path.clone()),
            BasePath::Url(url) => path::path_from_url(url),
        }
    }
}

impl From<String> for BasePath {
    fn from(raw: String) -> Self {
        BasePath::parse(&raw)
    }
}

impl From<&str> for BasePath {
    fn from(raw: &str) -> Self {
        BasePath::parse(raw)
    }
}

impl From<PathBuf> for BasePath {
    fn from(path: PathBuf) -> Self {
        BasePath::Path(path)
    }
}

impl From<&std::path::Path> for BasePath {
    fn from(path: &std::path::Path) -> Self {
        BasePath::Path(path.to_path_buf())
    }
}

impl From<Url> for BasePath {
    fn from(url: Url) -> Self {
        BasePath::Url(url)
    }
}

/// A fresh uuid-named directory under the system temp dir.
pub fn default_base_path() -> PathBuf {
    std::env::temp_dir().join(Uuid::new_v4().to_string())
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileSystemConfig {
    #[serde(alias = "basePath")]
    pub base_path: BasePath,
    #[serde(alias = "autoClean")]
    pub auto_clean: bool,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            base_path: BasePath::Path(default_base_path()),
            auto_clean: true,
        }
    }
}

impl FileSystemConfig {
    pub fn new(base_path: impl Into<BasePath>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn with_auto_clean(mut self, auto_clean: bool) -> Self {
        self.auto_clean = auto_clean;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset keys keep their
    /// defaults; a relative base path is resolved against the current
    /// directory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(BASE_PATH_ENV).filter(|raw| !raw.trim().is_empty()) {
            config.base_path = match BasePath::parse(raw.trim()) {
                BasePath::Path(path) if path.is_relative() => {
                    BasePath::Path(std::env::current_dir()?.join(path))
                }
                other => other,
            };
        }

        if let Some(raw) = lookup(AUTO_CLEAN_ENV) {
            config.auto_clean = parse_bool(AUTO_CLEAN_ENV, &raw)?;
        }

        Ok(config)
    }

    pub fn resolve_base_path(&self) -> Result<PathBuf> {
        let path = self.base_path.to_path()?;
        path::ensure_absolute_base(&path)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SandboxError::InvalidOperation(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

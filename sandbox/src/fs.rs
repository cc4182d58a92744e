use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};
use url::Url;
use walkdir::WalkDir;

use crate::errors::{is_not_found_kind, Result, SandboxError};
use crate::json::{self, JsonOptions};
use crate::macros::MacroRegistry;
use crate::path;

const DEFAULT_REMOVE_RETRIES: u32 = 3;
const DEFAULT_CLEANUP_RETRIES: u32 = 10;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Unix permission bits applied when the file is created.
    pub mode: Option<u32>,
    pub append: bool,
}

impl WriteOptions {
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MkdirOptions {
    pub mode: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveOptions {
    pub max_retries: u32,
    /// Delay before the first retry; each further attempt waits one more step.
    pub retry_delay: Duration,
}

impl RemoveOptions {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    pub fn for_cleanup() -> Self {
        Self::new(DEFAULT_CLEANUP_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self::new(DEFAULT_REMOVE_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatOptions {
    pub follow_symlinks: bool,
}

impl Default for StatOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FileStats {
    pub kind: FileKind,
    pub size: u64,
    pub readonly: bool,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

impl FileStats {
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };
        Self {
            kind,
            size: metadata.len(),
            readonly: metadata.permissions().readonly(),
            modified: metadata.modified().ok().map(to_utc),
            accessed: metadata.accessed().ok().map(to_utc),
            created: metadata.created().ok().map(to_utc),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// A regular file found by [`FileSystem::read_dir`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DirEntry {
    /// Relative to the scanned directory, `/`-separated.
    pub path: String,
    pub full_path: PathBuf,
    pub basename: String,
    pub size: u64,
}

/// Filesystem rooted at a fixed base directory. Every relative path is joined
/// onto the base; nothing outside the tree is touched unless the caller walks
/// out with `..`.
#[derive(Clone)]
pub struct FileSystem {
    base_path: PathBuf,
    base_url: Url,
    macros: Arc<MacroRegistry<FileSystem>>,
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl FileSystem {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_macros(base_path, Arc::new(MacroRegistry::new()))
    }

    pub fn with_macros(
        base_path: impl AsRef<Path>,
        macros: Arc<MacroRegistry<FileSystem>>,
    ) -> Result<Self> {
        let base_path = path::ensure_absolute_base(base_path.as_ref())?;
        let base_url = path::directory_url(&base_path)?;
        Ok(Self {
            base_path,
            base_url,
            macros,
        })
    }

    pub fn from_url(base_url: &Url) -> Result<Self> {
        Self::new(path::path_from_url(base_url)?)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn macros(&self) -> &Arc<MacroRegistry<FileSystem>> {
        &self.macros
    }

    /// Absolute location of `relative` inside the sandbox.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        path::resolve(&self.base_path, relative)
    }

    pub async fn create(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<()> {
        self.create_with(relative, contents, &WriteOptions::default())
            .await
    }

    #[instrument(
        skip_all,
        fields(path = %relative.as_ref().display(), size = contents.as_ref().len())
    )]
    pub async fn create_with(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
        options: &WriteOptions,
    ) -> Result<()> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut open = fs::OpenOptions::new();
        open.create(true).write(true);
        if options.append {
            open.append(true);
        } else {
            open.truncate(true);
        }
        #[cfg(unix)]
        {
            if let Some(mode) = options.mode {
                open.mode(mode);
            }
        }

        let mut file = open.open(&path).await?;
        file.write_all(contents.as_ref()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn mkdir(&self, relative: impl AsRef<Path>) -> Result<()> {
        self.mkdir_with(relative, &MkdirOptions::default()).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn mkdir_with(
        &self,
        relative: impl AsRef<Path>,
        options: &MkdirOptions,
    ) -> Result<()> {
        let path = self.resolve(relative);
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            if let Some(mode) = options.mode {
                builder.mode(mode);
            }
        }
        #[cfg(not(unix))]
        let _ = options;
        builder.create(path).await?;
        Ok(())
    }

    pub async fn remove(&self, relative: impl AsRef<Path>) -> Result<()> {
        self.remove_with(relative, &RemoveOptions::default()).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn remove_with(
        &self,
        relative: impl AsRef<Path>,
        options: &RemoveOptions,
    ) -> Result<()> {
        let path = self.resolve(relative);
        remove_with_retries(&path, options).await
    }

    /// Removes the whole base directory.
    pub async fn cleanup(&self) -> Result<()> {
        self.cleanup_with(&RemoveOptions::for_cleanup()).await
    }

    #[instrument(skip_all, fields(base = %self.base_path.display()))]
    pub async fn cleanup_with(&self, options: &RemoveOptions) -> Result<()> {
        remove_with_retries(&self.base_path, options).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn exists(&self, relative: impl AsRef<Path>) -> Result<bool> {
        path_exists(&self.resolve(relative)).await
    }

    #[instrument(skip_all, fields(base = %self.base_path.display()))]
    pub async fn root_exists(&self) -> Result<bool> {
        path_exists(&self.base_path).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn contents(&self, relative: impl AsRef<Path>) -> Result<String> {
        Ok(fs::read_to_string(self.resolve(relative)).await?)
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn contents_bytes(&self, relative: impl AsRef<Path>) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(relative)).await?)
    }

    pub async fn stats(&self, relative: impl AsRef<Path>) -> Result<FileStats> {
        self.stats_with(relative, &StatOptions::default()).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn stats_with(
        &self,
        relative: impl AsRef<Path>,
        options: &StatOptions,
    ) -> Result<FileStats> {
        let path = self.resolve(relative);
        let metadata = if options.follow_symlinks {
            fs::metadata(&path).await?
        } else {
            fs::symlink_metadata(&path).await?
        };
        Ok(FileStats::from_metadata(&metadata))
    }

    /// Recursively lists regular files below the base directory, sorted by
    /// name at every level. Directories, including symlinked ones, are
    /// descended into but never reported. A missing base directory yields an
    /// empty listing.
    #[instrument(skip_all, fields(base = %self.base_path.display()))]
    pub async fn read_dir(&self) -> Result<Vec<DirEntry>> {
        list_files(self.base_path.clone()).await
    }

    /// Same as [`FileSystem::read_dir`], starting from `relative`. Entry paths
    /// are relative to that directory.
    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn read_dir_at(&self, relative: impl AsRef<Path>) -> Result<Vec<DirEntry>> {
        list_files(self.resolve(relative)).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn create_json<T: Serialize + ?Sized>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> Result<()> {
        self.create_json_with(relative, value, &JsonOptions::default())
            .await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn create_json_with<T: Serialize + ?Sized>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
        options: &JsonOptions,
    ) -> Result<()> {
        let text = json::to_json_text(value, options)?;
        self.create_with(relative, text, &options.write).await
    }

    #[instrument(skip_all, fields(path = %relative.as_ref().display()))]
    pub async fn contents_json<T: DeserializeOwned>(
        &self,
        relative: impl AsRef<Path>,
    ) -> Result<T> {
        let text = self.contents(relative).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Invokes a method registered on this filesystem's macro registry.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let method = self
            .macros
            .get_macro(name)
            .ok_or_else(|| SandboxError::MacroNotFound(name.to_string()))?;
        method.call(self, args).await
    }

    /// Reads a getter registered on this filesystem's macro registry.
    pub fn get(&self, name: &str) -> Result<Value> {
        let getter = self
            .macros
            .get_getter(name)
            .ok_or_else(|| SandboxError::MacroNotFound(name.to_string()))?;
        Ok(getter(self))
    }
}

async fn path_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if is_not_found_kind(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::ResourceBusy
            | io::ErrorKind::DirectoryNotEmpty
            | io::ErrorKind::Interrupted
    )
}

async fn remove_once(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if is_not_found_kind(&err) => return Ok(()),
        Err(err) => return Err(err),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Err(err) if is_not_found_kind(&err) => Ok(()),
        other => other,
    }
}

async fn remove_with_retries(path: &Path, options: &RemoveOptions) -> Result<()> {
    let mut attempt = 0;
    loop {
        match remove_once(path).await {
            Ok(()) => return Ok(()),
            Err(err) if is_transient(&err) && attempt < options.max_retries => {
                attempt += 1;
                warn!(
                    path = %path.display(),
                    attempt,
                    error = %err,
                    "retrying removal after transient error"
                );
                tokio::time::sleep(options.retry_delay * attempt).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Blocking removal used where no runtime is available (drop guards).
pub(crate) fn remove_blocking(path: &Path, options: &RemoveOptions) -> io::Result<()> {
    let mut attempt = 0;
    loop {
        let result = match std::fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(err) if is_not_found_kind(&err) => return Ok(()),
            Err(err) if is_transient(&err) && attempt < options.max_retries => {
                attempt += 1;
                std::thread::sleep(options.retry_delay * attempt);
            }
            Err(err) => return Err(err),
        }
    }
}

async fn list_files(root: PathBuf) -> Result<Vec<DirEntry>> {
    tokio::task::spawn_blocking(move || walk_files(&root))
        .await
        .map_err(|err| SandboxError::Join(err.to_string()))?
}

fn walk_files(root: &Path) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 && err.io_error().is_some_and(is_not_found_kind) => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(SandboxError::Io(err.into())),
        };
        if entry.depth() == 0 {
            if !entry.file_type().is_dir() {
                return Err(SandboxError::Io(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", root.display()),
                )));
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let size = entry
            .metadata()
            .map_err(|err| SandboxError::Io(err.into()))?
            .len();
        entries.push(DirEntry {
            path: path::to_slash(relative),
            full_path: entry.path().to_path_buf(),
            basename: entry.file_name().to_string_lossy().into_owned(),
            size,
        });
    }
    Ok(entries)
}

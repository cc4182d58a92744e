//! Filesystem assertions evaluated against a [`FileSystem`].
//!
//! Every assertion bumps the shared [`AssertionCounter`] once before looking
//! at the disk, checks existence preconditions itself and reports them as an
//! [`AssertionFailure`] rather than surfacing the raw I/O error. Anything else
//! that goes wrong while reading (permissions, invalid UTF-8) comes back as
//! [`AssertionError::Sandbox`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::errors::SandboxError;
use crate::failure::{AssertionFailure, AssertionValue, Operator};
use crate::fs::FileSystem;
use crate::macros::MacroRegistry;

/// Number of assertions attempted, owned by the test host and shared with
/// every [`Assert`] it hands out.
#[derive(Clone, Debug, Default)]
pub struct AssertionCounter(Arc<AtomicUsize>);

impl AssertionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error(transparent)]
    Failure(#[from] AssertionFailure),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl AssertionError {
    pub fn failure(&self) -> Option<&AssertionFailure> {
        match self {
            AssertionError::Failure(failure) => Some(failure),
            AssertionError::Sandbox(_) => None,
        }
    }

    pub fn into_failure(self) -> Option<AssertionFailure> {
        match self {
            AssertionError::Failure(failure) => Some(failure),
            AssertionError::Sandbox(_) => None,
        }
    }
}

pub type AssertResult = std::result::Result<(), AssertionError>;

/// What [`Assert::file_contains`] looks for.
#[derive(Clone, Debug)]
pub enum Needle {
    Text(String),
    /// Every item must be present; the first missing one is reported.
    List(Vec<String>),
    Pattern(Regex),
}

impl From<&str> for Needle {
    fn from(text: &str) -> Self {
        Needle::Text(text.to_string())
    }
}

impl From<String> for Needle {
    fn from(text: String) -> Self {
        Needle::Text(text)
    }
}

impl From<Regex> for Needle {
    fn from(pattern: Regex) -> Self {
        Needle::Pattern(pattern)
    }
}

impl From<&Regex> for Needle {
    fn from(pattern: &Regex) -> Self {
        Needle::Pattern(pattern.clone())
    }
}

impl From<Vec<String>> for Needle {
    fn from(items: Vec<String>) -> Self {
        Needle::List(items)
    }
}

impl From<Vec<&str>> for Needle {
    fn from(items: Vec<&str>) -> Self {
        Needle::List(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Needle {
    fn from(items: &[&str]) -> Self {
        Needle::List(items.iter().map(|item| item.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Needle {
    fn from(items: [&str; N]) -> Self {
        Needle::List(items.iter().map(|item| item.to_string()).collect())
    }
}

/// One or more substrings for [`Assert::file_not_contains`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Substrings(Vec<String>);

impl Substrings {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for Substrings {
    fn from(text: &str) -> Self {
        Substrings(vec![text.to_string()])
    }
}

impl From<String> for Substrings {
    fn from(text: String) -> Self {
        Substrings(vec![text])
    }
}

impl From<Vec<String>> for Substrings {
    fn from(items: Vec<String>) -> Self {
        Substrings(items)
    }
}

impl From<Vec<&str>> for Substrings {
    fn from(items: Vec<&str>) -> Self {
        Substrings(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Substrings {
    fn from(items: &[&str]) -> Self {
        Substrings(items.iter().map(|item| item.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Substrings {
    fn from(items: [&str; N]) -> Self {
        Substrings(items.iter().map(|item| item.to_string()).collect())
    }
}

fn quoted(text: &str) -> String {
    AssertionValue::from(text).to_string()
}

#[derive(Clone)]
pub struct Assert {
    fs: FileSystem,
    counter: AssertionCounter,
    prefix: Option<String>,
    macros: Arc<MacroRegistry<Assert>>,
}

impl fmt::Debug for Assert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assert")
            .field("fs", &self.fs)
            .field("assertions", &self.counter.total())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Assert {
    pub fn new(fs: FileSystem, counter: AssertionCounter) -> Self {
        Self::with_macros(fs, counter, Arc::new(MacroRegistry::new()))
    }

    pub fn with_macros(
        fs: FileSystem,
        counter: AssertionCounter,
        macros: Arc<MacroRegistry<Assert>>,
    ) -> Self {
        Self {
            fs,
            counter,
            prefix: None,
            macros,
        }
    }

    /// Copy of this assert whose failure messages start with `prefix: `.
    /// Shares the counter with the original.
    pub fn with_message(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..self.clone()
        }
    }

    pub fn fs(&self) -> &FileSystem {
        &self.fs
    }

    pub fn counter(&self) -> &AssertionCounter {
        &self.counter
    }

    pub fn macros(&self) -> &Arc<MacroRegistry<Assert>> {
        &self.macros
    }

    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, SandboxError> {
        let method = self
            .macros
            .get_macro(name)
            .ok_or_else(|| SandboxError::MacroNotFound(name.to_string()))?;
        method.call(self, args).await
    }

    pub fn get(&self, name: &str) -> Result<Value, SandboxError> {
        let getter = self
            .macros
            .get_getter(name)
            .ok_or_else(|| SandboxError::MacroNotFound(name.to_string()))?;
        Ok(getter(self))
    }

    fn evaluate(&self, passed: bool, failure: impl FnOnce() -> AssertionFailure) -> AssertResult {
        if passed {
            return Ok(());
        }
        let failure = failure().prefixed(self.prefix.as_deref());
        debug!(operator = %failure.operator, message = %failure.message, "assertion failed");
        Err(failure.into())
    }

    async fn require(&self, path: &str, message: impl FnOnce() -> String) -> AssertResult {
        let exists = self.fs.exists(path).await?;
        self.evaluate(exists, || AssertionFailure::existence(message(), Operator::Exists))
    }

    async fn require_file(&self, path: &str) -> AssertResult {
        self.require(path, || format!("expected {} file to exist", quoted(path)))
            .await
    }

    async fn require_dir(&self, path: &str) -> AssertResult {
        self.require(path, || format!("expected {} directory to exist", quoted(path)))
            .await
    }

    async fn listing(&self, path: Option<&str>) -> Result<Vec<String>, SandboxError> {
        let entries = match path {
            Some(path) => self.fs.read_dir_at(path).await?,
            None => self.fs.read_dir().await?,
        };
        Ok(entries.into_iter().map(|entry| entry.path).collect())
    }

    pub async fn file_exists(&self, path: &str) -> AssertResult {
        self.counter.increment();
        self.require_file(path).await
    }

    pub async fn file_not_exists(&self, path: &str) -> AssertResult {
        self.counter.increment();
        let exists = self.fs.exists(path).await?;
        self.evaluate(!exists, || {
            AssertionFailure::existence(
                format!("expected {} file to not exist", quoted(path)),
                Operator::NotExists,
            )
        })
    }

    pub async fn dir_exists(&self, path: &str) -> AssertResult {
        self.counter.increment();
        self.require_dir(path).await
    }

    pub async fn dir_not_exists(&self, path: &str) -> AssertResult {
        self.counter.increment();
        let exists = self.fs.exists(path).await?;
        self.evaluate(!exists, || {
            AssertionFailure::existence(
                format!("expected {} directory to not exist", quoted(path)),
                Operator::NotExists,
            )
        })
    }

    pub async fn file_equals(&self, path: &str, expected: &str) -> AssertResult {
        self.counter.increment();
        self.require_file(path).await?;

        let contents = self.fs.contents(path).await?;
        self.evaluate(contents == expected, || {
            AssertionFailure::comparison(
                format!(
                    "expected {} file contents to equal {}",
                    quoted(path),
                    quoted(expected)
                ),
                Operator::StrictEqual,
                expected,
                contents.as_str(),
            )
        })
    }

    pub async fn file_contains(&self, path: &str, needle: impl Into<Needle>) -> AssertResult {
        self.counter.increment();
        let needle = needle.into();
        self.require_file(path).await?;

        let contents = self.fs.contents(path).await?;
        match needle {
            Needle::Text(text) => self.contains_substring(path, &contents, &text),
            Needle::List(items) => items
                .iter()
                .try_for_each(|item| self.contains_substring(path, &contents, item)),
            Needle::Pattern(pattern) => self.evaluate(pattern.is_match(&contents), || {
                let source = AssertionValue::Pattern(pattern.as_str().to_string());
                AssertionFailure::comparison(
                    format!("expected {} file contents to match {source}", quoted(path)),
                    Operator::StrictEqual,
                    source,
                    contents.as_str(),
                )
                .without_diff()
            }),
        }
    }

    fn contains_substring(&self, path: &str, contents: &str, needle: &str) -> AssertResult {
        self.evaluate(contents.contains(needle), || {
            AssertionFailure::comparison(
                format!(
                    "expected {} file contents to contain {}",
                    quoted(path),
                    quoted(needle)
                ),
                Operator::ContainsSubset,
                needle,
                contents,
            )
        })
    }

    pub async fn file_not_contains(
        &self,
        path: &str,
        needles: impl Into<Substrings>,
    ) -> AssertResult {
        self.counter.increment();
        let needles = needles.into();
        self.require_file(path).await?;

        let contents = self.fs.contents(path).await?;
        for needle in needles.iter() {
            self.evaluate(!contents.contains(needle), || {
                AssertionFailure::comparison(
                    format!(
                        "expected {} file contents to not contain {}",
                        quoted(path),
                        quoted(needle)
                    ),
                    Operator::ContainsSubset,
                    needle,
                    contents.as_str(),
                )
                .without_diff()
            })?;
        }
        Ok(())
    }

    pub async fn file_same_as(&self, path: &str, other_path: &str) -> AssertResult {
        self.counter.increment();
        self.require_file(path).await?;
        self.require(other_path, || {
            format!("expected comparing file {} to exist", quoted(other_path))
        })
        .await?;

        let contents = self.fs.contents(path).await?;
        let other_contents = self.fs.contents(other_path).await?;
        self.evaluate(contents == other_contents, || {
            AssertionFailure::comparison(
                format!(
                    "expected {} file contents to equal {}",
                    quoted(path),
                    quoted(&other_contents)
                ),
                Operator::StrictEqual,
                other_contents.as_str(),
                contents.as_str(),
            )
        })
    }

    pub async fn file_is_empty(&self, path: &str) -> AssertResult {
        self.counter.increment();
        self.require_file(path).await?;

        let contents = self.fs.contents(path).await?;
        self.evaluate(is_blank(&contents), || {
            AssertionFailure::comparison(
                format!("expected {} file to be empty", quoted(path)),
                Operator::StrictEqual,
                "",
                contents.as_str(),
            )
        })
    }

    pub async fn file_is_not_empty(&self, path: &str) -> AssertResult {
        self.counter.increment();
        self.require_file(path).await?;

        let contents = self.fs.contents(path).await?;
        self.evaluate(!is_blank(&contents), || {
            AssertionFailure::comparison(
                format!("expected {} file to be not empty", quoted(path)),
                Operator::NotStrictEqual,
                "",
                contents.as_str(),
            )
            .without_diff()
        })
    }

    /// Passes when every path appears in the recursive listing of the base
    /// directory. Paths are compared as `/`-separated strings.
    pub async fn has_files<I>(&self, files: I) -> AssertResult
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.counter.increment();
        let files: Vec<String> = files.into_iter().map(Into::into).collect();

        let listing = self.listing(None).await?;
        let has_all = files.iter().all(|file| listing.contains(file));
        self.evaluate(has_all, || {
            let expected = AssertionValue::List(files);
            AssertionFailure::comparison(
                format!("expected file system to have {expected} files"),
                Operator::DeepStrictEqual,
                expected,
                listing,
            )
        })
    }

    pub async fn does_not_have_files<I>(&self, files: I) -> AssertResult
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.counter.increment();
        let files: Vec<String> = files.into_iter().map(Into::into).collect();

        let listing = self.listing(None).await?;
        let has_none = files.iter().all(|file| !listing.contains(file));
        self.evaluate(has_none, || {
            let expected = AssertionValue::List(listing);
            AssertionFailure::comparison(
                format!("expected file system to not have {expected} files"),
                Operator::DeepStrictNotEqual,
                expected,
                files,
            )
        })
    }

    /// Passes when no regular file exists below `path`, or below the base
    /// directory when `path` is `None`.
    pub async fn dir_is_empty(&self, path: Option<&str>) -> AssertResult {
        self.counter.increment();
        if let Some(path) = path {
            self.require_dir(path).await?;
        }

        let listing = self.listing(path).await?;
        self.evaluate(listing.is_empty(), || {
            let message = match path {
                Some(path) => format!("expected {} directory to be empty", quoted(path)),
                None => "expected file system base directory to be empty".to_string(),
            };
            AssertionFailure::comparison(
                message,
                Operator::DeepStrictEqual,
                Vec::<String>::new(),
                listing,
            )
        })
    }

    pub async fn dir_is_not_empty(&self, path: Option<&str>) -> AssertResult {
        self.counter.increment();
        if let Some(path) = path {
            self.require_dir(path).await?;
        }

        let listing = self.listing(path).await?;
        self.evaluate(!listing.is_empty(), || {
            let message = match path {
                Some(path) => format!("expected {} directory to be not empty", quoted(path)),
                None => "expected file system base directory to be not empty".to_string(),
            };
            AssertionFailure::comparison(
                message,
                Operator::DeepStrictNotEqual,
                Vec::<String>::new(),
                Vec::<String>::new(),
            )
            .without_diff()
        })
    }
}

/// Whitespace-only check that also treats a byte order mark as blank.
fn is_blank(contents: &str) -> bool {
    contents
        .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .is_empty()
}

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::errors::{Result, SandboxError};

pub fn ensure_absolute_base(base_dir: &Path) -> Result<PathBuf> {
    if base_dir.is_relative() {
        return Err(SandboxError::InvalidOperation(format!(
            "sandbox base directory must be absolute, got '{}'",
            base_dir.display()
        )));
    }
    Ok(base_dir.to_path_buf())
}

/// Joins `relative` onto `base_dir` with ordinary path semantics.
///
/// Leading separators are stripped so `"/foo"` lands inside the base instead
/// of replacing it. `..` is folded lexically into the preceding segment, so
/// `missing/../a.txt` resolves to `a.txt` even when `missing` does not exist.
/// A `..` with nothing left to fold stays in the path and points outside the
/// base directory.
pub fn resolve(base_dir: &Path, relative: impl AsRef<Path>) -> PathBuf {
    let mut segments: Vec<Component<'_>> = Vec::new();
    for component in relative.as_ref().components() {
        match component {
            Component::RootDir | Component::Prefix(_) | Component::CurDir => continue,
            Component::ParentDir => match segments.last() {
                Some(Component::Normal(_)) => {
                    segments.pop();
                }
                _ => segments.push(component),
            },
            normal => segments.push(normal),
        }
    }

    let mut resolved = base_dir.to_path_buf();
    resolved.extend(segments.iter().map(|segment| segment.as_os_str()));
    resolved
}

/// `file://` url of a directory, always with a trailing slash.
pub fn directory_url(base_dir: &Path) -> Result<Url> {
    Url::from_directory_path(base_dir)
        .map_err(|_| SandboxError::InvalidBaseUrl(base_dir.display().to_string()))
}

pub fn path_from_url(url: &Url) -> Result<PathBuf> {
    if url.scheme() != "file" {
        return Err(SandboxError::InvalidBaseUrl(url.to_string()));
    }
    url.to_file_path()
        .map_err(|_| SandboxError::InvalidBaseUrl(url.to_string()))
}

/// Relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

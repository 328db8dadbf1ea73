//! Local file handling: output directories, filenames, scratch space.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ToolError;

/// Longest filename [`sanitize_filename`] produces.
pub const MAX_FILENAME_LEN: usize = 100;

/// Extensions longer than this are treated as part of the stem.
const MAX_EXTENSION_LEN: usize = 10;

/// Create `path` and its parents. Succeeds if it already exists.
pub async fn ensure_dir(path: &Path) -> Result<(), ToolError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ToolError::filesystem("create directory", path, e))
}

/// Pick the output directory for a call: the caller's `output_path` if it
/// is non-blank, otherwise the configured default.
pub fn resolve_output_dir(requested: Option<&str>, default: &Path) -> PathBuf {
    match requested.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => normalize_path(Path::new(path)),
        None => normalize_path(default),
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` where a
/// preceding normal segment exists. Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Last segment of a local path or URL, without query or fragment.
pub fn base_name(reference: &str) -> &str {
    let without_query = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_query)
}

/// Make a safe filename out of arbitrary text.
///
/// Keeps ASCII letters, digits, `.`, `_` and `-`; anything else becomes
/// `_`. Runs of `_`, `.` or `-` collapse to one, leading and trailing separators
/// are trimmed, the extension is kept when truncating to
/// [`MAX_FILENAME_LEN`]. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN => {
            (stem, Some(ext))
        }
        _ => (name, None),
    };

    let ext = ext.map(clean_segment).filter(|e| !e.is_empty());
    let mut stem = clean_segment(stem);
    if stem.is_empty() {
        stem = placeholder_stem();
    }

    let ext_len = ext.as_ref().map(|e| e.len() + 1).unwrap_or(0);
    let budget = MAX_FILENAME_LEN - ext_len;
    if stem.len() > budget {
        // Only ASCII survives clean_segment, so byte truncation is safe
        stem.truncate(budget);
        let trimmed_len = stem.trim_end_matches(['_', '.', '-']).len();
        stem.truncate(trimmed_len);
        if stem.is_empty() {
            stem = placeholder_stem();
        }
    }

    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

fn clean_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if matches!(mapped, '_' | '.' | '-') && out.ends_with(mapped) {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches(['_', '.', '-']).to_string()
}

fn placeholder_stem() -> String {
    format!("image_{}", short_id())
}

/// Eight hex characters of a fresh v4 UUID.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// `dir/filename`, or `dir/<stem>_<short id>.<ext>` if that is taken.
pub async fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let renamed = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, short_id(), ext),
        _ => format!("{}_{}", filename, short_id()),
    };
    debug!(from = filename, to = %renamed, "output name taken, using suffixed name");
    dir.join(renamed)
}

pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ToolError::filesystem("write", path, e))
}

/// Per-call scratch directory. [`ScratchDir::close`] removes it on the
/// normal path; dropping an unclosed guard removes it synchronously.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create `<root>/<prefix>_<uuid>`.
    pub async fn create(root: &Path, prefix: &str) -> Result<Self, ToolError> {
        let path = root.join(format!("{}_{}", prefix, Uuid::new_v4().simple()));
        ensure_dir(&path).await?;
        debug!(path = %path.display(), "created scratch directory");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory without blocking the runtime. Failures are
    /// logged only.
    pub async fn close(mut self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory"),
        }
        self.removed = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory"),
        }
    }
}

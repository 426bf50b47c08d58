use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;

use crate::error::{ExtractError, Result};

/// Suffix given to files whose CRC or size did not verify.
pub const MISMATCH_SUFFIX: &str = ".crc-mismatch";

/// Turn an archive name into a relative path.
///
/// Both `/` and `\` separate segments; empty and `.` segments are dropped.
/// Returns `None` if any segment would leave the output directory
/// (`..`, a root, a drive prefix) or if nothing is left.
pub fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();

    for segment in name.split(['/', '\\']) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return None,
        }
    }

    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Writes entries below a base directory.
pub struct OutputSink {
    base: PathBuf,
}

impl OutputSink {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Create the base directory if it is missing.
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.base)
            .await
            .map_err(|e| ExtractError::fs(&self.base, e))
    }

    /// Resolve an archive name to its location under the base directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        sanitize_entry_name(name)
            .map(|relative| self.base.join(relative))
            .ok_or_else(|| ExtractError::UnsafePath(name.to_string()))
    }

    /// Create the directory an entry names, with any missing ancestors.
    pub async fn create_dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.resolve(name)?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| ExtractError::fs(&path, e))?;
        Ok(path)
    }

    /// Write `data` to `target` atomically.
    ///
    /// The bytes go to a temporary file next to `target` which is renamed
    /// over it only once fully written; on failure the temporary is removed.
    pub async fn write_file(&self, target: &Path, data: Vec<u8>) -> Result<()> {
        let parent = target.parent().unwrap_or(&self.base).to_path_buf();
        fs::create_dir_all(&parent)
            .await
            .map_err(|e| ExtractError::fs(&parent, e))?;

        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| ExtractError::fs(&parent, e))?;
            tmp.write_all(&data)
                .map_err(|e| ExtractError::fs(tmp.path(), e))?;
            tmp.persist(&target)
                .map_err(|e| ExtractError::fs(&target, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| ExtractError::fs(&self.base, std::io::Error::other(e)))?
    }

    /// Remove the file at `path` if there is one. Directories are left alone.
    ///
    /// Returns whether a file was removed.
    pub async fn remove_stale(&self, path: &Path) -> Result<bool> {
        match fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ExtractError::fs(path, e)),
        }
        fs::remove_file(path)
            .await
            .map_err(|e| ExtractError::fs(path, e))?;
        Ok(true)
    }
}

/// Where a file that failed verification is kept.
pub fn mismatch_path(target: &Path) -> PathBuf {
    let mut marked = target.as_os_str().to_owned();
    marked.push(MISMATCH_SUFFIX);
    PathBuf::from(marked)
}

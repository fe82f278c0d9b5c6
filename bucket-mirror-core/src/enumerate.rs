//! Directory walk producing a local [`KeyMapping`].

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::keys::{relative_key, KeyMapping};

/// Map every regular file below `root` from its absolute path to its key.
///
/// Identifiers are built from [`resolve_root`], so two spellings of the same
/// directory produce the same mapping. Symlinks are followed. Any walk error
/// (missing root, permission denied, dangling link, link cycle) aborts the
/// whole enumeration.
pub fn enumerate(root: &Path) -> Result<KeyMapping> {
    let root = resolve_root(root)?;
    info!(root = %root.display(), "Enumerating local tree");

    let mut files = KeyMapping::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            error!(path = %path.display(), error = %e, "Directory walk failed");
            SyncError::io(path, io::Error::from(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let key = relative_key(&root, entry.path())?;
        let identifier = entry
            .path()
            .to_str()
            .ok_or_else(|| {
                SyncError::io(
                    entry.path(),
                    io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
                )
            })?
            .to_string();
        debug!(file = %identifier, key = %key, "Discovered file");
        files.insert(identifier, key);
    }

    info!(root = %root.display(), files = files.len(), "Enumeration complete");
    Ok(files)
}

/// Absolute, lexically normalised form of `root`, which must be a directory.
///
/// `.` segments are dropped and `..` removes the preceding segment. Symlinks
/// inside the path are left alone.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(root).map_err(|e| SyncError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(SyncError::io(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "root is not a directory"),
        ));
    }
    let absolute = std::path::absolute(root).map_err(|e| SyncError::io(root, e))?;
    Ok(normalize_lexically(&absolute))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

//! Canonical store keys and the key mappings built from them.
//!
//! A store key is always relative and `/`-separated, whatever the host's
//! path separator. Everything that turns a filesystem path into a key goes
//! through this module.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Unique identifier → store key.
///
/// For local mappings the identifier is the absolute path of the file; for
/// remote mappings it is [`remote_identifier`] of the instance and key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMapping(BTreeMap<String, String>);

impl KeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, key: impl Into<String>) -> Option<String> {
        self.0.insert(identifier.into(), key.into())
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.0.get(identifier).map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.0.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(identifier, key)` pairs in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(id, key)| (id.as_str(), key.as_str()))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The store keys, i.e. the values of the mapping.
    pub fn store_keys(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for KeyMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for KeyMapping {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Key of `file` relative to `root`, joined with `/`.
///
/// Fails when `file` is not strictly below `root` or holds a non UTF-8
/// component.
pub fn relative_key(root: &Path, file: &Path) -> Result<String> {
    let invalid = |message: String| {
        SyncError::io(file, io::Error::new(io::ErrorKind::InvalidInput, message))
    };

    let rel = file
        .strip_prefix(root)
        .map_err(|_| invalid(format!("not below root {}", root.display())))?;

    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    SyncError::io(
                        file,
                        io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
                    )
                })?;
                segments.push(part);
            }
            Component::CurDir => {}
            other => return Err(invalid(format!("unexpected path component {other:?}"))),
        }
    }

    if segments.is_empty() {
        return Err(invalid("path names the root itself".to_string()));
    }
    Ok(segments.join("/"))
}

/// Canonical form of an already textual key.
///
/// Backslashes count as separators, empty and `.` segments are dropped, and
/// the result never starts with `/`. Applying it twice changes nothing.
pub fn canonicalize(key: &str) -> String {
    key.split(|c| c == '/' || c == '\\')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Identifier of a remote object within a remote key mapping.
pub fn remote_identifier(instance_id: &str, key: &str) -> String {
    let instance = instance_id.replace('\\', "/");
    let instance = instance.trim_end_matches('/');
    if instance.is_empty() {
        canonicalize(key)
    } else {
        format!("{}/{}", instance, canonicalize(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn relative_key_strips_root_and_uses_forward_slashes() {
        let root = PathBuf::from("/srv/site");
        let file = root.join("img").join("b.png");
        assert_eq!(relative_key(&root, &file).unwrap(), "img/b.png");
    }

    #[test]
    fn relative_key_rejects_paths_outside_root() {
        let err = relative_key(Path::new("/srv/site"), Path::new("/etc/passwd")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn relative_key_rejects_the_root_itself() {
        let root = Path::new("/srv/site");
        assert!(relative_key(root, root).is_err());
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for raw in ["img/b.png", "\\img\\b.png", "/a//b/./c.txt", "a.html"] {
            let once = canonicalize(raw);
            assert_eq!(canonicalize(&once), once, "input {raw:?}");
            assert!(!once.starts_with('/'));
            assert!(!once.is_empty());
        }
        assert_eq!(canonicalize("\\img\\b.png"), "img/b.png");
    }

    #[test]
    fn remote_identifier_joins_with_forward_slash() {
        assert_eq!(remote_identifier("./public/", "a.html"), "./public/a.html");
        assert_eq!(remote_identifier("C:\\site", "img/b.png"), "C:/site/img/b.png");
        assert_eq!(remote_identifier("", "a.html"), "a.html");
    }
}

//! Content-type resolution by file extension.
//!
//! The built-in table is a constant; a [`ContentTypes`] value is that table
//! with one or more override layers merged on top at construction and is
//! never mutated afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Extensions known without any override.
pub const DEFAULT_CONTENT_TYPES: [(&str, &str); 19] = [
    (".html", "text/html"),
    (".htm", "text/html"),
    (".css", "text/css"),
    (".scss", "text/less"),
    (".gif", "image/gif"),
    (".ico", "image/x-icon"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".js", "application/javascript"),
    (".json", "application/json"),
    (".mpeg", "video/mpeg"),
    (".png", "image/png"),
    (".svg", "image/svg+xml"),
    (".swf", "application/x-shockwave-flash"),
    (".ts", "application/typescript"),
    (".woff", "font/woff"),
    (".woff2", "font/woff2"),
    (".xhtml", "application/xhtml+xml"),
    (".xml", "application/xml"),
];

/// Merged extension → MIME table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypes {
    table: HashMap<String, String>,
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self {
            table: DEFAULT_CONTENT_TYPES
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
        }
    }
}

impl ContentTypes {
    /// Defaults with `overrides` applied on top.
    pub fn build(overrides: &BTreeMap<String, String>) -> Self {
        Self::layered([overrides])
    }

    /// Defaults with each layer applied in turn; a later layer wins.
    pub fn layered<'a, I>(layers: I) -> Self
    where
        I: IntoIterator<Item = &'a BTreeMap<String, String>>,
    {
        let mut types = Self::default();
        for layer in layers {
            for (ext, mime) in layer {
                types.table.insert(dotted(ext), mime.clone());
            }
        }
        types
    }

    /// MIME type registered for `extension`, if any.
    pub fn resolve(&self, extension: &str) -> Option<&str> {
        self.table
            .get(&dotted(extension))
            .map(String::as_str)
            .filter(|mime| !mime.is_empty())
    }

    /// MIME type for the extension of `path`'s file name.
    pub fn for_path(&self, path: &Path) -> Option<&str> {
        extension_of(path).and_then(|ext| self.resolve(ext))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Extension of the final path component including its leading dot.
///
/// Everything from the last `.` on, so `archive.tar.gz` yields `.gz` and a
/// dotfile such as `.env` yields `.env`.
pub fn extension_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let dot = name.rfind('.')?;
    Some(&name[dot..])
}

/// `extension` with exactly the leading dot the table is keyed by.
pub fn dotted(extension: &str) -> String {
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    }
}

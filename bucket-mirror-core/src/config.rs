use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::content_type::{dotted, ContentTypes};
use crate::error::{Result, SyncError};

pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

fn default_upload_concurrency() -> usize {
    DEFAULT_UPLOAD_CONCURRENCY
}

/// The declared fields of one mirrored resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFields {
    /// Local directory to mirror; also the resource identifier.
    pub path: PathBuf,
    pub bucket: String,
    /// Content-type overrides, extension → MIME type.
    #[serde(default)]
    pub types: BTreeMap<String, String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

impl DeclaredFields {
    pub fn new(path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bucket: bucket.into(),
            types: BTreeMap::new(),
            profile: None,
            region: None,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }

    /// Reject declarations no lifecycle step could act on.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(SyncError::config("path", "must not be empty"));
        }
        if self.bucket.trim().is_empty() {
            return Err(SyncError::config("bucket", "must not be empty"));
        }
        if self.upload_concurrency == 0 {
            return Err(SyncError::config("upload_concurrency", "must be at least 1"));
        }
        if let Some((ext, _)) = self.types.iter().find(|(ext, _)| ext.trim_start_matches('.').is_empty()) {
            return Err(SyncError::config("types", format!("invalid extension {ext:?}")));
        }
        Ok(())
    }

    /// Layer `overrides` above the declared `types`.
    ///
    /// Keys are normalised to their dotted form first, so an override for
    /// `.md` replaces a declared `md` entry and the other way round.
    pub fn override_types<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut types: BTreeMap<String, String> = std::mem::take(&mut self.types)
            .into_iter()
            .map(|(ext, mime)| (dotted(&ext), mime))
            .collect();
        for (ext, mime) in overrides {
            types.insert(dotted(&ext), mime);
        }
        self.types = types;
    }

    /// Content-type table for this declaration.
    pub fn content_types(&self) -> ContentTypes {
        ContentTypes::build(&self.types)
    }

    /// Identifier of the resource: its root path as given.
    pub fn instance_id(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Human-readable resource description used in error messages.
    pub fn describe(&self) -> String {
        format!("bucket {:?} from {}", self.bucket, self.path.display())
    }

    pub fn trace_loaded(&self) {
        info!(
            path = %self.path.display(),
            bucket = %self.bucket,
            overrides = self.types.len(),
            "Loaded declared fields"
        );
        debug!(?self, "Declared fields (full debug)");
    }
}

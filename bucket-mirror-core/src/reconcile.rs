//! Reconciliation: diffing key mappings and applying the delta to a bucket.
//!
//! A [`SyncInstance`] is one local root with its enumerated files and the
//! content-type table used to upload them. A [`Reconciler`] drives a
//! [`StoreClient`] through the transitions of that instance:
//!
//! - `create`: upload everything (Absent → Created)
//! - `read`: list the bucket, changing nothing
//! - `update`: delete what disappeared, then upload what appeared
//! - `delete`: remove every recorded key (→ Absent)
//!
//! # Error Handling
//! Every transition stops at the first failing step and returns that error.
//! Side effects already applied stay applied: uploaded objects are not
//! removed again and deleted objects are not restored.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::DEFAULT_UPLOAD_CONCURRENCY;
use crate::content_type::ContentTypes;
use crate::contract::ObjectStore;
use crate::enumerate::{enumerate, resolve_root};
use crate::error::{Result, SyncError};
use crate::keys::KeyMapping;
use crate::store::StoreClient;

/// Local root together with its enumerated files.
#[derive(Debug, Clone)]
pub struct SyncInstance {
    root: PathBuf,
    files: KeyMapping,
    content_types: ContentTypes,
}

impl SyncInstance {
    /// Enumerate `root` on a blocking thread and capture the result.
    ///
    /// The instance keeps the normalised root, so its [`id`](Self::id) does not
    /// depend on how `root` was spelled.
    pub async fn open(root: impl Into<PathBuf>, content_types: ContentTypes) -> Result<Self> {
        let given = root.into();
        let walk_root = given.clone();
        let (root, files) = tokio::task::spawn_blocking(move || {
            let root = resolve_root(&walk_root)?;
            let files = enumerate(&root)?;
            Ok::<_, SyncError>((root, files))
        })
        .await
        .map_err(|e| SyncError::io(&given, std::io::Error::other(e)))??;
        Ok(Self {
            root,
            files,
            content_types,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &KeyMapping {
        &self.files
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Identifier of the instance, as used for remote key mappings.
    pub fn id(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }
}

/// Added and removed entries between two key mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub added: KeyMapping,
    pub removed: KeyMapping,
    pub unchanged: usize,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare `previous` with `current` by identifier.
pub fn diff(previous: &KeyMapping, current: &KeyMapping) -> Diff {
    let mut result = Diff::default();
    for (identifier, key) in current.iter() {
        if previous.contains(identifier) {
            result.unchanged += 1;
        } else {
            result.added.insert(identifier, key);
        }
    }
    for (identifier, key) in previous.iter() {
        if !current.contains(identifier) {
            result.removed.insert(identifier, key);
        }
    }
    result
}

/// What a transition changed in the bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: usize,
}

pub struct Reconciler<S> {
    client: StoreClient<S>,
    bucket: String,
    upload_concurrency: usize,
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Self {
            client: StoreClient::new(store),
            bucket: bucket.into(),
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }

    /// Run at most `limit` uploads at a time (at least one).
    pub fn with_upload_concurrency(mut self, limit: usize) -> Self {
        self.upload_concurrency = limit.max(1);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn client(&self) -> &StoreClient<S> {
        &self.client
    }

    /// Upload every file of `instance`.
    pub async fn create(&self, instance: &SyncInstance) -> Result<SyncReport> {
        info!(
            bucket = %self.bucket,
            root = %instance.root().display(),
            files = instance.files().len(),
            "[RECONCILE] Creating mirror"
        );
        let uploaded = self
            .upload_all(instance.files(), instance.content_types())
            .await?;
        info!(bucket = %self.bucket, uploaded = uploaded.len(), "[RECONCILE] Mirror created");
        Ok(SyncReport {
            uploaded,
            ..SyncReport::default()
        })
    }

    /// Everything currently in the bucket, identified under `instance_id`.
    pub async fn read(&self, instance_id: &str) -> Result<KeyMapping> {
        self.client.list(&self.bucket, instance_id).await
    }

    /// Bring the bucket from `previous` to the files of `instance`.
    ///
    /// Removed keys are deleted before any addition is uploaded; if the
    /// delete fails nothing is uploaded.
    pub async fn update(&self, previous: &KeyMapping, instance: &SyncInstance) -> Result<SyncReport> {
        let delta = diff(previous, instance.files());
        info!(
            bucket = %self.bucket,
            root = %instance.root().display(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            unchanged = delta.unchanged,
            "[RECONCILE] Updating mirror"
        );
        if delta.is_empty() {
            debug!(bucket = %self.bucket, "Nothing to reconcile");
            return Ok(SyncReport {
                unchanged: delta.unchanged,
                ..SyncReport::default()
            });
        }

        let deleted: Vec<String> = delta.removed.store_keys().map(str::to_string).collect();
        // A failed delete returns before any addition is uploaded.
        self.client.batch_delete(&self.bucket, deleted.clone()).await?;

        let uploaded = self
            .upload_all(&delta.added, instance.content_types())
            .await?;

        Ok(SyncReport {
            uploaded,
            deleted,
            unchanged: delta.unchanged,
        })
    }

    /// Delete every key in `recorded`.
    pub async fn delete(&self, recorded: &KeyMapping) -> Result<()> {
        info!(bucket = %self.bucket, objects = recorded.len(), "[RECONCILE] Deleting mirror");
        self.client
            .batch_delete(&self.bucket, recorded.store_keys().map(str::to_string))
            .await
    }

    async fn upload_all(&self, files: &KeyMapping, content_types: &ContentTypes) -> Result<Vec<String>> {
        let uploads = files.iter().map(|(file, key)| async move {
            let path = Path::new(file);
            self.client
                .upload(&self.bucket, path, key, content_types.for_path(path))
                .await
                .map(|()| key.to_string())
        });

        let mut uploaded: Vec<String> = stream::iter(uploads)
            .buffer_unordered(self.upload_concurrency)
            .try_collect()
            .await?;
        uploaded.sort();
        Ok(uploaded)
    }
}

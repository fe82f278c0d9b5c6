//! Store client facade: the three verbs the reconciler needs.
//!
//! [`StoreClient`] turns raw [`ObjectStore`] calls into whole operations with
//! all-or-error results:
//! - `list` pages until the store runs out of continuation tokens and returns
//!   either the complete mapping or an error, never a partial one
//! - `upload` owns the local file handle for exactly the duration of the
//!   request
//! - `batch_delete` treats any per-key failure as failure of the batch

use std::path::Path;

use tracing::{debug, error, info};

use crate::contract::{ObjectStore, PutObject};
use crate::error::{Result, StoreOp, SyncError};
use crate::keys::{remote_identifier, KeyMapping};

/// Maximum number of keys in one delete request (S3 `DeleteObjects` limit).
pub const MAX_DELETE_BATCH: usize = 1000;

pub struct StoreClient<S> {
    store: S,
}

impl<S: ObjectStore> StoreClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every object in `bucket`, keyed by its identifier under `instance_id`.
    pub async fn list(&self, bucket: &str, instance_id: &str) -> Result<KeyMapping> {
        let mut files = KeyMapping::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_page(bucket, token.take())
                .await
                .map_err(|e| {
                    error!(bucket, page = pages, error = %e, "Listing page failed");
                    SyncError::store(StoreOp::List, bucket, format!("unable to list items: {e}"))
                })?;
            pages += 1;
            debug!(bucket, page = pages, keys = page.keys.len(), "Fetched listing page");

            for key in page.keys {
                files.insert(remote_identifier(instance_id, &key), key);
            }
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!(bucket, pages, objects = files.len(), "Listed bucket");
        Ok(files)
    }

    /// Upload `local_path` to `key`, tagging it with `content_type` when set.
    pub async fn upload(
        &self,
        bucket: &str,
        local_path: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<()> {
        let body = tokio::fs::File::open(local_path).await.map_err(|e| {
            error!(file = %local_path.display(), error = %e, "Failed to open file for upload");
            SyncError::io(local_path, e)
        })?;

        let request = PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.map(str::to_string),
        };
        self.store.put_object(request).await.map_err(|e| {
            error!(bucket, key, file = %local_path.display(), error = %e, "Upload failed");
            SyncError::store(
                StoreOp::Upload,
                bucket,
                format!("{} upload to {key:?} failed: {e}", local_path.display()),
            )
        })?;

        debug!(bucket, key, content_type = content_type.unwrap_or(""), "Uploaded object");
        Ok(())
    }

    /// Delete every key in `keys` as one logical batch.
    ///
    /// Nothing is sent for an empty batch. On failure no statement is made
    /// about which keys were removed.
    pub async fn batch_delete<I>(&self, bucket: &str, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let keys: Vec<String> = keys.into_iter().collect();
        if keys.is_empty() {
            debug!(bucket, "No keys to delete");
            return Ok(());
        }

        let total = keys.len();
        let mut failed = Vec::new();
        for chunk in keys.chunks(MAX_DELETE_BATCH) {
            let failures = self
                .store
                .delete_objects(bucket, chunk.to_vec())
                .await
                .map_err(|e| {
                    error!(bucket, error = %e, "Delete request failed");
                    SyncError::store(StoreOp::Delete, bucket, format!("batch failed: {e}"))
                })?;
            failed.extend(failures);
        }

        if !failed.is_empty() {
            for failure in &failed {
                error!(bucket, key = %failure.key, message = %failure.message, "Object not deleted");
            }
            return Err(SyncError::store(
                StoreOp::Delete,
                bucket,
                format!(
                    "batch failed: {} of {total} keys not deleted (first: {:?}: {})",
                    failed.len(),
                    failed[0].key,
                    failed[0].message
                ),
            ));
        }

        info!(bucket, deleted = total, "Deleted objects");
        Ok(())
    }
}

//! In-memory object store.
//!
//! Behaves like a small S3: buckets must exist before use, listings are
//! paginated with continuation tokens, and deleting an absent key succeeds.
//! Clones share the same contents, which is what lets a [`MemoryFactory`]
//! hand out "new" clients that all see one store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::contract::{ClientFactory, DeleteFailure, ListPage, ObjectStore, PutObject};
use crate::error::{BackendError, Result};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object as held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

#[derive(Debug, Clone)]
pub struct MemoryStore {
    buckets: Arc<Mutex<Buckets>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            buckets: Arc::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds an empty `bucket`.
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store.create_bucket(bucket);
        store
    }

    /// Return at most `page_size` keys per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.lock().entry(bucket.to_string()).or_default();
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock().get(bucket)?.get(key).cloned()
    }

    /// Keys in `bucket`, sorted; empty when the bucket does not exist.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Place an object directly, bypassing the upload path.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.lock().entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: None,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn no_such_bucket(bucket: &str) -> BackendError {
    format!("NoSuchBucket: the specified bucket {bucket:?} does not exist").into()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> std::result::Result<ListPage, BackendError> {
        let buckets = self.lock();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        // The token is the last key of the previous page.
        let mut keys: Vec<String> = match &continuation_token {
            Some(after) => objects
                .range::<String, _>((
                    std::ops::Bound::Excluded(after.clone()),
                    std::ops::Bound::Unbounded,
                ))
                .take(self.page_size + 1)
                .map(|(key, _)| key.clone())
                .collect(),
            None => objects
                .keys()
                .take(self.page_size + 1)
                .cloned()
                .collect(),
        };

        let next_continuation_token = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };
        Ok(ListPage {
            keys,
            next_continuation_token,
        })
    }

    async fn put_object(&self, request: PutObject) -> std::result::Result<(), BackendError> {
        if !self.lock().contains_key(&request.bucket) {
            return Err(no_such_bucket(&request.bucket));
        }

        let mut body = Vec::new();
        let mut file = request.body;
        file.read_to_end(&mut body).await?;

        self.lock()
            .entry(request.bucket)
            .or_default()
            .insert(
                request.key,
                StoredObject {
                    body,
                    content_type: request.content_type,
                },
            );
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> std::result::Result<Vec<DeleteFailure>, BackendError> {
        let mut buckets = self.lock();
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        for key in keys {
            objects.remove(&key);
        }
        Ok(Vec::new())
    }
}

/// Factory handing out clones of one [`MemoryStore`], whatever the profile.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    store: MemoryStore,
}

impl MemoryFactory {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    type Store = MemoryStore;

    async fn make_client(&self, _profile: Option<&str>, _region: Option<&str>) -> Result<MemoryStore> {
        Ok(self.store.clone())
    }
}

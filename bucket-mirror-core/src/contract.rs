//! # contract: the seams between the engine and the outside world
//!
//! Two traits are defined here:
//! - [`ObjectStore`]: the raw object-store SDK surface (one page of a listing,
//!   one object upload, one multi-key delete request). Backends implement it;
//!   the [`crate::store::StoreClient`] facade is the only caller.
//! - [`ClientFactory`]: turns optional profile/region overrides into an
//!   authenticated [`ObjectStore`].
//!
//! ## Mocking & Testing
//! - [`ObjectStore`] is annotated for `mockall`; the generated
//!   `MockObjectStore` is exported with the `test-export-mocks` feature so
//!   downstream crates and integration tests can script store behaviour.

use async_trait::async_trait;

use crate::error::{BackendError, Result};

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys of the objects on this page.
    pub keys: Vec<String>,
    /// Token to request the following page; `None` on the last page.
    pub next_continuation_token: Option<String>,
}

/// A single-object upload.
#[derive(Debug)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    /// Open handle on the local file; dropped by the backend when done.
    pub body: tokio::fs::File,
    /// `None` leaves the content type unset.
    pub content_type: Option<String>,
}

/// A key the store refused to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub message: String,
}

/// Raw object-store operations.
///
/// Implementations should not retry; the engine reports every failure to its
/// caller with enough context to decide whether to re-apply.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of keys, continuing from `continuation_token` if given.
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> std::result::Result<ListPage, BackendError>;

    /// Upload one object, replacing any object stored under the same key.
    async fn put_object(&self, request: PutObject) -> std::result::Result<(), BackendError>;

    /// Delete `keys` in one request.
    ///
    /// Returns the keys the store reported as failed; keys that did not exist
    /// are not failures.
    async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> std::result::Result<Vec<DeleteFailure>, BackendError>;
}

/// Produces authenticated store clients.
///
/// `profile` and `region` are optional overrides layered on whatever ambient
/// credential discovery the implementation performs.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Store: ObjectStore;

    async fn make_client(&self, profile: Option<&str>, region: Option<&str>) -> Result<Self::Store>;
}

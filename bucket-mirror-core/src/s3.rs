//! S3 backend built on the AWS SDK.
//!
//! [`AwsClientFactory`] plays the role of session construction: ambient
//! credential discovery via `aws-config`, with an optional shared-config
//! profile, region, and custom endpoint (path-style addressing, for MinIO and
//! other S3-compatible services) layered on top.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use tracing::info;

use crate::contract::{ClientFactory, DeleteFailure, ListPage, ObjectStore, PutObject};
use crate::error::{BackendError, Result};

#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> std::result::Result<ListPage, BackendError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| -> BackendError { DisplayErrorContext(&e).to_string().into() })?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        Ok(ListPage {
            keys,
            next_continuation_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn put_object(&self, request: PutObject) -> std::result::Result<(), BackendError> {
        let body = ByteStream::read_from().file(request.body).build().await?;
        self.client
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(body)
            .set_content_type(request.content_type)
            .send()
            .await
            .map_err(|e| -> BackendError { DisplayErrorContext(&e).to_string().into() })?;
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> std::result::Result<Vec<DeleteFailure>, BackendError> {
        let objects = keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| -> BackendError { DisplayErrorContext(&e).to_string().into() })?;

        Ok(output
            .errors()
            .iter()
            .map(|e| DeleteFailure {
                key: e.key().unwrap_or_default().to_string(),
                message: format!(
                    "{}: {}",
                    e.code().unwrap_or("Unknown"),
                    e.message().unwrap_or_default()
                ),
            })
            .collect())
    }
}

/// Builds [`S3Store`] clients from the ambient AWS configuration.
#[derive(Debug, Clone, Default)]
pub struct AwsClientFactory {
    endpoint: Option<String>,
}

impl AwsClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Talk to an S3-compatible service at `endpoint` using path-style URLs.
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl ClientFactory for AwsClientFactory {
    type Store = S3Store;

    async fn make_client(&self, profile: Option<&str>, region: Option<&str>) -> Result<S3Store> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if self.endpoint.is_some() {
            config = config.force_path_style(true);
        }
        info!(
            profile = profile.unwrap_or("default"),
            region = ?shared.region(),
            endpoint = self.endpoint.as_deref().unwrap_or("aws"),
            "Constructed S3 client"
        );
        Ok(S3Store::new(aws_sdk_s3::Client::from_conf(config.build())))
    }
}

//! Resource lifecycle: create / read / update / delete of one mirror.
//!
//! The declared fields and the recorded state come from an external state
//! layer through [`ResourceData`]; store clients come from a
//! [`ClientFactory`]. Each entrypoint validates the declaration, runs the
//! matching [`Reconciler`] transition, and records the outcome only when the
//! transition succeeded.
//!
//! # Error Handling
//! Failures are returned as [`OperationError`], naming the lifecycle step and
//! the resource (bucket and root) next to the underlying cause.

use tracing::{info, warn};

use crate::config::DeclaredFields;
use crate::contract::ClientFactory;
use crate::error::{Operation, OperationError, SyncError};
use crate::keys::KeyMapping;
use crate::reconcile::{diff, Diff, Reconciler, SyncInstance, SyncReport};

/// Access to declared fields and recorded state of one resource.
pub trait ResourceData {
    fn declared(&self) -> &DeclaredFields;

    /// Recorded identifier; `None` while the resource is absent.
    fn id(&self) -> Option<&str>;

    /// Local key mapping recorded by the last successful create or update.
    fn recorded_files(&self) -> Option<&KeyMapping>;

    fn set_files(&mut self, files: Option<KeyMapping>);

    fn set_id(&mut self, id: Option<String>);
}

/// Recorded keys that are gone from the bucket, and bucket keys nobody recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drift {
    pub missing: Vec<String>,
    pub untracked: Vec<String>,
}

impl Drift {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.untracked.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub remote: KeyMapping,
    pub drift: Drift,
}

fn fail(operation: Operation, declared: &DeclaredFields) -> impl Fn(SyncError) -> OperationError + '_ {
    move |source| OperationError::new(operation, declared.describe(), source)
}

async fn connect<F: ClientFactory>(
    factory: &F,
    declared: &DeclaredFields,
) -> Result<Reconciler<F::Store>, SyncError> {
    declared.validate()?;
    let store = factory
        .make_client(declared.profile.as_deref(), declared.region.as_deref())
        .await?;
    Ok(Reconciler::new(store, declared.bucket.clone()).with_upload_concurrency(declared.upload_concurrency))
}

/// Upload the whole tree and record it.
pub async fn create<F, D>(factory: &F, data: &mut D) -> Result<SyncReport, OperationError>
where
    F: ClientFactory,
    D: ResourceData,
{
    let declared = data.declared().clone();
    let on_err = fail(Operation::Create, &declared);

    let reconciler = connect(factory, &declared).await.map_err(&on_err)?;
    let instance = SyncInstance::open(&declared.path, declared.content_types())
        .await
        .map_err(&on_err)?;
    let report = reconciler.create(&instance).await.map_err(&on_err)?;

    data.set_files(Some(instance.files().clone()));
    data.set_id(Some(instance.id()));
    info!(resource = %declared.describe(), uploaded = report.uploaded.len(), "Resource created");
    Ok(report)
}

/// List the bucket and compare it with the recorded files.
///
/// Recorded state is left untouched; drift is reported, not repaired.
pub async fn read<F, D>(factory: &F, data: &D) -> Result<ReadOutcome, OperationError>
where
    F: ClientFactory,
    D: ResourceData,
{
    let declared = data.declared();
    let on_err = fail(Operation::Read, declared);

    let reconciler = connect(factory, declared).await.map_err(&on_err)?;
    let instance_id = data
        .id()
        .map(str::to_string)
        .unwrap_or_else(|| declared.instance_id());
    let remote = reconciler.read(&instance_id).await.map_err(&on_err)?;

    let drift = match data.recorded_files() {
        Some(recorded) => detect_drift(recorded, &remote),
        None => Drift {
            missing: Vec::new(),
            untracked: remote.store_keys().map(str::to_string).collect(),
        },
    };
    if !drift.is_empty() {
        warn!(
            resource = %declared.describe(),
            missing = drift.missing.len(),
            untracked = drift.untracked.len(),
            "Bucket has drifted from recorded state"
        );
    }
    Ok(ReadOutcome { remote, drift })
}

/// Apply the difference between the recorded files and the current tree.
pub async fn update<F, D>(factory: &F, data: &mut D) -> Result<SyncReport, OperationError>
where
    F: ClientFactory,
    D: ResourceData,
{
    let declared = data.declared().clone();
    let on_err = fail(Operation::Update, &declared);

    let reconciler = connect(factory, &declared).await.map_err(&on_err)?;
    let previous = data.recorded_files().cloned().unwrap_or_default();
    let instance = SyncInstance::open(&declared.path, declared.content_types())
        .await
        .map_err(&on_err)?;
    let report = reconciler
        .update(&previous, &instance)
        .await
        .map_err(&on_err)?;

    data.set_files(Some(instance.files().clone()));
    data.set_id(Some(instance.id()));
    info!(
        resource = %declared.describe(),
        uploaded = report.uploaded.len(),
        deleted = report.deleted.len(),
        unchanged = report.unchanged,
        "Resource updated"
    );
    Ok(report)
}

/// Remove every recorded key from the bucket and forget the resource.
pub async fn delete<F, D>(factory: &F, data: &mut D) -> Result<(), OperationError>
where
    F: ClientFactory,
    D: ResourceData,
{
    let declared = data.declared().clone();
    let on_err = fail(Operation::Delete, &declared);

    if let Some(recorded) = data.recorded_files().filter(|files| !files.is_empty()) {
        let reconciler = connect(factory, &declared).await.map_err(&on_err)?;
        reconciler.delete(recorded).await.map_err(&on_err)?;
    }

    data.set_files(None);
    data.set_id(None);
    info!(resource = %declared.describe(), "Resource deleted");
    Ok(())
}

/// `create` for an absent resource, `update` otherwise.
pub async fn apply<F, D>(factory: &F, data: &mut D) -> Result<SyncReport, OperationError>
where
    F: ClientFactory,
    D: ResourceData,
{
    if data.id().is_some() {
        update(factory, data).await
    } else {
        create(factory, data).await
    }
}

/// What `apply` would change, without contacting the store.
pub async fn plan<D: ResourceData>(data: &D) -> Result<Diff, OperationError> {
    let declared = data.declared();
    let on_err = fail(Operation::Plan, declared);

    declared.validate().map_err(&on_err)?;
    let instance = SyncInstance::open(&declared.path, declared.content_types())
        .await
        .map_err(&on_err)?;
    let previous = data.recorded_files().cloned().unwrap_or_default();
    Ok(diff(&previous, instance.files()))
}

/// Compare recorded store keys with a remote listing.
pub fn detect_drift(recorded: &KeyMapping, remote: &KeyMapping) -> Drift {
    let remote_keys: std::collections::BTreeSet<&str> = remote.store_keys().collect();
    let recorded_keys: std::collections::BTreeSet<&str> = recorded.store_keys().collect();
    Drift {
        missing: recorded_keys
            .difference(&remote_keys)
            .map(|key| key.to_string())
            .collect(),
        untracked: remote_keys
            .difference(&recorded_keys)
            .map(|key| key.to_string())
            .collect(),
    }
}

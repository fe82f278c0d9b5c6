//! JSON state file: the recorded half of a mirrored resource.
//!
//! [`FileResource`] pairs the declared fields from the YAML config with the
//! identifier and key mapping recorded by the last successful apply, and
//! implements the core's [`ResourceData`] over them. Changes are kept in
//! memory until [`FileResource::save`].

use anyhow::{Context, Result};
use bucket_mirror_core::config::DeclaredFields;
use bucket_mirror_core::resource::ResourceData;
use bucket_mirror_core::KeyMapping;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub files: Option<KeyMapping>,
}

#[derive(Debug)]
pub struct FileResource {
    declared: DeclaredFields,
    state_path: PathBuf,
    recorded: RecordedState,
}

impl FileResource {
    /// Load recorded state from `state_path`; a missing file means the resource is absent.
    pub fn load(state_path: impl Into<PathBuf>, declared: DeclaredFields) -> Result<Self> {
        let state_path = state_path.into();
        let recorded = if state_path.exists() {
            let raw = fs::read_to_string(&state_path)
                .with_context(|| format!("Failed to read state file {}", state_path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse state file {}", state_path.display()))?
        } else {
            debug!(state_path = %state_path.display(), "No state file, resource is absent");
            RecordedState::default()
        };

        if let Some(bucket) = &recorded.bucket {
            if *bucket != declared.bucket {
                anyhow::bail!(
                    "state file {} records bucket {:?} but the config declares {:?}; point the config back at it and destroy the old mirror first",
                    state_path.display(),
                    bucket,
                    declared.bucket
                );
            }
        }

        Ok(Self {
            declared,
            state_path,
            recorded,
        })
    }

    /// Write the recorded state, replacing the previous file in one rename.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.recorded)?;
        let tmp = self.state_path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write state file {}", tmp.display()))?;
        fs::rename(&tmp, &self.state_path)
            .with_context(|| format!("Failed to replace state file {}", self.state_path.display()))?;
        info!(
            state_path = %self.state_path.display(),
            files = self.recorded.files.as_ref().map_or(0, KeyMapping::len),
            "Saved state"
        );
        Ok(())
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn recorded(&self) -> &RecordedState {
        &self.recorded
    }
}

impl ResourceData for FileResource {
    fn declared(&self) -> &DeclaredFields {
        &self.declared
    }

    fn id(&self) -> Option<&str> {
        self.recorded.id.as_deref()
    }

    fn recorded_files(&self) -> Option<&KeyMapping> {
        self.recorded.files.as_ref()
    }

    fn set_files(&mut self, files: Option<KeyMapping>) {
        self.recorded.bucket = files.as_ref().map(|_| self.declared.bucket.clone());
        self.recorded.files = files;
    }

    fn set_id(&mut self, id: Option<String>) {
        self.recorded.id = id;
    }
}

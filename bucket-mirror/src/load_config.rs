/// `load_config` module: Loads a YAML mirror declaration into the core's [`DeclaredFields`].
///
/// This module is the only place where user-supplied YAML is parsed.
///
/// # Responsibilities
/// - Parse the config file into [`CliConfig`]
/// - Resolve relative `path` and `state_file` against the config file's directory
/// - Merge `--type` overrides given on the command line over the file's `types`
///
/// # Errors
/// All errors use `anyhow::Error` with the config path attached; they surface at the CLI boundary.
use anyhow::{Context, Result};
use bucket_mirror_core::config::DeclaredFields;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Name of the state file when the config does not name one.
pub const DEFAULT_STATE_FILE: &str = "bucket-mirror.state.json";

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub resource: DeclaredFields,
    /// Custom S3-compatible endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl CliConfig {
    /// Apply `overrides` on top of the file's content-type table.
    pub fn with_type_overrides(mut self, overrides: &[(String, String)]) -> Self {
        self.resource.override_types(overrides.iter().cloned());
        self
    }
}

/// Loads the YAML declaration at `path`, resolving relative paths against its directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let mut config: CliConfig = serde_yaml::from_str(&config_content)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            e
        })
        .with_context(|| format!("Failed to parse config YAML {:?}", path_ref))?;

    let base = path_ref.parent().unwrap_or_else(|| Path::new("."));
    config.resource.path = resolve(base, &config.resource.path);
    let state_file = config
        .state_file
        .take()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
    config.state_file = Some(resolve(base, &state_file));

    config.resource.trace_loaded();
    Ok(config)
}

/// Parse one `--type` argument of the form `EXT=MIME`.
pub fn parse_type_override(raw: &str) -> Result<(String, String), String> {
    let (ext, mime) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected EXT=MIME, got {raw:?}"))?;
    let (ext, mime) = (ext.trim(), mime.trim());
    if ext.trim_start_matches('.').is_empty() || mime.is_empty() {
        return Err(format!("expected EXT=MIME, got {raw:?}"));
    }
    Ok((ext.to_string(), mime.to_string()))
}

/// Content-type overrides keyed by extension, for display.
pub fn describe_types(types: &BTreeMap<String, String>) -> String {
    types
        .iter()
        .map(|(ext, mime)| format!("{ext}={mime}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Default connector profile file, looked up in the working directory when
/// `--creds` is not given.
pub const DEFAULT_CREDS_FILE: &str = "connectors.yaml";

/// Fatal pre-dispatch configuration problems.
///
/// Rendered messages carry the guidance the operator needs to fix the run;
/// no job is ever submitted once one of these is hit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Connector profile file not found: {}", .path.display())]
    ProfileFileMissing { path: PathBuf },

    #[error("Connector profile '{name}' not defined in {}", .path.display())]
    ProfileMissing { name: String, path: PathBuf },

    #[error("File not present - {}", .path.display())]
    SensorListMissing { path: PathBuf },

    #[error(
        "No recognized column header in \"{}\". Place one of the following headers in the list:\n\
         1)  id            - if the list contains sensor IDs\n\
         2)  computer_name - if the list contains hostnames\n\
         3)  ip            - if the list contains IP addresses\n\
         Note: if multiple remote endpoints share a hostname, prefer the sensor ID list.",
        .path.display()
    )]
    SensorListHeader { path: PathBuf },
}

/// One connector profile: where the live-response server lives and how to
/// authenticate against it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectorConfig {
    pub url: String,
    pub token: String,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
}

fn default_ssl_verify() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileFile {
    profiles: HashMap<String, ConnectorConfig>,
}

/// Load one named profile from the connector profile YAML file.
pub fn load_profile(creds_path: Option<&Path>, name: &str) -> Result<ConnectorConfig> {
    let path = creds_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDS_FILE));

    if !path.is_file() {
        return Err(ConfigError::ProfileFileMissing { path }.into());
    }

    let content = fs::read_to_string(&path)
        .context(format!("Failed to read connector profile file: {}", path.display()))?;

    let file: ProfileFile = serde_yaml::from_str(&content)
        .context("Failed to parse connector profile YAML")?;

    debug!("Loaded {} connector profile(s) from {}", file.profiles.len(), path.display());

    file.profiles
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::ProfileMissing { name: name.to_string(), path }.into())
}

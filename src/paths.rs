use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Structured key for one endpoint's output artifact.
///
/// Both the pre-dispatch existence check and the post-collection write build
/// their paths through this type, so the filename format lives in exactly one
/// place.
#[derive(Debug, Clone)]
pub struct ArtifactLocation {
    pub root: PathBuf,
    pub subdir: &'static str,
    pub sensor_id: u64,
    pub hostname: String,
    pub nic_suffix: String,
    pub ext: &'static str,
}

impl ArtifactLocation {
    fn file_name(&self) -> String {
        format!(
            "{}_{}_{}{}.{}",
            self.subdir, self.sensor_id, self.hostname, self.nic_suffix, self.ext
        )
    }

    /// Path the artifact is written to.
    pub fn primary(&self) -> PathBuf {
        self.root.join(self.subdir).join(self.file_name())
    }

    /// Legacy location from earlier collection runs. Checked for
    /// pre-existence only, never written.
    pub fn legacy(&self) -> PathBuf {
        self.root.join(format!("{}2", self.subdir)).join(self.file_name())
    }

    /// True when a previous run already produced this artifact at either the
    /// primary or the legacy location.
    pub fn already_collected(&self) -> bool {
        self.primary().exists() || self.legacy().exists()
    }
}

/// Output root for a connection profile: the profile name, uppercased,
/// relative to the working directory.
pub fn output_root(profile: &str) -> PathBuf {
    PathBuf::from(profile.to_uppercase())
}

/// Create the output root and the operation's subdirectory if absent.
pub fn ensure_output_dirs(root: &Path, subdir: &str) -> Result<()> {
    fs::create_dir_all(root.join(subdir))
        .context(format!("Failed to create output directory {}", root.join(subdir).display()))?;
    Ok(())
}

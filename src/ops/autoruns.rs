use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};

use crate::models::Sensor;
use crate::ops::{PrerequisiteError, TriageProcedure};
use crate::paths::ArtifactLocation;
use crate::transport::LrSession;

/// Sysinternals console autoruns, shipped by the operator next to the tool.
pub const BINARY: &str = "autorunsc.exe";

/// Where the uploaded tool leaves its output on the endpoint.
pub const REMOTE_OUTPUT: &str = "autoruns.csv";

pub const COMMAND: &str =
    r#"cmd /c "autorunsc.exe -accepteula -nobanner -a * -c -h -s -t * > autoruns.csv""#;

/// Local directory holding operator-supplied tool binaries.
pub const DEPENDENCIES_DIR: &str = "Dependencies";

const WAIT_TIMEOUT: Duration = Duration::from_secs(900);

/// Verify the local autorunsc binary exists before any endpoint work begins.
pub fn check_local_binary() -> Result<(), PrerequisiteError> {
    let path = Path::new(DEPENDENCIES_DIR).join(BINARY);
    if path.is_file() {
        Ok(())
    } else {
        Err(PrerequisiteError(path.display().to_string()))
    }
}

/// Per-endpoint autoruns collection: upload the tool, run it with its output
/// redirected to a remote file, download and transcode that file, then delete
/// the uploaded tool whether or not the run succeeded.
pub struct AutorunsCollector {
    sensor_id: u64,
    hostname: String,
    location: ArtifactLocation,
    binary_path: PathBuf,
}

impl AutorunsCollector {
    pub fn new(sensor: &Sensor, location: ArtifactLocation) -> Self {
        Self {
            sensor_id: sensor.id,
            hostname: sensor.hostname.clone(),
            location,
            binary_path: Path::new(DEPENDENCIES_DIR).join(BINARY),
        }
    }

    /// Override the local tool location. Used by tests.
    pub fn with_binary_path(mut self, path: PathBuf) -> Self {
        self.binary_path = path;
        self
    }

    async fn collect(&self, session: &mut dyn LrSession) -> Result<()> {
        let binary = tokio::fs::read(&self.binary_path)
            .await
            .context(format!("Failed to read {}", self.binary_path.display()))?;

        info!(
            "Uploading binaries at host {} ({})",
            self.hostname, self.sensor_id
        );
        if let Err(err) = session.put_file(binary, BINARY).await {
            // A failed upload surfaces at the exec step.
            debug!("Upload failed for host {}: {}", self.hostname, err);
        }

        info!(
            "Executing command <{}> at host {} ({})",
            COMMAND, self.hostname, self.sensor_id
        );
        session.create_process(COMMAND, WAIT_TIMEOUT, true).await?;

        let raw = session.get_file(REMOTE_OUTPUT).await?;
        fs::write(self.location.primary(), decode_utf16le(&raw)).context(format!(
            "Failed to write autoruns artifact for sensor {}",
            self.sensor_id
        ))?;

        Ok(())
    }

    /// Remove the uploaded tool from the endpoint. Runs on every exit path;
    /// its own transport errors do not change the job outcome.
    async fn cleanup(&self, session: &mut dyn LrSession) {
        info!("Deleting binaries from host {}.", self.hostname);
        if let Err(err) = session.delete_file(BINARY).await {
            debug!("Cleanup failed on host {}: {}", self.hostname, err);
        }
    }
}

/// The remote redirection produces UTF-16LE; artifacts are stored as UTF-8.
fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    widestring::U16String::from_vec(units).to_string_lossy()
}

#[async_trait]
impl TriageProcedure for AutorunsCollector {
    async fn execute(&self, session: &mut dyn LrSession) -> Result<()> {
        let outcome = self.collect(session).await;
        self.cleanup(session).await;
        session.close().await;

        match outcome {
            Ok(()) => info!(
                "Retrieved autoruns from sensor {} ({})",
                self.hostname, self.sensor_id
            ),
            Err(err) => warn!(
                "Autoruns collection failed for host {} ({}), no output: {}",
                self.hostname, self.sensor_id, err
            ),
        }

        Ok(())
    }
}

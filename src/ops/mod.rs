//! The triage operation catalog.
//!
//! Each [`OperationKind`] carries the static metadata for one remote
//! procedure (output subdirectory, extension, remote command) and builds a
//! fresh per-endpoint [`TriageProcedure`] instance for every dispatched
//! sensor. Adding an operation means adding a variant here and a module next
//! to the existing ones; the dispatcher stays untouched.

pub mod autoruns;
pub mod wevtutil;

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::models::Sensor;
use crate::paths::ArtifactLocation;
use crate::transport::LrSession;

/// A required local dependency is missing. Fatal for the whole run; checked
/// once, before any job is submitted.
#[derive(Debug, Error)]
#[error("Required dependency missing: {0}")]
pub struct PrerequisiteError(pub String);

/// One operation's remote procedure, instantiated per endpoint.
#[async_trait::async_trait]
pub trait TriageProcedure: Send {
    /// Run the remote steps for one endpoint. Transport failures are handled
    /// inside and logged; an `Err` here means a local failure (for example a
    /// write to the output tree) and is logged by the job runner.
    async fn execute(&self, session: &mut dyn LrSession) -> Result<()>;
}

/// The supported triage operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Wevtutil,
    Autoruns,
}

impl OperationKind {
    /// Output subdirectory under the run root.
    pub fn subdir(&self) -> &'static str {
        match self {
            OperationKind::Wevtutil => "Wevtutil",
            OperationKind::Autoruns => "Autoruns",
        }
    }

    /// Output file extension.
    pub fn ext(&self) -> &'static str {
        match self {
            OperationKind::Wevtutil => "xml",
            OperationKind::Autoruns => "csv",
        }
    }

    /// Process-wide prerequisite check, run once before any dispatch.
    pub fn init_check(&self) -> Result<(), PrerequisiteError> {
        match self {
            OperationKind::Wevtutil => Ok(()),
            OperationKind::Autoruns => autoruns::check_local_binary(),
        }
    }

    /// Where this operation's artifact for `sensor` lives under `root`.
    pub fn artifact_location(&self, root: &Path, sensor: &Sensor, nic_suffix: &str) -> ArtifactLocation {
        ArtifactLocation {
            root: root.to_path_buf(),
            subdir: self.subdir(),
            sensor_id: sensor.id,
            hostname: sensor.hostname.clone(),
            nic_suffix: nic_suffix.to_string(),
            ext: self.ext(),
        }
    }

    /// Fresh per-endpoint procedure instance writing to `location`.
    pub fn procedure(&self, sensor: &Sensor, location: ArtifactLocation) -> Box<dyn TriageProcedure> {
        match self {
            OperationKind::Wevtutil => Box::new(wevtutil::EventLogCollector::new(sensor, location)),
            OperationKind::Autoruns => Box::new(autoruns::AutorunsCollector::new(sensor, location)),
        }
    }
}

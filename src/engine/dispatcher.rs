use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::models::Sensor;
use crate::ops::{OperationKind, TriageProcedure};
use crate::transport::EndpointDirectory;

/// Filters each resolved target, submits one remote job per eligible
/// endpoint, and keeps the in-flight handles for the collection barrier.
///
/// Submission is sequential; only execution is concurrent. Jobs share no
/// state, so one endpoint's failure never blocks another.
pub struct Dispatcher {
    directory: Arc<dyn EndpointDirectory>,
    operation: OperationKind,
    output_root: PathBuf,
    nics: bool,
    jobs: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn EndpointDirectory>,
        operation: OperationKind,
        output_root: PathBuf,
        nics: bool,
    ) -> Self {
        Self {
            directory,
            operation,
            output_root,
            nics,
            jobs: Vec::new(),
        }
    }

    /// Apply eligibility filtering to one resolved target and submit the
    /// remote job when it passes. Local checks run before anything touches
    /// the transport.
    pub fn dispatch(&mut self, sensor: Option<Sensor>, identifier: &str) {
        let Some(sensor) = sensor else {
            info!("Sensor not found {}", identifier);
            return;
        };

        let nic_suffix = if self.nics { sensor.nic_suffix() } else { String::new() };
        let location = self
            .operation
            .artifact_location(&self.output_root, &sensor, &nic_suffix);

        if location.already_collected() {
            debug!(
                "Artifact already present for host {} ({}), skipping",
                sensor.hostname, sensor.id
            );
            return;
        }

        if !sensor.os.contains("Windows") {
            info!("OS not supported for host {} ({})", sensor.hostname, sensor.id);
            return;
        }

        if !sensor.is_online() {
            info!("Sensor is offline for host {} ({})", sensor.hostname, sensor.id);
            return;
        }

        let procedure = self.operation.procedure(&sensor, location);
        if let Some(job) = submit(Arc::clone(&self.directory), procedure, sensor) {
            self.jobs.push(job);
        }
    }

    /// Jobs submitted so far.
    pub fn submitted(&self) -> usize {
        self.jobs.len()
    }

    /// Collection barrier: block until every submitted job has reached a
    /// terminal state, success or handled failure.
    pub async fn wait_all(self) {
        let count = self.jobs.len();
        futures::future::join_all(self.jobs).await;
        info!("All {} submitted job(s) accounted for", count);
    }
}

/// Submit one job against the endpoint's session. Returns the handle only
/// when the enqueue succeeded; a dropped submission is not retried.
///
/// Everything that can fail once the job is running, session open included,
/// is handled inside the task so that the failure stays on that endpoint.
fn submit(
    directory: Arc<dyn EndpointDirectory>,
    procedure: Box<dyn TriageProcedure>,
    sensor: Sensor,
) -> Option<JoinHandle<()>> {
    let handle = tokio::spawn(async move {
        match directory.open_session(sensor.id).await {
            Ok(mut session) => {
                if let Err(err) = procedure.execute(session.as_mut()).await {
                    warn!("Job failed for host {} ({}): {}", sensor.hostname, sensor.id, err);
                }
            }
            Err(err) => {
                warn!(
                    "Could not open session for host {} ({}): {}",
                    sensor.hostname, sensor.id, err
                );
            }
        }
    });

    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths;
    use crate::test_utils::{sensor, FakeDirectory};
    use tempfile::TempDir;

    fn dispatcher(root: &std::path::Path, sensors: Vec<Sensor>) -> Dispatcher {
        paths::ensure_output_dirs(root, OperationKind::Wevtutil.subdir()).unwrap();
        Dispatcher::new(
            Arc::new(FakeDirectory::new(sensors)),
            OperationKind::Wevtutil,
            root.to_path_buf(),
            false,
        )
    }

    #[tokio::test]
    async fn test_not_found_target_creates_no_job() {
        let tmp = TempDir::new().unwrap();
        let mut dispatcher = dispatcher(tmp.path(), vec![]);

        dispatcher.dispatch(None, "ghost");
        assert_eq!(dispatcher.submitted(), 0);
    }

    #[tokio::test]
    async fn test_eligibility_filtering_order() {
        let tmp = TempDir::new().unwrap();
        let fleet = vec![
            sensor(1, "a", "Windows 10 Pro", "Online"),
            sensor(2, "b", "Windows 10 Pro", "Offline"),
            sensor(3, "c", "Ubuntu 22.04", "Online"),
        ];
        let mut dispatcher = dispatcher(tmp.path(), fleet.clone());

        for s in fleet {
            let identifier = s.id.to_string();
            dispatcher.dispatch(Some(s), &identifier);
        }

        // Only the online Windows sensor produces a job.
        assert_eq!(dispatcher.submitted(), 1);
        dispatcher.wait_all().await;
    }

    #[tokio::test]
    async fn test_existing_artifact_skips_submission() {
        let tmp = TempDir::new().unwrap();
        let s = sensor(1, "a", "Windows 10 Pro", "Online");
        let mut dispatcher = dispatcher(tmp.path(), vec![s.clone()]);

        let location = OperationKind::Wevtutil.artifact_location(tmp.path(), &s, "");
        std::fs::write(location.primary(), b"previous run").unwrap();

        dispatcher.dispatch(Some(s), "1");
        assert_eq!(dispatcher.submitted(), 0);
    }

    #[tokio::test]
    async fn test_job_writes_artifact_and_barrier_waits() {
        let tmp = TempDir::new().unwrap();
        let s = sensor(1, "a", "Windows 10 Pro", "Online");
        let mut dispatcher = dispatcher(tmp.path(), vec![s.clone()]);

        dispatcher.dispatch(Some(s.clone()), "1");
        assert_eq!(dispatcher.submitted(), 1);
        dispatcher.wait_all().await;

        let location = OperationKind::Wevtutil.artifact_location(tmp.path(), &s, "");
        assert!(location.primary().exists());
    }

    #[tokio::test]
    async fn test_nic_suffix_keys_the_artifact_path() {
        let tmp = TempDir::new().unwrap();
        let mut s = sensor(1, "a", "Windows 10 Pro", "Online");
        s.network_interfaces = vec![crate::models::NetworkInterface {
            ip_addr: "10.0.0.5".to_string(),
            mac_addr: "00:11:22:33:44:55".to_string(),
        }];

        paths::ensure_output_dirs(tmp.path(), OperationKind::Wevtutil.subdir()).unwrap();
        let mut dispatcher = Dispatcher::new(
            Arc::new(FakeDirectory::new(vec![s.clone()])),
            OperationKind::Wevtutil,
            tmp.path().to_path_buf(),
            true,
        );

        dispatcher.dispatch(Some(s), "1");
        dispatcher.wait_all().await;

        assert!(tmp
            .path()
            .join("Wevtutil")
            .join("Wevtutil_1_a_10.0.0.5_001122334455.xml")
            .exists());
    }
}

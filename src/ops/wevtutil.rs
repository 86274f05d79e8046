use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};

use crate::models::Sensor;
use crate::ops::TriageProcedure;
use crate::paths::ArtifactLocation;
use crate::transport::LrSession;

/// Exports service-install events (System log, Event ID 7045) as XML.
pub const COMMAND: &str = r#"cmd /c wevtutil qe System "/q:*[System [(EventID=7045)]]" /f:xml"#;

const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-endpoint event-log collection: run `wevtutil`, capture its output,
/// store it verbatim. No remote files are left behind.
pub struct EventLogCollector {
    sensor_id: u64,
    hostname: String,
    os: String,
    location: ArtifactLocation,
}

impl EventLogCollector {
    pub fn new(sensor: &Sensor, location: ArtifactLocation) -> Self {
        Self {
            sensor_id: sensor.id,
            hostname: sensor.hostname.clone(),
            os: sensor.os.clone(),
            location,
        }
    }

    /// Store the command output, when there is any, and log the endpoint as
    /// processed either way.
    fn write_result(&self, output: Option<&[u8]>) -> Result<()> {
        if let Some(output) = output {
            fs::write(self.location.primary(), output).context(format!(
                "Failed to write event log artifact for sensor {}",
                self.sensor_id
            ))?;
        }

        info!(
            "Retrieved wevtutil events for sensor {} ({})",
            self.hostname, self.sensor_id
        );
        Ok(())
    }
}

#[async_trait]
impl TriageProcedure for EventLogCollector {
    async fn execute(&self, session: &mut dyn LrSession) -> Result<()> {
        // TODO: confirm whether this legacy exclusion was meant as a
        // conjunction; as written the disjunction never skips a host.
        if !self.os.contains("XP") || !self.os.contains("2000") || !self.os.contains("2003") {
            info!(
                "Executing command <{}> for host {} ({})",
                COMMAND, self.hostname, self.sensor_id
            );

            match session.create_process(COMMAND, WAIT_TIMEOUT, true).await {
                Ok(output) => {
                    session.close().await;
                    self.write_result(Some(&output))?;
                }
                Err(err) => {
                    warn!(
                        "Command failed for host {} ({}): {}",
                        self.hostname, self.sensor_id, err
                    );
                    session.close().await;
                    self.write_result(None)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockLrSession, TransportError};
    use tempfile::TempDir;

    fn sensor(os: &str) -> Sensor {
        Sensor {
            id: 42,
            hostname: "WKS-01".to_string(),
            os: os.to_string(),
            status: "Online".to_string(),
            network_interfaces: vec![],
        }
    }

    fn collector(root: &std::path::Path, os: &str) -> EventLogCollector {
        let sensor = sensor(os);
        let location = crate::ops::OperationKind::Wevtutil.artifact_location(root, &sensor, "");
        std::fs::create_dir_all(location.primary().parent().unwrap()).unwrap();
        EventLogCollector::new(&sensor, location)
    }

    #[tokio::test]
    async fn test_output_written_verbatim() {
        let tmp = TempDir::new().unwrap();
        let collector = collector(tmp.path(), "Windows 10 Pro");

        let mut session = MockLrSession::new();
        session
            .expect_create_process()
            .times(1)
            .returning(|_, _, _| Ok(b"<Events/>".to_vec()));
        session.expect_close().times(1).returning(|| ());

        collector.execute(&mut session).await.unwrap();

        let written = std::fs::read(
            tmp.path().join("Wevtutil").join("Wevtutil_42_WKS-01.xml"),
        )
        .unwrap();
        assert_eq!(written, b"<Events/>");
    }

    #[tokio::test]
    async fn test_transport_error_closes_session_and_completes() {
        let tmp = TempDir::new().unwrap();
        let collector = collector(tmp.path(), "Windows 10 Pro");

        let mut session = MockLrSession::new();
        session
            .expect_create_process()
            .times(1)
            .returning(|_, _, _| Err(TransportError::Command("sensor went away".to_string())));
        session.expect_close().times(1).returning(|| ());

        // The job still completes; no artifact is produced.
        collector.execute(&mut session).await.unwrap();
        assert!(!tmp
            .path()
            .join("Wevtutil")
            .join("Wevtutil_42_WKS-01.xml")
            .exists());
    }

    #[tokio::test]
    async fn test_legacy_os_guard_still_runs_on_xp() {
        // The disjunctive guard is true for every real OS string, so an XP
        // host is not actually excluded. Pins current behavior until the
        // original intent is confirmed.
        let tmp = TempDir::new().unwrap();
        let collector = collector(tmp.path(), "Windows XP Professional");

        let mut session = MockLrSession::new();
        session
            .expect_create_process()
            .times(1)
            .returning(|_, _, _| Ok(b"<Events/>".to_vec()));
        session.expect_close().times(1).returning(|| ());

        collector.execute(&mut session).await.unwrap();
    }

    #[tokio::test]
    async fn test_command_uses_bounded_wait() {
        let tmp = TempDir::new().unwrap();
        let collector = collector(tmp.path(), "Windows 10 Pro");

        let mut session = MockLrSession::new();
        session
            .expect_create_process()
            .withf(|command, wait_timeout, wait_for_completion| {
                command.contains("wevtutil")
                    && *wait_timeout == Duration::from_secs(300)
                    && *wait_for_completion
            })
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        session.expect_close().times(1).returning(|| ());

        collector.execute(&mut session).await.unwrap();
    }
}

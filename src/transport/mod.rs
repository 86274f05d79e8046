//! The seam between the dispatch engine and the live-response server.
//!
//! The engine only ever talks to the server through the [`EndpointDirectory`]
//! and [`LrSession`] traits; the REST connector in [`rest`] is the production
//! implementation and tests substitute fakes or mocks.

pub mod rest;

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use crate::models::Sensor;

/// A remote command or file-transfer failure on one endpoint's session.
///
/// Procedures catch this per job; it never propagates past the job boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("remote command failed: {0}")]
    Command(String),

    #[error("file transfer failed: {0}")]
    FileTransfer(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// The endpoint directory service: resolves identifiers to sensors and opens
/// live-response sessions against them.
#[async_trait::async_trait]
pub trait EndpointDirectory: Send + Sync {
    async fn sensor_by_id(&self, id: u64) -> Result<Option<Sensor>>;

    async fn sensor_by_hostname(&self, hostname: &str) -> Result<Option<Sensor>>;

    async fn sensor_by_ip(&self, ip: &str) -> Result<Option<Sensor>>;

    /// Every sensor known to the server, in directory order.
    async fn list_sensors(&self) -> Result<Vec<Sensor>>;

    async fn open_session(&self, sensor_id: u64) -> Result<Box<dyn LrSession>, TransportError>;
}

/// One endpoint's live-response session: remote process execution and file
/// transfer. The concurrent session count is bounded by the server, not by
/// this tool.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LrSession: Send {
    /// Run a command on the endpoint, waiting at most `wait_timeout` for it
    /// to complete. Returns the command's captured output when
    /// `wait_for_completion` is set.
    async fn create_process(
        &mut self,
        command: &str,
        wait_timeout: Duration,
        wait_for_completion: bool,
    ) -> Result<Vec<u8>, TransportError>;

    async fn put_file(&mut self, data: Vec<u8>, remote_name: &str) -> Result<(), TransportError>;

    async fn get_file(&mut self, remote_name: &str) -> Result<Vec<u8>, TransportError>;

    async fn delete_file(&mut self, remote_name: &str) -> Result<(), TransportError>;

    /// Release the session on the server. Safe to call on a failed session.
    async fn close(&mut self);
}

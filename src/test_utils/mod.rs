//! Test fixtures shared by unit tests: canned sensors and an in-memory
//! endpoint directory whose sessions accept everything.

#![cfg(test)]

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Sensor;
use crate::transport::{EndpointDirectory, LrSession, TransportError};

/// Build a sensor with the given identity and state.
pub fn sensor(id: u64, hostname: &str, os: &str, status: &str) -> Sensor {
    Sensor {
        id,
        hostname: hostname.to_string(),
        os: os.to_string(),
        status: status.to_string(),
        network_interfaces: vec![],
    }
}

/// Directory over a fixed sensor set. Sessions opened against it accept
/// every call and return empty output.
pub struct FakeDirectory {
    sensors: Vec<Sensor>,
}

impl FakeDirectory {
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self { sensors }
    }
}

#[async_trait]
impl EndpointDirectory for FakeDirectory {
    async fn sensor_by_id(&self, id: u64) -> Result<Option<Sensor>> {
        Ok(self.sensors.iter().find(|s| s.id == id).cloned())
    }

    async fn sensor_by_hostname(&self, hostname: &str) -> Result<Option<Sensor>> {
        Ok(self.sensors.iter().find(|s| s.hostname == hostname).cloned())
    }

    async fn sensor_by_ip(&self, ip: &str) -> Result<Option<Sensor>> {
        Ok(self
            .sensors
            .iter()
            .find(|s| s.network_interfaces.iter().any(|nic| nic.ip_addr == ip))
            .cloned())
    }

    async fn list_sensors(&self) -> Result<Vec<Sensor>> {
        Ok(self.sensors.clone())
    }

    async fn open_session(&self, _sensor_id: u64) -> Result<Box<dyn LrSession>, TransportError> {
        Ok(Box::new(NullSession))
    }
}

/// Session that accepts every call and produces empty output.
pub struct NullSession;

#[async_trait]
impl LrSession for NullSession {
    async fn create_process(
        &mut self,
        _command: &str,
        _wait_timeout: std::time::Duration,
        _wait_for_completion: bool,
    ) -> Result<Vec<u8>, TransportError> {
        Ok(Vec::new())
    }

    async fn put_file(&mut self, _data: Vec<u8>, _remote_name: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn get_file(&mut self, _remote_name: &str) -> Result<Vec<u8>, TransportError> {
        Ok(Vec::new())
    }

    async fn delete_file(&mut self, _remote_name: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&mut self) {}
}

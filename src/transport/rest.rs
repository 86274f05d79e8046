use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, Instant};

use crate::config::ConnectorConfig;
use crate::models::{NetworkInterface, Sensor};
use crate::transport::{EndpointDirectory, LrSession, TransportError};

const SESSION_OPEN_TIMEOUT: Duration = Duration::from_secs(120);
const SESSION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(5);
const FILE_OP_TIMEOUT: Duration = Duration::from_secs(120);

/// Sensor as the server serializes it. Network adapters arrive as
/// `"ip,mac|ip,mac|"`.
#[derive(Debug, Deserialize)]
struct SensorRecord {
    id: u64,
    computer_name: String,
    os_environment_display_string: String,
    status: String,
    #[serde(default)]
    network_adapters: String,
}

impl SensorRecord {
    fn into_sensor(self) -> Sensor {
        let network_interfaces = self
            .network_adapters
            .split('|')
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let (ip, mac) = entry.split_once(',')?;
                Some(NetworkInterface {
                    ip_addr: ip.trim().to_string(),
                    mac_addr: mac.trim().to_string(),
                })
            })
            .collect();

        Sensor {
            id: self.id,
            hostname: self.computer_name,
            os: self.os_environment_display_string,
            status: self.status,
            network_interfaces,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionRecord {
    id: u64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct CommandRecord {
    id: u64,
    status: String,
    #[serde(default)]
    result_desc: Option<String>,
    #[serde(default)]
    file_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileUploadRecord {
    id: u64,
}

/// REST connector for the live-response server. Implements both the sensor
/// directory and per-endpoint sessions over the server's HTTP API; the
/// endpoint-side transport stays on the server.
pub struct RestDirectory {
    client: Client,
    base_url: String,
}

impl RestDirectory {
    pub fn connect(config: &ConnectorConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut token = reqwest::header::HeaderValue::from_str(&config.token)
            .context("API token contains invalid header characters")?;
        token.set_sensitive(true);
        headers.insert("X-Auth-Token", token);

        if !config.ssl_verify {
            warn!("Server certificate verification is disabled for this profile");
        }

        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn query_sensors(&self, query: &[(&str, &str)]) -> Result<Vec<Sensor>> {
        let records: Vec<SensorRecord> = self
            .client
            .get(self.url("/api/v1/sensor"))
            .query(query)
            .send()
            .await
            .context("Sensor query failed")?
            .error_for_status()
            .context("Sensor query rejected by server")?
            .json()
            .await
            .context("Failed to decode sensor list")?;

        Ok(records.into_iter().map(SensorRecord::into_sensor).collect())
    }
}

#[async_trait]
impl EndpointDirectory for RestDirectory {
    async fn sensor_by_id(&self, id: u64) -> Result<Option<Sensor>> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/sensor/{}", id)))
            .send()
            .await
            .context("Sensor lookup failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let record: SensorRecord = response
            .error_for_status()
            .context("Sensor lookup rejected by server")?
            .json()
            .await
            .context("Failed to decode sensor")?;

        Ok(Some(record.into_sensor()))
    }

    async fn sensor_by_hostname(&self, hostname: &str) -> Result<Option<Sensor>> {
        let sensors = self.query_sensors(&[("hostname", hostname)]).await?;
        Ok(sensors.into_iter().next())
    }

    async fn sensor_by_ip(&self, ip: &str) -> Result<Option<Sensor>> {
        let sensors = self.query_sensors(&[("ip", ip)]).await?;
        Ok(sensors.into_iter().next())
    }

    async fn list_sensors(&self) -> Result<Vec<Sensor>> {
        self.query_sensors(&[]).await
    }

    async fn open_session(&self, sensor_id: u64) -> Result<Box<dyn LrSession>, TransportError> {
        let record: SessionRecord = self
            .client
            .post(self.url("/api/v1/cblr/session"))
            .json(&json!({ "sensor_id": sensor_id }))
            .send()
            .await
            .map_err(|e| TransportError::Session(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Session(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::Session(e.to_string()))?;

        debug!("Session {} pending for sensor {}", record.id, sensor_id);

        // The server attaches the session once the sensor checks in.
        let deadline = Instant::now() + SESSION_OPEN_TIMEOUT;
        loop {
            let record: SessionRecord = self
                .client
                .get(self.url(&format!("/api/v1/cblr/session/{}", record.id)))
                .send()
                .await
                .map_err(|e| TransportError::Session(e.to_string()))?
                .error_for_status()
                .map_err(|e| TransportError::Session(e.to_string()))?
                .json()
                .await
                .map_err(|e| TransportError::Session(e.to_string()))?;

            match record.status.as_str() {
                "active" => {
                    debug!("Session {} active for sensor {}", record.id, sensor_id);
                    return Ok(Box::new(RestSession {
                        client: self.client.clone(),
                        base_url: self.base_url.clone(),
                        session_id: record.id,
                        tmp_seq: 0,
                    }));
                }
                "close" | "timeout" => {
                    return Err(TransportError::Session(format!(
                        "session {} ended before activation ({})",
                        record.id, record.status
                    )));
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(TransportError::Timeout(SESSION_OPEN_TIMEOUT));
            }
            sleep(SESSION_POLL_INTERVAL).await;
        }
    }
}

/// One live session against one sensor, addressed by server-side session id.
pub struct RestSession {
    client: Client,
    base_url: String,
    session_id: u64,
    tmp_seq: u32,
}

impl RestSession {
    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/cblr/session/{}{}", self.base_url, self.session_id, path)
    }

    async fn post_command(&self, body: serde_json::Value) -> Result<CommandRecord, TransportError> {
        self.client
            .post(self.url("/command"))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Command(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Command(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::Command(e.to_string()))
    }

    /// Poll a command until it reaches a terminal state, bounded by
    /// `wait_timeout`.
    async fn wait_command(
        &self,
        command_id: u64,
        wait_timeout: Duration,
    ) -> Result<CommandRecord, TransportError> {
        let deadline = Instant::now() + wait_timeout;
        loop {
            let record: CommandRecord = self
                .client
                .get(self.url(&format!("/command/{}", command_id)))
                .send()
                .await
                .map_err(|e| TransportError::Command(e.to_string()))?
                .error_for_status()
                .map_err(|e| TransportError::Command(e.to_string()))?
                .json()
                .await
                .map_err(|e| TransportError::Command(e.to_string()))?;

            match record.status.as_str() {
                "complete" => return Ok(record),
                "error" | "canceled" => {
                    return Err(TransportError::Command(
                        record
                            .result_desc
                            .unwrap_or_else(|| format!("command {} failed", command_id)),
                    ));
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(TransportError::Timeout(wait_timeout));
            }
            sleep(COMMAND_POLL_INTERVAL).await;
        }
    }

    async fn download_file(&self, file_id: u64) -> Result<Vec<u8>, TransportError> {
        let bytes = self
            .client
            .get(self.url(&format!("/file/{}/content", file_id)))
            .send()
            .await
            .map_err(|e| TransportError::FileTransfer(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::FileTransfer(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| TransportError::FileTransfer(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl LrSession for RestSession {
    async fn create_process(
        &mut self,
        command: &str,
        wait_timeout: Duration,
        wait_for_completion: bool,
    ) -> Result<Vec<u8>, TransportError> {
        self.tmp_seq += 1;
        let output_file = format!("lr_out_{}_{}.tmp", self.session_id, self.tmp_seq);

        let record = self
            .post_command(json!({
                "session_id": self.session_id,
                "name": "create process",
                "object": command,
                "wait": wait_for_completion,
                "output_file": output_file,
            }))
            .await?;

        if !wait_for_completion {
            return Ok(Vec::new());
        }

        self.wait_command(record.id, wait_timeout).await?;

        let output = self.get_file(&output_file).await?;
        if let Err(err) = self.delete_file(&output_file).await {
            debug!("Failed to remove command output {}: {}", output_file, err);
        }
        Ok(output)
    }

    async fn put_file(&mut self, data: Vec<u8>, remote_name: &str) -> Result<(), TransportError> {
        let part = reqwest::multipart::Part::bytes(data).file_name(remote_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let upload: FileUploadRecord = self
            .client
            .post(self.url("/file"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::FileTransfer(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::FileTransfer(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::FileTransfer(e.to_string()))?;

        let record = self
            .post_command(json!({
                "session_id": self.session_id,
                "name": "put file",
                "object": remote_name,
                "file_id": upload.id,
            }))
            .await?;

        self.wait_command(record.id, FILE_OP_TIMEOUT).await?;
        Ok(())
    }

    async fn get_file(&mut self, remote_name: &str) -> Result<Vec<u8>, TransportError> {
        let record = self
            .post_command(json!({
                "session_id": self.session_id,
                "name": "get file",
                "object": remote_name,
            }))
            .await?;

        let done = self.wait_command(record.id, FILE_OP_TIMEOUT).await?;
        let file_id = done.file_id.ok_or_else(|| {
            TransportError::FileTransfer(format!("no file id returned for {}", remote_name))
        })?;

        self.download_file(file_id).await
    }

    async fn delete_file(&mut self, remote_name: &str) -> Result<(), TransportError> {
        let record = self
            .post_command(json!({
                "session_id": self.session_id,
                "name": "delete file",
                "object": remote_name,
            }))
            .await?;

        self.wait_command(record.id, FILE_OP_TIMEOUT).await?;
        Ok(())
    }

    async fn close(&mut self) {
        // Best-effort; the server reaps sessions that miss keepalives anyway.
        let result = self
            .client
            .put(self.url(""))
            .json(&json!({ "id": self.session_id, "status": "close" }))
            .send()
            .await;

        if let Err(err) = result {
            debug!("Failed to close session {}: {}", self.session_id, err);
        }
    }
}

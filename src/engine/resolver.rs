use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::config::ConfigError;
use crate::models::Sensor;
use crate::transport::EndpointDirectory;

/// How the operator named the run's targets. Exactly one is active per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    ById(u64),
    ByHostname(String),
    ByIp(String),
    AllSensors,
    BulkList(PathBuf),
}

/// The bulk-list key column. Fixed once per list from the header row; every
/// row resolves through the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKey {
    Id,
    ComputerName,
    Ip,
}

impl ListKey {
    fn column(&self) -> &'static str {
        match self {
            ListKey::Id => "id",
            ListKey::ComputerName => "computer_name",
            ListKey::Ip => "ip",
        }
    }
}

/// Pick the key column from a header row, in priority order
/// `id > computer_name > ip`.
fn detect_key(header: &str) -> Option<(ListKey, usize)> {
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    for key in [ListKey::Id, ListKey::ComputerName, ListKey::Ip] {
        if let Some(index) = columns.iter().position(|column| *column == key.column()) {
            return Some((key, index));
        }
    }
    None
}

async fn resolve_key(
    directory: &dyn EndpointDirectory,
    key: ListKey,
    value: &str,
) -> Result<Option<Sensor>> {
    match key {
        ListKey::Id => match value.parse::<u64>() {
            Ok(id) => directory.sensor_by_id(id).await,
            // A non-numeric value under an id header is an unresolvable row,
            // not a fatal list.
            Err(_) => Ok(None),
        },
        ListKey::ComputerName => directory.sensor_by_hostname(value).await,
        ListKey::Ip => directory.sensor_by_ip(value).await,
    }
}

/// Resolve a selector into `(sensor-or-none, original identifier)` pairs.
///
/// Unresolvable identifiers pass through as `None` so the dispatcher can log
/// them and move on; only bulk-list configuration problems are fatal here.
pub async fn resolve_targets(
    directory: &dyn EndpointDirectory,
    selector: &Selector,
) -> Result<Vec<(Option<Sensor>, String)>> {
    match selector {
        Selector::ById(id) => Ok(vec![(directory.sensor_by_id(*id).await?, id.to_string())]),
        Selector::ByHostname(hostname) => Ok(vec![(
            directory.sensor_by_hostname(hostname).await?,
            hostname.clone(),
        )]),
        Selector::ByIp(ip) => Ok(vec![(directory.sensor_by_ip(ip).await?, ip.clone())]),
        Selector::AllSensors => Ok(directory
            .list_sensors()
            .await?
            .into_iter()
            .map(|sensor| {
                let identifier = sensor.id.to_string();
                (Some(sensor), identifier)
            })
            .collect()),
        Selector::BulkList(path) => resolve_bulk_list(directory, path).await,
    }
}

async fn resolve_bulk_list(
    directory: &dyn EndpointDirectory,
    path: &Path,
) -> Result<Vec<(Option<Sensor>, String)>> {
    if !path.is_file() {
        return Err(ConfigError::SensorListMissing { path: path.to_path_buf() }.into());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .context(format!("Failed to read sensor list {}", path.display()))?;

    let mut lines = content.lines();
    let header = lines.next().unwrap_or("");
    let (key, index) = detect_key(header)
        .ok_or(ConfigError::SensorListHeader { path: path.to_path_buf() })?;

    debug!(
        "Resolving sensor list {} through the {} column",
        path.display(),
        key.column()
    );

    let mut targets = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }

        let value = line.split(',').nth(index).map(str::trim).unwrap_or("");
        if value.is_empty() {
            continue;
        }

        let sensor = resolve_key(directory, key, value).await?;
        targets.push((sensor, value.to_string()));
    }

    Ok(targets)
}

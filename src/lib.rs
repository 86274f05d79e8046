//! # lr-triage
//!
//! A fleet live-response triage dispatcher. Given a set of target endpoints
//! (by sensor ID, hostname, IP, all hosts, or a bulk CSV list), it submits
//! one remote triage job per eligible endpoint against the live-response
//! server, runs each job's remote procedure under per-endpoint error
//! isolation, and collects the per-endpoint output files into a local
//! archive tree.
//!
//! ## Overview
//!
//! The engine resolves targets through an endpoint directory, filters them
//! for eligibility (Windows, online, not already collected), and runs one
//! concurrent job per endpoint. One endpoint's transport failure never
//! blocks the rest of the fleet; the run only ends once every submitted job
//! has been accounted for.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use lr_triage::engine::{resolve_targets, Dispatcher, Selector};
//! use lr_triage::ops::OperationKind;
//! use lr_triage::transport::rest::RestDirectory;
//! use lr_triage::transport::EndpointDirectory;
//! use lr_triage::{config, paths};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let profile = config::load_profile(None, "default")?;
//! let directory: Arc<dyn EndpointDirectory> = Arc::new(RestDirectory::connect(&profile)?);
//!
//! let operation = OperationKind::Wevtutil;
//! operation.init_check()?;
//!
//! let root = paths::output_root("default");
//! paths::ensure_output_dirs(&root, operation.subdir())?;
//!
//! let targets = resolve_targets(directory.as_ref(), &Selector::AllSensors).await?;
//! let mut dispatcher = Dispatcher::new(directory, operation, root, false);
//! for (sensor, identifier) in targets {
//!     dispatcher.dispatch(sensor, &identifier);
//! }
//! dispatcher.wait_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`models`]: Sensor data models sourced from the endpoint directory
//! - [`engine`]: Target resolution, job dispatch, and the collection barrier
//! - [`ops`]: The triage operation catalog and per-endpoint procedures
//! - [`transport`]: The endpoint directory / session seam and its REST connector
//! - [`config`]: Connector profile loading
//! - [`paths`]: Artifact path construction

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Sensor data models sourced from the endpoint directory
pub mod models;

/// Target resolution, job dispatch, and the collection barrier
pub mod engine;

/// The triage operation catalog and per-endpoint procedures
pub mod ops;

/// The endpoint directory / session seam and its REST connector
pub mod transport;

/// Connector profile loading
pub mod config;

/// Artifact path construction
pub mod paths;

#[cfg(test)]
mod test_utils;

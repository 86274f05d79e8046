use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::Selector;
use crate::ops::OperationKind;

/// Command-line arguments for the fleet triage dispatcher.
///
/// One flag per target selector, connection options, and one subcommand per
/// triage operation. When several selector flags are given, the most
/// specific wins: sensor ID, then hostname, then IP, then all hosts, then
/// the sensor list file.
#[derive(Parser, Debug)]
#[clap(name = "lr-triage", about = "Fleet live-response triage dispatcher")]
pub struct Args {
    /// Connection profile to use
    #[clap(short, long, default_value = "default")]
    pub profile: String,

    /// Path to the connector profile file (default: connectors.yaml)
    #[clap(short = 'c', long)]
    pub creds: Option<PathBuf>,

    /// Sensor ID of a remote endpoint
    #[clap(short = 'i', long)]
    pub sensor_id: Option<u64>,

    /// Hostname of a remote endpoint
    #[clap(short = 't', long)]
    pub hostname: Option<String>,

    /// IP address of a remote endpoint
    #[clap(short = 'd', long)]
    pub ip_address: Option<String>,

    /// Run against every sensor known to the server
    #[clap(short = 'a', long)]
    pub all_hosts: bool,

    /// CSV file containing the sensor list
    #[clap(short = 'l', long, default_value = "hosts.csv")]
    pub sensor_list: PathBuf,

    /// Store NIC information (IPs and MACs) in the output file names.
    /// Don't use this switch if the fleet uses DHCP.
    #[clap(short, long)]
    pub nics: bool,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub operation: OperationCommand,
}

/// The triage operations available for the remote endpoints.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationCommand {
    /// Execute wevtutil for Event ID 7045 and retrieve the output as XML
    Wevtutil,
    /// Retrieve autoruns data using the Sysinternals tool
    Autoruns,
}

impl OperationCommand {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationCommand::Wevtutil => OperationKind::Wevtutil,
            OperationCommand::Autoruns => OperationKind::Autoruns,
        }
    }
}

impl Args {
    /// The active selector for this invocation.
    pub fn selector(&self) -> Selector {
        if let Some(id) = self.sensor_id {
            Selector::ById(id)
        } else if let Some(hostname) = &self.hostname {
            Selector::ByHostname(hostname.clone())
        } else if let Some(ip) = &self.ip_address {
            Selector::ByIp(ip.clone())
        } else if self.all_hosts {
            Selector::AllSensors
        } else {
            Selector::BulkList(self.sensor_list.clone())
        }
    }
}

use serde::{Serialize, Deserialize};

/// A managed remote endpoint as reported by the endpoint directory.
///
/// Sensors are read-only to this tool; every field comes from the
/// live-response server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Sensor {
    pub id: u64,
    pub hostname: String,
    pub os: String,
    pub status: String,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkInterface {
    pub ip_addr: String,
    pub mac_addr: String,
}

impl Sensor {
    pub fn is_online(&self) -> bool {
        self.status == "Online"
    }

    /// Filename fragment encoding the sensor's NICs, used to disambiguate
    /// hosts that share a hostname. One `_<ip>_<mac>` segment per interface,
    /// in directory order, with the colons stripped from the MAC.
    pub fn nic_suffix(&self) -> String {
        let mut suffix = String::new();
        for nic in &self.network_interfaces {
            suffix = format!("{}_{}_{}", suffix, nic.ip_addr, nic.mac_addr.replace(':', ""));
        }
        suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_with_nics(nics: Vec<NetworkInterface>) -> Sensor {
        Sensor {
            id: 42,
            hostname: "WKS-01".to_string(),
            os: "Windows 10 Pro".to_string(),
            status: "Online".to_string(),
            network_interfaces: nics,
        }
    }

    #[test]
    fn test_nic_suffix_single_interface() {
        let sensor = sensor_with_nics(vec![NetworkInterface {
            ip_addr: "10.0.0.5".to_string(),
            mac_addr: "00:11:22:33:44:55".to_string(),
        }]);

        assert_eq!(sensor.nic_suffix(), "_10.0.0.5_001122334455");
    }

    #[test]
    fn test_nic_suffix_preserves_interface_order() {
        let sensor = sensor_with_nics(vec![
            NetworkInterface {
                ip_addr: "10.0.0.5".to_string(),
                mac_addr: "00:11:22:33:44:55".to_string(),
            },
            NetworkInterface {
                ip_addr: "192.168.1.9".to_string(),
                mac_addr: "aa:bb:cc:dd:ee:ff".to_string(),
            },
        ]);

        assert_eq!(
            sensor.nic_suffix(),
            "_10.0.0.5_001122334455_192.168.1.9_aabbccddeeff"
        );
    }

    #[test]
    fn test_nic_suffix_empty_without_interfaces() {
        let sensor = sensor_with_nics(vec![]);
        assert_eq!(sensor.nic_suffix(), "");
    }

    #[test]
    fn test_is_online() {
        let mut sensor = sensor_with_nics(vec![]);
        assert!(sensor.is_online());

        sensor.status = "Offline".to_string();
        assert!(!sensor.is_online());
    }

    #[test]
    fn test_sensor_deserializes_without_interfaces() {
        let json = r#"{"id": 7, "hostname": "SRV-DC", "os": "Windows Server 2019", "status": "Online"}"#;
        let sensor: Sensor = serde_json::from_str(json).unwrap();

        assert_eq!(sensor.id, 7);
        assert!(sensor.network_interfaces.is_empty());
    }
}

//! LLDP neighbor table.
//!
//! The data model does not carry full neighbor detail on every release, so
//! this scrapes `display lldp neighbor-information verbose`.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::device::Device;
use crate::error::{DeviceError, Result};

const COMMAND: &str = "display lldp neighbor-information verbose";

static PORT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*LLDP neighbor-information of port \d+\[(?P<port>[^\]]+)\]:?\s*$")
        .expect("valid regex")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<key>[A-Za-z][A-Za-z /-]*?)\s*:\s*(?P<value>.*?)\s*$").expect("valid regex")
});

/// One LLDP neighbor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LldpNeighbor {
    pub local_port: String,
    pub chassis_id: Option<String>,
    pub remote_port: Option<String>,
    pub port_description: Option<String>,
    pub system_name: Option<String>,
    pub system_description: Option<String>,
    pub management_address: Option<String>,
}

impl LldpNeighbor {
    fn set(&mut self, key: &str, value: &str) {
        let value = Some(value.to_string()).filter(|v| !v.is_empty());
        match key {
            "Chassis ID" => self.chassis_id = value,
            "Port ID" => self.remote_port = value,
            "Port description" => self.port_description = value,
            "System name" => self.system_name = value,
            "System description" => self.system_description = value,
            "Management address" => self.management_address = value,
            _ => {}
        }
    }
}

/// Parse verbose LLDP output into neighbors, in output order.
pub fn parse_lldp_verbose(output: &str) -> Vec<LldpNeighbor> {
    let mut neighbors = Vec::new();
    let mut port: Option<String> = None;
    let mut current: Option<LldpNeighbor> = None;

    for line in output.lines() {
        if let Some(caps) = PORT_HEADER.captures(line) {
            neighbors.extend(current.take());
            port = Some(caps["port"].to_string());
            continue;
        }
        let Some(local_port) = &port else {
            continue;
        };
        let Some(caps) = FIELD.captures(line) else {
            continue;
        };
        let key = &caps["key"];
        if key == "LLDP neighbor index" {
            neighbors.extend(current.take());
            current = Some(LldpNeighbor {
                local_port: local_port.clone(),
                ..Default::default()
            });
            continue;
        }
        if let Some(neighbor) = current.as_mut() {
            neighbor.set(key, &caps["value"]);
        }
    }
    neighbors.extend(current);
    neighbors
}

/// Read the LLDP neighbor table.
pub async fn get_neighbors(device: &mut Device) -> Result<Vec<LldpNeighbor>> {
    let response = device.cli_display(&[COMMAND.to_string()]).await?;
    if let Some(message) = response.failure_message {
        return Err(DeviceError::CommandFailed {
            command: response.command,
            message,
        }
        .into());
    }
    let neighbors = parse_lldp_verbose(&response.result);
    debug!("found {} LLDP neighbors", neighbors.len());
    Ok(neighbors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::fake_device;

    const OUTPUT: &str = "\
LLDP neighbor-information of port 1[GigabitEthernet1/0/1]:
LLDP agent nearest-bridge:
 LLDP neighbor index : 1
 Update time         : 0 days, 0 hours, 1 minutes, 1 seconds
 Chassis type        : MAC address
 Chassis ID          : 70f9-6d04-1234
 Port ID type        : Interface name
 Port ID             : GigabitEthernet1/0/2
 Time to live        : 121
 Port description    : GigabitEthernet1/0/2 Interface
 System name         : core-sw
 System description  : HPE Comware Platform Software
 Management address type           : IPv4
 Management address                : 10.1.1.1

LLDP neighbor-information of port 2[GigabitEthernet1/0/2]:
LLDP agent nearest-bridge:
 LLDP neighbor index : 1
 Chassis ID          : 70f9-6d04-5678
 Port ID             : Ten-GigabitEthernet1/0/49
 Port description    :
 System name         : edge-sw
";

    #[test]
    fn test_parse_lldp_verbose() {
        let neighbors = parse_lldp_verbose(OUTPUT);
        assert_eq!(neighbors.len(), 2);

        let first = &neighbors[0];
        assert_eq!(first.local_port, "GigabitEthernet1/0/1");
        assert_eq!(first.chassis_id.as_deref(), Some("70f9-6d04-1234"));
        assert_eq!(first.remote_port.as_deref(), Some("GigabitEthernet1/0/2"));
        assert_eq!(first.system_name.as_deref(), Some("core-sw"));
        assert_eq!(first.management_address.as_deref(), Some("10.1.1.1"));

        let second = &neighbors[1];
        assert_eq!(second.local_port, "GigabitEthernet1/0/2");
        assert_eq!(second.port_description, None);
        assert_eq!(second.management_address, None);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_lldp_verbose("").is_empty());
        assert!(parse_lldp_verbose(" System name : stray").is_empty());
    }

    #[tokio::test]
    async fn test_get_neighbors() {
        let (mut device, _server) = fake_device(|op| {
            assert_eq!(op.text_at("Execution"), Some(COMMAND));
            format!("<CLI><Execution>&lt;HPE&gt;{COMMAND}\n{OUTPUT}</Execution></CLI>")
        })
        .await;
        let neighbors = get_neighbors(&mut device).await.unwrap();
        assert_eq!(neighbors.len(), 2);
    }
}

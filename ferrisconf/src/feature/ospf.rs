//! OSPF process, areas and networks.
//!
//! Read through the data model, configured through the CLI.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::{Feature, check_range, parse_ipv4};
use crate::device::StagedOp;
use crate::error::{ParamError, Result};
use crate::xml::Element;

/// A network statement: address and wildcard mask.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OspfNetwork {
    pub address: String,
    pub wildcard: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfArea {
    /// Dotted area id; a plain number is accepted and converted.
    pub id: String,
    #[serde(default)]
    pub networks: Vec<OspfNetwork>,
}

/// OSPF process attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    /// Full area list. Areas and networks not listed are removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub areas: Option<Vec<OspfArea>>,
}

/// An OSPF process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ospf {
    process: u16,
}

impl Ospf {
    pub fn new(process: u16) -> Result<Self> {
        check_range("process", process.into(), 1, 65535)?;
        Ok(Self { process })
    }

    pub fn process(&self) -> u16 {
        self.process
    }

    fn keyed(&self, name: &str) -> Element {
        Element::new(name).with_child(Element::leaf("Name", self.process))
    }

    fn owns(&self, el: &Element) -> bool {
        el.text_at("Name") == Some(self.process.to_string().as_str())
    }
}

/// Dotted form of an area id given as dotted quad or plain number.
pub fn normalize_area_id(id: &str) -> std::result::Result<String, ParamError> {
    let id = id.trim();
    if let Ok(n) = id.parse::<u32>() {
        return Ok(Ipv4Addr::from(n).to_string());
    }
    parse_ipv4("areas.id", id).map(|a| a.to_string())
}

fn area_key(id: &str) -> u32 {
    id.parse::<Ipv4Addr>().map(u32::from).unwrap_or(u32::MAX)
}

impl Feature for Ospf {
    type Config = OspfConfig;

    fn filter(&self) -> Vec<Element> {
        vec![
            Element::new("OSPF")
                .with_child(Element::new("Instances").with_child(self.keyed("Instance")))
                .with_child(Element::new("Areas").with_child(self.keyed("Area")))
                .with_child(Element::new("Networks").with_child(self.keyed("Network"))),
        ]
    }

    fn decode(&self, top: &Element) -> Result<Option<OspfConfig>> {
        let Some(instance) = top
            .find_all("OSPF/Instances/Instance")
            .into_iter()
            .find(|i| self.owns(i))
        else {
            return Ok(None);
        };

        let mut areas: Vec<OspfArea> = top
            .find_all("OSPF/Areas/Area")
            .into_iter()
            .filter(|a| self.owns(a))
            .filter_map(|a| a.text_at("AreaId"))
            .filter_map(|id| normalize_area_id(id).ok())
            .map(|id| OspfArea {
                id,
                networks: Vec::new(),
            })
            .collect();

        for network in top
            .find_all("OSPF/Networks/Network")
            .into_iter()
            .filter(|n| self.owns(n))
        {
            let (Some(area), Some(address), Some(wildcard)) = (
                network.text_at("AreaId").and_then(|a| normalize_area_id(a).ok()),
                network.text_at("IpAddress"),
                network.text_at("Wildcard"),
            ) else {
                continue;
            };
            let entry = OspfNetwork {
                address: address.to_string(),
                wildcard: wildcard.to_string(),
            };
            match areas.iter_mut().find(|a| a.id == area) {
                Some(existing) => existing.networks.push(entry),
                None => areas.push(OspfArea {
                    id: area,
                    networks: vec![entry],
                }),
            }
        }

        Ok(Some(self.normalize(OspfConfig {
            router_id: instance.text_at("RouterId").map(str::to_string),
            areas: Some(areas),
        })))
    }

    fn normalize(&self, mut config: OspfConfig) -> OspfConfig {
        if let Some(areas) = config.areas.as_mut() {
            for area in areas.iter_mut() {
                if let Ok(id) = normalize_area_id(&area.id) {
                    area.id = id;
                }
                area.networks.sort();
                area.networks.dedup();
            }
            areas.sort_by_key(|a| area_key(&a.id));
        }
        config
    }

    fn validate(&self, config: &OspfConfig) -> Result<()> {
        if let Some(router_id) = &config.router_id {
            parse_ipv4("router_id", router_id)?;
        }
        for area in config.areas.iter().flatten() {
            normalize_area_id(&area.id)?;
            for network in &area.networks {
                parse_ipv4("networks.address", &network.address)?;
                parse_ipv4("networks.wildcard", &network.wildcard)?;
            }
        }
        Ok(())
    }

    fn build_ops(&self, config: &OspfConfig, existing: Option<&OspfConfig>) -> Result<Vec<StagedOp>> {
        let mut cmds = vec![match &config.router_id {
            Some(router_id) => format!("ospf {} router-id {}", self.process, router_id),
            None => format!("ospf {}", self.process),
        }];

        if let Some(desired) = &config.areas {
            let current = existing
                .and_then(|e| e.areas.as_deref())
                .unwrap_or_default();

            for area in current.iter().filter(|c| !desired.iter().any(|d| d.id == c.id)) {
                cmds.push(format!("undo area {}", area.id));
            }

            for area in desired {
                let id = normalize_area_id(&area.id)?;
                let before: &[OspfNetwork] = current
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.networks.as_slice())
                    .unwrap_or_default();

                let removed = before.iter().filter(|n| !area.networks.contains(*n));
                let added = area.networks.iter().filter(|n| !before.contains(*n));
                let mut body: Vec<String> = removed
                    .map(|n| format!("undo network {} {}", n.address, n.wildcard))
                    .collect();
                body.extend(added.map(|n| format!("network {} {}", n.address, n.wildcard)));

                let is_new = !current.iter().any(|c| c.id == id);
                if is_new || !body.is_empty() {
                    cmds.push(format!("area {id}"));
                    cmds.extend(body);
                    cmds.push("quit".to_string());
                }
            }
        }

        Ok(vec![StagedOp::CliConfig(cmds)])
    }

    fn remove_ops(&self, existing: Option<&OspfConfig>) -> Result<Vec<StagedOp>> {
        if existing.is_none() {
            return Ok(Vec::new());
        }
        Ok(vec![StagedOp::CliConfig(vec![format!("undo ospf {}", self.process)])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(address: &str, wildcard: &str) -> OspfNetwork {
        OspfNetwork {
            address: address.into(),
            wildcard: wildcard.into(),
        }
    }

    #[test]
    fn test_normalize_area_id() {
        assert_eq!(normalize_area_id("0").unwrap(), "0.0.0.0");
        assert_eq!(normalize_area_id("257").unwrap(), "0.0.1.1");
        assert_eq!(normalize_area_id("0.0.0.10").unwrap(), "0.0.0.10");
        assert!(normalize_area_id("area51").is_err());
    }

    #[test]
    fn test_decode_groups_networks_by_area() {
        let top = Element::parse(
            "<top><OSPF>\
             <Instances><Instance><Name>1</Name><RouterId>1.1.1.1</RouterId></Instance></Instances>\
             <Areas><Area><Name>1</Name><AreaId>0.0.0.0</AreaId></Area></Areas>\
             <Networks>\
             <Network><Name>1</Name><AreaId>0.0.0.0</AreaId><IpAddress>10.0.0.0</IpAddress><Wildcard>0.0.0.255</Wildcard></Network>\
             <Network><Name>1</Name><AreaId>0.0.0.1</AreaId><IpAddress>10.1.0.0</IpAddress><Wildcard>0.0.255.255</Wildcard></Network>\
             <Network><Name>2</Name><AreaId>0.0.0.0</AreaId><IpAddress>10.2.0.0</IpAddress><Wildcard>0.0.0.255</Wildcard></Network>\
             </Networks></OSPF></top>",
        )
        .unwrap();
        let config = Ospf::new(1).unwrap().decode(&top).unwrap().unwrap();
        assert_eq!(config.router_id.as_deref(), Some("1.1.1.1"));
        let areas = config.areas.unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].id, "0.0.0.0");
        assert_eq!(areas[0].networks, vec![network("10.0.0.0", "0.0.0.255")]);
        assert_eq!(areas[1].id, "0.0.0.1");

        assert!(Ospf::new(3).unwrap().decode(&top).unwrap().is_none());
    }

    #[test]
    fn test_build_new_process() {
        let ospf = Ospf::new(1).unwrap();
        let config = ospf.normalize(OspfConfig {
            router_id: Some("1.1.1.1".into()),
            areas: Some(vec![OspfArea {
                id: "0".into(),
                networks: vec![network("10.0.0.0", "0.0.0.255")],
            }]),
        });
        let ops = ospf.build_ops(&config, None).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "ospf 1 router-id 1.1.1.1".into(),
                "area 0.0.0.0".into(),
                "network 10.0.0.0 0.0.0.255".into(),
                "quit".into(),
            ])]
        );
    }

    #[test]
    fn test_build_diff() {
        let ospf = Ospf::new(1).unwrap();
        let existing = OspfConfig {
            router_id: Some("1.1.1.1".into()),
            areas: Some(vec![
                OspfArea {
                    id: "0.0.0.0".into(),
                    networks: vec![network("10.0.0.0", "0.0.0.255")],
                },
                OspfArea {
                    id: "0.0.0.1".into(),
                    networks: vec![],
                },
            ]),
        };
        let config = OspfConfig {
            router_id: None,
            areas: Some(vec![OspfArea {
                id: "0.0.0.0".into(),
                networks: vec![network("10.0.1.0", "0.0.0.255")],
            }]),
        };
        let ops = ospf.build_ops(&config, Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "ospf 1".into(),
                "undo area 0.0.0.1".into(),
                "area 0.0.0.0".into(),
                "undo network 10.0.0.0 0.0.0.255".into(),
                "network 10.0.1.0 0.0.0.255".into(),
                "quit".into(),
            ])]
        );
    }

    #[test]
    fn test_validate_and_remove() {
        let ospf = Ospf::new(1).unwrap();
        let bad = OspfConfig {
            router_id: Some("300.1.1.1".into()),
            areas: None,
        };
        assert!(ospf.validate(&bad).is_err());
        assert!(Ospf::new(0).is_err());
        assert_eq!(
            ospf.remove_ops(Some(&OspfConfig::default())).unwrap(),
            vec![StagedOp::CliConfig(vec!["undo ospf 1".into()])]
        );
    }
}

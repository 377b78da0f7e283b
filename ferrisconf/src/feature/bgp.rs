//! BGP instance and IPv4 neighbors.

use serde::{Deserialize, Serialize};

use super::{Feature, check_len, check_range, parse_ipv4};
use crate::device::StagedOp;
use crate::error::{ParamError, Result};
use crate::xml::Element;

/// A BGP neighbor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BgpNeighbor {
    pub address: String,
    pub remote_as: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// BGP instance attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    /// Full neighbor list, sorted by address. Neighbors not listed are
    /// removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<Vec<BgpNeighbor>>,
}

/// A BGP instance identified by its local AS number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bgp {
    asn: u32,
    instance: String,
}

impl Bgp {
    /// The default instance.
    pub fn new(asn: u32) -> Result<Self> {
        Self::with_instance(asn, "")
    }

    pub fn with_instance(asn: u32, instance: impl Into<String>) -> Result<Self> {
        check_range("asn", asn.into(), 1, u32::MAX.into())?;
        Ok(Self {
            asn,
            instance: instance.into(),
        })
    }

    pub fn asn(&self) -> u32 {
        self.asn
    }

    fn instance_element(&self) -> Element {
        Element::new("Instance")
            .with_child(Element::leaf("Name", &self.instance))
            .with_child(Element::leaf("ASNumber", self.asn))
    }

    fn peer_element(&self, address: &str) -> Element {
        Element::new("Peer")
            .with_child(Element::leaf("Name", &self.instance))
            .with_child(Element::leaf("IpAddress", address))
    }

    fn same_instance(&self, el: &Element) -> bool {
        el.text_at("Name").unwrap_or_default() == self.instance
    }
}

impl Feature for Bgp {
    type Config = BgpConfig;

    fn filter(&self) -> Vec<Element> {
        vec![
            Element::new("BGP")
                .with_child(Element::new("Instances").with_child(Element::new("Instance")))
                .with_child(Element::new("Peers").with_child(Element::new("Peer"))),
        ]
    }

    fn decode(&self, top: &Element) -> Result<Option<BgpConfig>> {
        let asn = self.asn.to_string();
        let Some(entry) = top
            .find_all("BGP/Instances/Instance")
            .into_iter()
            .find(|i| self.same_instance(i) && i.text_at("ASNumber") == Some(asn.as_str()))
        else {
            return Ok(None);
        };

        let mut neighbors: Vec<BgpNeighbor> = top
            .find_all("BGP/Peers/Peer")
            .into_iter()
            .filter(|p| self.same_instance(p))
            .filter_map(|p| {
                Some(BgpNeighbor {
                    address: p.text_at("IpAddress")?.to_string(),
                    remote_as: p.text_at("RemoteAS")?.parse().ok()?,
                    description: p.text_at("Description").map(str::to_string),
                })
            })
            .collect();
        neighbors.sort();

        Ok(Some(BgpConfig {
            router_id: entry.text_at("RouterID").map(str::to_string),
            neighbors: Some(neighbors),
        }))
    }

    fn normalize(&self, mut config: BgpConfig) -> BgpConfig {
        if let Some(neighbors) = config.neighbors.as_mut() {
            neighbors.sort();
        }
        config
    }

    fn validate(&self, config: &BgpConfig) -> Result<()> {
        if let Some(router_id) = &config.router_id {
            parse_ipv4("router_id", router_id)?;
        }
        let mut addresses = Vec::new();
        for neighbor in config.neighbors.iter().flatten() {
            parse_ipv4("neighbors.address", &neighbor.address)?;
            if addresses.contains(&neighbor.address.as_str()) {
                return Err(ParamError::invalid(
                    "neighbors.address",
                    format!("neighbor {} listed twice", neighbor.address),
                )
                .into());
            }
            addresses.push(neighbor.address.as_str());
            if neighbor.remote_as == 0 {
                return Err(ParamError::invalid("neighbors.remote_as", "must be non-zero").into());
            }
            check_len("neighbors.description", neighbor.description.as_deref(), 79)?;
        }
        Ok(())
    }

    fn build_ops(&self, config: &BgpConfig, existing: Option<&BgpConfig>) -> Result<Vec<StagedOp>> {
        let mut instance = self.instance_element();
        if let Some(router_id) = &config.router_id {
            instance.push(Element::leaf("RouterID", router_id));
        }
        let mut bgp = Element::new("BGP")
            .with_child(Element::new("Instances").with_child(instance));

        if let Some(desired) = &config.neighbors {
            let current = existing
                .and_then(|e| e.neighbors.as_deref())
                .unwrap_or_default();

            let mut peers: Vec<Element> = current
                .iter()
                .filter(|c| !desired.iter().any(|d| d.address == c.address))
                .map(|c| self.peer_element(&c.address).with_attr("xc:operation", "delete"))
                .collect();
            // A changed peer is replaced so that unset leaves are cleared.
            for d in desired.iter().filter(|d| !current.contains(*d)) {
                let mut peer = self
                    .peer_element(&d.address)
                    .with_child(Element::leaf("RemoteAS", d.remote_as));
                if let Some(description) = &d.description {
                    peer.push(Element::leaf("Description", description));
                }
                if current.iter().any(|c| c.address == d.address) {
                    peer = peer.with_attr("xc:operation", "replace");
                }
                peers.push(peer);
            }

            if !peers.is_empty() {
                bgp.push(Element::new("Peers").with_children(peers));
            }
        }

        Ok(vec![StagedOp::EditConfig(vec![bgp])])
    }

    fn remove_ops(&self, existing: Option<&BgpConfig>) -> Result<Vec<StagedOp>> {
        if existing.is_none() {
            return Ok(Vec::new());
        }
        let instance = self.instance_element().with_attr("xc:operation", "delete");
        Ok(vec![StagedOp::EditConfig(vec![
            Element::new("BGP").with_child(Element::new("Instances").with_child(instance)),
        ])])
    }
}

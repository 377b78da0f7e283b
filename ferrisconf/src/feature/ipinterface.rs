//! IPv4 addresses on routed and logical interfaces.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::interface::{InterfaceRef, LogicalKind, PortLayer};
use super::{Feature, ValueMap, parse_ipv4};
use crate::device::{Device, StagedOp};
use crate::error::{ParamError, Result};
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Primary,
    Sub,
}

impl ValueMap for AddressKind {
    const TABLE: &'static [(Self, &'static str)] =
        &[(AddressKind::Primary, "1"), (AddressKind::Sub, "2")];
}

/// Attributes of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAddressConfig {
    /// Dotted netmask.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<AddressKind>,
}

/// An address as listed on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpAddressEntry {
    pub address: String,
    pub mask: String,
    pub kind: Option<AddressKind>,
}

/// One IPv4 address on an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpInterface {
    interface: String,
    if_index: u32,
    routed: bool,
    address: Ipv4Addr,
}

impl IpInterface {
    /// `routed` is true for routed ports and logical interfaces.
    pub fn new(interface: impl Into<String>, if_index: u32, routed: bool, address: &str) -> Result<Self> {
        Ok(Self {
            interface: interface.into(),
            if_index,
            routed,
            address: parse_ipv4("address", address)?,
        })
    }

    /// Look up the interface on the device.
    pub async fn resolve(device: &mut Device, name: &str, address: &str) -> Result<Self> {
        let found = InterfaceRef::lookup(device, name).await?;
        let if_index = found.require_index()?;
        let routed =
            found.layer == Some(PortLayer::Routed) || LogicalKind::parse(&found.name).is_some();
        Self::new(found.name, if_index, routed, address)
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Every IPv4 address configured on the interface.
    pub async fn list(&self, device: &mut Device) -> Result<Vec<IpAddressEntry>> {
        let top = device.get_many(self.filter()).await?;
        Ok(self
            .entries(&top)
            .filter_map(|e| {
                Some(IpAddressEntry {
                    address: e.text_at("Ipv4Address")?.to_string(),
                    mask: e.text_at("Ipv4Mask")?.to_string(),
                    kind: e.text_at("AddressOrigin").and_then(AddressKind::from_code),
                })
            })
            .collect())
    }

    fn entries<'a>(&self, top: &'a Element) -> impl Iterator<Item = &'a Element> {
        let index = self.if_index.to_string();
        top.find_all("IPV4ADDRESS/Ipv4Addresses/Ipv4Address")
            .into_iter()
            .filter(move |e| e.text_at("IfIndex") == Some(index.as_str()))
    }

    fn address_element(&self, mask: &str, kind: Option<AddressKind>) -> Element {
        let mut entry = Element::new("Ipv4Address")
            .with_child(Element::leaf("IfIndex", self.if_index))
            .with_child(Element::leaf("Ipv4Address", self.address))
            .with_child(Element::leaf("Ipv4Mask", mask));
        if let Some(kind) = kind {
            entry.push(Element::leaf("AddressOrigin", kind.code()));
        }
        entry
    }
}

fn addresses(entry: Element) -> Element {
    Element::new("IPV4ADDRESS").with_child(Element::new("Ipv4Addresses").with_child(entry))
}

/// Whether `mask` is a dotted netmask with contiguous ones.
fn is_netmask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

impl Feature for IpInterface {
    type Config = IpAddressConfig;

    fn filter(&self) -> Vec<Element> {
        vec![addresses(
            Element::new("Ipv4Address").with_child(Element::leaf("IfIndex", self.if_index)),
        )]
    }

    fn decode(&self, top: &Element) -> Result<Option<IpAddressConfig>> {
        let address = self.address.to_string();
        Ok(self
            .entries(top)
            .find(|e| e.text_at("Ipv4Address") == Some(address.as_str()))
            .map(|e| IpAddressConfig {
                mask: e.text_at("Ipv4Mask").map(str::to_string),
                kind: e.text_at("AddressOrigin").and_then(AddressKind::from_code),
            }))
    }

    fn validate(&self, config: &IpAddressConfig) -> Result<()> {
        if !self.routed {
            return Err(ParamError::invalid(
                "interface",
                format!("{} must be routed or logical to carry an address", self.interface),
            )
            .into());
        }
        let Some(mask) = &config.mask else {
            return Err(ParamError::Required { param: "mask" }.into());
        };
        if !is_netmask(parse_ipv4("mask", mask)?) {
            return Err(ParamError::invalid("mask", format!("'{mask}' is not a netmask")).into());
        }
        Ok(())
    }

    fn build_ops(
        &self,
        config: &IpAddressConfig,
        _existing: Option<&IpAddressConfig>,
    ) -> Result<Vec<StagedOp>> {
        let mask = config
            .mask
            .as_deref()
            .ok_or(ParamError::Required { param: "mask" })?;
        let kind = config.kind.unwrap_or(AddressKind::Primary);
        Ok(vec![StagedOp::EditConfig(vec![addresses(
            self.address_element(mask, Some(kind)),
        )])])
    }

    fn remove_ops(&self, existing: Option<&IpAddressConfig>) -> Result<Vec<StagedOp>> {
        let Some(mask) = existing.and_then(|e| e.mask.as_deref()) else {
            return Ok(Vec::new());
        };
        let entry = self
            .address_element(mask, None)
            .with_attr("xc:operation", "delete");
        Ok(vec![StagedOp::EditConfig(vec![addresses(entry)])])
    }
}

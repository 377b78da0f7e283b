//! VLAN configuration.

use serde::{Deserialize, Serialize};

use super::{Feature, KeyMap, check_len, check_range, leaves_to_params, params_into, params_to_leaves};
use crate::device::{Device, StagedOp};
use crate::error::{ParamError, Result};
use crate::xml::Element;

const KEY_MAP: KeyMap = &[("name", "Name"), ("description", "Description")];

/// Lowest configurable VLAN id.
pub const MIN_VLAN_ID: u16 = 1;

/// Highest configurable VLAN id.
pub const MAX_VLAN_ID: u16 = 4094;

/// A VLAN identified by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vlan {
    id: u16,
}

/// VLAN attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Vlan {
    /// Create a VLAN handle, checking the id range.
    pub fn new(id: u16) -> Result<Self> {
        check_range("vlanid", id.into(), MIN_VLAN_ID.into(), MAX_VLAN_ID.into())?;
        Ok(Self { id })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    fn vlan_element(&self, children: Vec<Element>) -> Element {
        vlans([Element::new("VLANID")
            .with_child(Element::leaf("ID", self.id))
            .with_children(children)])
    }
}

fn vlans(entries: impl IntoIterator<Item = Element>) -> Element {
    Element::new("VLAN").with_child(Element::new("VLANs").with_children(entries))
}

impl Feature for Vlan {
    type Config = VlanConfig;

    fn filter(&self) -> Vec<Element> {
        vec![self.vlan_element(Vec::new())]
    }

    fn decode(&self, top: &Element) -> Result<Option<VlanConfig>> {
        let id = self.id.to_string();
        top.find_all("VLAN/VLANs/VLANID")
            .into_iter()
            .find(|v| v.text_at("ID") == Some(id.as_str()))
            .map(|v| params_into(leaves_to_params(v, KEY_MAP)))
            .transpose()
    }

    fn validate(&self, config: &VlanConfig) -> Result<()> {
        check_len("name", config.name.as_deref(), 32)?;
        check_len("description", config.description.as_deref(), 255)?;
        Ok(())
    }

    fn build_ops(&self, config: &VlanConfig, _existing: Option<&VlanConfig>) -> Result<Vec<StagedOp>> {
        let leaves = params_to_leaves(config, KEY_MAP);
        Ok(vec![StagedOp::EditConfig(vec![self.vlan_element(leaves)])])
    }

    fn remove_ops(&self, existing: Option<&VlanConfig>) -> Result<Vec<StagedOp>> {
        if self.id == 1 {
            return Err(ParamError::invalid("vlanid", "VLAN 1 cannot be removed").into());
        }
        if existing.is_none() {
            return Ok(Vec::new());
        }
        let entry = Element::new("VLANID")
            .with_attr("xc:operation", "delete")
            .with_child(Element::leaf("ID", self.id));
        Ok(vec![StagedOp::EditConfig(vec![vlans([entry])])])
    }
}

/// Ids of every VLAN configured on the device, ascending.
pub async fn get_vlan_list(device: &mut Device) -> Result<Vec<u16>> {
    let filter = vlans([Element::new("VLANID").with_child(Element::new("ID"))]);
    let top = device.get(filter).await?;
    let mut ids: Vec<u16> = top
        .find_all("VLAN/VLANs/VLANID")
        .into_iter()
        .filter_map(|v| v.text_at("ID").and_then(|id| id.parse().ok()))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Expand a list such as `"1-3,10"` into sorted, de-duplicated ids.
pub fn expand_vlan_range(list: &str) -> std::result::Result<Vec<u16>, ParamError> {
    let mut ids = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_id(a)?, parse_id(b)?),
            None => {
                let id = parse_id(part)?;
                (id, id)
            }
        };
        if start > end {
            return Err(ParamError::invalid(
                "vlan_range",
                format!("range '{part}' is reversed"),
            ));
        }
        ids.extend(start..=end);
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn parse_id(s: &str) -> std::result::Result<u16, ParamError> {
    let id: u16 = s
        .trim()
        .parse()
        .map_err(|_| ParamError::invalid("vlan_range", format!("'{s}' is not a VLAN id")))?;
    check_range("vlan_range", id.into(), MIN_VLAN_ID.into(), MAX_VLAN_ID.into())?;
    Ok(id)
}

/// Consecutive runs of sorted ids as `(first, last)` pairs.
fn runs(ids: &[u16]) -> Vec<(u16, u16)> {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out: Vec<(u16, u16)> = Vec::new();
    for id in sorted {
        match out.last_mut() {
            Some((_, last)) if *last + 1 == id => *last = id,
            _ => out.push((id, id)),
        }
    }
    out
}

/// Compact ids into the `"1-3,10"` form used by the data model.
pub fn compact_vlan_list(ids: &[u16]) -> String {
    runs(ids)
        .into_iter()
        .map(|(a, b)| if a == b { a.to_string() } else { format!("{a}-{b}") })
        .collect::<Vec<_>>()
        .join(",")
}

/// Compact ids into the `"1 to 3 10"` form the CLI accepts.
pub fn cli_vlan_list(ids: &[u16]) -> String {
    runs(ids)
        .into_iter()
        .map(|(a, b)| if a == b { a.to_string() } else { format!("{a} to {b}") })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::fake_device;
    use crate::netconf::testing::ok_reply;

    #[test]
    fn test_id_range() {
        assert!(Vlan::new(1).is_ok());
        assert!(Vlan::new(4094).is_ok());
        assert!(Vlan::new(0).is_err());
        assert!(Vlan::new(4095).is_err());
    }

    #[test]
    fn test_build_ops() {
        let vlan = Vlan::new(10).unwrap();
        let config = VlanConfig {
            name: Some("web".into()),
            description: None,
        };
        let ops = vlan.build_ops(&config, None).unwrap();
        assert_eq!(ops.len(), 1);
        let StagedOp::EditConfig(els) = &ops[0] else {
            panic!("expected edit-config");
        };
        assert_eq!(
            els[0].to_xml(),
            "<VLAN><VLANs><VLANID><ID>10</ID><Name>web</Name></VLANID></VLANs></VLAN>"
        );
    }

    #[test]
    fn test_remove_ops() {
        let vlan = Vlan::new(10).unwrap();
        assert!(vlan.remove_ops(None).unwrap().is_empty());

        let ops = vlan.remove_ops(Some(&VlanConfig::default())).unwrap();
        let StagedOp::EditConfig(els) = &ops[0] else {
            panic!("expected edit-config");
        };
        let entry = els[0].find("VLANs/VLANID").unwrap();
        assert_eq!(entry.attr("operation"), Some("delete"));

        assert!(Vlan::new(1).unwrap().remove_ops(Some(&VlanConfig::default())).is_err());
    }

    #[test]
    fn test_decode() {
        let top = Element::parse(
            "<top><VLAN><VLANs>\
             <VLANID><ID>1</ID><Name>default</Name></VLANID>\
             <VLANID><ID>10</ID><Name>web</Name><Description>frontend</Description></VLANID>\
             </VLANs></VLAN></top>",
        )
        .unwrap();
        let config = Vlan::new(10).unwrap().decode(&top).unwrap().unwrap();
        assert_eq!(config.name.as_deref(), Some("web"));
        assert_eq!(config.description.as_deref(), Some("frontend"));
        assert!(Vlan::new(20).unwrap().decode(&top).unwrap().is_none());
    }

    #[test]
    fn test_validate_name_length() {
        let vlan = Vlan::new(10).unwrap();
        let config = VlanConfig {
            name: Some("x".repeat(33)),
            description: None,
        };
        assert!(vlan.validate(&config).is_err());
    }

    #[test]
    fn test_expand_vlan_range() {
        assert_eq!(expand_vlan_range("1-3,10").unwrap(), vec![1, 2, 3, 10]);
        assert_eq!(expand_vlan_range(" 5 , 2-3 ,5").unwrap(), vec![2, 3, 5]);
        assert!(expand_vlan_range("").unwrap().is_empty());
        assert!(expand_vlan_range("3-1").is_err());
        assert!(expand_vlan_range("1-5000").is_err());
        assert!(expand_vlan_range("abc").is_err());
    }

    #[test]
    fn test_compact_lists() {
        assert_eq!(compact_vlan_list(&[10, 1, 2, 3]), "1-3,10");
        assert_eq!(cli_vlan_list(&[1, 2, 3, 10]), "1 to 3 10");
        assert_eq!(compact_vlan_list(&[]), "");
    }

    #[tokio::test]
    async fn test_build_against_device() {
        let (mut device, server) = fake_device(|op| match op.name.as_str() {
            "get" => "<data><top><VLAN><VLANs/></VLAN></top></data>".to_string(),
            _ => {
                assert!(op.find("config/top/VLAN/VLANs/VLANID").is_some());
                ok_reply()
            }
        })
        .await;

        let vlan = Vlan::new(10).unwrap();
        let config = VlanConfig {
            name: Some("web".into()),
            description: None,
        };
        vlan.build(&mut device, &config, false).await.unwrap();
        device.close().await.unwrap();
        assert_eq!(server.await.unwrap(), vec!["get", "edit-config", "close-session"]);
    }

    #[tokio::test]
    async fn test_get_vlan_list() {
        let (mut device, _server) = fake_device(|_| {
            "<data><top><VLAN><VLANs>\
             <VLANID><ID>20</ID></VLANID><VLANID><ID>1</ID></VLANID>\
             </VLANs></VLAN></top></data>"
                .to_string()
        })
        .await;
        assert_eq!(get_vlan_list(&mut device).await.unwrap(), vec![1, 20]);
    }
}

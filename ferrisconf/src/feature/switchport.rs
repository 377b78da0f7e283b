//! Layer 2 switchport settings: link type, PVID and permitted VLANs.
//!
//! State is read from the data model; changes are pushed as CLI since the
//! link type transitions need commands in a specific order.

use serde::{Deserialize, Serialize};

use super::interface::{InterfaceRef, PortLayer};
use super::vlan::{MAX_VLAN_ID, MIN_VLAN_ID, cli_vlan_list, compact_vlan_list, expand_vlan_range};
use super::{Feature, ValueMap, check_range};
use crate::device::{Device, StagedOp};
use crate::error::{ParamError, Result};
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Access,
    Trunk,
    Hybrid,
}

impl ValueMap for LinkType {
    const TABLE: &'static [(Self, &'static str)] = &[
        (LinkType::Access, "1"),
        (LinkType::Trunk, "2"),
        (LinkType::Hybrid, "3"),
    ];
}

impl LinkType {
    fn cli(self) -> &'static str {
        match self {
            LinkType::Access => "access",
            LinkType::Trunk => "trunk",
            LinkType::Hybrid => "hybrid",
        }
    }
}

/// Switchport attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvid: Option<u16>,
    /// Permitted (trunk) or tagged (hybrid) VLANs, as `"1-3,10"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_vlans: Option<String>,
}

/// Switchport of one bridged interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switchport {
    interface: String,
    if_index: u32,
    bridged: bool,
}

impl Switchport {
    pub fn new(interface: impl Into<String>, if_index: u32, bridged: bool) -> Self {
        Self {
            interface: interface.into(),
            if_index,
            bridged,
        }
    }

    /// Look up the interface on the device.
    pub async fn resolve(device: &mut Device, name: &str) -> Result<Self> {
        let found = InterfaceRef::lookup(device, name).await?;
        let if_index = found.require_index()?;
        Ok(Self::new(
            found.name,
            if_index,
            found.layer != Some(PortLayer::Routed),
        ))
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn interface_cmd(&self) -> String {
        format!("interface {}", self.interface)
    }
}

fn normalize_list(list: &str) -> String {
    expand_vlan_range(list)
        .map(|ids| compact_vlan_list(&ids))
        .unwrap_or_else(|_| list.trim().to_string())
}

impl Feature for Switchport {
    type Config = SwitchportConfig;

    fn filter(&self) -> Vec<Element> {
        let index = || Element::leaf("IfIndex", self.if_index);
        vec![
            Element::new("Ifmgr").with_child(
                Element::new("Interfaces").with_child(
                    Element::new("Interface")
                        .with_child(index())
                        .with_child(Element::new("LinkType"))
                        .with_child(Element::new("PVID")),
                ),
            ),
            Element::new("VLAN")
                .with_child(Element::new("TrunkInterfaces").with_child(
                    Element::new("Interface").with_child(index()),
                ))
                .with_child(Element::new("HybridInterfaces").with_child(
                    Element::new("Interface").with_child(index()),
                )),
        ]
    }

    fn decode(&self, top: &Element) -> Result<Option<SwitchportConfig>> {
        let index = self.if_index.to_string();
        let matches = |i: &&Element| i.text_at("IfIndex") == Some(index.as_str());

        let Some(entry) = top
            .find_all("Ifmgr/Interfaces/Interface")
            .into_iter()
            .find(matches)
        else {
            return Ok(None);
        };

        let link_type = entry.text_at("LinkType").and_then(LinkType::from_code);
        let permitted_vlans = match link_type {
            Some(LinkType::Trunk) => top
                .find_all("VLAN/TrunkInterfaces/Interface")
                .into_iter()
                .find(matches)
                .and_then(|i| i.text_at("PermitVlanList")),
            Some(LinkType::Hybrid) => top
                .find_all("VLAN/HybridInterfaces/Interface")
                .into_iter()
                .find(matches)
                .and_then(|i| i.text_at("TaggedVlanList")),
            _ => None,
        };

        Ok(Some(SwitchportConfig {
            link_type,
            pvid: entry.text_at("PVID").and_then(|s| s.parse().ok()),
            permitted_vlans: permitted_vlans.map(normalize_list),
        }))
    }

    fn normalize(&self, mut config: SwitchportConfig) -> SwitchportConfig {
        config.permitted_vlans = config.permitted_vlans.as_deref().map(normalize_list);
        config
    }

    fn validate(&self, config: &SwitchportConfig) -> Result<()> {
        if !self.bridged {
            return Err(ParamError::invalid(
                "interface",
                format!("{} is routed; set it to bridged first", self.interface),
            )
            .into());
        }
        let Some(link_type) = config.link_type else {
            if config.pvid.is_some() || config.permitted_vlans.is_some() {
                return Err(ParamError::Required { param: "link_type" }.into());
            }
            return Ok(());
        };
        if let Some(pvid) = config.pvid {
            check_range("pvid", pvid.into(), MIN_VLAN_ID.into(), MAX_VLAN_ID.into())?;
        }
        if let Some(list) = &config.permitted_vlans {
            if link_type == LinkType::Access {
                return Err(ParamError::MutuallyExclusive {
                    first: "permitted_vlans",
                    second: "link_type access",
                }
                .into());
            }
            expand_vlan_range(list)?;
        }
        Ok(())
    }

    fn build_ops(
        &self,
        config: &SwitchportConfig,
        existing: Option<&SwitchportConfig>,
    ) -> Result<Vec<StagedOp>> {
        let Some(link_type) = config.link_type else {
            return Ok(Vec::new());
        };
        let current = existing.and_then(|e| e.link_type);
        let mut cmds = vec![self.interface_cmd()];

        if current != Some(link_type) {
            // Trunk and hybrid ports must pass through access to change type.
            if matches!(current, Some(LinkType::Trunk | LinkType::Hybrid))
                && link_type != LinkType::Access
            {
                cmds.push("port link-type access".to_string());
            }
            cmds.push(format!("port link-type {}", link_type.cli()));
        }

        let permitted = config
            .permitted_vlans
            .as_deref()
            .map(expand_vlan_range)
            .transpose()?;

        match link_type {
            LinkType::Access => {
                if let Some(pvid) = config.pvid {
                    cmds.push(format!("port access vlan {pvid}"));
                }
            }
            LinkType::Trunk => {
                if let Some(ids) = &permitted {
                    if current == Some(LinkType::Trunk) {
                        cmds.push("undo port trunk permit vlan all".to_string());
                    }
                    cmds.push(format!("port trunk permit vlan {}", cli_vlan_list(ids)));
                }
                if let Some(pvid) = config.pvid {
                    cmds.push(format!("port trunk pvid vlan {pvid}"));
                }
            }
            LinkType::Hybrid => {
                if let Some(ids) = &permitted {
                    if current == Some(LinkType::Hybrid) {
                        let tagged = existing
                            .and_then(|e| e.permitted_vlans.as_deref())
                            .map(expand_vlan_range)
                            .transpose()?
                            .unwrap_or_default();
                        let removed: Vec<u16> =
                            tagged.into_iter().filter(|id| !ids.contains(id)).collect();
                        if !removed.is_empty() {
                            cmds.push(format!("undo port hybrid vlan {}", cli_vlan_list(&removed)));
                        }
                    }
                    cmds.push(format!("port hybrid vlan {} tagged", cli_vlan_list(ids)));
                }
                if let Some(pvid) = config.pvid {
                    cmds.push(format!("port hybrid pvid vlan {pvid}"));
                }
            }
        }

        if cmds.len() == 1 {
            return Ok(Vec::new());
        }
        Ok(vec![StagedOp::CliConfig(cmds)])
    }

    /// Return the port to access VLAN 1.
    fn remove_ops(&self, existing: Option<&SwitchportConfig>) -> Result<Vec<StagedOp>> {
        let Some(existing) = existing else {
            return Ok(Vec::new());
        };
        let mut cmds = vec![self.interface_cmd()];
        match existing.link_type {
            Some(LinkType::Trunk) => {
                cmds.push("undo port trunk permit vlan all".to_string());
                cmds.push("port link-type access".to_string());
            }
            Some(LinkType::Hybrid) => cmds.push("port link-type access".to_string()),
            _ => {}
        }
        cmds.push("port access vlan 1".to_string());
        Ok(vec![StagedOp::CliConfig(cmds)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port() -> Switchport {
        Switchport::new("GigabitEthernet1/0/1", 3, true)
    }

    #[test]
    fn test_decode_trunk() {
        let top = Element::parse(
            "<top>\
             <Ifmgr><Interfaces><Interface><IfIndex>3</IfIndex><LinkType>2</LinkType><PVID>10</PVID></Interface></Interfaces></Ifmgr>\
             <VLAN><TrunkInterfaces><Interface><IfIndex>3</IfIndex><PermitVlanList>1,2,3,10</PermitVlanList></Interface></TrunkInterfaces></VLAN>\
             </top>",
        )
        .unwrap();
        let config = port().decode(&top).unwrap().unwrap();
        assert_eq!(config.link_type, Some(LinkType::Trunk));
        assert_eq!(config.pvid, Some(10));
        assert_eq!(config.permitted_vlans.as_deref(), Some("1-3,10"));
    }

    #[test]
    fn test_build_access_to_trunk() {
        let existing = SwitchportConfig {
            link_type: Some(LinkType::Access),
            pvid: Some(1),
            permitted_vlans: None,
        };
        let config = SwitchportConfig {
            link_type: Some(LinkType::Trunk),
            pvid: Some(10),
            permitted_vlans: Some("10-12,20".into()),
        };
        let ops = port().build_ops(&config, Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface GigabitEthernet1/0/1".into(),
                "port link-type trunk".into(),
                "port trunk permit vlan 10 to 12 20".into(),
                "port trunk pvid vlan 10".into(),
            ])]
        );
    }

    #[test]
    fn test_build_trunk_to_hybrid_passes_through_access() {
        let existing = SwitchportConfig {
            link_type: Some(LinkType::Trunk),
            ..Default::default()
        };
        let config = SwitchportConfig {
            link_type: Some(LinkType::Hybrid),
            ..Default::default()
        };
        let ops = port().build_ops(&config, Some(&existing)).unwrap();
        let StagedOp::CliConfig(cmds) = &ops[0] else {
            panic!("expected cli");
        };
        assert_eq!(cmds[1], "port link-type access");
        assert_eq!(cmds[2], "port link-type hybrid");
    }

    #[test]
    fn test_validate() {
        let access_with_list = SwitchportConfig {
            link_type: Some(LinkType::Access),
            permitted_vlans: Some("10".into()),
            ..Default::default()
        };
        assert!(port().validate(&access_with_list).is_err());

        let missing_type = SwitchportConfig {
            pvid: Some(10),
            ..Default::default()
        };
        assert!(port().validate(&missing_type).is_err());

        let routed = Switchport::new("GigabitEthernet1/0/1", 3, false);
        assert!(routed.validate(&SwitchportConfig::default()).is_err());
    }

    #[test]
    fn test_remove_ops_from_trunk() {
        let existing = SwitchportConfig {
            link_type: Some(LinkType::Trunk),
            ..Default::default()
        };
        let ops = port().remove_ops(Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface GigabitEthernet1/0/1".into(),
                "undo port trunk permit vlan all".into(),
                "port link-type access".into(),
                "port access vlan 1".into(),
            ])]
        );
    }

    #[test]
    fn test_build_hybrid_drops_untagged_vlans() {
        let existing = SwitchportConfig {
            link_type: Some(LinkType::Hybrid),
            pvid: Some(1),
            permitted_vlans: Some("10,20-22".into()),
        };
        let config = SwitchportConfig {
            link_type: Some(LinkType::Hybrid),
            pvid: None,
            permitted_vlans: Some("10".into()),
        };
        let ops = port().build_ops(&config, Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface GigabitEthernet1/0/1".into(),
                "undo port hybrid vlan 20 to 22".into(),
                "port hybrid vlan 10 tagged".into(),
            ])]
        );
    }

    #[test]
    fn test_build_hybrid_from_access_has_nothing_to_undo() {
        let existing = SwitchportConfig {
            link_type: Some(LinkType::Access),
            pvid: Some(1),
            permitted_vlans: None,
        };
        let config = SwitchportConfig {
            link_type: Some(LinkType::Hybrid),
            pvid: None,
            permitted_vlans: Some("10,20".into()),
        };
        let ops = port().build_ops(&config, Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface GigabitEthernet1/0/1".into(),
                "port link-type hybrid".into(),
                "port hybrid vlan 10 20 tagged".into(),
            ])]
        );
    }
}

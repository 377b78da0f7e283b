//! Link aggregation groups.
//!
//! Group state and membership come from the `LAGG` table; member IfIndexes
//! are mapped back to names through `Ifmgr`. Changes are pushed as CLI so
//! member ports can be moved in and out in one batch.

use serde::{Deserialize, Serialize};

use super::interface::{is_ethernet, normalize_interface_name};
use super::{Feature, ValueMap, check_range};
use crate::device::StagedOp;
use crate::error::{ParamError, Result};
use crate::xml::Element;

pub const MIN_GROUP_ID: u32 = 1;
pub const MAX_GROUP_ID: u32 = 1024;

/// Layer of the aggregate interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Bridged,
    Routed,
}

impl AggregationKind {
    fn prefix(self) -> &'static str {
        match self {
            AggregationKind::Bridged => "Bridge-Aggregation",
            AggregationKind::Routed => "Route-Aggregation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaggMode {
    Static,
    Dynamic,
}

impl ValueMap for LaggMode {
    const TABLE: &'static [(Self, &'static str)] = &[(LaggMode::Static, "1"), (LaggMode::Dynamic, "2")];
}

/// Aggregation group attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortChannelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<LaggMode>,
    /// Member interface names, sorted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

/// An aggregation group identified by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortChannel {
    group: u32,
    kind: AggregationKind,
}

impl PortChannel {
    pub fn new(group: u32, kind: AggregationKind) -> Result<Self> {
        check_range("group", group.into(), MIN_GROUP_ID.into(), MAX_GROUP_ID.into())?;
        Ok(Self { group, kind })
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    /// Name of the aggregate interface.
    pub fn interface_name(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.group)
    }

    fn member_cmds(&self, name: &str, join: bool) -> [String; 2] {
        let action = if join {
            format!("port link-aggregation group {}", self.group)
        } else {
            "undo port link-aggregation group".to_string()
        };
        [format!("interface {name}"), action]
    }
}

fn sorted_members(members: &[String]) -> Vec<String> {
    let mut names: Vec<String> = members.iter().map(|m| normalize_interface_name(m)).collect();
    names.sort();
    names.dedup();
    names
}

impl Feature for PortChannel {
    type Config = PortChannelConfig;

    fn filter(&self) -> Vec<Element> {
        vec![
            Element::new("LAGG")
                .with_child(Element::new("LAGGGroups").with_child(
                    Element::new("LAGGGroup").with_child(Element::leaf("GroupId", self.group)),
                ))
                .with_child(Element::new("LAGGMembers").with_child(
                    Element::new("LAGGMember").with_child(Element::leaf("GroupId", self.group)),
                )),
            Element::new("Ifmgr").with_child(
                Element::new("Interfaces").with_child(
                    Element::new("Interface")
                        .with_child(Element::new("IfIndex"))
                        .with_child(Element::new("Name")),
                ),
            ),
        ]
    }

    fn decode(&self, top: &Element) -> Result<Option<PortChannelConfig>> {
        let group = self.group.to_string();
        let Some(entry) = top
            .find_all("LAGG/LAGGGroups/LAGGGroup")
            .into_iter()
            .find(|g| g.text_at("GroupId") == Some(group.as_str()))
        else {
            return Ok(None);
        };

        let names: Vec<(&str, &str)> = top
            .find_all("Ifmgr/Interfaces/Interface")
            .into_iter()
            .filter_map(|i| Some((i.text_at("IfIndex")?, i.text_at("Name")?)))
            .collect();

        let mut members: Vec<String> = top
            .find_all("LAGG/LAGGMembers/LAGGMember")
            .into_iter()
            .filter(|m| m.text_at("GroupId") == Some(group.as_str()))
            .filter_map(|m| {
                let index = m.text_at("IfIndex")?;
                names
                    .iter()
                    .find(|(i, _)| *i == index)
                    .map(|(_, name)| (*name).to_string())
            })
            .collect();
        members.sort();

        Ok(Some(PortChannelConfig {
            mode: entry.text_at("LinkMode").and_then(LaggMode::from_code),
            members: Some(members),
        }))
    }

    fn normalize(&self, mut config: PortChannelConfig) -> PortChannelConfig {
        config.members = config.members.as_deref().map(sorted_members);
        config
    }

    fn validate(&self, config: &PortChannelConfig) -> Result<()> {
        for member in config.members.iter().flatten() {
            if !is_ethernet(&normalize_interface_name(member)) {
                return Err(ParamError::invalid(
                    "members",
                    format!("'{member}' is not an Ethernet port"),
                )
                .into());
            }
        }
        Ok(())
    }

    fn build_ops(
        &self,
        config: &PortChannelConfig,
        existing: Option<&PortChannelConfig>,
    ) -> Result<Vec<StagedOp>> {
        let mut cmds = Vec::new();

        let current_mode = existing.and_then(|e| e.mode);
        let mode_changed = config.mode.is_some() && config.mode != current_mode;
        if existing.is_none() || mode_changed {
            cmds.push(format!("interface {}", self.interface_name()));
            match config.mode {
                Some(LaggMode::Dynamic) => cmds.push("link-aggregation mode dynamic".to_string()),
                Some(LaggMode::Static) if existing.is_some() => {
                    cmds.push("undo link-aggregation mode".to_string())
                }
                _ => {}
            }
        }

        if let Some(desired) = config.members.as_deref() {
            let desired = sorted_members(desired);
            let current = existing
                .and_then(|e| e.members.as_deref())
                .unwrap_or_default();

            for name in current.iter().filter(|m| !desired.contains(*m)) {
                cmds.extend(self.member_cmds(name, false));
            }
            for name in desired.iter().filter(|m| !current.contains(*m)) {
                cmds.extend(self.member_cmds(name, true));
            }
        }

        if cmds.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![StagedOp::CliConfig(cmds)])
    }

    fn remove_ops(&self, existing: Option<&PortChannelConfig>) -> Result<Vec<StagedOp>> {
        let Some(existing) = existing else {
            return Ok(Vec::new());
        };
        let mut cmds = Vec::new();
        for name in existing.members.iter().flatten() {
            cmds.extend(self.member_cmds(name, false));
        }
        cmds.push(format!("undo interface {}", self.interface_name()));
        Ok(vec![StagedOp::CliConfig(cmds)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bagg() -> PortChannel {
        PortChannel::new(1, AggregationKind::Bridged).unwrap()
    }

    #[test]
    fn test_group_range() {
        assert!(PortChannel::new(0, AggregationKind::Bridged).is_err());
        assert!(PortChannel::new(1025, AggregationKind::Routed).is_err());
        assert_eq!(
            PortChannel::new(5, AggregationKind::Routed).unwrap().interface_name(),
            "Route-Aggregation5"
        );
    }

    #[test]
    fn test_decode_maps_member_names() {
        let top = Element::parse(
            "<top>\
             <LAGG><LAGGGroups><LAGGGroup><GroupId>1</GroupId><LinkMode>2</LinkMode></LAGGGroup></LAGGGroups>\
             <LAGGMembers>\
             <LAGGMember><IfIndex>4</IfIndex><GroupId>1</GroupId></LAGGMember>\
             <LAGGMember><IfIndex>3</IfIndex><GroupId>1</GroupId></LAGGMember>\
             <LAGGMember><IfIndex>9</IfIndex><GroupId>2</GroupId></LAGGMember>\
             </LAGGMembers></LAGG>\
             <Ifmgr><Interfaces>\
             <Interface><IfIndex>3</IfIndex><Name>GigabitEthernet1/0/1</Name></Interface>\
             <Interface><IfIndex>4</IfIndex><Name>GigabitEthernet1/0/2</Name></Interface>\
             <Interface><IfIndex>9</IfIndex><Name>GigabitEthernet1/0/7</Name></Interface>\
             </Interfaces></Ifmgr></top>",
        )
        .unwrap();
        let config = bagg().decode(&top).unwrap().unwrap();
        assert_eq!(config.mode, Some(LaggMode::Dynamic));
        assert_eq!(
            config.members,
            Some(vec![
                "GigabitEthernet1/0/1".to_string(),
                "GigabitEthernet1/0/2".to_string()
            ])
        );
    }

    #[test]
    fn test_build_new_group() {
        let config = bagg().normalize(PortChannelConfig {
            mode: Some(LaggMode::Dynamic),
            members: Some(vec!["ge1/0/2".into(), "ge1/0/1".into()]),
        });
        let ops = bagg().build_ops(&config, None).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface Bridge-Aggregation1".into(),
                "link-aggregation mode dynamic".into(),
                "interface GigabitEthernet1/0/1".into(),
                "port link-aggregation group 1".into(),
                "interface GigabitEthernet1/0/2".into(),
                "port link-aggregation group 1".into(),
            ])]
        );
    }

    #[test]
    fn test_build_member_diff() {
        let existing = PortChannelConfig {
            mode: Some(LaggMode::Static),
            members: Some(vec!["GigabitEthernet1/0/1".into(), "GigabitEthernet1/0/2".into()]),
        };
        let config = PortChannelConfig {
            mode: Some(LaggMode::Static),
            members: Some(vec!["GigabitEthernet1/0/2".into(), "GigabitEthernet1/0/3".into()]),
        };
        let ops = bagg().build_ops(&config, Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface GigabitEthernet1/0/1".into(),
                "undo port link-aggregation group".into(),
                "interface GigabitEthernet1/0/3".into(),
                "port link-aggregation group 1".into(),
            ])]
        );

        assert!(bagg().build_ops(&existing, Some(&existing)).unwrap().is_empty());
    }

    #[test]
    fn test_validate_members() {
        let config = PortChannelConfig {
            mode: None,
            members: Some(vec!["vlan10".into()]),
        };
        assert!(bagg().validate(&config).is_err());
    }

    #[test]
    fn test_remove_ops() {
        let existing = PortChannelConfig {
            mode: Some(LaggMode::Static),
            members: Some(vec!["GigabitEthernet1/0/1".into()]),
        };
        let ops = bagg().remove_ops(Some(&existing)).unwrap();
        assert_eq!(
            ops,
            vec![StagedOp::CliConfig(vec![
                "interface GigabitEthernet1/0/1".into(),
                "undo port link-aggregation group".into(),
                "undo interface Bridge-Aggregation1".into(),
            ])]
        );
    }
}

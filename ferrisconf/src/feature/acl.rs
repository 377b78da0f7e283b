//! IPv4 basic (2000-2999) and advanced (3000-3999) ACLs.

use serde::{Deserialize, Serialize};

use super::{Feature, ValueMap, check_len, check_range, parse_ipv4};
use crate::device::StagedOp;
use crate::error::{ParamError, Result};
use crate::xml::Element;

const IPV4_GROUP_TYPE: &str = "1";
const MAX_RULE_ID: u32 = 65534;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    Deny,
    Permit,
}

impl ValueMap for AclAction {
    const TABLE: &'static [(Self, &'static str)] = &[(AclAction::Deny, "1"), (AclAction::Permit, "2")];
}

/// Named protocols and their `ProtocolType` codes.
const PROTOCOLS: &[(&str, &str)] = &[
    ("ip", "256"),
    ("icmp", "1"),
    ("igmp", "2"),
    ("tcp", "6"),
    ("udp", "17"),
    ("gre", "47"),
    ("ospf", "89"),
];

fn protocol_code(protocol: &str) -> Option<String> {
    let protocol = protocol.trim().to_ascii_lowercase();
    if let Some((_, code)) = PROTOCOLS.iter().find(|(name, _)| *name == protocol) {
        return Some((*code).to_string());
    }
    protocol.parse::<u8>().ok().map(|n| n.to_string())
}

fn protocol_name(code: &str) -> String {
    PROTOCOLS
        .iter()
        .find(|(_, c)| *c == code)
        .map_or_else(|| code.to_string(), |(name, _)| (*name).to_string())
}

/// Address and wildcard mask.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AclPrefix {
    pub address: String,
    pub wildcard: String,
}

/// One rule. `None` source or destination matches any address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AclRule {
    pub id: u32,
    pub action: AclAction,
    /// Protocol name (`tcp`, `udp`, `ip`, ...) or number. Advanced only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AclPrefix>,
    /// Advanced only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<AclPrefix>,
}

/// ACL group attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Full rule list, sorted by id. Rules not listed are removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<AclRule>>,
}

/// An IPv4 ACL group identified by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acl {
    group: u32,
}

impl Acl {
    pub fn new(group: u32) -> Result<Self> {
        check_range("group", group.into(), 2000, 3999)?;
        Ok(Self { group })
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn is_advanced(&self) -> bool {
        self.group >= 3000
    }

    fn rules_container(&self) -> &'static str {
        if self.is_advanced() {
            "IPv4AdvanceRules"
        } else {
            "IPv4BasicRules"
        }
    }

    fn group_element(&self) -> Element {
        Element::new("Group")
            .with_child(Element::leaf("GroupType", IPV4_GROUP_TYPE))
            .with_child(Element::leaf("GroupID", self.group))
    }

    fn rule_key(&self, id: u32) -> Element {
        Element::new("Rule")
            .with_child(Element::leaf("GroupID", self.group))
            .with_child(Element::leaf("RuleID", id))
    }

    fn rule_element(&self, rule: &AclRule) -> Element {
        let mut el = self
            .rule_key(rule.id)
            .with_child(Element::leaf("Action", rule.action.code()));
        if let Some(code) = rule.protocol.as_deref().and_then(protocol_code) {
            el.push(Element::leaf("ProtocolType", code));
        }
        if let Some(src) = &rule.source {
            el.push(
                Element::new("SrcIPv4")
                    .with_child(Element::leaf("SrcIPv4Addr", &src.address))
                    .with_child(Element::leaf("SrcIPv4Wildcard", &src.wildcard)),
            );
        }
        if let Some(dst) = &rule.destination {
            el.push(
                Element::new("DstIPv4")
                    .with_child(Element::leaf("DstIPv4Addr", &dst.address))
                    .with_child(Element::leaf("DstIPv4Wildcard", &dst.wildcard)),
            );
        }
        el
    }

    fn decode_rule(&self, el: &Element) -> Option<AclRule> {
        let prefix = |path: &str, addr: &str, wildcard: &str| {
            let p = el.find(path)?;
            Some(AclPrefix {
                address: p.text_at(addr)?.to_string(),
                wildcard: p.text_at(wildcard)?.to_string(),
            })
        };
        Some(AclRule {
            id: el.text_at("RuleID")?.parse().ok()?,
            action: AclAction::from_code(el.text_at("Action")?)?,
            protocol: el.text_at("ProtocolType").map(protocol_name),
            source: prefix("SrcIPv4", "SrcIPv4Addr", "SrcIPv4Wildcard"),
            destination: prefix("DstIPv4", "DstIPv4Addr", "DstIPv4Wildcard"),
        })
    }
}

fn check_prefix(param: &'static str, prefix: Option<&AclPrefix>) -> Result<()> {
    if let Some(p) = prefix {
        parse_ipv4(param, &p.address)?;
        parse_ipv4(param, &p.wildcard)?;
    }
    Ok(())
}

impl Feature for Acl {
    type Config = AclConfig;

    fn filter(&self) -> Vec<Element> {
        vec![
            Element::new("ACL")
                .with_child(Element::new("Groups").with_child(self.group_element()))
                .with_child(Element::new(self.rules_container()).with_child(
                    Element::new("Rule").with_child(Element::leaf("GroupID", self.group)),
                )),
        ]
    }

    fn decode(&self, top: &Element) -> Result<Option<AclConfig>> {
        let group = self.group.to_string();
        let Some(entry) = top
            .find_all("ACL/Groups/Group")
            .into_iter()
            .find(|g| g.text_at("GroupID") == Some(group.as_str()))
        else {
            return Ok(None);
        };

        let path = format!("ACL/{}/Rule", self.rules_container());
        let mut rules: Vec<AclRule> = top
            .find_all(&path)
            .into_iter()
            .filter(|r| r.text_at("GroupID") == Some(group.as_str()))
            .filter_map(|r| self.decode_rule(r))
            .collect();
        rules.sort();

        Ok(Some(AclConfig {
            description: entry.text_at("Description").map(str::to_string),
            rules: Some(rules),
        }))
    }

    fn normalize(&self, mut config: AclConfig) -> AclConfig {
        if let Some(rules) = config.rules.as_mut() {
            for rule in rules.iter_mut() {
                if let Some(code) = rule.protocol.as_deref().and_then(protocol_code) {
                    rule.protocol = Some(protocol_name(&code));
                }
            }
            rules.sort();
        }
        config
    }

    fn validate(&self, config: &AclConfig) -> Result<()> {
        check_len("description", config.description.as_deref(), 127)?;
        let mut ids = Vec::new();
        for rule in config.rules.iter().flatten() {
            check_range("rules.id", rule.id.into(), 0, MAX_RULE_ID.into())?;
            if ids.contains(&rule.id) {
                return Err(ParamError::invalid("rules.id", format!("rule {} listed twice", rule.id)).into());
            }
            ids.push(rule.id);

            if !self.is_advanced() {
                if rule.protocol.is_some() {
                    return Err(ParamError::MutuallyExclusive {
                        first: "rules.protocol",
                        second: "basic ACL",
                    }
                    .into());
                }
                if rule.destination.is_some() {
                    return Err(ParamError::MutuallyExclusive {
                        first: "rules.destination",
                        second: "basic ACL",
                    }
                    .into());
                }
            }
            if let Some(protocol) = &rule.protocol {
                if protocol_code(protocol).is_none() {
                    return Err(ParamError::invalid(
                        "rules.protocol",
                        format!("unknown protocol '{protocol}'"),
                    )
                    .into());
                }
            }
            check_prefix("rules.source", rule.source.as_ref())?;
            check_prefix("rules.destination", rule.destination.as_ref())?;
        }
        Ok(())
    }

    fn build_ops(&self, config: &AclConfig, existing: Option<&AclConfig>) -> Result<Vec<StagedOp>> {
        let mut group = self.group_element();
        if let Some(description) = &config.description {
            group.push(Element::leaf("Description", description));
        }
        let mut acl = Element::new("ACL").with_child(Element::new("Groups").with_child(group));

        if let Some(desired) = &config.rules {
            let current = existing
                .and_then(|e| e.rules.as_deref())
                .unwrap_or_default();

            let mut rules: Vec<Element> = current
                .iter()
                .filter(|c| !desired.iter().any(|d| d.id == c.id))
                .map(|c| self.rule_key(c.id).with_attr("xc:operation", "delete"))
                .collect();
            for rule in desired.iter().filter(|d| !current.contains(*d)) {
                let el = self.rule_element(rule);
                // A changed rule is replaced so stale match fields are dropped.
                rules.push(if current.iter().any(|c| c.id == rule.id) {
                    el.with_attr("xc:operation", "replace")
                } else {
                    el
                });
            }
            if !rules.is_empty() {
                acl.push(Element::new(self.rules_container()).with_children(rules));
            }
        }

        Ok(vec![StagedOp::EditConfig(vec![acl])])
    }

    fn remove_ops(&self, existing: Option<&AclConfig>) -> Result<Vec<StagedOp>> {
        if existing.is_none() {
            return Ok(Vec::new());
        }
        Ok(vec![StagedOp::EditConfig(vec![Element::new("ACL").with_child(
            Element::new("Groups").with_child(self.group_element().with_attr("xc:operation", "delete")),
        )])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permit_any(id: u32) -> AclRule {
        AclRule {
            id,
            action: AclAction::Permit,
            protocol: None,
            source: None,
            destination: None,
        }
    }

    #[test]
    fn test_group_range() {
        assert!(Acl::new(1999).is_err());
        assert!(!Acl::new(2000).unwrap().is_advanced());
        assert!(Acl::new(3999).unwrap().is_advanced());
        assert!(Acl::new(4000).is_err());
    }

    #[test]
    fn test_protocols() {
        assert_eq!(protocol_code("TCP").as_deref(), Some("6"));
        assert_eq!(protocol_code("50").as_deref(), Some("50"));
        assert_eq!(protocol_code("bogus"), None);
        assert_eq!(protocol_name("17"), "udp");
        assert_eq!(protocol_name("50"), "50");
    }

    #[test]
    fn test_decode_advanced() {
        let top = Element::parse(
            "<top><ACL>\
             <Groups><Group><GroupType>1</GroupType><GroupID>3001</GroupID><Description>web</Description></Group></Groups>\
             <IPv4AdvanceRules>\
             <Rule><GroupID>3001</GroupID><RuleID>5</RuleID><Action>2</Action><ProtocolType>6</ProtocolType>\
             <SrcIPv4><SrcIPv4Addr>10.0.0.0</SrcIPv4Addr><SrcIPv4Wildcard>0.0.0.255</SrcIPv4Wildcard></SrcIPv4></Rule>\
             <Rule><GroupID>3001</GroupID><RuleID>0</RuleID><Action>1</Action><ProtocolType>256</ProtocolType></Rule>\
             </IPv4AdvanceRules></ACL></top>",
        )
        .unwrap();
        let config = Acl::new(3001).unwrap().decode(&top).unwrap().unwrap();
        assert_eq!(config.description.as_deref(), Some("web"));
        let rules = config.rules.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, 0);
        assert_eq!(rules[0].action, AclAction::Deny);
        assert_eq!(rules[0].protocol.as_deref(), Some("ip"));
        assert_eq!(rules[1].protocol.as_deref(), Some("tcp"));
        assert_eq!(
            rules[1].source,
            Some(AclPrefix {
                address: "10.0.0.0".into(),
                wildcard: "0.0.0.255".into()
            })
        );
        assert_eq!(rules[1].destination, None);
    }

    #[test]
    fn test_validate_basic_rejects_advanced_fields() {
        let acl = Acl::new(2001).unwrap();
        let mut rule = permit_any(5);
        rule.protocol = Some("tcp".into());
        let config = AclConfig {
            description: None,
            rules: Some(vec![rule]),
        };
        assert!(acl.validate(&config).is_err());

        let dup = AclConfig {
            description: None,
            rules: Some(vec![permit_any(1), permit_any(1)]),
        };
        assert!(acl.validate(&dup).is_err());
    }

    #[test]
    fn test_build_ops_rule_diff() {
        let acl = Acl::new(2001).unwrap();
        let existing = AclConfig {
            description: None,
            rules: Some(vec![permit_any(0), permit_any(5)]),
        };
        let mut changed = permit_any(5);
        changed.action = AclAction::Deny;
        let config = AclConfig {
            description: Some("mgmt".into()),
            rules: Some(vec![changed, permit_any(10)]),
        };

        let ops = acl.build_ops(&config, Some(&existing)).unwrap();
        let StagedOp::EditConfig(els) = &ops[0] else {
            panic!("expected edit-config");
        };
        assert_eq!(els[0].text_at("Groups/Group/Description"), Some("mgmt"));
        let rules = els[0].find_all("IPv4BasicRules/Rule");
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].text_at("RuleID"), Some("0"));
        assert_eq!(rules[0].attr("operation"), Some("delete"));
        assert_eq!(rules[1].text_at("RuleID"), Some("5"));
        assert_eq!(rules[1].attr("operation"), Some("replace"));
        assert_eq!(rules[1].text_at("Action"), Some("1"));
        assert_eq!(rules[2].text_at("RuleID"), Some("10"));
        assert_eq!(rules[2].attr("operation"), None);
    }

    #[test]
    fn test_remove_ops() {
        let acl = Acl::new(3001).unwrap();
        assert!(acl.remove_ops(None).unwrap().is_empty());
        let ops = acl.remove_ops(Some(&AclConfig::default())).unwrap();
        let StagedOp::EditConfig(els) = &ops[0] else {
            panic!("expected edit-config");
        };
        assert_eq!(els[0].find("Groups/Group").unwrap().attr("operation"), Some("delete"));
    }
}

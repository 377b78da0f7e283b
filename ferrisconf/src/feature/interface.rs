//! Physical and logical interface configuration.
//!
//! Interfaces are keyed by IfIndex in the data model. Physical ports always
//! exist; removing one returns it to defaults. Logical interfaces are
//! created and deleted through `<action>`, and until one exists its
//! attributes are set through the CLI since it has no IfIndex yet.

use serde::{Deserialize, Serialize};

use super::{Feature, KeyMap, ValueMap, check_len, check_range, leaves_to_params, params_into, params_to_leaves};
use crate::device::{Device, StagedOp};
use crate::error::{DeviceError, ParamError, Result};
use crate::xml::Element;

const KEY_MAP: KeyMap = &[("description", "Description")];

/// Interface name prefixes, long form first, with the abbreviations the
/// CLI accepts.
const NAME_PREFIXES: &[(&str, &[&str])] = &[
    ("M-GigabitEthernet", &["m-gigabitethernet", "m-ge", "m-gi", "mge"]),
    ("Ten-GigabitEthernet", &["ten-gigabitethernet", "tengigabitethernet", "xge", "te", "ten"]),
    ("Twenty-FiveGigE", &["twenty-fivegige", "wge", "twe"]),
    ("FortyGigE", &["fortygige", "fge", "fo", "for"]),
    ("HundredGigE", &["hundredgige", "hge", "hu", "hun"]),
    ("GigabitEthernet", &["gigabitethernet", "ge", "gi", "gig"]),
    ("Vlan-interface", &["vlan-interface", "vlanif", "vlan", "vl"]),
    ("LoopBack", &["loopback", "loop", "lo"]),
    ("Bridge-Aggregation", &["bridge-aggregation", "bagg", "br"]),
    ("Route-Aggregation", &["route-aggregation", "ragg", "ro"]),
    ("Tunnel", &["tunnel", "tun"]),
];

/// Expand an abbreviated interface name (`ge1/0/1`, `vlan10`) to the form
/// the device reports.
pub fn normalize_interface_name(name: &str) -> String {
    let name = name.trim();
    let split = name
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(name.len());
    let (prefix, number) = name.split_at(split);
    let lower = prefix.trim().to_ascii_lowercase();

    NAME_PREFIXES
        .iter()
        .find(|(_, abbrevs)| abbrevs.contains(&lower.as_str()))
        .map(|(full, _)| format!("{full}{number}"))
        .unwrap_or_else(|| name.to_string())
}

/// Kind of logical interface and its `IfTypeExt` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKind {
    Loopback,
    VlanInterface,
    BridgeAggregation,
    RouteAggregation,
    Tunnel,
}

impl ValueMap for LogicalKind {
    const TABLE: &'static [(Self, &'static str)] = &[
        (LogicalKind::Tunnel, "15"),
        (LogicalKind::Loopback, "16"),
        (LogicalKind::VlanInterface, "41"),
        (LogicalKind::BridgeAggregation, "56"),
        (LogicalKind::RouteAggregation, "67"),
    ];
}

impl LogicalKind {
    /// Kind and number for a normalized logical interface name.
    pub fn parse(name: &str) -> Option<(Self, u32)> {
        let kinds = [
            ("LoopBack", LogicalKind::Loopback),
            ("Vlan-interface", LogicalKind::VlanInterface),
            ("Bridge-Aggregation", LogicalKind::BridgeAggregation),
            ("Route-Aggregation", LogicalKind::RouteAggregation),
            ("Tunnel", LogicalKind::Tunnel),
        ];
        kinds.into_iter().find_map(|(prefix, kind)| {
            name.strip_prefix(prefix)
                .and_then(|n| n.parse().ok())
                .map(|n| (kind, n))
        })
    }
}

/// Whether a normalized name is an Ethernet port.
pub fn is_ethernet(name: &str) -> bool {
    ["GigabitEthernet", "Ten-GigabitEthernet", "Twenty-FiveGigE", "FortyGigE", "HundredGigE", "M-GigabitEthernet"]
        .iter()
        .any(|p| name.starts_with(p) && name[p.len()..].starts_with(|c: char| c.is_ascii_digit()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    Up,
    Down,
}

impl ValueMap for AdminState {
    const TABLE: &'static [(Self, &'static str)] = &[(AdminState::Up, "1"), (AdminState::Down, "2")];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speed {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "10")]
    Mb10,
    #[serde(rename = "100")]
    Mb100,
    #[serde(rename = "1000")]
    Gb1,
    #[serde(rename = "10000")]
    Gb10,
    #[serde(rename = "25000")]
    Gb25,
    #[serde(rename = "40000")]
    Gb40,
    #[serde(rename = "100000")]
    Gb100,
}

impl ValueMap for Speed {
    const TABLE: &'static [(Self, &'static str)] = &[
        (Speed::Auto, "1"),
        (Speed::Mb10, "2"),
        (Speed::Mb100, "4"),
        (Speed::Gb1, "32"),
        (Speed::Gb10, "1024"),
        (Speed::Gb25, "2048"),
        (Speed::Gb40, "8192"),
        (Speed::Gb100, "16384"),
    ];
}

impl Speed {
    fn cli(self) -> &'static str {
        match self {
            Speed::Auto => "auto",
            Speed::Mb10 => "10",
            Speed::Mb100 => "100",
            Speed::Gb1 => "1000",
            Speed::Gb10 => "10000",
            Speed::Gb25 => "25000",
            Speed::Gb40 => "40000",
            Speed::Gb100 => "100000",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duplex {
    Full,
    Half,
    Auto,
}

impl ValueMap for Duplex {
    const TABLE: &'static [(Self, &'static str)] =
        &[(Duplex::Full, "1"), (Duplex::Half, "2"), (Duplex::Auto, "3")];
}

/// Layer 2 (bridged) or layer 3 (routed) port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortLayer {
    Bridged,
    Routed,
}

impl ValueMap for PortLayer {
    const TABLE: &'static [(Self, &'static str)] = &[(PortLayer::Bridged, "1"), (PortLayer::Routed, "2")];
}

impl PortLayer {
    fn cli(self) -> &'static str {
        match self {
            PortLayer::Bridged => "bridge",
            PortLayer::Routed => "route",
        }
    }
}

/// Name, IfIndex and port layer of an interface as the device reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRef {
    pub name: String,
    pub if_index: Option<u32>,
    pub layer: Option<PortLayer>,
}

impl InterfaceRef {
    /// Look up an interface by (possibly abbreviated) name.
    pub async fn lookup(device: &mut Device, name: &str) -> Result<InterfaceRef> {
        let name = normalize_interface_name(name);
        let filter = Element::new("Ifmgr").with_child(
            Element::new("Interfaces").with_child(
                Element::new("Interface")
                    .with_child(Element::leaf("Name", &name))
                    .with_child(Element::new("IfIndex"))
                    .with_child(Element::new("PortLayer")),
            ),
        );
        let top = device.get(filter).await?;
        let found = top
            .find_all("Ifmgr/Interfaces/Interface")
            .into_iter()
            .find(|i| i.text_at("Name").is_some_and(|n| n.eq_ignore_ascii_case(&name)));

        Ok(InterfaceRef {
            if_index: found.and_then(|i| i.text_at("IfIndex")).and_then(|s| s.parse().ok()),
            layer: found.and_then(|i| i.text_at("PortLayer")).and_then(PortLayer::from_code),
            name,
        })
    }

    /// IfIndex, or an error naming the interface.
    pub fn require_index(&self) -> Result<u32> {
        self.if_index.ok_or_else(|| {
            DeviceError::InterfaceNotFound {
                name: self.name.clone(),
            }
            .into()
        })
    }
}

/// An interface identified by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
    if_index: Option<u32>,
    logical: Option<(LogicalKind, u32)>,
}

/// Interface attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<Speed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplex: Option<Duplex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<PortLayer>,
}

impl Interface {
    /// Create a handle from a name and the IfIndex it has, if it exists.
    ///
    /// A name that is neither an Ethernet port nor a logical interface is
    /// rejected.
    pub fn new(name: &str, if_index: Option<u32>) -> Result<Self> {
        let name = normalize_interface_name(name);
        let logical = LogicalKind::parse(&name);
        if logical.is_none() && !is_ethernet(&name) {
            return Err(ParamError::invalid("name", format!("unsupported interface '{name}'")).into());
        }
        if logical.is_none() && if_index.is_none() {
            return Err(DeviceError::InterfaceNotFound { name }.into());
        }
        Ok(Self {
            name,
            if_index,
            logical,
        })
    }

    /// Resolve the IfIndex on the device and create a handle.
    pub async fn resolve(device: &mut Device, name: &str) -> Result<Self> {
        let found = InterfaceRef::lookup(device, name).await?;
        Self::new(&found.name, found.if_index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn if_index(&self) -> Option<u32> {
        self.if_index
    }

    pub fn is_logical(&self) -> bool {
        self.logical.is_some()
    }

    /// Whether the handle carries no IfIndex for a logical interface, which
    /// is the case when it did not exist at resolve time.
    pub fn needs_create(&self) -> bool {
        self.logical.is_some() && self.if_index.is_none()
    }

    fn interfaces(entry: Element) -> Element {
        Element::new("Ifmgr").with_child(Element::new("Interfaces").with_child(entry))
    }

    fn create_op(&self) -> Option<StagedOp> {
        let (kind, number) = self.logical?;
        let entry = Element::new("Interface")
            .with_child(Element::leaf("IfTypeExt", kind.code()))
            .with_child(Element::leaf("Number", number));
        Some(StagedOp::Action(vec![
            Element::new("Ifmgr").with_child(Element::new("LogicInterfaces").with_child(entry)),
        ]))
    }

    fn cli_commands(&self, config: &InterfaceConfig) -> Vec<String> {
        let mut cmds = vec![format!("interface {}", self.name)];
        if let Some(layer) = config.layer {
            cmds.push(format!("port link-mode {}", layer.cli()));
        }
        if let Some(description) = &config.description {
            cmds.push(format!("description {description}"));
        }
        if let Some(speed) = config.speed {
            cmds.push(format!("speed {}", speed.cli()));
        }
        if let Some(duplex) = config.duplex {
            cmds.push(format!("duplex {}", serde_label(&duplex)));
        }
        if let Some(mtu) = config.mtu {
            cmds.push(format!("mtu {mtu}"));
        }
        match config.admin {
            Some(AdminState::Up) => cmds.push("undo shutdown".to_string()),
            Some(AdminState::Down) => cmds.push("shutdown".to_string()),
            None => {}
        }
        cmds
    }
}

fn serde_label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

impl Feature for Interface {
    type Config = InterfaceConfig;

    fn filter(&self) -> Vec<Element> {
        let key = match self.if_index {
            Some(index) => Element::leaf("IfIndex", index),
            None => Element::leaf("Name", &self.name),
        };
        vec![Self::interfaces(Element::new("Interface").with_child(key))]
    }

    fn decode(&self, top: &Element) -> Result<Option<InterfaceConfig>> {
        let Some(entry) = top
            .find_all("Ifmgr/Interfaces/Interface")
            .into_iter()
            .find(|i| match self.if_index {
                Some(index) => i.text_at("IfIndex") == Some(index.to_string().as_str()),
                None => i.text_at("Name").is_some_and(|n| n.eq_ignore_ascii_case(&self.name)),
            })
        else {
            return Ok(None);
        };

        let mut config: InterfaceConfig = params_into(leaves_to_params(entry, KEY_MAP))?;
        config.admin = entry.text_at("AdminStatus").and_then(AdminState::from_code);
        config.layer = entry.text_at("PortLayer").and_then(PortLayer::from_code);
        config.mtu = entry.text_at("ConfigMTU").and_then(|s| s.parse().ok());
        if !self.is_logical() {
            config.speed = entry.text_at("ConfigSpeed").and_then(Speed::from_code);
            config.duplex = entry.text_at("ConfigDuplex").and_then(Duplex::from_code);
        }
        Ok(Some(config))
    }

    fn validate(&self, config: &InterfaceConfig) -> Result<()> {
        check_len("description", config.description.as_deref(), 255)?;
        if let Some(mtu) = config.mtu {
            check_range("mtu", mtu.into(), 46, 9216)?;
        }
        if self.is_logical() {
            for (param, set) in [
                ("speed", config.speed.is_some()),
                ("duplex", config.duplex.is_some()),
                ("layer", config.layer.is_some()),
            ] {
                if set {
                    return Err(ParamError::invalid(
                        param,
                        format!("not supported on logical interface {}", self.name),
                    )
                    .into());
                }
            }
        }
        if config.duplex == Some(Duplex::Half)
            && matches!(
                config.speed,
                Some(Speed::Gb1 | Speed::Gb10 | Speed::Gb25 | Speed::Gb40 | Speed::Gb100)
            )
        {
            return Err(ParamError::MutuallyExclusive {
                first: "duplex half",
                second: "speed of 1000 or more",
            }
            .into());
        }
        Ok(())
    }

    fn build_ops(
        &self,
        config: &InterfaceConfig,
        existing: Option<&InterfaceConfig>,
    ) -> Result<Vec<StagedOp>> {
        let has_settings = *config != InterfaceConfig::default();
        if existing.is_none() {
            let mut ops: Vec<StagedOp> = self.create_op().into_iter().collect();
            if has_settings {
                ops.push(StagedOp::CliConfig(self.cli_commands(config)));
            }
            return Ok(ops);
        }
        // Found by name only, so the data model cannot address it.
        let Some(if_index) = self.if_index else {
            return Ok(if has_settings {
                vec![StagedOp::CliConfig(self.cli_commands(config))]
            } else {
                Vec::new()
            });
        };

        let mut ops = Vec::new();
        // Changing the port layer resets the port, so it goes first on its own.
        if let Some(layer) = config.layer {
            if existing.and_then(|e| e.layer) != Some(layer) {
                ops.push(StagedOp::EditConfig(vec![Self::interfaces(
                    Element::new("Interface")
                        .with_child(Element::leaf("IfIndex", if_index))
                        .with_child(Element::leaf("PortLayer", layer.code())),
                )]));
            }
        }

        let mut entry = Element::new("Interface").with_child(Element::leaf("IfIndex", if_index));
        entry = entry.with_children(params_to_leaves(config, KEY_MAP));
        if let Some(admin) = config.admin {
            entry.push(Element::leaf("AdminStatus", admin.code()));
        }
        if let Some(speed) = config.speed {
            entry.push(Element::leaf("ConfigSpeed", speed.code()));
        }
        if let Some(duplex) = config.duplex {
            entry.push(Element::leaf("ConfigDuplex", duplex.code()));
        }
        if let Some(mtu) = config.mtu {
            entry.push(Element::leaf("ConfigMTU", mtu));
        }
        if entry.children.len() > 1 {
            ops.push(StagedOp::EditConfig(vec![Self::interfaces(entry)]));
        }
        Ok(ops)
    }

    fn remove_ops(&self, existing: Option<&InterfaceConfig>) -> Result<Vec<StagedOp>> {
        if existing.is_none() {
            return Ok(Vec::new());
        }
        let Some(if_index) = self.if_index else {
            return Ok(vec![StagedOp::CliConfig(vec![format!(
                "undo interface {}",
                self.name
            )])]);
        };
        let (container, verb) = if self.is_logical() {
            ("LogicInterfaces", "Remove")
        } else {
            ("Interfaces", "Default")
        };
        let entry = Element::new("Interface")
            .with_child(Element::leaf("IfIndex", if_index))
            .with_child(Element::new(verb));
        Ok(vec![StagedOp::Action(vec![
            Element::new("Ifmgr").with_child(Element::new(container).with_child(entry)),
        ])])
    }
}

//! Device facts: identity, inventory and interface list.

use serde::Serialize;

use crate::device::Device;
use crate::error::Result;
use crate::xml::Element;

/// `Class` code of the chassis entity.
const CHASSIS_CLASS: &str = "3";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facts {
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub software_version: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub interfaces: Vec<String>,
}

fn filter() -> Vec<Element> {
    vec![
        Element::new("Device")
            .with_child(
                Element::new("Base")
                    .with_child(Element::new("HostName"))
                    .with_child(Element::new("Uptime")),
            )
            .with_child(Element::new("PhysicalEntities").with_child(Element::new("Entity"))),
        Element::new("Ifmgr").with_child(
            Element::new("Interfaces")
                .with_child(Element::new("Interface").with_child(Element::new("Name"))),
        ),
    ]
}

/// Facts from a `<top>` reply.
pub fn decode_facts(top: &Element) -> Facts {
    let entities = top.find_all("Device/PhysicalEntities/Entity");
    let chassis = entities
        .iter()
        .find(|e| e.text_at("Class") == Some(CHASSIS_CLASS))
        .or_else(|| entities.iter().find(|e| e.text_at("SerialNumber").is_some()));
    let owned = |path: &str| chassis.and_then(|c| c.text_at(path)).map(str::to_string);

    Facts {
        hostname: top.text_at("Device/Base/HostName").map(str::to_string),
        vendor: owned("MfgName"),
        model: owned("Model").or_else(|| owned("Name")),
        serial_number: owned("SerialNumber"),
        software_version: owned("SoftwareRev"),
        uptime_seconds: top.text_at("Device/Base/Uptime").and_then(|u| u.parse().ok()),
        interfaces: top
            .find_all("Ifmgr/Interfaces/Interface")
            .into_iter()
            .filter_map(|i| i.text_at("Name"))
            .map(str::to_string)
            .collect(),
    }
}

/// Gather facts in one `<get>`.
pub async fn get_facts(device: &mut Device) -> Result<Facts> {
    let top = device.get_many(filter()).await?;
    Ok(decode_facts(&top))
}

//! Per-feature translators between parameters and the Comware data model.
//!
//! Every feature follows the same shape:
//! - a value identifying the managed object (VLAN id, interface, AS number)
//! - a `Config` struct of optional attributes, `serde` serializable
//! - a subtree filter and a decoder for reading current state
//! - builders producing [`StagedOp`]s for creating/updating and removing
//!
//! Builders are pure; the provided async methods on [`Feature`] wire them
//! to a [`Device`].

pub mod acl;
pub mod bgp;
pub mod facts;
pub mod interface;
pub mod ipinterface;
pub mod neighbors;
pub mod ospf;
pub mod portchannel;
pub mod switchport;
pub mod vlan;

use std::fmt::Debug;
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::device::{Device, OpOutcome, StagedOp};
use crate::error::{ParamError, Result};
use crate::xml::Element;

/// Parameter name to XML tag pairs.
pub type KeyMap = &'static [(&'static str, &'static str)];

/// Enumerations encoded as numeric codes in the data model.
pub trait ValueMap: Copy + PartialEq + Sized + 'static {
    /// Variant to code pairs.
    const TABLE: &'static [(Self, &'static str)];

    /// Code sent to the device.
    fn code(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(v, _)| *v == self)
            .map_or("", |(_, code)| code)
    }

    /// Variant for a code read from the device.
    fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::TABLE
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(v, _)| *v)
    }
}

/// A configurable feature of the device.
pub trait Feature: Send + Sync {
    /// Attributes of the managed object. All fields are optional so a
    /// config can describe a partial change.
    type Config: Serialize
        + DeserializeOwned
        + Default
        + Clone
        + PartialEq
        + Debug
        + Send
        + Sync;

    /// `<top>` children used to read current state.
    fn filter(&self) -> Vec<Element>;

    /// Decode current state from the reply `<top>`. `None` when the object
    /// does not exist.
    fn decode(&self, top: &Element) -> Result<Option<Self::Config>>;

    /// Canonical form of a requested config, so it compares equal to what
    /// the device reports.
    fn normalize(&self, config: Self::Config) -> Self::Config {
        config
    }

    /// Cross-field and range checks.
    fn validate(&self, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Ops that move the device to `config`.
    fn build_ops(
        &self,
        config: &Self::Config,
        existing: Option<&Self::Config>,
    ) -> Result<Vec<StagedOp>>;

    /// Ops that remove the object, or return it to defaults where it
    /// cannot be removed.
    fn remove_ops(&self, existing: Option<&Self::Config>) -> Result<Vec<StagedOp>>;

    /// Read current state from the device.
    fn get_config(
        &self,
        device: &mut Device,
    ) -> impl Future<Output = Result<Option<Self::Config>>> + Send {
        async move {
            let top = device.get_many(self.filter()).await?;
            self.decode(&top)
        }
    }

    /// Validate and apply `config`, staging the ops instead when `stage`
    /// is set.
    fn build(
        &self,
        device: &mut Device,
        config: &Self::Config,
        stage: bool,
    ) -> impl Future<Output = Result<Vec<OpOutcome>>> + Send {
        async move {
            let config = self.normalize(config.clone());
            self.validate(&config)?;
            let existing = self.get_config(device).await?;
            let ops = self.build_ops(&config, existing.as_ref())?;
            dispatch(device, ops, stage).await
        }
    }

    /// Remove the object, staging the ops instead when `stage` is set.
    fn remove(
        &self,
        device: &mut Device,
        stage: bool,
    ) -> impl Future<Output = Result<Vec<OpOutcome>>> + Send {
        async move {
            let existing = self.get_config(device).await?;
            let ops = self.remove_ops(existing.as_ref())?;
            dispatch(device, ops, stage).await
        }
    }
}

/// Stage `ops` or run them in order, stopping at the first error.
pub async fn dispatch(
    device: &mut Device,
    ops: Vec<StagedOp>,
    stage: bool,
) -> Result<Vec<OpOutcome>> {
    if stage {
        for op in ops {
            device.stage(op);
        }
        return Ok(Vec::new());
    }
    let mut outcomes = Vec::with_capacity(ops.len());
    for op in ops {
        if op.is_empty() {
            continue;
        }
        outcomes.push(device.execute(op).await?);
    }
    Ok(outcomes)
}

/// Leaves for every non-null parameter of `params` that has a tag in `map`.
pub(crate) fn params_to_leaves(params: &impl Serialize, map: KeyMap) -> Vec<Element> {
    let Ok(Value::Object(fields)) = serde_json::to_value(params) else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(param, tag)| match fields.get(*param) {
            Some(Value::String(s)) => Some(Element::leaf(*tag, s)),
            Some(Value::Number(n)) => Some(Element::leaf(*tag, n)),
            Some(Value::Bool(b)) => Some(Element::leaf(*tag, b)),
            _ => None,
        })
        .collect()
}

/// Parameters for every tag of `map` with text under `el`.
pub(crate) fn leaves_to_params(el: &Element, map: KeyMap) -> Map<String, Value> {
    map.iter()
        .filter_map(|(param, tag)| {
            el.text_at(tag)
                .map(|text| ((*param).to_string(), Value::String(text.to_string())))
        })
        .collect()
}

/// Decode a parameter map into a config, reporting the shape error.
pub(crate) fn params_into<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| ParamError::invalid("config", e.to_string()).into())
}

/// Check an inclusive numeric range.
pub(crate) fn check_range(
    param: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> std::result::Result<(), ParamError> {
    if value < min || value > max {
        return Err(ParamError::OutOfRange {
            param,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Check that a text parameter fits the device's length limit.
pub(crate) fn check_len(
    param: &'static str,
    value: Option<&str>,
    max: usize,
) -> std::result::Result<(), ParamError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ParamError::invalid(
            param,
            format!("must be at most {max} characters"),
        )),
        _ => Ok(()),
    }
}

/// Parse an IPv4 address parameter.
pub(crate) fn parse_ipv4(
    param: &'static str,
    value: &str,
) -> std::result::Result<std::net::Ipv4Addr, ParamError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParamError::invalid(param, format!("'{value}' is not an IPv4 address")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
        Blue,
    }

    impl ValueMap for Color {
        const TABLE: &'static [(Self, &'static str)] = &[(Color::Red, "1"), (Color::Blue, "2")];
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Params {
        name: Option<String>,
        descr: Option<String>,
    }

    const MAP: KeyMap = &[("name", "Name"), ("descr", "Description")];

    #[test]
    fn test_value_map() {
        assert_eq!(Color::Blue.code(), "2");
        assert_eq!(Color::from_code(" 1 "), Some(Color::Red));
        assert_eq!(Color::from_code("9"), None);
    }

    #[test]
    fn test_key_map_both_ways() {
        let params = Params {
            name: Some("web".into()),
            descr: None,
        };
        let leaves = params_to_leaves(&params, MAP);
        assert_eq!(leaves, vec![Element::leaf("Name", "web")]);

        let el = Element::new("VLANID")
            .with_child(Element::leaf("Name", "web"))
            .with_child(Element::leaf("Description", "frontend"));
        let decoded: Params = params_into(leaves_to_params(&el, MAP)).unwrap();
        assert_eq!(decoded.name.as_deref(), Some("web"));
        assert_eq!(decoded.descr.as_deref(), Some("frontend"));
    }

    #[test]
    fn test_checks() {
        assert!(check_range("vlanid", 10, 1, 4094).is_ok());
        assert!(check_range("vlanid", 0, 1, 4094).is_err());
        assert!(check_len("name", Some("abc"), 2).is_err());
        assert!(check_len("name", None, 2).is_ok());
        assert!(parse_ipv4("router_id", "1.1.1.1").is_ok());
        assert!(parse_ipv4("router_id", "1.1.1").is_err());
    }
}

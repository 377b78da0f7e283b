//! Staged operations.
//!
//! Feature modules describe their changes as [`StagedOp`] values. A device
//! either runs an op immediately or queues it; queued ops run in order on
//! `execute_staged()`.

use serde::Serialize;

use crate::xml::Element;

/// One deferred unit of work against the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum StagedOp {
    /// `<edit-config>` on running whose `<top>` holds these elements.
    #[serde(serialize_with = "serialize_elements")]
    EditConfig(Vec<Element>),

    /// Configuration commands run in system view, in order.
    CliConfig(Vec<String>),

    /// Display commands, in order.
    CliDisplay(Vec<String>),

    /// `<action>` whose `<top>` holds these elements.
    #[serde(serialize_with = "serialize_elements")]
    Action(Vec<Element>),

    /// Save running configuration to a file (platform default if `None`).
    Save(Option<String>),

    /// Roll running configuration back to a saved file.
    Rollback(String),
}

impl StagedOp {
    /// Short name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            StagedOp::EditConfig(_) => "edit_config",
            StagedOp::CliConfig(_) => "cli_config",
            StagedOp::CliDisplay(_) => "cli_display",
            StagedOp::Action(_) => "action",
            StagedOp::Save(_) => "save",
            StagedOp::Rollback(_) => "rollback",
        }
    }

    /// Whether the op carries nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            StagedOp::EditConfig(els) | StagedOp::Action(els) => els.is_empty(),
            StagedOp::CliConfig(cmds) | StagedOp::CliDisplay(cmds) => cmds.is_empty(),
            StagedOp::Save(_) | StagedOp::Rollback(_) => false,
        }
    }
}

fn serialize_elements<S>(elements: &[Element], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(elements.iter().map(Element::to_xml))
}

/// Result of running one op.
#[derive(Debug, Clone)]
pub enum OpOutcome {
    /// An RPC that returned `<ok/>` (or data that was not needed).
    Ok,
    /// Normalized CLI output.
    Cli(super::CliResponse),
}

/// Ordered queue of staged ops.
#[derive(Debug, Default)]
pub struct Stage {
    ops: Vec<StagedOp>,
}

impl Stage {
    /// Append an op. Empty ops are dropped.
    pub fn push(&mut self, op: StagedOp) {
        if !op.is_empty() {
            self.ops.push(op);
        }
    }

    /// Queued ops, oldest first.
    pub fn ops(&self) -> &[StagedOp] {
        &self.ops
    }

    /// Remove and return every queued op.
    pub fn take(&mut self) -> Vec<StagedOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ops_are_dropped() {
        let mut stage = Stage::default();
        stage.push(StagedOp::CliConfig(vec![]));
        stage.push(StagedOp::EditConfig(vec![]));
        assert!(stage.is_empty());

        stage.push(StagedOp::Save(None));
        stage.push(StagedOp::CliConfig(vec!["vlan 10".into()]));
        assert_eq!(stage.len(), 2);
        assert_eq!(stage.ops()[0].kind(), "save");

        let taken = stage.take();
        assert_eq!(taken.len(), 2);
        assert!(stage.is_empty());
    }

    #[test]
    fn test_serialize_renders_xml() {
        let op = StagedOp::EditConfig(vec![Element::new("VLAN")]);
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["type"], "edit_config");
        assert_eq!(value["body"][0], "<VLAN/>");

        let op = StagedOp::CliConfig(vec!["vlan 10".into()]);
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["body"][0], "vlan 10");
    }
}

//! Platform definition for vendor-specific configurations.

use std::fmt;
use std::sync::Arc;

use super::VendorBehavior;
use crate::xml::Element;

/// Platform definition containing all vendor-specific configuration.
#[derive(Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "hp_comware", "h3c_comware").
    pub name: String,

    /// Namespace of `<top>` in `<get>` filters and replies.
    pub data_namespace: String,

    /// Namespace of `<top>` in `<edit-config>` bodies.
    pub config_namespace: String,

    /// Namespace of `<top>` in `<action>` bodies.
    pub action_namespace: String,

    /// Patterns that indicate command failure.
    pub failed_when_contains: Vec<String>,

    /// File written by `save` when none is given.
    pub default_save_file: Option<String>,

    /// Optional vendor-specific behavior.
    pub behavior: Option<Arc<dyn VendorBehavior>>,
}

impl PlatformDefinition {
    /// Create a new platform definition with minimal required fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_namespace: String::new(),
            config_namespace: String::new(),
            action_namespace: String::new(),
            failed_when_contains: vec![],
            default_save_file: None,
            behavior: None,
        }
    }

    /// Derive the data, config and action namespaces from a common base,
    /// e.g. `http://www.hp.com/netconf` gives `http://www.hp.com/netconf/data:1.0`.
    pub fn with_namespace_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.data_namespace = format!("{base}/data:1.0");
        self.config_namespace = format!("{base}/config:1.0");
        self.action_namespace = format!("{base}/action:1.0");
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Set the default save file.
    pub fn with_save_file(mut self, file: impl Into<String>) -> Self {
        self.default_save_file = Some(file.into());
        self
    }

    /// Set vendor behavior.
    pub fn with_behavior(mut self, behavior: Arc<dyn VendorBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// `<top>` for filters, holding `children`.
    pub fn data_top(&self, children: impl IntoIterator<Item = Element>) -> Element {
        top(&self.data_namespace, children)
    }

    /// `<top>` for edit-config bodies, holding `children`.
    pub fn config_top(&self, children: impl IntoIterator<Item = Element>) -> Element {
        top(&self.config_namespace, children)
    }

    /// `<top>` for action bodies, holding `children`.
    pub fn action_top(&self, children: impl IntoIterator<Item = Element>) -> Element {
        top(&self.action_namespace, children)
    }
}

fn top(namespace: &str, children: impl IntoIterator<Item = Element>) -> Element {
    Element::new("top")
        .with_attr("xmlns", namespace)
        .with_children(children)
}

impl fmt::Debug for PlatformDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDefinition")
            .field("name", &self.name)
            .field("data_namespace", &self.data_namespace)
            .field("config_namespace", &self.config_namespace)
            .field("action_namespace", &self.action_namespace)
            .field("failed_when_contains", &self.failed_when_contains)
            .field("default_save_file", &self.default_save_file)
            .field(
                "behavior",
                &self.behavior.as_ref().map(|_| "<VendorBehavior>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_base() {
        let platform = PlatformDefinition::new("x").with_namespace_base("http://www.hp.com/netconf/");
        assert_eq!(platform.data_namespace, "http://www.hp.com/netconf/data:1.0");
        assert_eq!(platform.config_namespace, "http://www.hp.com/netconf/config:1.0");
        assert_eq!(platform.action_namespace, "http://www.hp.com/netconf/action:1.0");
    }

    #[test]
    fn test_config_top_wraps_children() {
        let platform = PlatformDefinition::new("x").with_namespace_base("urn:test");
        let top = platform.config_top([Element::new("VLAN")]);
        assert_eq!(top.to_xml(), r#"<top xmlns="urn:test/config:1.0"><VLAN/></top>"#);
    }
}

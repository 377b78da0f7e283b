//! HPE / H3C Comware 7 platform definitions.
//!
//! Both dialects share the data model and CLI; they differ only in the
//! namespace URIs of `<top>`.
//!
//! CLI output returned by the `CLI` RPC echoes every command behind the
//! prompt of the view it ran in:
//!
//! ```text
//! <HPE>display vlan 10
//!  VLAN ID: 10
//! <HPE>system-view
//! System View: return to User View with Ctrl+Z.
//! [HPE]vlan 10
//! [HPE-vlan10]
//! ```

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::platform::{PlatformDefinition, VendorBehavior};

/// Platform name for HPE-branded Comware.
pub const HP_PLATFORM_NAME: &str = "hp_comware";

/// Platform name for H3C-branded Comware.
pub const H3C_PLATFORM_NAME: &str = "h3c_comware";

/// Matches a `<sysname>` or `[sysname-view]` prompt at the start of a line.
static PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:<[\w\-.:@/]+>|\[[\w\-.:@/]+\])").expect("valid regex")
});

/// HPE Comware platform definition.
pub fn hp() -> PlatformDefinition {
    base(HP_PLATFORM_NAME).with_namespace_base("http://www.hp.com/netconf")
}

/// H3C Comware platform definition.
pub fn h3c() -> PlatformDefinition {
    base(H3C_PLATFORM_NAME).with_namespace_base("http://www.h3c.com/netconf")
}

fn base(name: &str) -> PlatformDefinition {
    PlatformDefinition::new(name)
        .with_failure_pattern("% Unrecognized command")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Too many parameters")
        .with_failure_pattern("% Wrong parameter")
        .with_failure_pattern("% Ambiguous command")
        .with_save_file("flash:/startup.cfg")
        .with_behavior(Arc::new(ComwareBehavior))
}

/// Comware-specific behavior.
pub struct ComwareBehavior;

impl VendorBehavior for ComwareBehavior {
    fn normalize_output(&self, raw: &str) -> String {
        raw.lines()
            .filter(|line| !PROMPT.is_match(line))
            .filter(|line| !line.starts_with("System View: return to User View"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches(['\r', '\n'])
            .to_string()
    }

    fn detect_failure(&self, output: &str) -> Option<String> {
        // Errors are reported on their own line with a leading '%'
        output
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("% ") && !line.starts_with("% Info"))
            .map(str::to_string)
    }
}

//! Platform definitions for Comware dialects.
//!
//! A platform names the NETCONF data model namespaces a device speaks and
//! the CLI output patterns that indicate a failed command.

mod definition;
mod registry;
pub mod vendors;

pub use definition::PlatformDefinition;
pub use registry::PlatformRegistry;

/// Trait for vendor-specific behavior.
pub trait VendorBehavior: Send + Sync {
    /// Normalize CLI output (strip prompt and command echo lines).
    fn normalize_output(&self, raw: &str) -> String;

    /// Detect command failure from output.
    fn detect_failure(&self, output: &str) -> Option<String>;
}

/// Default vendor behavior implementation.
pub struct DefaultBehavior;

impl VendorBehavior for DefaultBehavior {
    fn normalize_output(&self, raw: &str) -> String {
        raw.trim_matches(['\r', '\n']).to_string()
    }

    fn detect_failure(&self, _output: &str) -> Option<String> {
        None
    }
}

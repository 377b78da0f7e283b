//! # Ferrisconf
//!
//! Async NETCONF configuration library for HPE Comware switches.
//!
//! Ferrisconf turns declarative feature parameters ("VLAN 10 named web",
//! "BGP AS 65001 with router-id 1.1.1.1") into Comware NETCONF payloads or
//! CLI command batches, and reports the before/after state of each change.
//!
//! ## Features
//!
//! - Async NETCONF over SSH via russh, with base:1.0 and base:1.1 framing
//! - Comware `<top>` data model with HP and H3C namespaces
//! - Staged operations run as a batch that stops at the first error
//! - Feature modules for VLANs, interfaces, switchports, IPv4 addresses,
//!   link aggregation, BGP, OSPF, ACLs, LLDP neighbors and device facts
//! - Idempotent [`apply`] with check mode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrisconf::feature::vlan::{Vlan, VlanConfig};
//! use ferrisconf::{DeviceBuilder, State, apply};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrisconf::Error> {
//!     let mut device = DeviceBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .build()?;
//!
//!     device.open().await?;
//!
//!     let config = VlanConfig {
//!         name: Some("web".into()),
//!         description: None,
//!     };
//!     let result = apply(&mut device, &Vlan::new(10)?, State::Present, &config, false).await?;
//!     println!("changed: {}", result.changed);
//!
//!     device.close().await?;
//!     Ok(())
//! }
//! ```

pub mod apply;
pub mod device;
pub mod error;
pub mod feature;
pub mod netconf;
pub mod platform;
pub mod transport;
pub mod xml;

// Re-export main types for convenience
pub use apply::{ModuleResult, State, apply};
pub use device::{CliResponse, Device, DeviceBuilder, OpOutcome, StagedOp};
pub use error::{Error, Result};
pub use feature::{Feature, ValueMap};
pub use platform::{PlatformDefinition, PlatformRegistry};
pub use transport::{AuthMethod, HostKeyVerification, SshConfig};
pub use xml::Element;

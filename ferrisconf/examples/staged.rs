//! Staged example: queue changes across features and run them as a batch.
//!
//! Stages a VLAN, an access port in it, a BGP instance and a save, prints
//! the queue, then executes it. Execution stops at the first failed op and
//! reports which one it was.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example staged -- --host 192.168.1.1 --user admin --password secret --port-name ge1/0/10
//! ```

use std::env;

use ferrisconf::error::DeviceError;
use ferrisconf::feature::bgp::{Bgp, BgpConfig};
use ferrisconf::feature::switchport::{LinkType, Switchport, SwitchportConfig};
use ferrisconf::feature::vlan::{Vlan, VlanConfig};
use ferrisconf::{DeviceBuilder, Error, Feature, StagedOp};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let arg = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let host = arg("--host").unwrap_or_else(|| "localhost".to_string());
    let user = arg("--user").unwrap_or_else(|| "admin".to_string());
    let password = arg("--password").unwrap_or_default();
    let port_name = arg("--port-name").unwrap_or_else(|| "GigabitEthernet1/0/10".to_string());

    let mut device = DeviceBuilder::new(&host)
        .username(&user)
        .password(&password)
        .build()?;
    device.open().await?;

    let vlan = Vlan::new(100)?;
    let vlan_config = VlanConfig {
        name: Some("servers".into()),
        description: Some("staged example".into()),
    };
    vlan.build(&mut device, &vlan_config, true).await?;

    let switchport = Switchport::resolve(&mut device, &port_name).await?;
    let access = SwitchportConfig {
        link_type: Some(LinkType::Access),
        pvid: Some(100),
        permitted_vlans: None,
    };
    switchport.build(&mut device, &access, true).await?;

    let bgp = Bgp::new(65001)?;
    let bgp_config = BgpConfig {
        router_id: Some("10.255.255.1".into()),
        neighbors: None,
    };
    bgp.build(&mut device, &bgp_config, true).await?;

    device.stage(StagedOp::Save(None));

    println!("Staged operations:");
    for (i, op) in device.staged().iter().enumerate() {
        println!("  {i}: {}", serde_json::to_string(op)?);
    }

    match device.execute_staged().await {
        Ok(outcomes) => println!("\nExecuted {} operations", outcomes.len()),
        Err(Error::Device(DeviceError::StagedFailed { index, kind, source })) => {
            eprintln!("\nStaged op {index} ({kind}) failed: {source}");
        }
        Err(e) => return Err(e.into()),
    }

    device.close().await?;
    Ok(())
}

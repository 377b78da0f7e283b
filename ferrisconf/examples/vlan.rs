//! VLAN example: idempotent create/remove with a change report.
//!
//! Runs `apply` for one VLAN and prints the proposed, existing, delta and
//! end state. Running it twice reports no change the second time.
//!
//! # Usage
//!
//! ```bash
//! # Create or update VLAN 10
//! cargo run --example vlan -- --host 192.168.1.1 --user admin --password secret --vlan 10 --name web
//!
//! # Preview only
//! cargo run --example vlan -- --host 192.168.1.1 --user admin --password secret --vlan 10 --name web --check
//!
//! # Remove it again
//! cargo run --example vlan -- --host 192.168.1.1 --user admin --password secret --vlan 10 --absent
//! ```

use std::env;

use ferrisconf::feature::vlan::{Vlan, VlanConfig, get_vlan_list};
use ferrisconf::{DeviceBuilder, State, apply};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let Some(password) = &args.password else {
        eprintln!("Error: --password is required");
        std::process::exit(1);
    };

    let mut device = DeviceBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(password)
        .build()?;
    device.open().await?;

    let vlan = Vlan::new(args.vlan)?;
    let config = VlanConfig {
        name: args.name.clone(),
        description: args.description.clone(),
    };

    let result = apply(&mut device, &vlan, args.state, &config, args.check).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.changed && !args.check {
        device.save(None).await?;
        println!("Saved running configuration");
    }

    println!("VLANs now present: {:?}", get_vlan_list(&mut device).await?);

    device.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    vlan: u16,
    name: Option<String>,
    description: Option<String>,
    state: State,
    check: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 830,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: None,
            vlan: 1,
            name: None,
            description: None,
            state: State::Present,
            check: false,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            let mut consumed = 2;
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => {
                    parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(parsed.port)
                }
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--vlan" => parsed.vlan = value.and_then(|v| v.parse().ok()).unwrap_or(parsed.vlan),
                "--name" => parsed.name = value,
                "--description" => parsed.description = value,
                "--absent" => {
                    parsed.state = State::Absent;
                    consumed = 1;
                }
                "--check" => {
                    parsed.check = true;
                    consumed = 1;
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    consumed = 1;
                }
            }
            i += consumed;
        }
        parsed
    }
}

//! Facts example: connect to a Comware switch and print what it is.
//!
//! Gathers hostname, model, serial, software version and the interface
//! list in a single NETCONF `<get>`, then prints the LLDP neighbor table.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example facts -- --host 192.168.1.1 --user admin --password secret
//!
//! # H3C-branded switch
//! cargo run --example facts -- --host 192.168.1.1 --user admin --password secret --platform h3c_comware
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ferrisconf::DeviceBuilder;
use ferrisconf::feature::facts::get_facts;
use ferrisconf::feature::neighbors::get_neighbors;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{}...", args.host, args.port);

    let mut builder = DeviceBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .platform(&args.platform)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let mut device = builder.build()?;
    device.open().await?;
    println!("Connected!\n");

    let facts = get_facts(&mut device).await?;
    println!("{}", serde_json::to_string_pretty(&facts)?);

    println!("\nLLDP neighbors:");
    println!("{}", "-".repeat(50));
    for neighbor in get_neighbors(&mut device).await? {
        println!(
            "{:<28} {:<20} {}",
            neighbor.local_port,
            neighbor.system_name.as_deref().unwrap_or("-"),
            neighbor.remote_port.as_deref().unwrap_or("-"),
        );
    }
    println!("{}", "-".repeat(50));

    device.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    platform: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 830u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = None;
        let mut key = None;
        let mut platform = "hp_comware".to_string();
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => host = value.unwrap_or(host),
                "--port" | "-p" => port = value.and_then(|v| v.parse().ok()).unwrap_or(port),
                "--user" | "-u" => user = value.unwrap_or(user),
                "--password" | "-P" => password = value,
                "--key" | "-k" => key = value.map(PathBuf::from),
                "--platform" => platform = value.unwrap_or(platform),
                "--timeout" | "-t" => {
                    timeout = value.and_then(|v| v.parse().ok()).unwrap_or(timeout)
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            platform,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"ferrisconf facts example

USAGE:
    cargo run --example facts -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        NETCONF port [default: 830]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    --platform <NAME>        hp_comware or h3c_comware [default: hp_comware]
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}

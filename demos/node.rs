//! Run a node on UDP and drive it from stdin.
//!
//! `cargo run --example node -- --port 7890`
//! `cargo run --example node -- --port 7891 --bootstrap 127.0.0.1:7890`

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};

use vanishing_dht::{cli::Cli, rpc::UdpTransport, Dht};

#[derive(Parser)]
struct Args {
    /// Address to listen on, also what other nodes reach us at
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,
    /// UDP port to listen on
    #[arg(short, long, default_value_t = 7890)]
    port: u16,
    /// Address of a node to join the network through
    #[arg(short, long)]
    bootstrap: Option<SocketAddr>,
    /// Seed the node id and random number generator
    #[arg(short, long)]
    seed: Option<u64>,
    /// Log every request
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::TRACE } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let transport = UdpTransport::bind(SocketAddr::new(args.host, args.port)).await?;

    let mut builder = Dht::builder();
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let dht = builder.build(transport);

    info!(id = %dht.id(), address = %dht.local_addr(), "Node is running");

    if let Some(bootstrap) = args.bootstrap {
        match dht.bootstrap(bootstrap).await {
            Ok(contacts) => info!(closest = contacts.len(), "Bootstrapped"),
            Err(error) => warn!(?error, "Failed to bootstrap"),
        }
    }

    let mut cli = Cli::new(dht);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim() == "quit" {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        println!("{}", cli.execute_line(&line).await);
    }

    Ok(())
}

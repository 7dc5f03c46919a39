use std::error::Error;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpStream;
use tokio::time::timeout;

use btc_peer::session::{PeerAddresses, Session};
use btc_peer::ChannelSettings;

#[derive(Parser)]
#[command(name = "btc-cli")]
struct Cli {
    #[arg(long)]
    node: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Ping,
    GetAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    println!("Connecting to {}", cli.node);
    let stream = timeout(Duration::from_secs(30), TcpStream::connect(&cli.node)).await??;

    let session = Session::new(stream, ChannelSettings::default());
    let version = session.handshake().await?;
    println!(
        "Connected to {} (protocol {})",
        version.user_agent, version.version
    );

    match cli.command {
        Commands::Ping => {
            let pong = session.ping().await?;
            println!("Pong received (nonce {:#018x})", pong.nonce);
        }
        Commands::GetAddr => match session.get_addresses().await? {
            PeerAddresses::V2(entries) => {
                println!("Received {} peer addresses (addrv2)", entries.len());
                for entry in entries.iter().take(10) {
                    println!("  {:?} port {}", entry.addr, entry.port);
                }
            }
            PeerAddresses::Legacy(entries) => {
                println!("Received {} peer addresses (addr)", entries.len());
                for entry in entries.iter().take(10) {
                    println!("  {}:{}", entry.addr.ip, entry.addr.port);
                }
            }
        },
    }

    Ok(())
}

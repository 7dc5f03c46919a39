use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use btc_peer::session::{PeerAddresses, Session};
use btc_peer::wire::constants::MAINNET_DNS_SEEDS;
use btc_peer::ChannelSettings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Walks the mainnet DNS seeds, performs the handshake on a peer channel
/// and asks each seed node for the peer addresses it knows.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    for node in MAINNET_DNS_SEEDS {
        println!("Connecting to: {node}");

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(*node)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                println!("Failed to connect to {node}: {err}, skipping...");
                continue;
            }
            Err(_) => {
                println!("Timeout connecting to {node}, skipping...");
                continue;
            }
        };

        let session = Session::new(stream, ChannelSettings::default());

        let version = match session.handshake().await {
            Ok(version) => version,
            Err(err) => {
                println!("Handshake with {node} failed: {err}, skipping...");
                continue;
            }
        };
        println!(
            "Handshake complete: {} (protocol {}, {:?})",
            version.user_agent, version.version, version.services
        );

        match session.get_addresses().await {
            Ok(PeerAddresses::V2(entries)) => {
                println!("Received {} peer addresses (addrv2) from {node}", entries.len());
            }
            Ok(PeerAddresses::Legacy(entries)) => {
                println!("Received {} peer addresses (addr) from {node}", entries.len());
            }
            Err(err) => {
                println!("getaddr against {node} failed: {err}");
            }
        }
    }

    Ok(())
}

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::oneshot;

use btc_peer::net::ChannelProxy;
use btc_peer::session::Session;
use btc_peer::wire::constants::MAINNET_DNS_SEEDS;
use btc_peer::wire::message::Pong;
use btc_peer::ChannelSettings;

/// Prints every verified frame a peer sends us.
fn print_frames(proxy: Arc<ChannelProxy>) {
    let again = Arc::clone(&proxy);
    proxy.subscribe_raw(move |frame| {
        if let Ok((header, payload)) = frame {
            println!(
                "Received Command: {:?}, payload_len: {}",
                header.command(),
                payload.len()
            );
            print_frames(again);
        }
    });
}

/// Answers pings so the peer keeps the connection alive.
fn answer_pings(proxy: Arc<ChannelProxy>) {
    let again = Arc::clone(&proxy);
    proxy.subscribe_ping(move |ping| {
        if let Ok(ping) = ping {
            again.send(&Pong { nonce: ping.nonce }, |result| {
                if result.is_ok() {
                    println!("→ Sent Pong");
                }
            });
            answer_pings(again);
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let node = std::env::args()
        .nth(1)
        .unwrap_or_else(|| MAINNET_DNS_SEEDS[0].to_string());

    println!("Connecting to: {node}");
    let stream = TcpStream::connect(&node).await?;

    let session = Session::new(stream, ChannelSettings::default());
    let version = session.handshake().await?;
    println!(
        "Handshake complete: {} (protocol {})",
        version.user_agent, version.version
    );

    print_frames(session.channel().proxy());
    answer_pings(session.channel().proxy());

    // Run until the peer goes away or a timer tears the channel down.
    let (stop_tx, stop_rx) = oneshot::channel();
    session.channel().subscribe_stop(move |reason| {
        let _ = stop_tx.send(reason);
    });
    if let Err(reason) = stop_rx.await? {
        println!("Channel stopped: {reason}");
    }

    Ok(())
}

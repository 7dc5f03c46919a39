use tokio::net::TcpStream;
use tokio::sync::oneshot;

use crate::net::{Channel, ChannelError, ChannelSettings};
use crate::wire::constants::PROTOCOL_VERSION;
use crate::wire::message::{
    AddrEntry, AddrV2Entry, GetAddr, Ping, Pong, SendAddrV2, Services, Verack, VersionMessage,
};
use crate::wire::payload::Encode;

/// Peer addresses from a `getaddr` exchange: `addrv2` (BIP 155) when the
/// peer supports it, the legacy `addr` message otherwise.
#[derive(Debug)]
pub enum PeerAddresses {
    V2(Vec<AddrV2Entry>),
    Legacy(Vec<AddrEntry>),
}

/// Async convenience layer over a [`Channel`]: the version/verack
/// handshake and simple request/response exchanges, bridging the
/// channel's callback subscriptions to `async` with oneshot channels.
///
/// Handshake flow, signalling BIP 155 support:
///
/// ```text
///   → send version
///   ← recv version
///   → send sendaddrv2    ← BEFORE verack
///   → send verack
///   ← recv verack        -- handshake complete
/// ```
pub struct Session {
    channel: Channel,
}

impl Session {
    pub fn new(stream: TcpStream, settings: ChannelSettings) -> Self {
        Self {
            channel: Channel::new(stream, settings),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Starts the channel and performs the version/verack exchange.
    /// Returns the peer's `version` message.
    pub async fn handshake(&self) -> Result<VersionMessage, ChannelError> {
        let (version_tx, version_rx) = oneshot::channel();
        self.channel.subscribe_version(move |version| {
            let _ = version_tx.send(version);
        });
        let (verack_tx, verack_rx) = oneshot::channel();
        self.channel.subscribe_verack(move |verack| {
            let _ = verack_tx.send(verack);
        });

        self.channel.start();

        let local = VersionMessage::local(PROTOCOL_VERSION, Services::NONE);
        self.send(&local).await?;

        let version = version_rx
            .await
            .map_err(|_| ChannelError::ChannelStopped)??;

        // Signal addrv2 support before our verack; peers that understand
        // BIP 155 will answer getaddr with addrv2 instead of addr.
        self.send(&SendAddrV2).await?;
        self.send(&Verack).await?;

        verack_rx.await.map_err(|_| ChannelError::ChannelStopped)??;

        Ok(version)
    }

    /// Sends one message and waits for its write completion.
    pub async fn send<M: Encode>(&self, message: &M) -> Result<(), ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.channel.send(message, move |result| {
            let _ = tx.send(result);
        });
        rx.await.map_err(|_| ChannelError::ChannelStopped)?
    }

    /// Pings the peer and waits for the answering pong.
    pub async fn ping(&self) -> Result<Pong, ChannelError> {
        use rand::Rng;

        let (pong_tx, pong_rx) = oneshot::channel();
        self.channel.subscribe_pong(move |pong| {
            let _ = pong_tx.send(pong);
        });

        let nonce: u64 = rand::thread_rng().r#gen();
        self.send(&Ping { nonce }).await?;

        let pong = pong_rx.await.map_err(|_| ChannelError::ChannelStopped)??;
        if pong.nonce != nonce {
            tracing::warn!(
                sent = nonce,
                received = pong.nonce,
                "pong nonce does not match ping"
            );
        }
        Ok(pong)
    }

    /// Requests peer addresses, preferring `addrv2` over the legacy
    /// `addr` reply.
    pub async fn get_addresses(&self) -> Result<PeerAddresses, ChannelError> {
        let (v2_tx, v2_rx) = oneshot::channel();
        self.channel.subscribe_addrv2(move |entries| {
            let _ = v2_tx.send(entries);
        });
        let (legacy_tx, legacy_rx) = oneshot::channel();
        self.channel.subscribe_addr(move |entries| {
            let _ = legacy_tx.send(entries);
        });

        self.send(&GetAddr).await?;

        tokio::select! {
            entries = v2_rx => Ok(PeerAddresses::V2(
                entries.map_err(|_| ChannelError::ChannelStopped)??,
            )),
            entries = legacy_rx => Ok(PeerAddresses::Legacy(
                entries.map_err(|_| ChannelError::ChannelStopped)??,
            )),
        }
    }
}

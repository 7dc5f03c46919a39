use std::io;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::deadline::Deadline;
use super::dispatch::{Dispatch, Strand};
use super::error::ChannelError;
use super::registry::MessageRegistry;
use super::subscriber::Subscriber;
use crate::wire::codec::{payload_checksum, MessageHeader, CHECKSUM_SIZE, HEADER_BASE_SIZE, HEADER_SIZE};
use crate::wire::constants::MAIN_NET_MAGIC;
use crate::wire::message::{
    AddrEntry, AddrV2Entry, Block, BlockHeader, GetAddr, GetBlocks, GetData, GetHeaders, Inv,
    NotFound, Ping, Pong, Tx, Verack, VersionMessage,
};
use crate::wire::payload::Encode;

/// Largest payload a peer may announce, matching Bitcoin Core's 32 MiB
/// network buffer bound.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 0x0200_0000;

/// Per-channel configuration: network magic, timer durations, and the
/// inbound payload bound.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Network identifier expected in every inbound frame and stamped on
    /// every outbound one.
    pub magic: u32,
    /// Hard cap on channel lifetime. Jittered per arm so a batch of
    /// simultaneously opened channels does not expire in lockstep.
    pub expiration: Duration,
    /// Re-armed after every inbound read step; firing means the peer went
    /// quiet mid-frame or between frames.
    pub inactivity: Duration,
    /// Application work opportunity on an otherwise idle channel; firing
    /// never terminates the channel.
    pub revival: Duration,
    /// Fraction by which the expiration duration is randomized, e.g. 0.2
    /// for ±20%.
    pub expiration_jitter: f64,
    /// Frames announcing a larger payload stop the channel before any
    /// allocation happens.
    pub max_payload_size: u32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            magic: MAIN_NET_MAGIC,
            expiration: Duration::from_secs(90 * 60),
            inactivity: Duration::from_secs(30 * 60),
            revival: Duration::from_secs(60),
            expiration_jitter: 0.2,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// Owning handle for one peer channel.
///
/// Construct it around an already-connected socket, register interest via
/// the `subscribe_*` methods, then call [`ChannelProxy::start`] exactly
/// once. Dropping the handle stops the channel; pending reads, timers and
/// handler deliveries keep the underlying proxy alive until the stop
/// completes, so no callback ever touches freed channel state.
pub struct Channel {
    proxy: Arc<ChannelProxy>,
}

impl Channel {
    /// Binds a channel to a connected socket. Must be called from within
    /// the tokio runtime that will run the channel.
    pub fn new(stream: TcpStream, settings: ChannelSettings) -> Self {
        Self {
            proxy: ChannelProxy::new(stream, settings),
        }
    }

    /// A shared handle for use inside subscriber callbacks.
    pub fn proxy(&self) -> Arc<ChannelProxy> {
        Arc::clone(&self.proxy)
    }
}

impl Deref for Channel {
    type Target = ChannelProxy;

    fn deref(&self) -> &ChannelProxy {
        &self.proxy
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.proxy.stop(ChannelError::ChannelStopped);
    }
}

struct SubscriberSet {
    version: Arc<Subscriber<VersionMessage>>,
    verack: Arc<Subscriber<Verack>>,
    addr: Arc<Subscriber<Vec<AddrEntry>>>,
    addrv2: Arc<Subscriber<Vec<AddrV2Entry>>>,
    getaddr: Arc<Subscriber<GetAddr>>,
    ping: Arc<Subscriber<Ping>>,
    pong: Arc<Subscriber<Pong>>,
    inv: Arc<Subscriber<Inv>>,
    getdata: Arc<Subscriber<GetData>>,
    notfound: Arc<Subscriber<NotFound>>,
    getblocks: Arc<Subscriber<GetBlocks>>,
    getheaders: Arc<Subscriber<GetHeaders>>,
    headers: Arc<Subscriber<Vec<BlockHeader>>>,
    tx: Arc<Subscriber<Tx>>,
    block: Arc<Subscriber<Block>>,
    raw: Arc<Subscriber<(MessageHeader, Vec<u8>)>>,
    stop: Arc<Subscriber<()>>,
}

impl SubscriberSet {
    fn new(dispatch: &Dispatch) -> Self {
        Self {
            version: Arc::new(Subscriber::new(dispatch.clone())),
            verack: Arc::new(Subscriber::new(dispatch.clone())),
            addr: Arc::new(Subscriber::new(dispatch.clone())),
            addrv2: Arc::new(Subscriber::new(dispatch.clone())),
            getaddr: Arc::new(Subscriber::new(dispatch.clone())),
            ping: Arc::new(Subscriber::new(dispatch.clone())),
            pong: Arc::new(Subscriber::new(dispatch.clone())),
            inv: Arc::new(Subscriber::new(dispatch.clone())),
            getdata: Arc::new(Subscriber::new(dispatch.clone())),
            notfound: Arc::new(Subscriber::new(dispatch.clone())),
            getblocks: Arc::new(Subscriber::new(dispatch.clone())),
            getheaders: Arc::new(Subscriber::new(dispatch.clone())),
            headers: Arc::new(Subscriber::new(dispatch.clone())),
            tx: Arc::new(Subscriber::new(dispatch.clone())),
            block: Arc::new(Subscriber::new(dispatch.clone())),
            raw: Arc::new(Subscriber::new(dispatch.clone())),
            stop: Arc::new(Subscriber::new(dispatch.clone())),
        }
    }

    fn registry(&self) -> MessageRegistry {
        let mut registry = MessageRegistry::new();
        registry.register("version", Arc::clone(&self.version));
        registry.register("verack", Arc::clone(&self.verack));
        registry.register("addr", Arc::clone(&self.addr));
        registry.register("addrv2", Arc::clone(&self.addrv2));
        registry.register("getaddr", Arc::clone(&self.getaddr));
        registry.register("ping", Arc::clone(&self.ping));
        registry.register("pong", Arc::clone(&self.pong));
        registry.register("inv", Arc::clone(&self.inv));
        registry.register("getdata", Arc::clone(&self.getdata));
        registry.register("notfound", Arc::clone(&self.notfound));
        registry.register("getblocks", Arc::clone(&self.getblocks));
        registry.register("getheaders", Arc::clone(&self.getheaders));
        registry.register("headers", Arc::clone(&self.headers));
        registry.register("tx", Arc::clone(&self.tx));
        registry.register("block", Arc::clone(&self.block));
        registry
    }
}

/// The channel proxy owns the socket, the timers, the message registry
/// and every subscriber, and drives the inbound read pipeline.
///
/// All operations are non-blocking; results arrive through handlers run
/// on the worker pool. The stop transition, outbound writes and inbound
/// decoding are serialized on the channel's strand.
pub struct ChannelProxy {
    weak: Weak<ChannelProxy>,
    settings: ChannelSettings,
    address: Option<SocketAddr>,
    dispatch: Dispatch,
    strand: Strand,
    stopped: AtomicBool,
    stop_signal: watch::Sender<bool>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    expiration: Deadline,
    inactivity: Deadline,
    revival: Deadline,
    revival_handler: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    subscribers: SubscriberSet,
    registry: MessageRegistry,
}

impl ChannelProxy {
    fn new(stream: TcpStream, settings: ChannelSettings) -> Arc<Self> {
        let dispatch = Dispatch::new();
        let address = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let subscribers = SubscriberSet::new(&dispatch);
        let registry = subscribers.registry();
        let (stop_signal, _) = watch::channel(false);

        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            address,
            strand: dispatch.strand(),
            stopped: AtomicBool::new(false),
            stop_signal,
            reader: Mutex::new(Some(read_half)),
            writer: AsyncMutex::new(Some(write_half)),
            expiration: Deadline::new(dispatch.clone()),
            inactivity: Deadline::new(dispatch.clone()),
            revival: Deadline::new(dispatch.clone()),
            revival_handler: Mutex::new(None),
            subscribers,
            registry,
            settings,
            dispatch,
        })
    }

    /// Launches the read pipeline and arms all three timers. Call once.
    pub fn start(&self) {
        let Some(proxy) = self.weak.upgrade() else {
            return;
        };
        if let Some(reader) = self.reader.lock().unwrap().take() {
            self.dispatch.spawn(read_loop(proxy, reader));
        }
        self.start_timers();
    }

    /// Remote endpoint snapshot; the unspecified address when the endpoint
    /// was already unavailable at construction.
    pub fn address(&self) -> SocketAddr {
        self.address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    /// Observable terminal flag.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Enqueues the transition to the stopped state with `reason`.
    /// Safe to call repeatedly and from any task; only the first transition
    /// takes effect.
    pub fn stop(&self, reason: ChannelError) {
        if self.stopped() {
            return;
        }
        let Some(proxy) = self.weak.upgrade() else {
            return;
        };
        self.strand.sync(async move {
            proxy.do_stop(reason).await;
        });
    }

    async fn do_stop(&self, reason: ChannelError) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(address = %self.address(), %reason, "channel stopping");

        self.clear_timers();
        let _ = self.stop_signal.send(true);

        // Shutter the socket; a failed shutdown changes nothing about the
        // stop itself.
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        self.clear_subscriptions(reason);
    }

    fn clear_timers(&self) {
        self.expiration.cancel();
        self.inactivity.cancel();
        self.revival.cancel();
        self.revival_handler.lock().unwrap().take();
    }

    /// Typed subscribers learn only that the channel stopped; the raw and
    /// stop subscribers receive the actual terminal reason.
    fn clear_subscriptions(&self, reason: ChannelError) {
        let subs = &self.subscribers;
        subs.version.relay(Err(ChannelError::ChannelStopped));
        subs.verack.relay(Err(ChannelError::ChannelStopped));
        subs.addr.relay(Err(ChannelError::ChannelStopped));
        subs.addrv2.relay(Err(ChannelError::ChannelStopped));
        subs.getaddr.relay(Err(ChannelError::ChannelStopped));
        subs.ping.relay(Err(ChannelError::ChannelStopped));
        subs.pong.relay(Err(ChannelError::ChannelStopped));
        subs.inv.relay(Err(ChannelError::ChannelStopped));
        subs.getdata.relay(Err(ChannelError::ChannelStopped));
        subs.notfound.relay(Err(ChannelError::ChannelStopped));
        subs.getblocks.relay(Err(ChannelError::ChannelStopped));
        subs.getheaders.relay(Err(ChannelError::ChannelStopped));
        subs.headers.relay(Err(ChannelError::ChannelStopped));
        subs.tx.relay(Err(ChannelError::ChannelStopped));
        subs.block.relay(Err(ChannelError::ChannelStopped));
        subs.raw.relay(Err(reason.clone()));
        subs.stop.relay(Err(reason));
    }

    fn start_timers(&self) {
        if self.stopped() {
            return;
        }
        self.start_expiration();
        self.start_revival();
        self.start_inactivity();
    }

    fn start_expiration(&self) {
        if self.stopped() {
            return;
        }
        let Some(proxy) = self.weak.upgrade() else {
            return;
        };
        let timeout = jittered(self.settings.expiration, self.settings.expiration_jitter);
        self.expiration.start(timeout, move |status| {
            if status.canceled() || proxy.stopped() {
                return;
            }
            info!(address = %proxy.address(), "channel lifetime expired");
            proxy.stop(ChannelError::ChannelTimeout);
        });
    }

    fn start_inactivity(&self) {
        if self.stopped() {
            return;
        }
        let Some(proxy) = self.weak.upgrade() else {
            return;
        };
        self.inactivity.start(self.settings.inactivity, move |status| {
            if status.canceled() || proxy.stopped() {
                return;
            }
            info!(address = %proxy.address(), "channel inactivity timeout");
            proxy.stop(ChannelError::ChannelTimeout);
        });
    }

    fn start_revival(&self) {
        if self.stopped() {
            return;
        }
        let Some(proxy) = self.weak.upgrade() else {
            return;
        };
        self.revival.start(self.settings.revival, move |status| {
            if status.canceled() || proxy.stopped() {
                return;
            }
            let handler = proxy.revival_handler.lock().unwrap().take();
            if let Some(handler) = handler {
                handler();
            }
        });
    }

    /// Re-arms the revival timer; the caller signals continued interest in
    /// the channel.
    pub fn reset_revival(&self) {
        if self.stopped() {
            return;
        }
        self.start_revival();
    }

    /// Installs the one-shot handler invoked when the revival timer fires.
    pub fn set_revival_handler(&self, handler: impl FnOnce() + Send + 'static) {
        if self.stopped() {
            return;
        }
        *self.revival_handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Encodes `message`, stamps a header and submits the frame.
    pub fn send<M: Encode>(
        &self,
        message: &M,
        handle_send: impl FnOnce(Result<(), ChannelError>) + Send + 'static,
    ) {
        let payload = message.encode();
        let header = MessageHeader::for_payload(self.settings.magic, message.command(), &payload);
        self.send_raw(header, payload, handle_send);
    }

    /// Writes `header` + `payload` as one atomic write. Concurrent sends
    /// are serialized on the channel's strand so frames never interleave
    /// on the wire.
    pub fn send_raw(
        &self,
        header: MessageHeader,
        payload: Vec<u8>,
        handle_send: impl FnOnce(Result<(), ChannelError>) + Send + 'static,
    ) {
        if self.stopped() {
            handle_send(Err(ChannelError::ChannelStopped));
            return;
        }
        let Some(proxy) = self.weak.upgrade() else {
            handle_send(Err(ChannelError::ChannelStopped));
            return;
        };
        self.strand.sync(async move {
            if proxy.stopped() {
                handle_send(Err(ChannelError::ChannelStopped));
                return;
            }
            debug!(
                address = %proxy.address(),
                command = header.command_name(),
                bytes = payload.len(),
                "send"
            );

            let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
            frame.extend_from_slice(&header.encode());
            frame.extend_from_slice(&payload);

            let result = {
                let mut writer = proxy.writer.lock().await;
                match writer.as_mut() {
                    Some(writer) => writer.write_all(&frame).await.map_err(ChannelError::from),
                    None => Err(ChannelError::ChannelStopped),
                }
            };
            if let Err(reason) = &result {
                if !matches!(reason, ChannelError::ChannelStopped) {
                    warn!(address = %proxy.address(), %reason, "channel send failure");
                    proxy.stop(reason.clone());
                }
            }
            handle_send(result);
        });
    }

    pub fn subscribe_version(
        &self,
        handler: impl FnOnce(Result<VersionMessage, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.version.subscribe(handler);
    }

    pub fn subscribe_verack(
        &self,
        handler: impl FnOnce(Result<Verack, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.verack.subscribe(handler);
    }

    pub fn subscribe_addr(
        &self,
        handler: impl FnOnce(Result<Vec<AddrEntry>, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.addr.subscribe(handler);
    }

    pub fn subscribe_addrv2(
        &self,
        handler: impl FnOnce(Result<Vec<AddrV2Entry>, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.addrv2.subscribe(handler);
    }

    pub fn subscribe_getaddr(
        &self,
        handler: impl FnOnce(Result<GetAddr, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.getaddr.subscribe(handler);
    }

    pub fn subscribe_ping(
        &self,
        handler: impl FnOnce(Result<Ping, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.ping.subscribe(handler);
    }

    pub fn subscribe_pong(
        &self,
        handler: impl FnOnce(Result<Pong, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.pong.subscribe(handler);
    }

    pub fn subscribe_inv(&self, handler: impl FnOnce(Result<Inv, ChannelError>) + Send + 'static) {
        self.subscribers.inv.subscribe(handler);
    }

    pub fn subscribe_getdata(
        &self,
        handler: impl FnOnce(Result<GetData, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.getdata.subscribe(handler);
    }

    pub fn subscribe_notfound(
        &self,
        handler: impl FnOnce(Result<NotFound, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.notfound.subscribe(handler);
    }

    pub fn subscribe_getblocks(
        &self,
        handler: impl FnOnce(Result<GetBlocks, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.getblocks.subscribe(handler);
    }

    pub fn subscribe_getheaders(
        &self,
        handler: impl FnOnce(Result<GetHeaders, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.getheaders.subscribe(handler);
    }

    pub fn subscribe_headers(
        &self,
        handler: impl FnOnce(Result<Vec<BlockHeader>, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.headers.subscribe(handler);
    }

    pub fn subscribe_tx(&self, handler: impl FnOnce(Result<Tx, ChannelError>) + Send + 'static) {
        self.subscribers.tx.subscribe(handler);
    }

    pub fn subscribe_block(
        &self,
        handler: impl FnOnce(Result<Block, ChannelError>) + Send + 'static,
    ) {
        self.subscribers.block.subscribe(handler);
    }

    /// Receives every checksum-verified frame as `(header, payload)`,
    /// before command dispatch.
    pub fn subscribe_raw(
        &self,
        handler: impl FnOnce(Result<(MessageHeader, Vec<u8>), ChannelError>) + Send + 'static,
    ) {
        self.subscribers.raw.subscribe(handler);
    }

    /// Receives the terminal reason when the channel stops.
    pub fn subscribe_stop(
        &self,
        handler: impl FnOnce(Result<(), ChannelError>) + Send + 'static,
    ) {
        self.subscribers.stop.subscribe(handler);
    }
}

/// Randomizes `duration` within ±`fraction` so simultaneously opened
/// channels do not all expire at the same instant.
fn jittered(duration: Duration, fraction: f64) -> Duration {
    let fraction = fraction.clamp(0.0, 1.0);
    if fraction == 0.0 {
        return duration;
    }
    let scale = rand::thread_rng().gen_range(1.0 - fraction..=1.0 + fraction);
    duration.mul_f64(scale)
}

enum Step {
    Done,
    Stopped,
    Failed(io::Error),
}

async fn read_step(
    reader: &mut OwnedReadHalf,
    buf: &mut [u8],
    stop_signal: &mut watch::Receiver<bool>,
) -> Step {
    tokio::select! {
        result = reader.read_exact(buf) => match result {
            Ok(_) => Step::Done,
            Err(err) => Step::Failed(err),
        },
        _ = stop_signal.changed() => Step::Stopped,
    }
}

/// Strict serial inbound pipeline: base header, checksum, payload.
///
/// Decoding runs on the channel strand so the next header read is issued
/// before any subscriber work happens; a slow handler cannot starve the
/// read pipeline. The inactivity timer is re-armed after every completed
/// read step.
async fn read_loop(proxy: Arc<ChannelProxy>, mut reader: OwnedReadHalf) {
    let mut stop_signal = proxy.stop_signal.subscribe();
    let mut base = [0u8; HEADER_BASE_SIZE];
    let mut checksum = [0u8; CHECKSUM_SIZE];

    loop {
        if proxy.stopped() {
            return;
        }

        // Magic, command and payload length.
        match read_step(&mut reader, &mut base, &mut stop_signal).await {
            Step::Done => {}
            Step::Stopped => return,
            Step::Failed(err) => {
                let reason = ChannelError::from(err);
                debug!(address = %proxy.address(), %reason, "channel failure");
                proxy.stop(reason);
                return;
            }
        }
        let mut header = MessageHeader::parse_base(&base);
        if header.magic != proxy.settings.magic {
            warn!(
                address = %proxy.address(),
                magic = %format_args!("{:#010x}", header.magic),
                "invalid header received"
            );
            proxy.stop(ChannelError::bad_stream("invalid magic"));
            return;
        }
        if header.payload_length > proxy.settings.max_payload_size {
            warn!(
                address = %proxy.address(),
                command = header.command_name(),
                bytes = header.payload_length,
                "oversized payload announced"
            );
            proxy.stop(ChannelError::bad_stream("oversized payload"));
            return;
        }
        debug!(
            address = %proxy.address(),
            command = header.command_name(),
            bytes = header.payload_length,
            "receive"
        );
        proxy.start_inactivity();

        // The checksum is its own read step, so a peer disconnecting
        // between header and checksum surfaces here rather than as a
        // header failure.
        match read_step(&mut reader, &mut checksum, &mut stop_signal).await {
            Step::Done => {}
            Step::Stopped => return,
            Step::Failed(err) => {
                let reason = ChannelError::from(err);
                warn!(address = %proxy.address(), %reason, "invalid checksum read");
                proxy.stop(reason);
                return;
            }
        }
        header.checksum = u32::from_le_bytes(checksum);
        proxy.start_inactivity();

        let mut payload = vec![0u8; header.payload_length as usize];
        match read_step(&mut reader, &mut payload, &mut stop_signal).await {
            Step::Done => {}
            Step::Stopped => return,
            Step::Failed(err) => {
                let reason = ChannelError::from(err);
                warn!(address = %proxy.address(), %reason, "invalid payload read");
                proxy.stop(reason);
                return;
            }
        }
        if payload_checksum(&payload) != header.checksum {
            warn!(
                address = %proxy.address(),
                command = header.command_name(),
                "invalid checksum received"
            );
            proxy.stop(ChannelError::bad_stream("invalid checksum"));
            return;
        }

        // The frame is verified: publish it raw, then hand decoding to the
        // strand and loop straight into the next header read.
        proxy
            .subscribers
            .raw
            .relay(Ok((header.clone(), payload.clone())));

        let decoder = Arc::clone(&proxy);
        proxy.strand.sync(async move {
            if decoder.stopped() {
                return;
            }
            match decoder.registry.dispatch(header.command_name(), &payload) {
                Ok(true) => {}
                Ok(false) => debug!(
                    address = %decoder.address(),
                    command = header.command_name(),
                    "unhandled command"
                ),
                Err(reason) => {
                    warn!(address = %decoder.address(), %reason, "invalid payload received");
                    decoder.stop(reason);
                }
            }
        });
        proxy.start_inactivity();
    }
}

use sha2::{Digest, Sha256};
use std::fmt::{Debug, Formatter, Result};
use std::io;

/// Implemented by types that can be decoded from a raw Bitcoin message
/// payload.
///
/// `cursor` is advanced past the consumed bytes; the message registry
/// uses the final position to warn about trailing bytes left in an
/// otherwise valid payload.
pub trait Decode: Sized {
    fn decode(payload: &[u8], cursor: &mut usize) -> io::Result<Self>;
}

/// Known Bitcoin P2P commands.
///
/// See:
/// https://developer.bitcoin.org/reference/p2p_networking.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Control
    Version,
    Verack,
    Addr,
    AddrV2,
    SendAddrV2,
    GetAddr,
    Ping,
    Pong,
    SendHeaders,
    SendCmpct,
    FeeFilter,
    Reject,
    Alert,
    // Data
    Inv,
    GetData,
    NotFound,
    GetBlocks,
    GetHeaders,
    Headers,
    Block,
    Tx,
    GetBlockTxn,
    BlockTxn,
    CmpctBlock,
    Mempool,
    MerkleBlock,
    // Bloom filter
    FilterLoad,
    FilterAdd,
    FilterClear,

    Unknown,
}

impl From<&[u8; 12]> for Command {
    fn from(bytes: &[u8; 12]) -> Self {
        let cmd = std::str::from_utf8(bytes)
            .unwrap_or("")
            .trim_matches(char::from(0));

        match cmd {
            "version" => Command::Version,
            "verack" => Command::Verack,
            "addr" => Command::Addr,
            "addrv2" => Command::AddrV2,
            "sendaddrv2" => Command::SendAddrV2,
            "getaddr" => Command::GetAddr,
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "sendheaders" => Command::SendHeaders,
            "sendcmpct" => Command::SendCmpct,
            "feefilter" => Command::FeeFilter,
            "reject" => Command::Reject,
            "alert" => Command::Alert,
            "inv" => Command::Inv,
            "getdata" => Command::GetData,
            "notfound" => Command::NotFound,
            "getblocks" => Command::GetBlocks,
            "getheaders" => Command::GetHeaders,
            "headers" => Command::Headers,
            "block" => Command::Block,
            "tx" => Command::Tx,
            "getblocktxn" => Command::GetBlockTxn,
            "blocktxn" => Command::BlockTxn,
            "cmpctblock" => Command::CmpctBlock,
            "mempool" => Command::Mempool,
            "merkleblock" => Command::MerkleBlock,
            "filterload" => Command::FilterLoad,
            "filteradd" => Command::FilterAdd,
            "filterclear" => Command::FilterClear,
            _ => Command::Unknown,
        }
    }
}

impl Command {
    /// The ASCII command name as it appears, NUL-trimmed, on the wire.
    /// Empty for [`Command::Unknown`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Verack => "verack",
            Command::Addr => "addr",
            Command::AddrV2 => "addrv2",
            Command::SendAddrV2 => "sendaddrv2",
            Command::GetAddr => "getaddr",
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::SendHeaders => "sendheaders",
            Command::SendCmpct => "sendcmpct",
            Command::FeeFilter => "feefilter",
            Command::Reject => "reject",
            Command::Alert => "alert",
            Command::Inv => "inv",
            Command::GetData => "getdata",
            Command::NotFound => "notfound",
            Command::GetBlocks => "getblocks",
            Command::GetHeaders => "getheaders",
            Command::Headers => "headers",
            Command::Block => "block",
            Command::Tx => "tx",
            Command::GetBlockTxn => "getblocktxn",
            Command::BlockTxn => "blocktxn",
            Command::CmpctBlock => "cmpctblock",
            Command::Mempool => "mempool",
            Command::MerkleBlock => "merkleblock",
            Command::FilterLoad => "filterload",
            Command::FilterAdd => "filteradd",
            Command::FilterClear => "filterclear",
            Command::Unknown => "",
        }
    }

    /// Returns the 12-byte command field as defined by the Bitcoin P2P
    /// protocol.
    ///
    /// The command string is ASCII and padded with zero bytes.
    pub fn as_bytes(&self) -> [u8; 12] {
        let name = self.as_str().as_bytes();

        let mut padded = [0u8; 12];
        padded[..name.len()].copy_from_slice(name);
        padded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAddr {
    pub services: u64,
    pub ip: std::net::IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct VersionMessage {
    pub version: i32,
    pub services: Services,
    pub timestamp: i64,
    pub addr_recv: NetAddr,
    pub addr_from: NetAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: Option<bool>,
}

/// `verack` carries no payload; the type exists so the handshake
/// acknowledgment gets its own typed subscriber.
#[derive(Debug, Clone, Copy)]
pub struct Verack;

/// `getaddr` carries no payload.
#[derive(Debug, Clone, Copy)]
pub struct GetAddr;

/// `sendaddrv2` (BIP 155) carries no payload. Sent before `verack` to
/// request `addrv2` responses; inbound it needs no typed subscriber.
#[derive(Debug, Clone, Copy)]
pub struct SendAddrV2;

/// `ping` with the BIP 31 nonce; zero for pre-BIP 31 peers that send an
/// empty payload.
#[derive(Debug, Clone, Copy)]
pub struct Ping {
    pub nonce: u64,
}

/// `pong`, echoing the nonce of the ping it answers.
#[derive(Debug, Clone, Copy)]
pub struct Pong {
    pub nonce: u64,
}

#[derive(Debug, Clone)]
pub struct AddrEntry {
    pub timestamp: u32,
    pub addr: NetAddr,
}

/// Network-specific address payload from an `addrv2` message (BIP 155).
///
/// Each variant carries exactly the bytes defined by the BIP 155 registry:
///
/// | ID   | Variant      | Length  |
/// |------|--------------|---------|
/// | 0x01 | IPv4         | 4 B     |
/// | 0x02 | IPv6         | 16 B    |
/// | 0x03 | TorV2        | 10 B    | (deprecated — Tor v2 shut down Oct 2021)
/// | 0x04 | TorV3        | 32 B    |
/// | 0x05 | I2P          | 32 B    |
/// | 0x06 | CJDNS        | 16 B    |
/// | 0x07 | Yggdrasil    | 16 B    |
///
/// https://github.com/bitcoin/bips/blob/master/bip-0155.mediawiki
#[derive(Debug, Clone)]
pub enum AddrV2Addr {
    IPv4(std::net::Ipv4Addr),
    IPv6(std::net::Ipv6Addr),
    TorV2([u8; 10]),
    TorV3([u8; 32]),
    I2P([u8; 32]),
    Cjdns(std::net::Ipv6Addr),
    Yggdrasil(std::net::Ipv6Addr),
    Unknown { network_id: u8, bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct AddrV2Entry {
    pub timestamp: u32,
    /// Services encoded as a CompactSize (varint) on the wire, expanded to u64.
    pub services: u64,
    pub addr: AddrV2Addr,
    pub port: u16,
}

/// A Bitcoin block header (exactly 80 bytes on the wire).
///
/// Layout (little-endian fields unless otherwise noted):
///
/// ```text
/// 4  bytes  version
/// 32 bytes  previous block hash
/// 32 bytes  merkle root
/// 4  bytes  timestamp (Unix epoch)
/// 4  bytes  nBits (compact target encoding)
/// 4  bytes  nonce
/// ```
///
/// Reference:
/// https://developer.bitcoin.org/reference/block_chain.html#block-headers
///
/// In `headers` messages, each header is followed by a CompactSize
/// transaction count (always zero). The transaction data is NOT included.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_blockhash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Computes the block header hash (block ID).
    ///
    /// The block hash is defined as: SHA256(SHA256(header_bytes)).
    ///
    /// The returned hash is in little-endian byte order, matching the
    /// internal representation used on the wire. For human-readable
    /// display (block explorers), the bytes must be reversed.
    pub fn hash(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(80);

        bytes.extend(&self.version.to_le_bytes());
        bytes.extend(&self.prev_blockhash);
        bytes.extend(&self.merkle_root);
        bytes.extend(&self.time.to_le_bytes());
        bytes.extend(&self.bits.to_le_bytes());
        bytes.extend(&self.nonce.to_le_bytes());

        let hash = Sha256::digest(Sha256::digest(&bytes));

        let mut result = [0u8; 32];
        result.copy_from_slice(&hash);
        result
    }
}

/// A minimally decoded Bitcoin block as received via the P2P `block`
/// message: the 80-byte header, the CompactSize transaction count, and the
/// total serialized payload size. Transactions are not decoded at this
/// layer.
///
/// Reference (serialized block format):
/// https://developer.bitcoin.org/reference/block_chain.html#serialized-blocks
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub tx_count: u64,
    pub serialized_size: usize,
}

/// A raw transaction, opaque at the channel layer. Consensus decoding is
/// a concern of the validation layers above.
#[derive(Debug, Clone)]
pub struct Tx {
    pub raw: Vec<u8>,
}

/// Inventory object types used in `inv`, `getdata`, and `notfound`
/// messages, serialized as little-endian 32-bit unsigned integers.
///
/// Defined by the Bitcoin P2P protocol:
/// https://developer.bitcoin.org/reference/p2p_networking.html#data-messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryType {
    /// Error / undefined type.
    Error,

    /// Transaction (legacy txid-based).
    Tx,

    /// Full block.
    Block,

    /// Filtered block (BIP37).
    FilteredBlock,

    /// Compact block (BIP152).
    CompactBlock,

    /// Witness transaction (BIP144).
    WitnessTx,

    /// Witness block (BIP144).
    WitnessBlock,

    /// Witness filtered block (BIP144).
    WitnessFilteredBlock,

    /// Unassigned value, preserved for forward compatibility.
    Unknown(u32),
}

impl InventoryType {
    pub fn to_u32(self) -> u32 {
        match self {
            InventoryType::Error => 0,
            InventoryType::Tx => 1,
            InventoryType::Block => 2,
            InventoryType::FilteredBlock => 3,
            InventoryType::CompactBlock => 4,
            InventoryType::WitnessTx => 0x4000_0001,
            InventoryType::WitnessBlock => 0x4000_0002,
            InventoryType::WitnessFilteredBlock => 0x4000_0003,
            InventoryType::Unknown(value) => value,
        }
    }

    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => InventoryType::Error,
            1 => InventoryType::Tx,
            2 => InventoryType::Block,
            3 => InventoryType::FilteredBlock,
            4 => InventoryType::CompactBlock,
            0x4000_0001 => InventoryType::WitnessTx,
            0x4000_0002 => InventoryType::WitnessBlock,
            0x4000_0003 => InventoryType::WitnessFilteredBlock,
            other => InventoryType::Unknown(other),
        }
    }

    /// Serialize the inventory type to little-endian bytes for wire usage.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.to_u32().to_le_bytes()
    }
}

/// One `{type, hash}` inventory vector.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    pub kind: InventoryType,
    pub hash: [u8; 32],
}

/// `inv` — objects a peer announces it has.
#[derive(Debug, Clone)]
pub struct Inv(pub Vec<InventoryItem>);

/// `getdata` — objects we ask a peer to deliver.
#[derive(Debug, Clone)]
pub struct GetData(pub Vec<InventoryItem>);

/// `notfound` — objects a peer could not deliver for a `getdata`.
#[derive(Debug, Clone)]
pub struct NotFound(pub Vec<InventoryItem>);

/// `getblocks` — request block inventories after the best locator match.
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#getblocks
#[derive(Debug, Clone)]
pub struct GetBlocks {
    pub version: i32,
    pub locator: Vec<[u8; 32]>,
    pub stop: [u8; 32],
}

/// `getheaders` — same shape as `getblocks`, answered with `headers`.
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#getheaders
#[derive(Debug, Clone)]
pub struct GetHeaders {
    pub version: i32,
    pub locator: Vec<[u8; 32]>,
    pub stop: [u8; 32],
}

/// Service flags as defined by the Bitcoin P2P protocol.
///
/// This is a bitfield (`u64`) transmitted in the `version` message.
/// Each bit represents a capability supported by the node.
///
/// Official reference:
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
///
/// The flags are forward-compatible: unknown bits must be preserved.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Services(u64);

impl Services {
    /// Creates a new `Services` from raw bits.
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bitfield value.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns true if no bits are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    // ---- Assigned Service Flags ----

    /// 0x00 — Unnamed
    ///
    /// This node is not a full node.
    /// It may not be able to provide any data except for transactions it originates.
    pub const NONE: Services = Services(0x00);

    /// 0x01 — NODE_NETWORK
    ///
    /// This is a full node and can be asked for full blocks.
    /// It should implement all protocol features available in
    /// its self-reported protocol version.
    pub const NODE_NETWORK: Services = Services(0x01);

    /// 0x02 — NODE_GETUTXO
    ///
    /// This node can respond to `getutxo` requests.
    /// Defined in BIP64.
    ///
    /// Not supported by currently maintained Bitcoin Core versions.
    pub const NODE_GETUTXO: Services = Services(0x02);

    /// 0x04 — NODE_BLOOM
    ///
    /// Supports bloom-filtered connections.
    /// Defined in BIP111.
    pub const NODE_BLOOM: Services = Services(0x04);

    /// 0x08 — NODE_WITNESS
    ///
    /// Can provide blocks and transactions including witness data.
    /// Defined in BIP144.
    pub const NODE_WITNESS: Services = Services(0x08);

    /// 0x10 — NODE_XTHIN
    ///
    /// Supports Xtreme Thinblocks.
    ///
    /// Not supported by currently maintained Bitcoin Core versions.
    pub const NODE_XTHIN: Services = Services(0x10);

    /// 0x0400 — NODE_NETWORK_LIMITED
    ///
    /// Same as NODE_NETWORK but guarantees at least the last 288 blocks
    /// (~2 days).
    /// Defined in BIP159.
    pub const NODE_NETWORK_LIMITED: Services = Services(0x0400);

    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();

        if self.is_empty() {
            names.push("NONE");
            return names;
        }

        if self.contains(Self::NODE_NETWORK) {
            names.push("NODE_NETWORK");
        }
        if self.contains(Self::NODE_GETUTXO) {
            names.push("NODE_GETUTXO");
        }
        if self.contains(Self::NODE_BLOOM) {
            names.push("NODE_BLOOM");
        }
        if self.contains(Self::NODE_WITNESS) {
            names.push("NODE_WITNESS");
        }
        if self.contains(Self::NODE_XTHIN) {
            names.push("NODE_XTHIN");
        }
        if self.contains(Self::NODE_NETWORK_LIMITED) {
            names.push("NODE_NETWORK_LIMITED");
        }

        names
    }
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.is_empty() {
            return write!(f, "Services(NONE)");
        }

        let names = self.names().join(" | ");

        write!(f, "Services({}) [0x{:016x}]", names, self.bits())
    }
}

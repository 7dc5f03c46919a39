use byteorder::{LittleEndian, WriteBytesExt};
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::wire::message::{
    AddrEntry, Command, GetAddr, GetBlocks, GetData, GetHeaders, Inv, InventoryItem,
    InventoryType, NetAddr, NotFound, Ping, Pong, SendAddrV2, Services, Tx, Verack, VersionMessage,
};

/// Implemented by messages that can be sent down a channel: the command
/// that names them on the wire and the serialized payload body.
pub trait Encode {
    fn command(&self) -> Command;
    fn encode(&self) -> Vec<u8>;
}

impl VersionMessage {
    /// A minimal local `version` suitable for initiating a handshake:
    /// current timestamp, random nonce, zeroed addresses, empty user
    /// agent.
    ///
    /// The payload layout is:
    ///
    /// ```text
    /// int32    version
    /// uint64   services
    /// int64    timestamp
    /// net_addr addr_recv
    /// net_addr addr_from
    /// uint64   nonce
    /// var_str  user_agent
    /// int32    start_height
    /// bool     relay
    /// ```
    ///
    /// Reference:
    /// https://developer.bitcoin.org/reference/p2p_networking.html#version
    pub fn local(protocol_version: i32, services: Services) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0);

        let unspecified = NetAddr {
            services: 0,
            ip: std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
            port: 0,
        };

        VersionMessage {
            version: protocol_version,
            services,
            timestamp,
            addr_recv: unspecified.clone(),
            addr_from: unspecified,
            nonce: rand::thread_rng().r#gen(),
            user_agent: String::new(),
            start_height: 0,
            relay: Some(false),
        }
    }
}

impl Encode for VersionMessage {
    fn command(&self) -> Command {
        Command::Version
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload = vec![];

        // Writing into a Vec cannot fail.
        payload
            .write_i32::<LittleEndian>(self.version)
            .expect("write to vec");
        payload
            .write_u64::<LittleEndian>(self.services.bits())
            .expect("write to vec");
        payload
            .write_i64::<LittleEndian>(self.timestamp)
            .expect("write to vec");

        write_net_addr(&self.addr_recv, &mut payload);
        write_net_addr(&self.addr_from, &mut payload);

        payload
            .write_u64::<LittleEndian>(self.nonce)
            .expect("write to vec");

        write_varint(self.user_agent.len() as u64, &mut payload);
        payload.extend_from_slice(self.user_agent.as_bytes());

        payload
            .write_i32::<LittleEndian>(self.start_height)
            .expect("write to vec");
        if let Some(relay) = self.relay {
            payload.push(relay as u8);
        }

        payload
    }
}

impl Encode for Verack {
    fn command(&self) -> Command {
        Command::Verack
    }

    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

impl Encode for GetAddr {
    fn command(&self) -> Command {
        Command::GetAddr
    }

    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

impl Encode for SendAddrV2 {
    fn command(&self) -> Command {
        Command::SendAddrV2
    }

    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

impl Encode for Ping {
    fn command(&self) -> Command {
        Command::Ping
    }

    fn encode(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }
}

impl Encode for Pong {
    fn command(&self) -> Command {
        Command::Pong
    }

    fn encode(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }
}

impl Encode for Inv {
    fn command(&self) -> Command {
        Command::Inv
    }

    fn encode(&self) -> Vec<u8> {
        encode_inventory(&self.0)
    }
}

impl Encode for GetData {
    fn command(&self) -> Command {
        Command::GetData
    }

    fn encode(&self) -> Vec<u8> {
        encode_inventory(&self.0)
    }
}

impl Encode for NotFound {
    fn command(&self) -> Command {
        Command::NotFound
    }

    fn encode(&self) -> Vec<u8> {
        encode_inventory(&self.0)
    }
}

impl Encode for GetBlocks {
    fn command(&self) -> Command {
        Command::GetBlocks
    }

    fn encode(&self) -> Vec<u8> {
        encode_locator(self.version, &self.locator, &self.stop)
    }
}

impl Encode for GetHeaders {
    fn command(&self) -> Command {
        Command::GetHeaders
    }

    fn encode(&self) -> Vec<u8> {
        encode_locator(self.version, &self.locator, &self.stop)
    }
}

impl Encode for Vec<AddrEntry> {
    fn command(&self) -> Command {
        Command::Addr
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload = vec![];
        write_varint(self.len() as u64, &mut payload);
        for entry in self {
            payload.extend_from_slice(&entry.timestamp.to_le_bytes());
            write_net_addr(&entry.addr, &mut payload);
        }
        payload
    }
}

impl Encode for Tx {
    fn command(&self) -> Command {
        Command::Tx
    }

    fn encode(&self) -> Vec<u8> {
        self.raw.clone()
    }
}

impl GetData {
    /// Requests one full block including witness data.
    ///
    /// Uses MSG_WITNESS_BLOCK (0x40000002) instead of MSG_BLOCK (2):
    /// MSG_BLOCK allows peers to answer with the legacy "stripped"
    /// serialization, while MSG_WITNESS_BLOCK requires NODE_WITNESS peers
    /// to include witness data (BIP144).
    ///
    /// https://github.com/bitcoin/bips/blob/master/bip-0144.mediawiki
    pub fn witness_block(hash: [u8; 32]) -> Self {
        GetData(vec![InventoryItem {
            kind: InventoryType::WitnessBlock,
            hash,
        }])
    }
}

impl GetHeaders {
    /// A `getheaders` request from a block locator.
    ///
    /// The peer finds the first locator hash it recognizes in its active
    /// chain and returns up to 2000 headers after that block, stopping
    /// early at `stop` when it is non-zero.
    ///
    /// https://developer.bitcoin.org/reference/p2p_networking.html#getheaders
    pub fn from_locator(protocol_version: i32, locator: Vec<[u8; 32]>) -> Self {
        GetHeaders {
            version: protocol_version,
            locator,
            stop: [0u8; 32], // no stop
        }
    }
}

/// Encodes a NetAddr field (26 bytes: services + 16-byte IP + port) as
/// used in version / addr payloads. IPv4 uses the standard ::ffff:
/// mapping.
fn write_net_addr(addr: &NetAddr, out: &mut Vec<u8>) {
    out.extend_from_slice(&addr.services.to_le_bytes());
    let ip = match addr.ip {
        std::net::IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        std::net::IpAddr::V6(v6) => v6,
    };
    out.extend_from_slice(&ip.octets());
    out.extend_from_slice(&addr.port.to_be_bytes());
}

fn encode_inventory(items: &[InventoryItem]) -> Vec<u8> {
    let mut payload = vec![];
    write_varint(items.len() as u64, &mut payload);
    for item in items {
        payload.extend_from_slice(&item.kind.to_le_bytes());
        payload.extend_from_slice(&item.hash);
    }
    payload
}

fn encode_locator(version: i32, locator: &[[u8; 32]], stop: &[u8; 32]) -> Vec<u8> {
    let mut payload = vec![];
    payload.extend_from_slice(&version.to_le_bytes());
    write_varint(locator.len() as u64, &mut payload);
    for hash in locator {
        payload.extend_from_slice(hash);
    }
    payload.extend_from_slice(stop);
    payload
}

/// Writes Bitcoin `CompactSize` (varint) to output.
///
/// This matches wire encoding used by inventory counts, vector lengths,
/// and many transaction/block fields.
///
/// Reference:
/// https://developer.bitcoin.org/reference/transactions.html#compactsize-unsigned-integers
fn write_varint(value: u64, out: &mut Vec<u8>) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend(&value.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::Decode;

    #[test]
    fn local_version_round_trips_through_decoder() {
        let local = VersionMessage::local(70016, Services::NODE_NETWORK);
        let payload = local.encode();

        let mut cursor = 0;
        let decoded = VersionMessage::decode(&payload, &mut cursor).unwrap();

        assert_eq!(cursor, payload.len());
        assert_eq!(decoded.version, 70016);
        assert_eq!(decoded.services.bits(), Services::NODE_NETWORK.bits());
        assert_eq!(decoded.nonce, local.nonce);
        assert_eq!(decoded.user_agent, "");
        assert_eq!(decoded.relay, Some(false));
    }

    #[test]
    fn version_with_user_agent_keeps_it() {
        let mut local = VersionMessage::local(70015, Services::NONE);
        local.user_agent = "/Satoshi:25.0.0/".to_string();

        let decoded = VersionMessage::decode(&local.encode(), &mut 0).unwrap();
        assert_eq!(decoded.user_agent, "/Satoshi:25.0.0/");
    }

    #[test]
    fn empty_messages_have_empty_payloads() {
        assert!(Verack.encode().is_empty());
        assert!(GetAddr.encode().is_empty());
        assert!(SendAddrV2.encode().is_empty());
        assert_eq!(Verack.command(), Command::Verack);
        assert_eq!(GetAddr.command(), Command::GetAddr);
        assert_eq!(SendAddrV2.command(), Command::SendAddrV2);
    }

    #[test]
    fn ping_pong_carry_the_nonce() {
        let payload = Ping { nonce: 0x0102_0304 }.encode();
        assert_eq!(payload, 0x0102_0304u64.to_le_bytes());

        let pong = Pong::decode(&payload, &mut 0).unwrap();
        assert_eq!(pong.nonce, 0x0102_0304);
    }

    #[test]
    fn witness_block_getdata_round_trips() {
        let request = GetData::witness_block([0x5A; 32]);
        let payload = request.encode();

        // varint count 1, then MSG_WITNESS_BLOCK little-endian.
        assert_eq!(payload[0], 1);
        assert_eq!(&payload[1..5], &0x4000_0002u32.to_le_bytes());

        let decoded = GetData::decode(&payload, &mut 0).unwrap();
        assert_eq!(decoded.0.len(), 1);
        assert_eq!(decoded.0[0].kind, InventoryType::WitnessBlock);
        assert_eq!(decoded.0[0].hash, [0x5A; 32]);
    }

    #[test]
    fn getheaders_from_locator_round_trips() {
        let request = GetHeaders::from_locator(70016, vec![[0x11; 32], [0x22; 32]]);
        let payload = request.encode();

        let mut cursor = 0;
        let decoded = GetHeaders::decode(&payload, &mut cursor).unwrap();
        assert_eq!(cursor, payload.len());
        assert_eq!(decoded.version, 70016);
        assert_eq!(decoded.locator.len(), 2);
        assert_eq!(decoded.stop, [0u8; 32]);
    }

    #[test]
    fn addr_entries_round_trip_with_ffff_mapping() {
        let entries = vec![AddrEntry {
            timestamp: 1700000100,
            addr: NetAddr {
                services: 1,
                ip: std::net::IpAddr::V4(std::net::Ipv4Addr::new(1, 2, 3, 4)),
                port: 8333,
            },
        }];
        let payload = entries.encode();

        let decoded = Vec::<AddrEntry>::decode(&payload, &mut 0).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].addr, entries[0].addr);
        assert_eq!(decoded[0].timestamp, 1700000100);
    }

    #[test]
    fn varint_boundary_values() {
        let mut out = vec![];
        write_varint(0xFC, &mut out);
        assert_eq!(out, vec![0xFC]);

        out.clear();
        write_varint(0xFD, &mut out);
        assert_eq!(out, vec![0xFD, 0xFD, 0x00]);

        out.clear();
        write_varint(0x1_0000, &mut out);
        assert_eq!(out, vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
    }
}

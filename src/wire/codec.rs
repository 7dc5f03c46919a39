use sha2::{Digest, Sha256};

use crate::wire::message::Command;

/// Size of the full message header on the wire:
/// magic (4) + command (12) + payload length (4) + checksum (4).
pub const HEADER_SIZE: usize = 24;

/// Size of the trailing checksum field.
pub const CHECKSUM_SIZE: usize = 4;

/// Leading portion of the header (magic, command, payload length). The
/// inbound pipeline reads this first and fetches the checksum as its own
/// step, so a peer that disconnects mid-header is distinguishable from
/// one that disconnects before the checksum.
pub const HEADER_BASE_SIZE: usize = HEADER_SIZE - CHECKSUM_SIZE;

/// The 24-byte Bitcoin P2P message header.
///
/// ```text
/// +------------+--------------+---------------+-------------+
/// | magic (4)  | command (12) | length (4 LE) | checksum (4)|
/// +------------+--------------+---------------+-------------+
/// ```
///
/// The checksum is the first 4 bytes of `SHA256(SHA256(payload))`, read
/// little-endian. The command is ASCII padded with zero bytes.
///
/// Protocol reference:
/// https://developer.bitcoin.org/reference/p2p_networking.html#message-headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u32,
    pub command: [u8; 12],
    pub payload_length: u32,
    pub checksum: u32,
}

impl MessageHeader {
    /// Stamps a header for an outbound payload, computing length and
    /// checksum.
    pub fn for_payload(magic: u32, command: Command, payload: &[u8]) -> Self {
        Self {
            magic,
            command: command.as_bytes(),
            payload_length: payload.len() as u32,
            checksum: payload_checksum(payload),
        }
    }

    /// Parses the leading header fields; the checksum arrives in a later
    /// read step and starts out as zero.
    pub fn parse_base(bytes: &[u8; HEADER_BASE_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            command: bytes[4..16].try_into().unwrap(),
            payload_length: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            checksum: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..16].copy_from_slice(&self.command);
        bytes[16..20].copy_from_slice(&self.payload_length.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// The known command this header names, or [`Command::Unknown`].
    pub fn command(&self) -> Command {
        Command::from(&self.command)
    }

    /// The command field as a trimmed ASCII string; empty for non-ASCII
    /// garbage, which no registry entry will match.
    pub fn command_name(&self) -> &str {
        std::str::from_utf8(&self.command)
            .map(|name| name.trim_end_matches('\0'))
            .unwrap_or("")
    }
}

/// First 4 bytes of `SHA256(SHA256(payload))`, read little-endian.
///
/// The double-SHA256 construction is used throughout the protocol (block
/// hashes, txids, frame checksums) and is consensus-critical.
pub fn payload_checksum(payload: &[u8]) -> u32 {
    let digest = Sha256::digest(Sha256::digest(payload));
    u32::from_le_bytes(digest[..4].try_into().unwrap())
}

/// A complete frame (header + payload) for `command` on the network
/// identified by `magic`.
pub fn encode_frame(magic: u32, command: Command, payload: &[u8]) -> Vec<u8> {
    let header = MessageHeader::for_payload(magic, command, payload);
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(payload);
    frame
}

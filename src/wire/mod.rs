//! Bitcoin P2P wire protocol primitives.
//!
//! This module provides the 24-byte message header codec, the command
//! catalog, and the typed protocol messages with their [`Decode`] and
//! [`Encode`] implementations. The channel layer in [`crate::net`]
//! consumes these to turn socket bytes into typed subscriber events.
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html

pub mod codec;
pub mod constants;
pub mod decode;
pub mod message;
pub mod payload;

pub use codec::{encode_frame, payload_checksum, MessageHeader};
pub use message::{Command, Decode};
pub use payload::Encode;

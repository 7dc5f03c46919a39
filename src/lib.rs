//! Peer channel core for the Bitcoin P2P network.
//!
//! This crate implements the per-connection subsystem of a Bitcoin P2P
//! node: framing bytes on a TCP socket into typed protocol messages,
//! fanning decoded messages out to any number of subscribers, and
//! enforcing liveness with expiration/inactivity/revival timers.
//!
//! The [`net`] module holds the channel machinery; [`wire`] holds the
//! Bitcoin wire protocol itself (the 24-byte message header, command
//! names, and the typed message catalog with its decoders and encoders).
//! [`session`] layers the version/verack handshake on top of a channel.
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html

pub mod net;
pub mod session;
pub mod wire;

pub use net::{Channel, ChannelError, ChannelProxy, ChannelSettings};

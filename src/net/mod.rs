//! Peer channel machinery.
//!
//! A [`Channel`] owns one connected socket and drives a strict serial
//! read pipeline over it: header, checksum, payload. Verified frames are
//! published to a raw subscriber and then decoded by command into typed
//! messages, each with its own multi-handler [`subscriber::Subscriber`].
//! Three timers (expiration, inactivity, revival) bound the channel's
//! lifetime; any timer firing or any I/O error tears the channel down and
//! delivers a single terminal status to every subscriber.

pub mod channel;
pub mod deadline;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod subscriber;

pub use channel::{Channel, ChannelProxy, ChannelSettings};
pub use dispatch::{Dispatch, Strand};
pub use error::ChannelError;

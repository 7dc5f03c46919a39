use std::io;
use std::sync::Arc;

/// Terminal status of a peer channel.
///
/// The first non-success status that reaches a channel transitions it to
/// its stopped state and is broadcast to subscribers; errors are never
/// recovered locally. Transport errors are translated into this type at
/// the socket boundary and carried behind an `Arc` so the same status can
/// be delivered to every subscriber.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// The channel has been, or is about to be, torn down.
    #[error("channel stopped")]
    ChannelStopped,

    /// The expiration or inactivity timer fired.
    #[error("channel timed out")]
    ChannelTimeout,

    /// The peer violated the wire protocol: bad magic, bad checksum,
    /// oversized payload, or a malformed message body.
    #[error("bad stream: {0}")]
    BadStream(String),

    /// The underlying socket failed.
    #[error("transport error: {0}")]
    Transport(Arc<io::Error>),
}

impl ChannelError {
    pub(crate) fn bad_stream(reason: impl Into<String>) -> Self {
        ChannelError::BadStream(reason.into())
    }
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        ChannelError::Transport(Arc::new(err))
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::error::ChannelError;
use super::subscriber::Subscriber;
use crate::wire::message::Decode;

type Decoder = Box<dyn Fn(&[u8]) -> Result<(), ChannelError> + Send + Sync>;

/// Maps protocol command names to payload decoders.
///
/// A channel builds its registry once at construction, pairing each
/// command with the typed [`Subscriber`] that should receive decoded
/// values; the registry is immutable afterwards and safe to read without
/// locking. Unknown commands are not an error — the channel skips them
/// and keeps reading.
pub struct MessageRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Wires `command` to decode into `M` and relay to `subscriber`.
    pub fn register<M>(&mut self, command: &'static str, subscriber: Arc<Subscriber<M>>)
    where
        M: Decode + Clone + Send + 'static,
    {
        self.decoders.insert(
            command,
            Box::new(move |payload| {
                let mut cursor = 0;
                let message = M::decode(payload, &mut cursor)
                    .map_err(|err| ChannelError::bad_stream(format!("{command}: {err}")))?;
                if cursor < payload.len() {
                    warn!(
                        command,
                        unused = payload.len() - cursor,
                        "valid message handled, unused bytes remain in payload"
                    );
                }
                subscriber.relay(Ok(message));
                Ok(())
            }),
        );
    }

    /// Decodes `payload` for `command` and relays the typed value.
    ///
    /// Returns `Ok(false)` when the command is not registered. A decoder
    /// failure is a protocol error and terminates the channel.
    pub fn dispatch(&self, command: &str, payload: &[u8]) -> Result<bool, ChannelError> {
        match self.decoders.get(command) {
            Some(decode) => decode(payload).map(|()| true),
            None => Ok(false),
        }
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

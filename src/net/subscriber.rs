use std::sync::Mutex;

use super::dispatch::Dispatch;
use super::error::ChannelError;

type Handler<M> = Box<dyn FnOnce(Result<M, ChannelError>) + Send + 'static>;

/// Multi-handler broadcast point for one typed event.
///
/// Handlers are one-shot: every `relay` detaches the whole pending list
/// and invokes each handler exactly once, so a handler that wants the next
/// event must resubscribe. An `Err` relay is terminal — it is recorded,
/// and every later `subscribe` is answered with it on the spot instead of
/// being queued.
pub struct Subscriber<M> {
    dispatch: Dispatch,
    inner: Mutex<Inner<M>>,
}

struct Inner<M> {
    pending: Vec<Handler<M>>,
    terminal: Option<ChannelError>,
}

impl<M: Clone + Send + 'static> Subscriber<M> {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                terminal: None,
            }),
        }
    }

    /// Registers `handler` for the next relayed event.
    ///
    /// After a terminal relay the handler runs synchronously with the
    /// recorded terminal status.
    pub fn subscribe(&self, handler: impl FnOnce(Result<M, ChannelError>) + Send + 'static) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(terminal) = inner.terminal.clone() {
            drop(inner);
            handler(Err(terminal));
        } else {
            inner.pending.push(Box::new(handler));
        }
    }

    /// Delivers `event` to every pending handler via the worker pool.
    ///
    /// The lock is held only long enough to detach the pending list, so
    /// slow handlers never block new subscriptions. The first `Err` relay
    /// is recorded as the terminal status; relays after that are ignored.
    pub fn relay(&self, event: Result<M, ChannelError>) {
        let handlers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.terminal.is_some() {
                return;
            }
            if let Err(terminal) = &event {
                inner.terminal = Some(terminal.clone());
            }
            std::mem::take(&mut inner.pending)
        };
        for handler in handlers {
            let event = event.clone();
            self.dispatch.queue(move || handler(event));
        }
    }
}

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;

use super::dispatch::Dispatch;

/// Outcome delivered to a deadline handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// The full duration elapsed.
    Elapsed,
    /// The schedule was cancelled or replaced before it elapsed.
    Canceled,
}

impl TimerStatus {
    pub fn canceled(self) -> bool {
        matches!(self, TimerStatus::Canceled)
    }
}

/// One-shot cancellable timer bound to the worker pool.
///
/// Each `start` yields exactly one handler invocation, either
/// [`TimerStatus::Elapsed`] or [`TimerStatus::Canceled`]. Cancellation is
/// best effort: a timer that elapses concurrently with `cancel` still
/// fires with `Elapsed`, so handlers must be prepared to observe state
/// that changed after the cancel was issued.
pub struct Deadline {
    dispatch: Dispatch,
    pending: Mutex<Option<oneshot::Sender<()>>>,
}

impl Deadline {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
            pending: Mutex::new(None),
        }
    }

    /// Schedules `handler` to run after `duration`, replacing (and thereby
    /// cancelling) any pending schedule.
    pub fn start(&self, duration: Duration, handler: impl FnOnce(TimerStatus) + Send + 'static) {
        let (cancel, canceled) = oneshot::channel();
        if let Some(previous) = self.pending.lock().unwrap().replace(cancel) {
            let _ = previous.send(());
        }
        self.dispatch.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => handler(TimerStatus::Elapsed),
                _ = canceled => handler(TimerStatus::Canceled),
            }
        });
    }

    /// Cancels the pending schedule, if any.
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().unwrap().take() {
            let _ = pending.send(());
        }
    }
}

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to the shared worker pool.
///
/// `queue` posts independent work; [`Strand`]s obtained from
/// [`Dispatch::strand`] serialize work that must not overlap. Channels use
/// one strand each, which makes a channel behave single-threaded from its
/// own perspective while many channels run in parallel across the pool.
#[derive(Clone)]
pub struct Dispatch {
    handle: Handle,
}

impl Dispatch {
    /// Binds to the current tokio runtime.
    ///
    /// Panics outside of a runtime context, like `tokio::spawn` does.
    pub fn new() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Runs `job` on some worker. Jobs queued from the same call site run
    /// in FIFO submission order but may execute concurrently.
    pub fn queue(&self, job: impl FnOnce() + Send + 'static) {
        self.handle.spawn(async move { job() });
    }

    /// Runs a future on some worker.
    pub fn spawn(&self, future: impl Future<Output = ()> + Send + 'static) {
        self.handle.spawn(future);
    }

    /// Creates a new serialization domain on this pool.
    pub fn strand(&self) -> Strand {
        Strand::new(&self.handle)
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::new()
    }
}

/// A FIFO, one-at-a-time execution domain within the worker pool.
///
/// All jobs submitted through [`Strand::sync`] run to completion in
/// submission order; a job never observes another strand job part-way
/// through. Dropping every clone of the strand shuts its worker down once
/// the queue drains.
#[derive(Clone)]
pub struct Strand {
    jobs: mpsc::UnboundedSender<Job>,
}

impl Strand {
    fn new(handle: &Handle) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = queue.recv().await {
                job.await;
            }
        });
        Self { jobs }
    }

    /// Submits `job` to run after every previously submitted job has
    /// completed. Submission never blocks.
    pub fn sync(&self, job: impl Future<Output = ()> + Send + 'static) {
        // Send only fails after shutdown, when there is nothing left to run
        // the job against.
        let _ = self.jobs.send(Box::pin(job));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn queue_runs_the_job() {
        let dispatch = Dispatch::new();
        let (tx, rx) = oneshot::channel();
        dispatch.queue(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn strand_preserves_submission_order() {
        let dispatch = Dispatch::new();
        let strand = dispatch.strand();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();

        for i in 0..100u32 {
            let order = Arc::clone(&order);
            strand.sync(async move {
                order.lock().unwrap().push(i);
            });
        }
        strand.sync(async move {
            let _ = done_tx.send(());
        });

        done_rx.await.unwrap();
        let seen = order.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn strand_jobs_never_overlap() {
        let dispatch = Dispatch::new();
        let strand = dispatch.strand();
        let running = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();

        for _ in 0..10 {
            let running = Arc::clone(&running);
            strand.sync(async move {
                assert!(!running.swap(true, Ordering::SeqCst), "job overlap");
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.store(false, Ordering::SeqCst);
            });
        }
        strand.sync(async move {
            let _ = done_tx.send(());
        });

        done_rx.await.unwrap();
    }
}

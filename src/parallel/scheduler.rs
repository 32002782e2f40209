use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set-once flag shared by a run's workers and anyone allowed to cancel it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A pass/fail check over one work item.
///
/// Implementations run concurrently with each other, so any output they produce
/// must be serialized by the implementation itself.
pub trait Worker<T>: Sync {
    /// `true` when the item passed or was brought into compliance
    fn process(&self, item: &T) -> bool;
}

impl<T, F> Worker<T> for F
where
    F: Fn(&T) -> bool + Sync,
{
    fn process(&self, item: &T) -> bool {
        self(item)
    }
}

/// What happened to the items of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub panicked: usize,
    /// An external cancellation stopped the run before every item was processed
    pub cancelled: bool,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.panicked == 0 && !self.cancelled && self.processed == self.total
    }
}

enum Outcome {
    Passed,
    Failed,
    Panicked,
}

/// Context for worker threads to avoid too many function parameters
struct WorkerContext<T> {
    worker_id: usize,
    work_rx: Receiver<T>,
    result_tx: Sender<Outcome>,
    stop: StopSignal,
}

/// Fixed-size worker pool that stops handing out work after the first failure
#[derive(Debug, Clone)]
pub struct WorkScheduler {
    workers: usize,
    poll_interval: Duration,
    cancel: Option<StopSignal>,
}

impl WorkScheduler {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// A pool of `workers` threads (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            cancel: None,
        }
    }

    /// A pool sized from the available processing units, see [`calculate_optimal_workers`]
    pub fn from_config(max_threads: usize, thread_percentage: u8) -> Self {
        Self::new(calculate_optimal_workers(max_threads, thread_percentage))
    }

    /// How often the caller's thread wakes to look for cancellation
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Stop the run (after in-flight items finish) once `signal` is raised
    pub fn with_cancellation(mut self, signal: StopSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `worker` over `items`; `true` iff every invocation returned `true`.
    pub fn run<T, W>(&self, items: Vec<T>, worker: &W) -> bool
    where
        T: Send,
        W: Worker<T> + ?Sized,
    {
        self.run_with_summary(items, worker).success()
    }

    /// Like [`run`](Self::run), reporting how many items were processed and how they ended.
    ///
    /// Blocks until every worker thread has exited. After a failure or a
    /// cancellation some items are never processed.
    pub fn run_with_summary<T, W>(&self, items: Vec<T>, worker: &W) -> RunSummary
    where
        T: Send,
        W: Worker<T> + ?Sized,
    {
        let total = items.len();
        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };
        if total == 0 {
            return summary;
        }
        if self.cancel.as_ref().is_some_and(StopSignal::is_raised) {
            summary.cancelled = true;
            return summary;
        }

        // The whole queue is filled before any worker starts
        let (work_tx, work_rx) = unbounded();
        for item in items {
            if work_tx.send(item).is_err() {
                break;
            }
        }
        drop(work_tx);

        let (result_tx, result_rx) = unbounded();
        let stop = StopSignal::new();
        let workers = self.workers.min(total);
        tracing::debug!("Dispatching {} item(s) to {} worker(s)", total, workers);

        let scoped = crossbeam::thread::scope(|s| {
            for worker_id in 0..workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    stop: stop.clone(),
                };

                s.spawn(move |_| worker_thread(ctx, worker));
            }

            // Drop our sender so the collector sees the channel close when workers exit
            drop(result_tx);

            self.collect_results(result_rx, &stop, &mut summary);
        });

        if scoped.is_err() {
            tracing::error!("A worker thread panicked outside of item processing");
            summary.panicked += 1;
        }

        tracing::debug!(
            "Run finished: {}/{} processed, {} failed, {} panicked{}",
            summary.processed,
            summary.total,
            summary.failed,
            summary.panicked,
            if summary.cancelled { ", cancelled" } else { "" }
        );
        summary
    }

    fn collect_results(&self, result_rx: Receiver<Outcome>, stop: &StopSignal, summary: &mut RunSummary) {
        loop {
            match result_rx.recv_timeout(self.poll_interval) {
                Ok(outcome) => {
                    summary.processed += 1;
                    match outcome {
                        Outcome::Passed => {}
                        Outcome::Failed => summary.failed += 1,
                        Outcome::Panicked => summary.panicked += 1,
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(cancel) = &self.cancel {
                if cancel.is_raised() && !stop.is_raised() && summary.processed < summary.total {
                    tracing::warn!("Cancellation requested, waiting for in-flight items to finish");
                    summary.cancelled = true;
                    stop.raise();
                }
            }
        }
    }
}

fn worker_thread<T, W>(ctx: WorkerContext<T>, worker: &W)
where
    W: Worker<T> + ?Sized,
{
    while !ctx.stop.is_raised() {
        // An empty queue means the run is drained
        let Ok(item) = ctx.work_rx.try_recv() else {
            break;
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| worker.process(&item))) {
            Ok(true) => Outcome::Passed,
            Ok(false) => {
                ctx.stop.raise();
                Outcome::Failed
            }
            Err(payload) => {
                ctx.stop.raise();
                tracing::error!(
                    "Worker {} panicked while processing an item: {}",
                    ctx.worker_id,
                    panic_message(payload.as_ref())
                );
                Outcome::Panicked
            }
        };

        if ctx.result_tx.send(outcome).is_err() {
            break; // Collector dropped
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Calculate workers based on available system resources and configuration limits
///
/// # Algorithm
/// ```text
/// 1. Detect available CPU cores: num_cpus::get()
/// 2. Apply percentage: cores * thread_percentage / 100
/// 3. Apply config limit: min(max_threads_config, percentage_result) if max_threads_config > 0
/// 4. Ensure minimum: max(1, final_result)
/// ```
pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
    let available_cores = num_cpus::get().max(1);

    let workers_by_percentage = std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

    // 0 means use percentage calculation only
    if max_threads_config > 0 {
        std::cmp::min(max_threads_config, workers_by_percentage)
    } else {
        workers_by_percentage
    }
}

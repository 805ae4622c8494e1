//! Background cross-linking for the Lexicon knowledge base.
//!
//! Creating or editing an entry must not wait for the corpus-wide pass, so
//! the request handler enqueues a [`LinkJob`] and returns. A single
//! [`LinkWorker`] consumes the queue, which serializes passes: two passes
//! never read and write the corpus at the same time within a process.
//!
//! ## Architecture
//!
//! - `LinkJob`: a request to run the pass for one entry
//! - `LinkQueue`: in-memory FIFO of pending jobs, shared with producers
//! - `LinkWorker`: background task that polls the queue and runs passes
//!
//! ## Idempotency
//!
//! The pass is idempotent: running it twice for the same entry adds no
//! links the second time, so a retried or repeated job is harmless. Job IDs
//! only correlate the log lines of one job across its attempts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexicon_linker::worker::{LinkJob, LinkQueue, LinkWorker};
//!
//! let queue = LinkQueue::new();
//! let mut worker = LinkWorker::new(queue.clone(), repo);
//! let mut reports = worker.subscribe();
//! let handle = worker.start();
//!
//! queue.enqueue(LinkJob::new(slug));
//! let report = reports.recv().await?;
//!
//! worker.shutdown();
//! handle.await?;
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lexicon_core::{CorpusRepository, Slug};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pass::{PassError, PassReport, run_pass};

/// Default interval between queue polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default number of attempts before a failing job is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Capacity of the report channel; slower subscribers see `Lagged`.
const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Error types for worker operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The pass failed.
    #[error(transparent)]
    Pass(#[from] PassError),

    /// The pass did not finish in time and was abandoned.
    #[error("pass timed out after {0:?}")]
    TimedOut(Duration),
}

/// A request to run the cross-linking pass for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkJob {
    /// Identifier shared by every attempt of this job.
    pub job_id: Uuid,

    /// Entry whose title and body should be linked.
    pub slug: Slug,

    /// Zero for the first attempt, incremented on each retry.
    pub attempt: u32,
}

impl LinkJob {
    /// Creates a new job for an entry.
    pub fn new(slug: Slug) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            slug,
            attempt: 0,
        }
    }

    /// The same job, one attempt later.
    pub fn retry(&self) -> Self {
        Self {
            job_id: self.job_id,
            slug: self.slug.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Thread-safe queue for link jobs.
///
/// Jobs are processed in FIFO order. A job for an entry that already has a
/// pending job is dropped, since the pending pass will see the latest body.
#[derive(Debug, Clone, Default)]
pub struct LinkQueue {
    inner: Arc<Mutex<VecDeque<LinkJob>>>,
}

impl LinkQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a job for processing.
    ///
    /// Returns false if the job was dropped.
    pub fn enqueue(&self, job: LinkJob) -> bool {
        match self.inner.lock() {
            Ok(mut queue) => {
                if queue.iter().any(|pending| pending.slug == job.slug) {
                    debug!(job_id = %job.job_id, slug = %job.slug, "entry already queued, dropping job");
                    return false;
                }
                debug!(job_id = %job.job_id, slug = %job.slug, attempt = job.attempt, "enqueuing link job");
                queue.push_back(job);
                true
            }
            Err(e) => {
                warn!("Failed to enqueue job: lock poisoned: {}", e);
                false
            }
        }
    }

    /// Dequeues and returns the next job, if any.
    pub fn process_next(&self) -> Option<LinkJob> {
        match self.inner.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(e) => {
                warn!("Failed to dequeue job: lock poisoned: {}", e);
                None
            }
        }
    }

    /// Returns the number of pending jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Returns true if there are no pending jobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all pending jobs from the queue.
    pub fn clear(&self) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.clear();
        }
    }
}

/// Statistics about worker processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    /// Jobs whose pass completed.
    pub jobs_processed: u64,
    /// Failed attempts.
    pub jobs_failed: u64,
    /// Failed attempts that were re-enqueued.
    pub jobs_retried: u64,
    /// Entry bodies rewritten.
    pub entries_updated: u64,
    /// Anchors inserted.
    pub links_added: u64,
}

/// State shared between the worker handle and its background task.
struct JobRunner<R> {
    queue: LinkQueue,
    repo: Arc<R>,
    stats: Arc<Mutex<WorkerStats>>,
    reports: broadcast::Sender<PassReport>,
    job_timeout: Option<Duration>,
    max_attempts: u32,
}

impl<R> Clone for JobRunner<R> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            repo: self.repo.clone(),
            stats: self.stats.clone(),
            reports: self.reports.clone(),
            job_timeout: self.job_timeout,
            max_attempts: self.max_attempts,
        }
    }
}

impl<R: CorpusRepository> JobRunner<R> {
    fn update_stats(&self, update: impl FnOnce(&mut WorkerStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    async fn run(&self, slug: &Slug) -> Result<PassReport, WorkerError> {
        let pass = run_pass(self.repo.as_ref(), slug);
        match self.job_timeout {
            Some(limit) => tokio::time::timeout(limit, pass)
                .await
                .map_err(|_| WorkerError::TimedOut(limit))?
                .map_err(WorkerError::from),
            None => pass.await.map_err(WorkerError::from),
        }
    }

    async fn process(&self, job: LinkJob) {
        let job_id = job.job_id;
        let start = Instant::now();

        match self.run(&job.slug).await {
            Ok(report) => {
                info!(
                    job_id = %job_id,
                    slug = %job.slug,
                    entries_updated = report.entries_updated,
                    links_added = report.links_added,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "processed link job"
                );
                self.update_stats(|s| {
                    s.jobs_processed += 1;
                    s.entries_updated +=
                        report.entries_updated as u64 + u64::from(report.new_entry_updated);
                    s.links_added += report.links_added as u64;
                });
                // No subscribers is fine.
                let _ = self.reports.send(report);
            }
            Err(WorkerError::Pass(PassError::EntryNotFound(slug))) => {
                warn!(job_id = %job_id, slug = %slug, "entry vanished before its link job ran");
                self.update_stats(|s| s.jobs_failed += 1);
            }
            Err(e) => {
                warn!(job_id = %job_id, slug = %job.slug, attempt = job.attempt, error = %e, "link job failed");
                self.update_stats(|s| s.jobs_failed += 1);
                if job.attempt + 1 < self.max_attempts && self.queue.enqueue(job.retry()) {
                    self.update_stats(|s| s.jobs_retried += 1);
                }
            }
        }
    }
}

/// Background worker that processes the link queue.
///
/// The worker polls the queue at a configurable interval and runs one pass
/// at a time. Exactly one worker should consume a given queue.
pub struct LinkWorker<R> {
    runner: JobRunner<R>,

    /// Poll interval for checking the queue.
    poll_interval: Duration,

    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,

    /// Shutdown signal receiver for the spawned task.
    shutdown_rx: watch::Receiver<bool>,
}

impl<R: CorpusRepository + 'static> LinkWorker<R> {
    /// Creates a worker over `queue` that runs passes against `repo`.
    pub fn new(queue: LinkQueue, repo: Arc<R>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            runner: JobRunner {
                queue,
                repo,
                stats: Arc::new(Mutex::new(WorkerStats::default())),
                reports,
                job_timeout: None,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Sets the poll interval for queue checking.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Abandons passes that take longer than `timeout`.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.runner.job_timeout = Some(timeout);
        self
    }

    /// Sets how many attempts a failing job gets. At least one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.runner.max_attempts = attempts.max(1);
        self
    }

    /// Subscribes to reports of completed passes.
    pub fn subscribe(&self) -> broadcast::Receiver<PassReport> {
        self.runner.reports.subscribe()
    }

    /// Returns the current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        self.runner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Returns the current queue depth.
    pub fn queue_depth(&self) -> usize {
        self.runner.queue.len()
    }

    /// Starts the background worker.
    ///
    /// Spawns a tokio task that polls the queue and processes jobs until
    /// [`LinkWorker::shutdown`] is called or the worker is dropped. A pass in
    /// progress always runs to completion first.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let runner = self.runner.clone();
        let poll_interval = self.poll_interval;
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            info!(poll_ms = poll_interval.as_millis() as u64, "link worker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        while let Some(job) = runner.queue.process_next() {
                            runner.process(job).await;
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("link worker shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signals the worker to shut down.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

#[cfg(test)]
impl<R: CorpusRepository + 'static> LinkWorker<R> {
    /// Processes a single job without the background task (test-only helper).
    async fn process_job(&self, job: LinkJob) {
        self.runner.process(job).await;
    }
}

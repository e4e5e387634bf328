//! Fixed-width worker pool over a bounded job queue.
//!
//! One producer walks the [`JobSource`] on a blocking thread and feeds a
//! bounded channel; `workers` tasks pull from it and run each job through the
//! [`RemoteWorkflow`]. A worker whose job fails stops pulling; the others keep
//! going unless `fail_fast` is set. The batch result lists every failure in
//! the order it was observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info};

use crate::api::CompressApi;
use crate::config::Settings;
use crate::error::PressError;
use crate::job::Job;
use crate::source::JobSource;
use crate::ui::BatchProgress;
use crate::workflow::{CompletedJob, RemoteWorkflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Halt the whole batch on the first failed job.
    pub fail_fast: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for DispatchOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            workers: settings.workers,
            queue_capacity: settings.queue_capacity(),
            fail_fast: settings.fail_fast,
        }
    }
}

/// Outcome of one batch.
#[derive(Debug)]
pub struct BatchReport {
    pub completed: Vec<CompletedJob>,
    /// Job failures, first observed first.
    pub errors: Vec<PressError>,
    /// Manifest entries whose file was gone at dispatch time.
    pub skipped: usize,
    /// Token refreshes performed during the batch.
    pub refreshes: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn into_result(mut self) -> Result<Vec<CompletedJob>, PressError> {
        if self.errors.is_empty() {
            Ok(self.completed)
        } else {
            Err(self.errors.swap_remove(0))
        }
    }
}

pub struct Dispatcher<A> {
    workflow: Arc<RemoteWorkflow<A>>,
    options: DispatchOptions,
    progress: BatchProgress,
}

impl<A: CompressApi + 'static> Dispatcher<A> {
    pub fn new(workflow: Arc<RemoteWorkflow<A>>, options: DispatchOptions) -> Self {
        Self {
            workflow,
            options,
            progress: BatchProgress::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: BatchProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Drains `source` through the pool and waits for every worker.
    pub async fn run(&self, source: JobSource) -> BatchReport {
        let started_at = Utc::now();
        let refreshes_before = self.workflow.guard().refreshes();
        let workers = self.options.workers.max(1);

        let (tx, rx) = mpsc::channel::<Job>(self.options.queue_capacity.max(1));
        let queue = Arc::new(Mutex::new(rx));
        let halted = Arc::new(AtomicBool::new(false));

        let producer = {
            let halted = halted.clone();
            let progress = self.progress.clone();
            task::spawn_blocking(move || produce(source, tx, &halted, &progress))
        };

        let mut pool = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                id,
                workflow: self.workflow.clone(),
                queue: queue.clone(),
                halted: halted.clone(),
                fail_fast: self.options.fail_fast,
                progress: self.progress.clone(),
            };
            pool.spawn(worker.run());
        }
        // Once every worker is gone the receiver must drop too, so a producer
        // blocked on a full queue wakes up.
        drop(queue);
        info!(workers, "dispatching");

        let mut completed = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(outcome) => {
                    completed.extend(outcome.completed);
                    errors.extend(outcome.error);
                }
                Err(e) => {
                    error!(error = %e, "worker task died");
                    errors.push(PressError::Worker(e));
                }
            }
        }

        let skipped = match producer.await {
            Ok(produced) => {
                debug!(offered = produced.offered, skipped = produced.skipped, "producer finished");
                produced.skipped
            }
            Err(e) => {
                errors.push(PressError::Worker(e));
                0
            }
        };

        BatchReport {
            completed,
            errors,
            skipped,
            refreshes: self.workflow.guard().refreshes() - refreshes_before,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

struct Produced {
    offered: usize,
    skipped: usize,
}

/// Feeds the queue until the source is exhausted, the batch is halted, or
/// every worker has gone away. Dropping `tx` closes the queue.
fn produce(
    mut source: JobSource,
    tx: mpsc::Sender<Job>,
    halted: &AtomicBool,
    progress: &BatchProgress,
) -> Produced {
    let mut offered = 0;
    while !halted.load(Ordering::SeqCst) {
        let skipped_before = source.skipped();
        let next = source.next();
        progress.jobs_skipped(source.skipped() - skipped_before);
        let Some(job) = next else { break };
        if tx.blocking_send(job).is_err() {
            debug!("all workers stopped, producer exiting");
            break;
        }
        offered += 1;
    }
    Produced {
        offered,
        skipped: source.skipped(),
    }
}

struct WorkerOutcome {
    completed: Vec<CompletedJob>,
    error: Option<PressError>,
}

struct Worker<A> {
    id: usize,
    workflow: Arc<RemoteWorkflow<A>>,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    halted: Arc<AtomicBool>,
    fail_fast: bool,
    progress: BatchProgress,
}

impl<A: CompressApi> Worker<A> {
    async fn run(self) -> WorkerOutcome {
        let mut completed = Vec::new();

        loop {
            if self.halted.load(Ordering::SeqCst) {
                break;
            }
            let next = self.queue.lock().await.recv().await;
            let Some(job) = next else { break };

            debug!(worker = self.id, file = %job.filename, "picked up");
            self.progress.job_started(&job.filename);
            match self.workflow.run(job).await {
                Ok(done) => {
                    self.progress.job_completed(&done);
                    completed.push(done);
                }
                Err(err) => {
                    error!(worker = self.id, error = %err, "job failed, worker stopping");
                    self.progress.job_failed(&err);
                    if self.fail_fast {
                        self.halted.store(true, Ordering::SeqCst);
                    }
                    return WorkerOutcome {
                        completed,
                        error: Some(err),
                    };
                }
            }
        }

        debug!(worker = self.id, jobs = completed.len(), "queue drained");
        WorkerOutcome {
            completed,
            error: None,
        }
    }
}

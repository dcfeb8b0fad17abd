//! Inbox job queue
//!
//! A bounded, prioritized, in-process queue with one FIFO per lane, plus the
//! worker pool that drains it. Enqueueing never blocks: when a lane is full
//! its oldest job is displaced to make room.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::inbox::InboxJob;
use crate::metrics::{INBOX_JOBS_DISPLACED, INBOX_JOBS_ENQUEUED, INBOX_JOBS_PROCESSED, INBOX_LANE_DEPTH};

/// Named priority bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Tombstones; drained first
    Delete,
    /// Every other delivery
    High,
}

impl Lane {
    /// Lanes in the order workers drain them
    pub const PRIORITY: [Lane; 2] = [Lane::Delete, Lane::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Delete => "delete",
            Lane::High => "high",
        }
    }

    fn index(&self) -> usize {
        match self {
            Lane::Delete => 0,
            Lane::High => 1,
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to an enqueued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Job appended to its lane
    Queued,
    /// Lane was full; its oldest job was dropped to admit this one
    DisplacedOldest,
}

/// One-way send of a job into its lane
#[cfg_attr(test, mockall::automock)]
pub trait JobQueue: Send + Sync {
    /// Must return promptly without waiting for capacity
    fn enqueue(&self, job: InboxJob) -> EnqueueOutcome;
}

/// Bounded multi-lane queue
pub struct LaneQueue {
    lanes: [Mutex<VecDeque<InboxJob>>; 2],
    capacity: usize,
    notify: Notify,
}

impl LaneQueue {
    /// Create a queue holding at most `capacity` jobs per lane
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: [
                Mutex::new(VecDeque::new()),
                Mutex::new(VecDeque::new()),
            ],
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    /// Number of jobs waiting in `lane`
    pub fn len(&self, lane: Lane) -> usize {
        self.lane(lane).len()
    }

    /// True when every lane is empty
    pub fn is_empty(&self) -> bool {
        Lane::PRIORITY.iter().all(|lane| self.len(*lane) == 0)
    }

    /// Pop the next job by priority, if any
    pub fn try_next(&self) -> Option<InboxJob> {
        for lane in Lane::PRIORITY {
            let mut jobs = self.lane(lane);
            if let Some(job) = jobs.pop_front() {
                INBOX_LANE_DEPTH
                    .with_label_values(&[lane.as_str()])
                    .set(jobs.len() as i64);
                return Some(job);
            }
        }
        None
    }

    /// Wait for the next job by priority
    pub async fn next_job(&self) -> InboxJob {
        loop {
            if let Some(job) = self.try_next() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    fn lane(&self, lane: Lane) -> std::sync::MutexGuard<'_, VecDeque<InboxJob>> {
        self.lanes[lane.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobQueue for LaneQueue {
    fn enqueue(&self, job: InboxJob) -> EnqueueOutcome {
        let lane = job.lane();
        let outcome = {
            let mut jobs = self.lane(lane);
            let outcome = if jobs.len() >= self.capacity {
                if let Some(displaced) = jobs.pop_front() {
                    tracing::warn!(
                        lane = %lane,
                        displaced_job = %displaced.id(),
                        capacity = self.capacity,
                        "Inbox lane full; dropping oldest job"
                    );
                }
                INBOX_JOBS_DISPLACED.with_label_values(&[lane.as_str()]).inc();
                EnqueueOutcome::DisplacedOldest
            } else {
                EnqueueOutcome::Queued
            };
            jobs.push_back(job);
            INBOX_LANE_DEPTH
                .with_label_values(&[lane.as_str()])
                .set(jobs.len() as i64);
            outcome
        };

        INBOX_JOBS_ENQUEUED.with_label_values(&[lane.as_str()]).inc();
        self.notify.notify_one();
        outcome
    }
}

// =============================================================================
// Workers
// =============================================================================

/// Processes accepted deliveries
///
/// Signature verification and the meaning of each activity live behind this
/// trait. Failures stay inside the worker boundary.
#[async_trait]
pub trait InboxJobHandler: Send + Sync {
    async fn handle(&self, job: InboxJob) -> anyhow::Result<()>;
}

/// Handler that records each job and hands nothing further on
///
/// Used when no processing pipeline is attached to the node.
pub struct TracingJobHandler;

#[async_trait]
impl InboxJobHandler for TracingJobHandler {
    async fn handle(&self, job: InboxJob) -> anyhow::Result<()> {
        tracing::debug!(
            job_id = %job.id(),
            lane = %job.lane(),
            target = ?job.target_username(),
            bytes = job.payload().len(),
            "Inbox job drained without a processing pipeline"
        );
        Ok(())
    }
}

/// Spawn `workers` tasks draining `queue` into `handler`
///
/// A failing or panicking job is logged and the worker moves on.
pub fn spawn_workers(
    queue: Arc<LaneQueue>,
    handler: Arc<dyn InboxJobHandler>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    (0..workers.max(1))
        .map(|worker| {
            let queue = queue.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                loop {
                    let job = queue.next_job().await;
                    run_job(worker, handler.clone(), job).await;
                }
            })
        })
        .collect()
}

async fn run_job(worker: usize, handler: Arc<dyn InboxJobHandler>, job: InboxJob) {
    let lane = job.lane();
    let job_id = job.id().to_string();

    let result = tokio::spawn(async move { handler.handle(job).await }).await;
    let status = match result {
        Ok(Ok(())) => "success",
        Ok(Err(error)) => {
            tracing::error!(worker, %job_id, lane = %lane, error = %error, "Inbox job failed");
            "error"
        }
        Err(join_error) => {
            tracing::error!(worker, %job_id, lane = %lane, error = %join_error, "Inbox job panicked");
            "panic"
        }
    };

    INBOX_JOBS_PROCESSED
        .with_label_values(&[lane.as_str(), status])
        .inc();
}

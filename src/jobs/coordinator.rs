//! Asynchronous job coordinator.
//!
//! Jobs go through a bounded queue to a single dispatcher, which starts at
//! most `max_workers` workers at a time. A full queue rejects new jobs with
//! `Busy` instead of blocking the caller.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::state::{Job, JobSnapshot, JobState};
use crate::acquire::InputDescriptor;
use crate::error::{Result, WatermarkError};
use crate::pipeline::{Pipeline, WatermarkRequest};

type JobTable = Arc<RwLock<HashMap<Uuid, Arc<Mutex<Job>>>>>;

struct WorkItem {
    job_id: Uuid,
    input: InputDescriptor,
    request: WatermarkRequest,
}

/// Queue and worker gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub queued: usize,
    pub queue_capacity: usize,
    pub active_workers: usize,
    pub max_workers: usize,
    pub jobs_total: usize,
    pub jobs_pending: usize,
    pub jobs_processing: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
    pub accepting: bool,
}

pub struct JobCoordinator {
    jobs: JobTable,
    /// None once shutdown has begun
    sender: Mutex<Option<mpsc::Sender<WorkItem>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    workers: Arc<Semaphore>,
    max_workers: usize,
    queue_capacity: usize,
    pipeline: Arc<Pipeline>,
}

impl JobCoordinator {
    /// Create the coordinator and spawn its dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(pipeline: Arc<Pipeline>, max_workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        let workers = Arc::new(Semaphore::new(max_workers.max(1)));

        let dispatcher = tokio::spawn(dispatch(
            receiver,
            Arc::clone(&workers),
            Arc::clone(&jobs),
            Arc::clone(&pipeline),
        ));

        Self {
            jobs,
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
            workers,
            max_workers: max_workers.max(1),
            queue_capacity: queue_capacity.max(1),
            pipeline,
        }
    }

    /// Validate and enqueue a request, returning the new job id.
    ///
    /// Nothing is recorded when validation fails or the queue is full.
    pub fn submit(&self, input: InputDescriptor, request: WatermarkRequest) -> Result<Uuid> {
        self.pipeline.precheck(&input, &request)?;

        let sender = self.sender.lock().clone().ok_or(WatermarkError::Busy)?;
        let permit = sender.try_reserve().map_err(|_| WatermarkError::Busy)?;

        let job_id = Uuid::new_v4();
        let job = Job::new(job_id, input.summary(), request.clone());
        self.jobs.write().insert(job_id, Arc::new(Mutex::new(job)));
        permit.send(WorkItem {
            job_id,
            input,
            request,
        });

        tracing::info!(job_id = %job_id, "Job accepted");
        Ok(job_id)
    }

    /// Current snapshot of a job.
    pub fn get(&self, job_id: Uuid) -> Result<JobSnapshot> {
        let job = self
            .jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| WatermarkError::JobNotFound(job_id.to_string()))?;

        let job = job.lock();
        let available = job
            .outcome()
            .map(|o| self.pipeline.store().is_available(&o.artifact))
            .unwrap_or(false);
        Ok(job.snapshot(available))
    }

    pub fn stats(&self) -> CoordinatorStats {
        let (queued, accepting) = match self.sender.lock().as_ref() {
            Some(sender) => (self.queue_capacity - sender.capacity(), true),
            None => (0, false),
        };

        let mut stats = CoordinatorStats {
            queued,
            queue_capacity: self.queue_capacity,
            active_workers: self.max_workers - self.workers.available_permits(),
            max_workers: self.max_workers,
            jobs_total: 0,
            jobs_pending: 0,
            jobs_processing: 0,
            jobs_completed: 0,
            jobs_failed: 0,
            accepting,
        };
        for job in self.jobs.read().values() {
            stats.jobs_total += 1;
            match job.lock().state() {
                JobState::Pending => stats.jobs_pending += 1,
                JobState::Processing => stats.jobs_processing += 1,
                JobState::Completed => stats.jobs_completed += 1,
                JobState::Failed => stats.jobs_failed += 1,
            }
        }
        stats
    }

    /// Stop accepting jobs, let queued jobs run, and wait for every worker.
    pub async fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "Job dispatcher terminated abnormally");
            }
        }

        // Every worker holds a permit until it finishes
        match self.workers.acquire_many(self.max_workers as u32).await {
            Ok(permits) => drop(permits),
            Err(e) => tracing::error!(error = %e, "Worker pool closed during shutdown"),
        }
        tracing::info!("Job coordinator shut down");
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<WorkItem>,
    workers: Arc<Semaphore>,
    jobs: JobTable,
    pipeline: Arc<Pipeline>,
) {
    loop {
        // Take a worker slot first so queued items stay counted as queued
        let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
            break;
        };
        let Some(item) = receiver.recv().await else {
            break;
        };

        let jobs = Arc::clone(&jobs);
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            run_job(item, jobs, pipeline).await;
            drop(permit);
        });
    }
    tracing::debug!("Job dispatcher stopped");
}

async fn run_job(item: WorkItem, jobs: JobTable, pipeline: Arc<Pipeline>) {
    let job_id = item.job_id;
    let Some(job) = jobs.read().get(&job_id).cloned() else {
        tracing::warn!(job_id = %job_id, "Dequeued unknown job");
        return;
    };

    let started = job.lock().start();
    if let Err(e) = started {
        tracing::warn!(job_id = %job_id, error = %e, "Job could not start");
        return;
    }
    tracing::info!(job_id = %job_id, "Job processing");

    // A panic inside the pipeline surfaces as a JoinError, not a dead worker
    let WorkItem { input, request, .. } = item;
    let result = tokio::spawn(async move { pipeline.run(input, &request).await })
        .await
        .unwrap_or_else(|e| {
            Err(WatermarkError::RenderFailed(format!(
                "job worker failed: {}",
                e
            )))
        });

    let mut job = job.lock();
    let recorded = match result {
        Ok(outcome) => {
            tracing::info!(
                job_id = %job_id,
                artifact = %outcome.artifact,
                kind = outcome.kind.as_str(),
                "Job completed"
            );
            job.complete(outcome)
        }
        Err(err) => {
            tracing::warn!(
                job_id = %job_id,
                kind = %err.kind(),
                error = %err,
                "Job failed"
            );
            job.fail(&err)
        }
    };
    if let Err(e) = recorded {
        tracing::error!(job_id = %job_id, error = %e, "Job result not recorded");
    }
}

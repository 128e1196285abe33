//! Background batch generation
//!
//! A batch runs on its own spawned task, detached from the request that
//! submitted it. Jobs run strictly one after another with a fixed pause in
//! between. A failed job is logged and skipped; the remaining jobs still run.
//! Credentials are read from the credential store before every job, so a
//! disconnect stops uploads for the rest of the batch. Successful articles are
//! handed to the document publisher.

use redactor_common::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::document_publisher::DocumentPublisher;
use super::document_store::PersistenceError;
use super::progress_emitter::NullSink;
use super::stage_pipeline::{PipelineError, StagePipeline};
use crate::models::{BatchJob, BatchReport, FailureReason, GenerationRequest, JobOutcome};

const FINISHED_BATCHES_KEPT: usize = 256;

/// Running batch
pub struct BatchHandle {
    id: Uuid,
    job_count: usize,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job_count(&self) -> usize {
        self.job_count
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the batch to finish
    pub async fn join(self) -> Result<BatchReport> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("batch task failed: {}", e)))
    }
}

/// Batches known to the status endpoint
///
/// Running batches keep their handle. Once a batch finishes its handle is
/// dropped and only the id is remembered, for the most recent
/// `FINISHED_BATCHES_KEPT` batches.
#[derive(Default)]
pub struct BatchRegistry {
    inner: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    running: HashMap<Uuid, BatchHandle>,
    finished: VecDeque<Uuid>,
}

impl RegistryState {
    fn sweep(&mut self) {
        let done: Vec<Uuid> = self
            .running
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        for id in done {
            self.running.remove(&id);
            self.finished.push_back(id);
        }
        while self.finished.len() > FINISHED_BATCHES_KEPT {
            if let Some(evicted) = self.finished.pop_front() {
                debug!(batch_id = %evicted, "Forgetting finished batch");
            }
        }
    }
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: BatchHandle) {
        let mut state = self.lock();
        state.sweep();
        state.running.insert(handle.id(), handle);
    }

    /// Some(finished) for a known batch, None for an unknown or forgotten one
    pub fn status(&self, id: Uuid) -> Option<bool> {
        let mut state = self.lock();
        state.sweep();
        if state.running.contains_key(&id) {
            Some(false)
        } else if state.finished.contains(&id) {
            Some(true)
        } else {
            None
        }
    }

    pub fn running(&self) -> usize {
        let mut state = self.lock();
        state.sweep();
        state.running.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // A panic while holding the lock leaves the maps consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct BatchRunner {
    pipeline: Arc<StagePipeline>,
    publisher: Arc<DocumentPublisher>,
    delay: Duration,
    shutdown: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        pipeline: Arc<StagePipeline>,
        publisher: Arc<DocumentPublisher>,
        delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            publisher,
            delay,
            shutdown,
        }
    }

    /// Start `jobs` in the background and return immediately
    pub fn submit(&self, jobs: Vec<BatchJob>, session_id: Option<String>) -> BatchHandle {
        let id = Uuid::new_v4();
        let job_count = jobs.len();
        let runner = self.clone();

        let task = tokio::spawn(async move { runner.run_batch(id, jobs, session_id).await });

        BatchHandle {
            id,
            job_count,
            task,
        }
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        jobs: Vec<BatchJob>,
        session_id: Option<String>,
    ) -> BatchReport {
        info!(batch_id = %batch_id, jobs = jobs.len(), "Batch started");

        let total = jobs.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, job) in jobs.into_iter().enumerate() {
            if index > 0 && !self.pause().await {
                cancelled = true;
                break;
            }
            if self.shutdown.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = self.run_job(&job, session_id.as_deref()).await;
            log_outcome(batch_id, index + 1, total, &job, &outcome);
            outcomes.push(outcome);
        }

        let report = BatchReport {
            batch_id,
            outcomes,
            cancelled,
        };
        info!(
            batch_id = %batch_id,
            uploaded = report.uploaded(),
            processed = report.outcomes.len(),
            total,
            cancelled,
            "Batch finished"
        );
        report
    }

    /// Wait out the inter-job delay; false when shutdown interrupted it
    async fn pause(&self) -> bool {
        if self.delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }

    async fn run_job(&self, job: &BatchJob, session_id: Option<&str>) -> JobOutcome {
        let request = match GenerationRequest::new(job.topic.clone(), job.suggested_title.clone()) {
            Ok(request) => request,
            Err(e) => {
                return JobOutcome::Rejected {
                    message: e.to_string(),
                }
            }
        };

        // Refreshed tokens land in the store, so this is also the newest copy
        let credentials = match self.publisher.current_credentials(session_id).await {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                return JobOutcome::NotSaved {
                    error: PersistenceError::NotConnected.to_string(),
                }
            }
            Err(e) => {
                return JobOutcome::NotSaved {
                    error: e.to_string(),
                }
            }
        };

        let article = match self.pipeline.run(&request, &NullSink).await {
            Ok(article) => article,
            Err(e) => {
                let reason = match &e {
                    PipelineError::Failed { reason, .. } => Some(*reason),
                    PipelineError::Aborted { stage, .. } => Some(FailureReason::for_stage(*stage)),
                    PipelineError::Internal(_) => None,
                };
                return JobOutcome::GenerationFailed {
                    reason,
                    detail: e.to_string(),
                };
            }
        };

        match self
            .publisher
            .publish(
                session_id,
                &credentials,
                request.document_title(),
                &article.final_article,
            )
            .await
        {
            Ok(publication) => JobOutcome::Uploaded {
                document: publication.document,
            },
            Err(e) => JobOutcome::NotSaved {
                error: e.to_string(),
            },
        }
    }
}

fn log_outcome(batch_id: Uuid, position: usize, total: usize, job: &BatchJob, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Uploaded { document } => info!(
            batch_id = %batch_id,
            job = position,
            total,
            topic = %job.topic,
            document_id = %document.id,
            "Batch job uploaded"
        ),
        JobOutcome::Rejected { message } => warn!(
            batch_id = %batch_id,
            job = position,
            total,
            "Batch job rejected: {}",
            message
        ),
        JobOutcome::GenerationFailed { reason, detail } => error!(
            batch_id = %batch_id,
            job = position,
            total,
            topic = %job.topic,
            reason = reason.map(FailureReason::code).unwrap_or("internal"),
            "Batch job generation failed: {}",
            detail
        ),
        JobOutcome::NotSaved { error } => warn!(
            batch_id = %batch_id,
            job = position,
            total,
            topic = %job.topic,
            "Batch job not saved: {}",
            error
        ),
    }
}

//! Job queue and worker pool. The orchestrator is the sole owner of
//! job status mutation; transitions are monotonic:
//! queued -> in_progress -> {completed, failed, cancelled}.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use creative_core::brief::CampaignBrief;
use creative_core::error::{PipelineError, PipelineResult};
use creative_core::types::{CampaignJob, ExecutionReport, JobStatus, ProductFailure};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::output::write_job_outputs;
use crate::pipeline::{run_pipeline, JobConclusion};
use crate::report::ExecutionReporter;
use crate::services::PipelineServices;

const QUEUE_DEPTH: usize = 1024;

/// Counts per status plus average processing time, for the status API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub avg_processing_secs: f64,
}

pub struct CampaignOrchestrator {
    services: Arc<PipelineServices>,
    jobs: DashMap<Uuid, CampaignJob>,
    reports: DashMap<Uuid, ExecutionReport>,
    cancel_flags: DashMap<Uuid, Arc<AtomicBool>>,
    tx: mpsc::Sender<Uuid>,
    terminal_notify: Notify,
    durations: Mutex<Vec<f64>>,
}

impl CampaignOrchestrator {
    /// Start the worker pool and return the submission handle.
    pub fn start(services: Arc<PipelineServices>) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Uuid>(QUEUE_DEPTH);
        let orchestrator = Arc::new(Self {
            services,
            jobs: DashMap::new(),
            reports: DashMap::new(),
            cancel_flags: DashMap::new(),
            tx,
            terminal_notify: Notify::new(),
            durations: Mutex::new(Vec::new()),
        });

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = orchestrator.services.config.worker_count.max(1);
        for worker in 0..workers {
            let orchestrator = orchestrator.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job_id = { rx.lock().await.recv().await };
                    match job_id {
                        Some(id) => orchestrator.process_job(worker, id).await,
                        None => break,
                    }
                }
            });
        }
        info!(workers, "campaign orchestrator started");
        orchestrator
    }

    /// Submit a validated brief; returns the job id.
    pub async fn submit(&self, brief: CampaignBrief) -> PipelineResult<Uuid> {
        let job = CampaignJob::new(brief);
        let id = job.id;
        info!(job_id = %id, campaign = %job.brief.campaign_name, "job submitted");
        self.jobs.insert(id, job);
        self.cancel_flags.insert(id, Arc::new(AtomicBool::new(false)));
        self.tx
            .send(id)
            .await
            .map_err(|e| PipelineError::Internal(anyhow::anyhow!("queue closed: {e}")))?;
        metrics::counter!("jobs_submitted_total").increment(1);
        Ok(id)
    }

    /// Validate and submit a raw brief payload. Malformed briefs are
    /// rejected here and never become jobs.
    pub async fn submit_value(&self, value: serde_json::Value) -> PipelineResult<Uuid> {
        let brief = CampaignBrief::from_value(value)?;
        self.submit(brief).await
    }

    pub fn status(&self, id: Uuid) -> Option<CampaignJob> {
        self.jobs.get(&id).map(|j| j.clone())
    }

    pub fn report(&self, id: Uuid) -> Option<ExecutionReport> {
        self.reports.get(&id).map(|r| r.clone())
    }

    /// Request cooperative cancellation. Returns false when the job is
    /// unknown or already terminal.
    pub fn cancel(&self, id: Uuid) -> bool {
        let active = self
            .jobs
            .get(&id)
            .map(|j| !j.status.is_terminal())
            .unwrap_or(false);
        if !active {
            return false;
        }
        if let Some(flag) = self.cancel_flags.get(&id) {
            flag.store(true, Ordering::SeqCst);
            info!(job_id = %id, "cancellation requested");
            return true;
        }
        false
    }

    /// Block until the job reaches a terminal status.
    pub async fn wait(&self, id: Uuid) -> Option<CampaignJob> {
        loop {
            let notified = self.terminal_notify.notified();
            match self.status(id) {
                Some(job) if job.status.is_terminal() => return Some(job),
                Some(_) => notified.await,
                None => return None,
            }
        }
    }

    pub fn queue_stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::InProgress => stats.in_progress += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        let durations = self.durations.lock().expect("durations lock poisoned");
        if !durations.is_empty() {
            stats.avg_processing_secs = durations.iter().sum::<f64>() / durations.len() as f64;
        }
        stats
    }

    async fn process_job(&self, worker: usize, id: Uuid) {
        let cancel = self
            .cancel_flags
            .get(&id)
            .map(|f| f.clone())
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        // Cancelled while still queued: terminal without starting.
        if cancel.load(Ordering::SeqCst) {
            self.transition(id, JobStatus::Cancelled, Some("cancelled before start".into()));
            return;
        }

        let brief = {
            let Some(mut job) = self.jobs.get_mut(&id) else {
                warn!(job_id = %id, "dequeued unknown job");
                return;
            };
            job.status = JobStatus::InProgress;
            job.started_at = Some(Utc::now());
            job.brief.clone()
        };
        info!(worker, job_id = %id, campaign = %brief.campaign_name, "job started");

        let (conclusion, outcome) = run_pipeline(&self.services, &brief, &cancel).await;

        let job_snapshot = {
            let Some(mut job) = self.jobs.get_mut(&id) else {
                return;
            };
            job.completed_at = Some(Utc::now());
            job.failures = outcome
                .products
                .iter()
                .filter_map(|p| {
                    p.failure.as_ref().map(|reason| ProductFailure {
                        product: p.product.clone(),
                        reason: reason.clone(),
                    })
                })
                .collect();
            match &conclusion {
                JobConclusion::Completed => job.status = JobStatus::Completed,
                JobConclusion::Failed(reason) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(reason.clone());
                }
                JobConclusion::Cancelled => {
                    job.status = JobStatus::Cancelled;
                    job.error = Some("job cancelled".into());
                }
            }
            job.clone()
        };

        if let (Some(start), Some(end)) = (job_snapshot.started_at, job_snapshot.completed_at) {
            let secs = (end - start).num_milliseconds() as f64 / 1000.0;
            self.durations
                .lock()
                .expect("durations lock poisoned")
                .push(secs);
            metrics::histogram!("job_duration_seconds").record(secs);
        }

        match job_snapshot.status {
            JobStatus::Completed | JobStatus::Failed => {
                let report = ExecutionReporter::finalize(&job_snapshot, &outcome);
                if let Err(e) = write_job_outputs(
                    &self.services.config.output_dir,
                    &job_snapshot,
                    &outcome,
                    &report,
                )
                .await
                {
                    error!(job_id = %id, error = %e, "failed to write job outputs");
                }
                self.reports.insert(id, report);
                metrics::counter!("jobs_finished_total").increment(1);
            }
            JobStatus::Cancelled => {
                // In-flight results are discarded; no report.
                metrics::counter!("jobs_cancelled_total").increment(1);
            }
            _ => {}
        }

        info!(
            worker,
            job_id = %id,
            status = ?job_snapshot.status,
            failures = job_snapshot.failures.len(),
            "job finished"
        );
        self.cancel_flags.remove(&id);
        self.terminal_notify.notify_waiters();
    }

    fn transition(&self, id: Uuid, status: JobStatus, error: Option<String>) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = status;
            job.completed_at = Some(Utc::now());
            job.error = error;
        }
        self.cancel_flags.remove(&id);
        self.terminal_notify.notify_waiters();
    }
}

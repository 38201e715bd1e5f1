//! Job worker and runner for processing background jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use fieldmark_core::{defaults, Job, JobRepository, JobType, Result};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrently executing jobs.
    pub max_concurrent_jobs: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, job_type: JobType },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, job_type: JobType },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        job_type: JobType,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| fieldmark_core::Error::Internal("Failed to send shutdown signal".into()))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Job worker that claims jobs from the queue and dispatches them to the
/// registered handlers.
pub struct JobWorker {
    jobs: Arc<dyn JobRepository>,
    config: WorkerConfig,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(jobs: Arc<dyn JobRepository>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            jobs,
            config,
            handlers: HashMap::new(),
            event_tx,
        }
    }

    /// Register a handler for its job type.
    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.job_type(), handler);
        self
    }

    /// Start the worker loop on the current runtime.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        tokio::spawn(self.run(shutdown_rx));
        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                subsystem = "jobs",
                component = "worker",
                "Job processing disabled, worker not starting"
            );
            return;
        }

        let handlers = Arc::new(self.handlers);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);
        info!(
            subsystem = "jobs",
            component = "worker",
            op = "start",
            max_concurrent = self.config.max_concurrent_jobs,
            poll_interval_ms = self.config.poll_interval_ms,
            "Job worker started"
        );

        loop {
            // Claim only when a slot is free, so a claimed job never sits
            // idle behind the concurrency cap.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match self.jobs.claim_next().await {
                Ok(Some(job)) => {
                    let jobs = self.jobs.clone();
                    let handlers = handlers.clone();
                    let event_tx = self.event_tx.clone();
                    tokio::spawn(async move {
                        execute_job(jobs, handlers, event_tx, job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!(
                        subsystem = "jobs",
                        component = "worker",
                        error = %e,
                        "Failed to claim next job"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(poll_interval) => {}
                    }
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!(
            subsystem = "jobs",
            component = "worker",
            op = "stop",
            "Job worker stopped"
        );
    }
}

async fn execute_job(
    jobs: Arc<dyn JobRepository>,
    handlers: Arc<HashMap<JobType, Arc<dyn JobHandler>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    job: Job,
) {
    let job_id = job.id;
    let job_type = job.job_type;

    let _ = event_tx.send(WorkerEvent::JobStarted { job_id, job_type });
    debug!(
        subsystem = "jobs",
        component = "worker",
        job_id = %job_id,
        job_type = job_type.as_str(),
        "Executing job"
    );

    let Some(handler) = handlers.get(&job_type) else {
        let msg = format!("No handler registered for job type {}", job_type.as_str());
        error!(job_id = %job_id, job_type = job_type.as_str(), "{}", msg);
        if let Err(e) = jobs.fail(job_id, &msg).await {
            error!(job_id = %job_id, error = %e, "Failed to mark job failed");
        }
        let _ = event_tx.send(WorkerEvent::JobFailed {
            job_id,
            job_type,
            error: msg,
        });
        return;
    };

    match handler.execute(JobContext::new(job)).await {
        JobResult::Success(result) => {
            if let Err(e) = jobs.complete(job_id, result).await {
                error!(job_id = %job_id, error = %e, "Failed to mark job completed");
            }
            let _ = event_tx.send(WorkerEvent::JobCompleted { job_id, job_type });
        }
        JobResult::Failed(msg) | JobResult::Retry(msg) => {
            if let Err(e) = jobs.fail(job_id, &msg).await {
                error!(job_id = %job_id, error = %e, "Failed to mark job failed");
            }
            let _ = event_tx.send(WorkerEvent::JobFailed {
                job_id,
                job_type,
                error: msg,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use crate::handler::NoOpHandler;
    use fieldmark_core::JobStatus;

    #[derive(Default)]
    struct InMemoryJobs {
        queue: Mutex<VecDeque<Job>>,
        completed: Mutex<Vec<Uuid>>,
        failed: Mutex<Vec<(Uuid, String)>>,
    }

    impl InMemoryJobs {
        fn push(&self, job_type: JobType, payload: Option<JsonValue>) -> Uuid {
            let id = Uuid::now_v7();
            self.queue.lock().unwrap().push_back(Job {
                id,
                job_type,
                status: JobStatus::Pending,
                priority: 0,
                payload,
                result: None,
                error_message: None,
                retry_count: 0,
                max_retries: 3,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
            });
            id
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobs {
        async fn enqueue(
            &self,
            job_type: JobType,
            _priority: i32,
            payload: Option<JsonValue>,
        ) -> fieldmark_core::Result<Uuid> {
            Ok(self.push(job_type, payload))
        }

        async fn claim_next(&self) -> fieldmark_core::Result<Option<Job>> {
            Ok(self.queue.lock().unwrap().pop_front())
        }

        async fn complete(
            &self,
            id: Uuid,
            _result: Option<JsonValue>,
        ) -> fieldmark_core::Result<()> {
            self.completed.lock().unwrap().push(id);
            Ok(())
        }

        async fn fail(&self, id: Uuid, error: &str) -> fieldmark_core::Result<()> {
            self.failed.lock().unwrap().push((id, error.to_string()));
            Ok(())
        }
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<WorkerEvent>,
        mut pred: impl FnMut(&WorkerEvent) -> bool,
    ) -> WorkerEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for worker event")
    }

    #[test]
    fn test_worker_config_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, defaults::JOB_POLL_INTERVAL_MS);
        assert_eq!(config.max_concurrent_jobs, defaults::JOB_MAX_CONCURRENT);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(50)
            .with_max_concurrent(2)
            .with_enabled(false);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.max_concurrent_jobs, 2);
        assert!(!config.enabled);
    }

    #[tokio::test]
    async fn test_worker_processes_queued_job() {
        let jobs = Arc::new(InMemoryJobs::default());

        let worker = JobWorker::new(
            jobs.clone(),
            WorkerConfig::default().with_poll_interval(10),
        )
        .with_handler(Arc::new(NoOpHandler::new(JobType::Retention)));
        let handle = worker.start();
        let mut events = handle.events();
        let job_id = jobs.push(JobType::Retention, None);

        wait_for(&mut events, |e| {
            matches!(e, WorkerEvent::JobCompleted { job_id: id, .. } if *id == job_id)
        })
        .await;

        assert_eq!(jobs.completed.lock().unwrap().as_slice(), &[job_id]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_fails_job_without_handler() {
        let jobs = Arc::new(InMemoryJobs::default());

        let worker = JobWorker::new(
            jobs.clone(),
            WorkerConfig::default().with_poll_interval(10),
        );
        let handle = worker.start();
        let mut events = handle.events();
        let job_id = jobs.push(JobType::ProjectImport, None);

        wait_for(&mut events, |e| {
            matches!(e, WorkerEvent::JobFailed { job_id: id, .. } if *id == job_id)
        })
        .await;

        let failed = jobs.failed.lock().unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].1.contains("No handler registered"));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_shutdown_emits_stopped() {
        let jobs = Arc::new(InMemoryJobs::default());
        let worker = JobWorker::new(
            jobs,
            WorkerConfig::default().with_poll_interval(10),
        );
        let handle = worker.start();
        let mut events = handle.events();

        handle.shutdown().await.unwrap();
        wait_for(&mut events, |e| matches!(e, WorkerEvent::WorkerStopped)).await;
    }

    #[tokio::test]
    async fn test_disabled_worker_does_not_claim() {
        let jobs = Arc::new(InMemoryJobs::default());
        jobs.push(JobType::Retention, None);

        let worker = JobWorker::new(
            jobs.clone(),
            WorkerConfig::default().with_enabled(false),
        )
        .with_handler(Arc::new(NoOpHandler::new(JobType::Retention)));
        let _handle = worker.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(jobs.queue.lock().unwrap().len(), 1);
        assert!(jobs.completed.lock().unwrap().is_empty());
    }
}

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::runtime::params::MarketingParams;
use crate::runtime::session::{Session, SessionStore};
use crate::runtime::storage::TaskStore;
use crate::runtime::types::{
    ImageSlot, MarketingCopy, OverallStatus, RuntimeError, StageStatus, StatusReport, TaskResult,
    TaskStatus, TaskToken, mint_token,
};
use crate::services::{ContentGenerator, GenerationError, ImageGenerator};

/// Message recorded on a task whose worker panicked.
pub const INTERNAL_FAILURE: &str = "internal error during generation";

/// Sizing of the background worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Jobs accepted but not yet picked up by a worker.
    pub queue_capacity: usize,
    /// Jobs running at the same time.
    pub max_workers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_workers: 16,
        }
    }
}

/// The content and image collaborators used by workers.
#[derive(Clone)]
pub struct Generators {
    pub content: Arc<dyn ContentGenerator>,
    pub image: Arc<dyn ImageGenerator>,
}

/// Work a task performs once a worker picks it up.
enum Job {
    /// Content, then an image built from that content.
    Full(MarketingParams),
    /// Content only; the image half stays `not_started`.
    Content(MarketingParams),
    /// Image only, from content produced by an earlier task.
    Image {
        params: MarketingParams,
        content: MarketingCopy,
    },
}

impl Job {
    fn kind(&self) -> &'static str {
        match self {
            Job::Full(_) => "full",
            Job::Content(_) => "content",
            Job::Image { .. } => "image",
        }
    }
}

struct Submission {
    token: TaskToken,
    job: Job,
}

/// Failure inside a worker, before it reaches the task record.
#[derive(Debug, Error)]
enum WorkerError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] RuntimeError),
}

/// Entry point for submitting generation work and polling its outcome.
///
/// Handlers call into the orchestrator, which registers state in the stores
/// and hands the job to a bounded worker pool; the call returns as soon as
/// the job is queued.
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::start(tasks, sessions, generators, OrchestratorConfig::default());
/// let token = orchestrator.submit_generation(params).await?;
/// let report = orchestrator.check_status(&token).await?;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    tasks: Arc<dyn TaskStore>,
    sessions: Arc<dyn SessionStore>,
    submit_tx: mpsc::Sender<Submission>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (free, capacity) = self.queue_slots();
        f.debug_struct("Orchestrator")
            .field("queue_capacity", &capacity)
            .field("queue_free", &free)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start the orchestrator and spawn its dispatch loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        tasks: Arc<dyn TaskStore>,
        sessions: Arc<dyn SessionStore>,
        generators: Generators,
        config: OrchestratorConfig,
    ) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel::<Submission>(config.queue_capacity.max(1));
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));

        let loop_tasks = Arc::clone(&tasks);
        tokio::spawn(async move {
            Self::run_loop(submit_rx, loop_tasks, generators, workers).await;
        });

        Self {
            tasks,
            sessions,
            submit_tx,
        }
    }

    /// Dispatch loop: takes a worker slot first, then the next job.
    ///
    /// Jobs stay in the bounded queue while every worker is busy, so a full
    /// pool shows up as `QueueFull` on submission.
    async fn run_loop(
        mut rx: mpsc::Receiver<Submission>,
        tasks: Arc<dyn TaskStore>,
        generators: Generators,
        workers: Arc<Semaphore>,
    ) {
        loop {
            let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
                break;
            };
            let Some(submission) = rx.recv().await else {
                break;
            };

            let tasks = Arc::clone(&tasks);
            let generators = generators.clone();
            tokio::spawn(async move {
                let _permit = permit;
                Self::supervise(submission, tasks, generators).await;
            });
        }
        info!("orchestrator dispatch loop stopped");
    }

    /// Run one job and write its outcome, including panics, into the task.
    async fn supervise(submission: Submission, tasks: Arc<dyn TaskStore>, generators: Generators) {
        let Submission { token, job } = submission;
        let kind = job.kind();
        info!(task_id = %token, kind, "task started");

        let worker_tasks = Arc::clone(&tasks);
        let worker_token = token.clone();
        let outcome = tokio::spawn(async move {
            Self::execute(&worker_token, job, worker_tasks.as_ref(), &generators).await
        })
        .await;

        let message = match outcome {
            Ok(Ok(())) => {
                info!(task_id = %token, kind, "task completed");
                return;
            }
            Ok(Err(WorkerError::Generation(e))) => {
                warn!(task_id = %token, kind, error = %e, "task failed");
                e.to_string()
            }
            Ok(Err(WorkerError::Store(e))) => {
                error!(task_id = %token, kind, error = %e, "task record update failed");
                e.to_string()
            }
            Err(join) => {
                error!(task_id = %token, kind, error = %join, "worker panicked");
                INTERNAL_FAILURE.to_owned()
            }
        };

        if let Err(e) = tasks.set_error(&token, &message).await {
            warn!(task_id = %token, error = %e, "could not record task failure");
        }
    }

    async fn execute(
        token: &str,
        job: Job,
        tasks: &dyn TaskStore,
        generators: &Generators,
    ) -> Result<(), WorkerError> {
        match job {
            Job::Full(params) => {
                let content = generators.content.generate_copy(&params).await?;
                tasks.publish_content(token, content.clone()).await?;
                debug!(task_id = %token, "content published");

                let image = Self::render(token, generators, &content, &params).await;
                tasks.publish_image(token, image).await?;
            }
            Job::Content(params) => {
                let content = generators.content.generate_copy(&params).await?;
                tasks.publish_content(token, content).await?;
            }
            Job::Image { params, content } => {
                let image = Self::render(token, generators, &content, &params).await;
                tasks.publish_image(token, image).await?;
            }
        }
        tasks.mark_completed(token).await?;
        Ok(())
    }

    /// Image failures never fail the task; they surface as an unavailable image.
    async fn render(
        token: &str,
        generators: &Generators,
        content: &MarketingCopy,
        params: &MarketingParams,
    ) -> ImageSlot {
        match generators
            .image
            .generate_image(content, &params.img_prompt, &params.logo)
            .await
        {
            Ok(bytes) => ImageSlot::Ready(bytes),
            Err(e) => {
                warn!(task_id = %token, error = %e, "image generation failed; continuing without image");
                ImageSlot::Unavailable
            }
        }
    }

    fn dispatch(&self, token: &str, job: Job) -> Result<(), RuntimeError> {
        let kind = job.kind();
        self.submit_tx
            .try_send(Submission {
                token: token.to_owned(),
                job,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RuntimeError::QueueFull {
                    capacity: self.submit_tx.max_capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => RuntimeError::Shutdown,
            })?;
        debug!(task_id = %token, kind, "task queued");
        Ok(())
    }

    // ── Public API ───────────────────────────────────────────────────────────

    /// `(free, total)` slots of the submission queue.
    pub fn queue_slots(&self) -> (usize, usize) {
        (self.submit_tx.capacity(), self.submit_tx.max_capacity())
    }

    /// Start a full generation and open a session for later regeneration.
    ///
    /// If the job cannot be queued, the task and session are rolled back.
    pub async fn submit_generation(
        &self,
        params: MarketingParams,
    ) -> Result<TaskToken, RuntimeError> {
        let token = mint_token();
        self.tasks
            .create_task(
                &token,
                TaskStatus::new(StageStatus::Processing, StageStatus::Processing),
                TaskResult::default(),
            )
            .await?;
        self.sessions.create_session(&token, params.clone()).await;

        if let Err(e) = self.dispatch(&token, Job::Full(params)) {
            self.sessions.remove_session(&token).await;
            self.tasks.delete_task(&token).await;
            return Err(e);
        }
        info!(task_id = %token, "generation submitted");
        Ok(token)
    }

    /// Regenerate only the copy, with `overrides` merged over the session's
    /// stored parameters.
    pub async fn regenerate_content(
        &self,
        root: &str,
        overrides: Map<String, Value>,
    ) -> Result<TaskToken, RuntimeError> {
        let session = self.live_session(root).await?;
        let params = session.params.with_overrides(overrides)?;

        let token = mint_token();
        self.tasks
            .create_task(
                &token,
                TaskStatus::new(StageStatus::Processing, StageStatus::NotStarted),
                TaskResult::default(),
            )
            .await?;
        self.enqueue_derived(root, &token, Job::Content(params))
            .await?;
        Ok(token)
    }

    /// Regenerate only the image from the root task's content, optionally
    /// with a different logo.
    pub async fn regenerate_image(
        &self,
        root: &str,
        logo: Option<String>,
    ) -> Result<TaskToken, RuntimeError> {
        let session = self.live_session(root).await?;
        let content = self
            .tasks
            .get_result(root)
            .await
            .ok()
            .and_then(|r| r.content)
            .ok_or_else(|| RuntimeError::ContentNotFound {
                root: root.to_owned(),
            })?;
        let params = session.params.with_logo(logo);

        let token = mint_token();
        self.tasks
            .create_task(
                &token,
                TaskStatus::new(StageStatus::NotStarted, StageStatus::Processing),
                TaskResult {
                    content: Some(content.clone()),
                    image: ImageSlot::NotRequested,
                },
            )
            .await?;
        self.enqueue_derived(root, &token, Job::Image { params, content })
            .await?;
        Ok(token)
    }

    /// Report progress or the outcome of a task.
    ///
    /// A terminal task with no live session keyed by its token is removed
    /// right after this read, so a second query reports it unknown.
    pub async fn check_status(&self, token: &str) -> Result<StatusReport, RuntimeError> {
        let snapshot = self.tasks.snapshot(token).await?;
        let has_session = self.sessions.get_session(token).await.is_some();

        let report = match snapshot.status.overall_status {
            OverallStatus::Processing => return Ok(StatusReport::Processing(snapshot.status)),
            OverallStatus::Completed => StatusReport::Completed(snapshot.result),
            OverallStatus::Failed => StatusReport::Failed(
                snapshot
                    .status
                    .error
                    .unwrap_or_else(|| "Unknown error".to_owned()),
            ),
        };

        if !has_session {
            self.tasks.delete_task(token).await;
            debug!(task_id = %token, "terminal task consumed");
        }
        Ok(report)
    }

    async fn live_session(&self, root: &str) -> Result<Session, RuntimeError> {
        self.sessions
            .get_session(root)
            .await
            .ok_or_else(|| RuntimeError::SessionNotFound {
                root: root.to_owned(),
            })
    }

    /// Queue a regeneration and record it under its root session.
    async fn enqueue_derived(&self, root: &str, token: &str, job: Job) -> Result<(), RuntimeError> {
        let kind = job.kind();
        if let Err(e) = self.dispatch(token, job) {
            self.tasks.delete_task(token).await;
            return Err(e);
        }
        // The session may expire between lookup and here; the task still runs.
        if let Err(e) = self.sessions.append_task(root, token).await {
            warn!(root = %root, task_id = %token, error = %e, "could not record regeneration in session");
        }
        info!(root = %root, task_id = %token, kind, "regeneration submitted");
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::runtime::types::{
    ImageSlot, MarketingCopy, OverallStatus, RuntimeError, Stage, StageStatus, TaskResult,
    TaskSnapshot, TaskStatus,
};

/// Registry of task status and result records.
///
/// Status and result for one token are written together by
/// [`TaskStore::publish_content`] / [`TaskStore::publish_image`] so that a
/// reader never sees a completed sub-status without the matching result field.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Insert a new record; fails if the token is already present.
    async fn create_task(
        &self,
        token: &str,
        status: TaskStatus,
        seed: TaskResult,
    ) -> Result<(), RuntimeError>;

    async fn update_status(
        &self,
        token: &str,
        stage: Stage,
        value: StageStatus,
    ) -> Result<(), RuntimeError>;

    /// Transition the task to `failed`, recording `message`.
    async fn set_error(&self, token: &str, message: &str) -> Result<(), RuntimeError>;

    /// Store generated content, then mark the content half completed.
    async fn publish_content(&self, token: &str, content: MarketingCopy)
    -> Result<(), RuntimeError>;

    /// Store the image outcome, then mark the image half completed.
    async fn publish_image(&self, token: &str, image: ImageSlot) -> Result<(), RuntimeError>;

    /// Transition the task to `completed`.
    async fn mark_completed(&self, token: &str) -> Result<(), RuntimeError>;

    async fn get_status(&self, token: &str) -> Result<TaskStatus, RuntimeError>;

    async fn get_result(&self, token: &str) -> Result<TaskResult, RuntimeError>;

    /// Status and result read atomically.
    async fn snapshot(&self, token: &str) -> Result<TaskSnapshot, RuntimeError>;

    /// Remove a record. No-op if absent.
    async fn delete_task(&self, token: &str);
}

/// The complete in-memory record for a single task.
#[derive(Debug)]
struct TaskRecord {
    status: TaskStatus,
    result: TaskResult,
}

/// In-memory [`TaskStore`].
///
/// Uses a `tokio::sync::RwLock<HashMap>` so many pollers can read
/// concurrently while workers update their own records.
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStore {
    inner: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    async fn with_record<R>(
        &self,
        token: &str,
        f: impl FnOnce(&mut TaskRecord) -> R,
    ) -> Result<R, RuntimeError> {
        let mut guard = self.inner.write().await;
        let record = guard.get_mut(token).ok_or_else(|| unknown(token))?;
        Ok(f(record))
    }
}

fn unknown(token: &str) -> RuntimeError {
    RuntimeError::UnknownTask {
        token: token.to_owned(),
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_task(
        &self,
        token: &str,
        status: TaskStatus,
        seed: TaskResult,
    ) -> Result<(), RuntimeError> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(token) {
            return Err(RuntimeError::DuplicateTask {
                token: token.to_owned(),
            });
        }
        guard.insert(token.to_owned(), TaskRecord { status, result: seed });
        Ok(())
    }

    async fn update_status(
        &self,
        token: &str,
        stage: Stage,
        value: StageStatus,
    ) -> Result<(), RuntimeError> {
        self.with_record(token, |r| r.status.set_stage(stage, value))
            .await
    }

    async fn set_error(&self, token: &str, message: &str) -> Result<(), RuntimeError> {
        self.with_record(token, |r| {
            r.status.overall_status = OverallStatus::Failed;
            r.status.error = Some(message.to_owned());
        })
        .await
    }

    async fn publish_content(
        &self,
        token: &str,
        content: MarketingCopy,
    ) -> Result<(), RuntimeError> {
        self.with_record(token, |r| {
            r.result.content = Some(content);
            r.status.content_status = StageStatus::Completed;
        })
        .await
    }

    async fn publish_image(&self, token: &str, image: ImageSlot) -> Result<(), RuntimeError> {
        self.with_record(token, |r| {
            r.result.image = image;
            r.status.image_status = StageStatus::Completed;
        })
        .await
    }

    async fn mark_completed(&self, token: &str) -> Result<(), RuntimeError> {
        self.with_record(token, |r| {
            r.status.overall_status = OverallStatus::Completed;
        })
        .await
    }

    async fn get_status(&self, token: &str) -> Result<TaskStatus, RuntimeError> {
        let guard = self.inner.read().await;
        guard
            .get(token)
            .map(|r| r.status.clone())
            .ok_or_else(|| unknown(token))
    }

    async fn get_result(&self, token: &str) -> Result<TaskResult, RuntimeError> {
        let guard = self.inner.read().await;
        guard
            .get(token)
            .map(|r| r.result.clone())
            .ok_or_else(|| unknown(token))
    }

    async fn snapshot(&self, token: &str) -> Result<TaskSnapshot, RuntimeError> {
        let guard = self.inner.read().await;
        let record = guard.get(token).ok_or_else(|| unknown(token))?;
        Ok(TaskSnapshot {
            status: record.status.clone(),
            result: record.result.clone(),
        })
    }

    async fn delete_task(&self, token: &str) {
        self.inner.write().await.remove(token);
    }
}

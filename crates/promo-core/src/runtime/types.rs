use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Opaque identifier for a submitted generation task (a UUID v4 string).
pub type TaskToken = String;

/// Mint a fresh task token.
pub fn mint_token() -> TaskToken {
    uuid::Uuid::new_v4().to_string()
}

/// Lifecycle state of a whole task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverallStatus {
    Processing,
    Completed,
    Failed,
}

impl OverallStatus {
    /// Returns `true` for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, OverallStatus::Completed | OverallStatus::Failed)
    }
}

/// Progress of one half (content or image) of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageStatus {
    NotStarted,
    Processing,
    Completed,
}

/// The two independently tracked halves of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Content,
    Image,
}

/// Status record of a task, as reported to polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    pub overall_status: OverallStatus,
    pub content_status: StageStatus,
    pub image_status: StageStatus,
    /// Set only when `overall_status` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn new(content_status: StageStatus, image_status: StageStatus) -> Self {
        Self {
            overall_status: OverallStatus::Processing,
            content_status,
            image_status,
            error: None,
        }
    }

    pub fn stage(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Content => self.content_status,
            Stage::Image => self.image_status,
        }
    }

    pub(crate) fn set_stage(&mut self, stage: Stage, value: StageStatus) {
        match stage {
            Stage::Content => self.content_status = value,
            Stage::Image => self.image_status = value,
        }
    }
}

/// Marketing copy produced by the content collaborator.
///
/// Field names on the wire follow the keys the language model is asked to
/// return (`Title`, `Punchline`, `Content`, `Hashtags`, `Keywords`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketingCopy {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Punchline", default)]
    pub punchline: String,
    #[serde(rename = "Content")]
    pub body: String,
    #[serde(rename = "Hashtags", default, deserialize_with = "string_or_list")]
    pub hashtags: Vec<String>,
    #[serde(rename = "Keywords", default, deserialize_with = "string_or_list")]
    pub keywords: Vec<String>,
}

/// Models sometimes answer with `"#a #b"` or `"a, b"` instead of a JSON list.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::List(items) => items,
        Repr::Text(text) => {
            let items: Vec<&str> = if text.contains(',') {
                text.split(',').collect()
            } else {
                text.split_whitespace().collect()
            };
            items
                .into_iter()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        }
    })
}

/// The image half of a task result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageSlot {
    /// The task never asked for an image (content-only regeneration).
    #[default]
    NotRequested,
    /// Image generation ran and failed; tolerated, reported as `null`.
    Unavailable,
    /// Encoded JPEG bytes.
    Ready(Bytes),
}

/// Result record of a task, filled in as each half completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResult {
    pub content: Option<MarketingCopy>,
    pub image: ImageSlot,
}

/// Status and result of a task read under a single lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    pub result: TaskResult,
}

/// Outcome of a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    Processing(TaskStatus),
    Completed(TaskResult),
    Failed(String),
}

/// Errors produced by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A task with this token is already registered.
    #[error("task already exists: {token}")]
    DuplicateTask { token: TaskToken },

    /// The referenced task does not exist (never created or already consumed).
    #[error("task not found: {token}")]
    UnknownTask { token: TaskToken },

    /// No live session is keyed by this root token.
    #[error("session expired or not found: {root}")]
    SessionNotFound { root: TaskToken },

    /// The root task has not produced content yet.
    #[error("original content not found for task {root}")]
    ContentNotFound { root: TaskToken },

    /// A required request field is absent.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// Request parameters are present but malformed.
    #[error("invalid request parameters: {message}")]
    InvalidParams { message: String },

    /// The worker queue is saturated.
    #[error("orchestrator queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The dispatch loop has stopped.
    #[error("orchestrator shut down")]
    Shutdown,
}

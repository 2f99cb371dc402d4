use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use promo_core::{ImageSlot, MarketingCopy, StatusReport, TaskResult, TaskStatus};
use serde::Serialize;
use utoipa::ToSchema;

/// Sub-statuses of a task that is still running.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressView {
    /// `processing`, `completed` or `failed`.
    pub overall_status: String,
    /// `not_started`, `processing` or `completed`.
    pub content_status: String,
    /// `not_started`, `processing` or `completed`.
    pub image_status: String,
}

impl From<TaskStatus> for ProgressView {
    fn from(status: TaskStatus) -> Self {
        Self {
            overall_status: status.overall_status.to_string(),
            content_status: status.content_status.to_string(),
            image_status: status.image_status.to_string(),
        }
    }
}

/// Generated marketing copy, keyed the way the language model returns it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContentView {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Punchline")]
    pub punchline: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Hashtags")]
    pub hashtags: Vec<String>,
    #[serde(rename = "Keywords")]
    pub keywords: Vec<String>,
}

impl From<MarketingCopy> for ContentView {
    fn from(copy: MarketingCopy) -> Self {
        Self {
            title: copy.title,
            punchline: copy.punchline,
            content: copy.body,
            hashtags: copy.hashtags,
            keywords: copy.keywords,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResultView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentView>,
    /// `data:image/jpeg;base64,...`; `null` when generation failed, absent
    /// when the task never produced an image.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

impl From<TaskResult> for ResultView {
    fn from(result: TaskResult) -> Self {
        let image = match result.image {
            ImageSlot::NotRequested => None,
            ImageSlot::Unavailable => Some(None),
            ImageSlot::Ready(bytes) => Some(Some(format!(
                "data:image/jpeg;base64,{}",
                STANDARD.encode(&bytes)
            ))),
        };
        Self {
            content: result.content.map(ContentView::from),
            image,
        }
    }
}

/// Answer of `GET /check-status/{task_id}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    Processing { progress: ProgressView },
    Completed { result: ResultView },
    Failed { error: String },
}

impl From<StatusReport> for StatusResponse {
    fn from(report: StatusReport) -> Self {
        match report {
            StatusReport::Processing(status) => StatusResponse::Processing {
                progress: status.into(),
            },
            StatusReport::Completed(result) => StatusResponse::Completed {
                result: result.into(),
            },
            StatusReport::Failed(error) => StatusResponse::Failed { error },
        }
    }
}

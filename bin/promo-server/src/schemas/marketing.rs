use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::ServerError;

/// Body of `POST /generate-marketing-content`.
///
/// Only used for the OpenAPI document; handlers validate the raw JSON with
/// `MarketingParams::from_json` so the first missing field is reported by
/// name. Extra fields are accepted and remembered for regeneration.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct GenerateMarketingRequest {
    /// Description of the picture to generate.
    pub img_prompt: String,
    /// What the campaign is about.
    pub prompt: String,
    /// One platform name or a list, e.g. `["Twitter", "LinkedIn"]`.
    #[schema(value_type = Vec<String>)]
    pub platform: Value,
    pub product: String,
    /// Base64 logo, plain or as a `data:` URL.
    pub logo: String,
}

/// Body of `POST /regenerate-content`: `task_id` plus any field of the
/// original request to override.
#[derive(Debug)]
pub struct RegenerateContentRequest {
    pub task_id: String,
    pub overrides: Map<String, Value>,
}

impl RegenerateContentRequest {
    pub fn from_json(body: Value) -> Result<Self, ServerError> {
        let mut overrides = into_object(body)?;
        let task_id = take_task_id(&mut overrides)?;
        Ok(Self { task_id, overrides })
    }
}

/// Body of `POST /regenerate-image`.
#[derive(Debug, ToSchema)]
pub struct RegenerateImageRequest {
    /// Root task whose session and content are reused.
    pub task_id: String,
    /// Replacement logo; the original one is reused when absent.
    pub logo: Option<String>,
}

impl RegenerateImageRequest {
    pub fn from_json(body: Value) -> Result<Self, ServerError> {
        let mut fields = into_object(body)?;
        let task_id = take_task_id(&mut fields)?;
        let logo = match fields.remove("logo") {
            None | Some(Value::Null) => None,
            Some(Value::String(logo)) => Some(logo),
            Some(_) => return Err(ServerError::BadRequest("logo must be a string".to_owned())),
        };
        Ok(Self { task_id, logo })
    }
}

/// Answer to every accepted submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmittedResponse {
    pub task_id: String,
    /// Always `"processing"`.
    pub status: String,
}

impl SubmittedResponse {
    pub fn processing(task_id: String) -> Self {
        Self {
            task_id,
            status: "processing".to_owned(),
        }
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, ServerError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ServerError::BadRequest(
            "request body must be a JSON object".to_owned(),
        )),
    }
}

fn take_task_id(fields: &mut Map<String, Value>) -> Result<String, ServerError> {
    match fields.remove("task_id") {
        None => Err(ServerError::BadRequest("Missing task_id".to_owned())),
        Some(Value::String(task_id)) => Ok(task_id),
        Some(_) => Err(ServerError::BadRequest("task_id must be a string".to_owned())),
    }
}

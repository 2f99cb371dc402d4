use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::runtime::types::RuntimeError;

/// Fields a full-generation request must carry, in validation order.
pub const REQUIRED_FIELDS: [&str; 5] = ["img_prompt", "prompt", "platform", "product", "logo"];

/// Target platform(s): callers send either a single name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Platforms {
    One(String),
    Many(Vec<String>),
}

impl Platforms {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Platforms::One(name) => vec![name.as_str()],
            Platforms::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// The parameters of a generation request, kept verbatim in a session so a
/// later regeneration can reuse whatever the caller does not resupply.
///
/// Unknown fields ride along in `extra` and survive merges untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingParams {
    pub img_prompt: String,
    pub prompt: String,
    pub platform: Platforms,
    pub product: String,
    /// Base64 logo, optionally as a `data:` URL.
    pub logo: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarketingParams {
    /// Validate a raw request body.
    ///
    /// Presence is checked first, field by field in [`REQUIRED_FIELDS`]
    /// order, so the caller learns about the first missing field by name.
    pub fn from_json(body: Value) -> Result<Self, RuntimeError> {
        let Value::Object(map) = body else {
            return Err(RuntimeError::InvalidParams {
                message: "request body must be a JSON object".to_owned(),
            });
        };
        if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !map.contains_key(**f)) {
            return Err(RuntimeError::MissingField { field: *field });
        }
        serde_json::from_value(Value::Object(map)).map_err(|e| RuntimeError::InvalidParams {
            message: e.to_string(),
        })
    }

    /// Merge caller overrides over a copy of these parameters.
    ///
    /// Every key except `task_id` replaces the stored value; keys absent from
    /// `overrides` keep their original value.
    pub fn with_overrides(&self, overrides: Map<String, Value>) -> Result<Self, RuntimeError> {
        let invalid = |e: serde_json::Error| RuntimeError::InvalidParams {
            message: e.to_string(),
        };
        let Value::Object(mut merged) = serde_json::to_value(self).map_err(invalid)? else {
            return Err(RuntimeError::InvalidParams {
                message: "stored parameters are not an object".to_owned(),
            });
        };
        for (key, value) in overrides {
            if key != "task_id" {
                merged.insert(key, value);
            }
        }
        serde_json::from_value(Value::Object(merged)).map_err(invalid)
    }

    /// Copy of these parameters with the logo optionally replaced.
    pub fn with_logo(&self, logo: Option<String>) -> Self {
        let mut params = self.clone();
        if let Some(logo) = logo {
            params.logo = logo;
        }
        params
    }
}

//! Templated calls to the generative text service and the fallbacks around them.
//!
//! Callers depend on [`TextGenerator`] rather than a concrete client so that
//! every generation step can degrade deterministically when the service is
//! missing, failing, or returns output that does not fit the requested schema.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::DrugBriefError;

pub(crate) mod condense;
pub(crate) mod image;
pub(crate) mod prompts;
pub(crate) mod summary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_base64: String,
}

/// One templated generation: the rendered prompt plus the JSON schema the
/// output must satisfy.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub template: &'static str,
    pub prompt: String,
    pub output_schema: Value,
    pub image: Option<InlineImage>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the structured output, or `Ok(None)` when the service produced nothing.
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Value>, DrugBriefError>;
}

/// Schema for an object with a single required, non-empty string field.
pub(crate) fn string_field_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            field: {"type": "STRING", "description": description}
        },
        "required": [field]
    })
}

/// Runs a request whose schema is [`string_field_schema`] and returns the trimmed field.
///
/// Missing output, a missing or non-string field, and an empty string all count as failures.
pub(crate) async fn generate_string_field(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
    field: &str,
) -> Result<String, DrugBriefError> {
    let output = generator
        .generate(request)
        .await?
        .ok_or_else(|| DrugBriefError::Api {
            api: request.template.to_string(),
            message: "generation returned no output".into(),
        })?;

    output
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DrugBriefError::Api {
            api: request.template.to_string(),
            message: format!("generation output is missing a non-empty \"{field}\" field"),
        })
}

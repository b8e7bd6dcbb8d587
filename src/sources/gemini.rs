use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::DrugBriefError;
use crate::generate::{GenerationRequest, TextGenerator};

pub(crate) const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub(crate) const GEMINI_BASE_ENV: &str = "DRUGBRIEF_GEMINI_BASE";
pub(crate) const GEMINI_MODEL_ENV: &str = "DRUGBRIEF_GEMINI_MODEL";
pub(crate) const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub(crate) const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";
const GEMINI_API: &str = "gemini";
const GEMINI_DOCS_URL: &str = "https://aistudio.google.com/app/apikey";

pub struct GeminiClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
    model: Cow<'static, str>,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new() -> Result<Self, DrugBriefError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(GEMINI_BASE, GEMINI_BASE_ENV),
            model: crate::sources::env_base(GEMINI_DEFAULT_MODEL, GEMINI_MODEL_ENV),
            api_key: crate::sources::env_secret(GEMINI_API_KEY_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String, api_key: Option<String>) -> Result<Self, DrugBriefError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base),
            model: Cow::Borrowed(GEMINI_DEFAULT_MODEL),
            api_key,
        })
    }

    /// Fails early with [`DrugBriefError::ApiKeyRequired`] when no key is configured.
    pub(crate) fn ensure_api_key(&self) -> Result<(), DrugBriefError> {
        self.api_key().map(|_| ())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base.as_ref().trim_end_matches('/'),
            self.model
        )
    }

    fn api_key(&self) -> Result<&str, DrugBriefError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| DrugBriefError::ApiKeyRequired {
                api: "Gemini".into(),
                env_var: GEMINI_API_KEY_ENV.into(),
                docs_url: GEMINI_DOCS_URL.into(),
            })
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": image.data_base64,
                }
            }));
        }
        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json",
                "responseSchema": request.output_schema,
            }
        })
    }

    /// Sends one `generateContent` call and returns the first candidate's text.
    pub async fn generate_text(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, DrugBriefError> {
        let key = self.api_key()?;
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, GEMINI_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(DrugBriefError::Api {
                api: GEMINI_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        crate::sources::ensure_json_content_type(GEMINI_API, content_type.as_ref(), &bytes)?;

        let parsed: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(|source| DrugBriefError::ApiJson {
                api: GEMINI_API.to_string(),
                source,
            })?;
        Ok(parsed.first_text())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Value>, DrugBriefError> {
        let Some(text) = self.generate_text(request).await? else {
            debug!(template = request.template, "Gemini returned no candidate text");
            return Ok(None);
        };
        let cleaned = strip_code_fences(&text);
        if cleaned.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(cleaned)
            .map(Some)
            .map_err(|source| DrugBriefError::ApiJson {
                api: GEMINI_API.to_string(),
                source,
            })
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

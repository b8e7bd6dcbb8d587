use std::borrow::Cow;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::DrugBriefError;
use crate::utils::serde::StringOrVec;

pub(crate) const OPENFDA_BASE: &str = "https://api.fda.gov";
pub(crate) const OPENFDA_BASE_ENV: &str = "DRUGBRIEF_OPENFDA_BASE";
const OPENFDA_API: &str = "openfda";

pub(crate) const LABEL_MAX_LIMIT: usize = 20;

pub(crate) const LABEL_NAME_FIELDS: &[&str] = &[
    "openfda.generic_name",
    "openfda.brand_name",
    "openfda.substance_name",
];

pub struct OpenFdaClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
    api_key: Option<String>,
}

impl OpenFdaClient {
    pub fn new() -> Result<Self, DrugBriefError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(OPENFDA_BASE, OPENFDA_BASE_ENV),
            api_key: crate::sources::env_secret("OPENFDA_API_KEY"),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String, api_key: Option<String>) -> Result<Self, DrugBriefError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base),
            api_key: api_key
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json_optional<T: DeserializeOwned>(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> Result<Option<T>, DrugBriefError> {
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, OPENFDA_API).await?;

        // openFDA answers 404 NOT_FOUND when a search matches no documents.
        if status.as_u16() == 404 {
            return Ok(None);
        }

        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(DrugBriefError::Api {
                api: OPENFDA_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| DrugBriefError::ApiJson {
                api: OPENFDA_API.to_string(),
                source,
            })
    }

    /// Searches drug labels with a prebuilt Lucene query.
    pub async fn label_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Option<OpenFdaResponse<LabelResult>>, DrugBriefError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DrugBriefError::InvalidArgument(
                "Label search requires at least one ingredient name.".into(),
            ));
        }
        if query.len() > 4096 {
            return Err(DrugBriefError::InvalidArgument("Query is too long.".into()));
        }
        if limit == 0 || limit > LABEL_MAX_LIMIT {
            return Err(DrugBriefError::InvalidArgument(format!(
                "Label search limit must be between 1 and {LABEL_MAX_LIMIT}"
            )));
        }

        let url = self.endpoint("drug/label.json");
        let mut req = self
            .client
            .get(&url)
            .query(&[("search", query), ("limit", &limit.to_string())]);
        if let Some(key) = self.api_key.as_deref() {
            req = req.query(&[("api_key", key)]);
        }
        self.get_json_optional(req).await
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenFdaResponse<T> {
    #[serde(default)]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelResult {
    #[serde(default)]
    pub adverse_reactions: StringOrVec,
    #[serde(default)]
    pub warnings: StringOrVec,
    #[serde(default)]
    pub openfda: Option<LabelOpenFda>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelOpenFda {
    #[serde(default)]
    pub generic_name: Vec<String>,
    #[serde(default)]
    pub brand_name: Vec<String>,
}

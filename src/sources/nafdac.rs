use std::borrow::Cow;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::error::DrugBriefError;

pub(crate) const NAFDAC_BASE: &str = "https://greenbook.nafdac.gov.ng/api/datatable/drugs";
pub(crate) const NAFDAC_BASE_ENV: &str = "DRUGBRIEF_NAFDAC_BASE";
const NAFDAC_API: &str = "nafdac";

pub(crate) const MAX_PAGE_SIZE: usize = 50;

// Column order the Greenbook datatable expects; index 1 is the default sort column.
const COLUMNS: &[&str] = &[
    "sn",
    "product_name",
    "registration_number",
    "holder",
    "active_ingredients",
];
const REGISTRATION_COLUMN: usize = 2;

/// Which server-side field a registry search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrySearchField {
    /// Global datatable search across all searchable columns.
    Any,
    /// Column search on `registration_number`.
    RegistrationNumber,
}

pub struct NafdacClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

#[derive(Debug, Deserialize)]
pub struct DatatableResponse {
    #[serde(default, rename = "recordsFiltered")]
    pub records_filtered: Option<u64>,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl NafdacClient {
    pub fn new() -> Result<Self, DrugBriefError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(NAFDAC_BASE, NAFDAC_BASE_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, DrugBriefError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base),
        })
    }

    fn query_params(query: &str, field: RegistrySearchField, length: usize) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![("draw".into(), "1".into())];
        for (i, column) in COLUMNS.iter().enumerate() {
            let column_search = match field {
                RegistrySearchField::RegistrationNumber if i == REGISTRATION_COLUMN => query,
                _ => "",
            };
            params.push((format!("columns[{i}][data]"), (*column).to_string()));
            params.push((format!("columns[{i}][name]"), String::new()));
            params.push((format!("columns[{i}][searchable]"), "true".into()));
            params.push((format!("columns[{i}][orderable]"), (i != 0).to_string()));
            params.push((format!("columns[{i}][search][value]"), column_search.to_string()));
            params.push((format!("columns[{i}][search][regex]"), "false".into()));
        }
        let global_search = match field {
            RegistrySearchField::Any => query,
            RegistrySearchField::RegistrationNumber => "",
        };
        params.extend([
            ("order[0][column]".to_string(), "1".to_string()),
            ("order[0][dir]".to_string(), "asc".to_string()),
            ("start".to_string(), "0".to_string()),
            ("length".to_string(), length.to_string()),
            ("search[value]".to_string(), global_search.to_string()),
            ("search[regex]".to_string(), "false".to_string()),
        ]);
        params
    }

    /// Issues a single datatable search and returns the raw rows.
    pub async fn search(
        &self,
        query: &str,
        field: RegistrySearchField,
        length: usize,
    ) -> Result<Vec<serde_json::Value>, DrugBriefError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DrugBriefError::InvalidArgument(
                "Please enter a drug name or NAFDAC registration number.".into(),
            ));
        }
        if query.len() > 256 {
            return Err(DrugBriefError::InvalidArgument("Query is too long.".into()));
        }
        let length = length.clamp(1, MAX_PAGE_SIZE);

        let resp = self
            .client
            .get(self.base.as_ref())
            .header(ACCEPT, "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .query(&Self::query_params(query, field, length))
            .send()
            .await?;
        let status = resp.status();
        let content_type = resp.headers().get(CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, NAFDAC_API).await?;

        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(DrugBriefError::Api {
                api: NAFDAC_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        crate::sources::ensure_json_content_type(NAFDAC_API, content_type.as_ref(), &bytes)?;

        let parsed: DatatableResponse =
            serde_json::from_slice(&bytes).map_err(|source| DrugBriefError::ApiJson {
                api: NAFDAC_API.to_string(),
                source,
            })?;
        debug!(
            query = %query,
            records_filtered = ?parsed.records_filtered,
            rows = parsed.data.len(),
            "NAFDAC datatable response"
        );
        Ok(parsed.data)
    }
}

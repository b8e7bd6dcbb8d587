use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sources::nafdac::{MAX_PAGE_SIZE, NafdacClient, RegistrySearchField};
use crate::transform;

/// One candidate product from the NAFDAC Greenbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    pub raw_ingredient_text: String,
}

/// A registry record alongside its normalized ingredient names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMatch {
    #[serde(flatten)]
    pub record: RegistryRecord,
    pub ingredients: Vec<String>,
}

impl From<RegistryRecord> for RegistryMatch {
    fn from(record: RegistryRecord) -> Self {
        let ingredients =
            transform::ingredients::normalize_ingredients(Some(&record.raw_ingredient_text));
        Self {
            record,
            ingredients,
        }
    }
}

fn registration_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(?:-[A-Za-z0-9]+)+$").expect("valid regex"))
}

/// Registration numbers look like `04-0567` or `A4-1234`: dash-joined alphanumeric
/// groups containing at least one digit.
pub(crate) fn looks_like_registration_number(query: &str) -> bool {
    let q = query.trim();
    registration_number_re().is_match(q) && q.chars().any(|c| c.is_ascii_digit())
}

pub(crate) fn search_field_for(query: &str) -> RegistrySearchField {
    if looks_like_registration_number(query) {
        RegistrySearchField::RegistrationNumber
    } else {
        RegistrySearchField::Any
    }
}

/// Looks a product up by name or registration number.
///
/// Returns the matching records in the registry's own order, or `None` when
/// nothing matches or the registry cannot be reached. Never fails.
pub async fn lookup(client: &NafdacClient, query: &str) -> Option<Vec<RegistryRecord>> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    let field = search_field_for(query);
    let rows = match client.search(query, field, MAX_PAGE_SIZE).await {
        Ok(rows) => rows,
        Err(err) => {
            warn!(query = %query, "NAFDAC registry unavailable: {err}");
            return None;
        }
    };

    let records = rows
        .iter()
        .filter(|row| transform::registry::row_matches_query(row, query))
        .filter_map(transform::registry::record_from_row)
        .collect::<Vec<_>>();

    debug!(
        query = %query,
        returned = rows.len(),
        matched = records.len(),
        "NAFDAC registry lookup"
    );

    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

use tracing::{debug, warn};

use crate::sources::openfda::{LABEL_MAX_LIMIT, LABEL_NAME_FIELDS, OpenFdaClient};
use crate::transform;
use crate::utils::query::or_phrase_query;

fn label_limit(ingredient_count: usize) -> usize {
    ingredient_count.saturating_mul(2).clamp(1, LABEL_MAX_LIMIT)
}

pub(crate) fn build_label_query(ingredients: &[String]) -> String {
    or_phrase_query(LABEL_NAME_FIELDS, ingredients)
}

/// Collects known side effects for a set of normalized ingredient names.
///
/// An empty list means "no known effects": it is returned for empty input,
/// unreachable upstreams and searches without matches alike.
pub async fn lookup_side_effects(client: &OpenFdaClient, ingredients: &[String]) -> Vec<String> {
    let query = build_label_query(ingredients);
    if query.is_empty() {
        return Vec::new();
    }
    let limit = label_limit(ingredients.len());

    let labels = match client.label_search(&query, limit).await {
        Ok(Some(resp)) => resp.results,
        Ok(None) => {
            debug!(ingredients = ?ingredients, "openFDA has no labels for ingredients");
            return Vec::new();
        }
        Err(err) => {
            warn!(ingredients = ?ingredients, "openFDA unavailable for side effects: {err}");
            return Vec::new();
        }
    };

    for label in &labels {
        if let Some(openfda) = &label.openfda {
            debug!(
                generic = ?openfda.generic_name,
                brand = ?openfda.brand_name,
                "openFDA label matched"
            );
        }
    }

    transform::adverse_event::merge_side_effects(&labels)
}

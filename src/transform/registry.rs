//! Maps NAFDAC Greenbook datatable rows onto [`RegistryRecord`].
//!
//! The datatable has shipped several row shapes over time, so each field is
//! read through an ordered list of probes and the first non-empty value wins.

use serde_json::Value;

use crate::entities::registry::RegistryRecord;

const UNKNOWN_PRODUCT: &str = "Unknown Product";

type IngredientParser = fn(&Value) -> Option<String>;

const PRODUCT_NAME_FIELDS: &[&str] = &["product_name", "productName", "name"];
const REGISTRATION_FIELDS: &[&str] = &["registration_number", "nafdac_no", "reg_no"];
pub(crate) const ALTERNATE_REGISTRATION_FIELD: &str = "nafdac_no";

const INGREDIENT_PROBES: &[(&str, IngredientParser)] = &[
    ("active_ingredients", flat_text),
    ("ingredient.ingredient_name", nested_ingredient_names),
    ("ingredients", ingredient_list),
    ("composition", flat_text),
];

fn lookup<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = row.get(first)?;
    for segment in segments {
        current = match current {
            // Nested arrays are returned whole; the parser fans out over them.
            Value::Array(_) => return Some(current),
            other => other.get(segment)?,
        };
    }
    Some(current)
}

fn nonempty(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty()).then(|| v.to_string())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => nonempty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flat_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(", ");
            nonempty(&joined)
        }
        other => scalar_text(other),
    }
}

fn nested_ingredient_names(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|item| item.get("ingredient_name").or(Some(item)))
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(", ");
            nonempty(&joined)
        }
        other => scalar_text(other),
    }
}

fn ingredient_list(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(_) => item
                        .get("name")
                        .or_else(|| item.get("ingredient_name"))
                        .and_then(scalar_text),
                    other => scalar_text(other),
                })
                .collect::<Vec<_>>()
                .join(", ");
            nonempty(&joined)
        }
        other => scalar_text(other),
    }
}

fn first_field(row: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| row.get(*field))
        .find_map(scalar_text)
}

/// Raw ingredient text for a row, trying each known schema shape in priority order.
pub(crate) fn ingredient_text(row: &Value) -> Option<String> {
    INGREDIENT_PROBES
        .iter()
        .find_map(|(path, parse)| lookup(row, path).and_then(parse))
}

pub(crate) fn alternate_registration(row: &Value) -> Option<String> {
    row.get(ALTERNATE_REGISTRATION_FIELD).and_then(scalar_text)
}

pub(crate) fn record_from_row(row: &Value) -> Option<RegistryRecord> {
    if !row.is_object() {
        return None;
    }
    Some(RegistryRecord {
        product_name: first_field(row, PRODUCT_NAME_FIELDS)
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
        registration_number: first_field(row, REGISTRATION_FIELDS),
        raw_ingredient_text: ingredient_text(row).unwrap_or_default(),
    })
}

/// Case-insensitive substring match against the name and both registration fields.
pub(crate) fn row_matches_query(row: &Value, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    [
        first_field(row, PRODUCT_NAME_FIELDS),
        row.get("registration_number").and_then(scalar_text),
        alternate_registration(row),
    ]
    .into_iter()
    .flatten()
    .any(|candidate| candidate.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_flat_greenbook_row() {
        let row = json!({
            "sn": "12",
            "product_name": "Emzor Paracetamol Tablets",
            "registration_number": "04-0567",
            "holder": "Emzor Pharmaceutical Industries Ltd",
            "active_ingredients": "Paracetamol 500mg BP"
        });

        let record = record_from_row(&row).expect("record");
        assert_eq!(record.product_name, "Emzor Paracetamol Tablets");
        assert_eq!(record.registration_number.as_deref(), Some("04-0567"));
        assert_eq!(record.raw_ingredient_text, "Paracetamol 500mg BP");
    }

    #[test]
    fn falls_back_to_nested_ingredient_names() {
        let row = json!({
            "product_name": "Coartem",
            "nafdac_no": "A4-0234",
            "ingredient": [
                {"ingredient_name": "Artemether 20mg"},
                {"ingredient_name": "Lumefantrine 120mg"}
            ]
        });

        let record = record_from_row(&row).expect("record");
        assert_eq!(record.registration_number.as_deref(), Some("A4-0234"));
        assert_eq!(
            record.raw_ingredient_text,
            "Artemether 20mg, Lumefantrine 120mg"
        );
    }

    #[test]
    fn nested_object_ingredient_is_supported() {
        let row = json!({
            "product_name": "Amlovar",
            "ingredient": {"ingredient_name": "Amlodipine (as Besylate) 5mg"}
        });
        assert_eq!(
            ingredient_text(&row).as_deref(),
            Some("Amlodipine (as Besylate) 5mg")
        );
    }

    #[test]
    fn empty_flat_field_does_not_hide_composition() {
        let row = json!({
            "product_name": "Flagyl",
            "active_ingredients": "   ",
            "ingredients": [],
            "composition": "Each tablet contains Metronidazole 400mg"
        });
        assert_eq!(
            ingredient_text(&row).as_deref(),
            Some("Each tablet contains Metronidazole 400mg")
        );
    }

    #[test]
    fn ingredient_list_accepts_strings_and_objects() {
        let row = json!({
            "ingredients": ["Ibuprofen 200mg", {"name": "Paracetamol 325mg"}]
        });
        assert_eq!(
            ingredient_text(&row).as_deref(),
            Some("Ibuprofen 200mg, Paracetamol 325mg")
        );
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let record = record_from_row(&json!({"sn": 3})).expect("record");
        assert_eq!(record.product_name, UNKNOWN_PRODUCT);
        assert!(record.registration_number.is_none());
        assert!(record.raw_ingredient_text.is_empty());
        assert!(record_from_row(&json!("not-a-row")).is_none());
    }

    #[test]
    fn query_matches_name_or_either_registration_field() {
        let row = json!({
            "product_name": "Emzor Paracetamol",
            "registration_number": "04-0567",
            "nafdac_no": "A4-9999"
        });
        assert!(row_matches_query(&row, "paracetamol"));
        assert!(row_matches_query(&row, "04-0567"));
        assert!(row_matches_query(&row, "a4-9999"));
        assert!(!row_matches_query(&row, "ibuprofen"));
        assert!(!row_matches_query(&row, "   "));
    }
}

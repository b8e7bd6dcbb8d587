//! Registry ingredient text normalization.
//!
//! Registry rows carry free text such as `"Amlodipine (as Besylate) 5mg BP\r<br />Paracetamol"`.
//! [`normalize_ingredients`] turns that into distinct base ingredient names. Every cleaning
//! step runs to a fixpoint, so normalizing an already-normalized name returns it unchanged.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const MIN_INGREDIENT_CHARS: usize = 2;

// Bases that are themselves the active moiety of a salt ("Ferrous Sulphate").
const CATION_BASES: &[&str] = &[
    "ferrous",
    "ferric",
    "zinc",
    "magnesium",
    "calcium",
    "sodium",
    "potassium",
    "aluminium",
    "aluminum",
    "copper",
    "lithium",
];

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|\r\n|\r|\n").expect("valid regex"))
}

fn markup_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

fn delimiter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;]+").expect("valid regex"))
}

fn as_salt_paren_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*\(\s*as\b[^)]*\)?").expect("valid regex"))
}

fn as_salt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+as\s+\S.*$").expect("valid regex"))
}

fn pharmacopoeia_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:B\.?P|U\.?S\.?P|E\.?P|J\.?P|Ph\.?\s*Eur)\b\.?").expect("valid regex")
    })
}

fn trailing_dosage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\s*\b\d+(?:\.\d+)?\s*(?:mg|mcg|µg|ug|g|ml|iu|i\.u\.|units?|%)(?:\s*/\s*\d*(?:\.\d+)?\s*(?:mg|g|ml|tablets?|tabs?|capsules?|dose|vial))?(?:\s*w/[vw])?\s*$",
        )
        .expect("valid regex")
    })
}

fn trailing_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+\d+(?:\.\d+)?\s*$").expect("valid regex"))
}

fn trailing_salt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(.+?)\s+(?:hcl|hydrochloride|hydrobromide|sodium|disodium|potassium|calcium|magnesium|maleate|besylate|besilate|sulphate|sulfate|phosphate|citrate|acetate|tartrate|mesylate|mesilate|fumarate|succinate|trihydrate|monohydrate|dihydrate|anhydrous)$",
        )
        .expect("valid regex")
    })
}

fn trailing_conjunction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:and|or|&)$").expect("valid regex"))
}

fn leading_conjunction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:and|or|&)\s+").expect("valid regex"))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trim_stray_punctuation(value: &str) -> &str {
    let mut out = value.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '.' | ':' | '-' | '*' | '"' | '\'' | '+' | '/')
    });
    if out.ends_with(')') && !out.contains('(') {
        out = out.trim_end_matches(')');
    }
    if out.starts_with('(') && !out.contains(')') {
        out = out.trim_start_matches('(');
    }
    out
}

fn strip_trailing_salt(value: &str) -> String {
    let Some(caps) = trailing_salt_re().captures(value) else {
        return value.to_string();
    };
    let base = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    if base.is_empty() || CATION_BASES.contains(&base.to_ascii_lowercase().as_str()) {
        return value.to_string();
    }
    base.to_string()
}

fn clean_step(value: &str) -> String {
    let v = as_salt_paren_re().replace_all(value, " ");
    let v = as_salt_re().replace(&v, "");
    let v = pharmacopoeia_re().replace_all(&v, " ");
    let v = collapse_whitespace(&v);
    let v = trailing_dosage_re().replace(&v, "");
    let v = trailing_number_re().replace(&v, "");
    let v = strip_trailing_salt(v.trim());
    let v = trailing_conjunction_re().replace(&v, "");
    let v = leading_conjunction_re().replace(&v, "");
    collapse_whitespace(trim_stray_punctuation(&v))
}

/// Cleans a single ingredient segment down to its base name.
///
/// Returns `None` when nothing meaningful survives.
pub(crate) fn clean_ingredient(segment: &str) -> Option<String> {
    let mut current = collapse_whitespace(segment);
    loop {
        let next = clean_step(&current);
        if next == current {
            break;
        }
        current = next;
    }
    (current.chars().count() >= MIN_INGREDIENT_CHARS).then_some(current)
}

fn split_segments(raw: &str) -> Vec<String> {
    let text = line_break_re().replace_all(raw, ",");
    let text = markup_tag_re().replace_all(&text, "");
    delimiter_re()
        .split(&text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalizes raw registry ingredient text into distinct ingredient names.
///
/// Order and casing of the first occurrence are preserved; duplicates are
/// compared case-insensitively. Missing or blank input yields an empty list.
pub(crate) fn normalize_ingredients(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for segment in split_segments(raw) {
        let Some(name) = clean_ingredient(&segment) else {
            continue;
        };
        if seen.insert(name.to_lowercase()) {
            out.push(name);
        }
    }
    out
}

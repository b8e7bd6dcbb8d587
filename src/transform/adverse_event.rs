use std::collections::HashSet;

use crate::sources::openfda::LabelResult;

pub(crate) const WARNINGS_PREFIX: &str = "Potential warnings: ";

fn trimmed_nonempty(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Side-effect text for one label: adverse reactions when present, else the
/// warnings section marked with [`WARNINGS_PREFIX`], else nothing.
pub(crate) fn label_side_effects(label: &LabelResult) -> Vec<String> {
    let reactions = trimmed_nonempty(label.adverse_reactions.clone().into_vec());
    if !reactions.is_empty() {
        return reactions;
    }

    let warnings = trimmed_nonempty(label.warnings.clone().into_vec());
    if warnings.is_empty() {
        return Vec::new();
    }
    vec![format!("{WARNINGS_PREFIX}{}", warnings.join(" "))]
}

pub(crate) fn merge_side_effects<'a>(labels: impl IntoIterator<Item = &'a LabelResult>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for label in labels {
        for effect in label_side_effects(label) {
            if seen.insert(effect.to_lowercase()) {
                out.push(effect);
            }
        }
    }
    out
}

use std::collections::HashSet;

use minijinja::context;
use tracing::{debug, warn};

use super::prompts::{self, CONDENSE_SIDE_EFFECT};
use super::{GenerationRequest, TextGenerator, generate_string_field, string_field_schema};
use crate::error::DrugBriefError;

const SHORT_EFFECT_MAX_CHARS: usize = 20;
const BLOB_PROMPT_MAX_CHARS: usize = 6000;
const OUTPUT_FIELD: &str = "bulletPoint";

/// Short fragments without sentence punctuation ("Nausea") are already bullet-sized.
pub(crate) fn is_already_concise(effect: &str) -> bool {
    effect.chars().count() < SHORT_EFFECT_MAX_CHARS && !effect.contains(['.', '!', '?'])
}

fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn strip_bullet_marker(value: &str) -> &str {
    value
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '·') || c.is_whitespace())
        .trim_end()
}

async fn generate_bullet(
    generator: &dyn TextGenerator,
    effect: &str,
) -> Result<String, DrugBriefError> {
    let prompt = prompts::render(
        CONDENSE_SIDE_EFFECT,
        context! { original_effect => truncate_chars(effect, BLOB_PROMPT_MAX_CHARS) },
    )?;
    let request = GenerationRequest {
        template: CONDENSE_SIDE_EFFECT,
        prompt,
        output_schema: string_field_schema(
            OUTPUT_FIELD,
            "A concise, informative bullet point summarizing the side effect, suitable for a patient.",
        ),
        image: None,
    };
    let bullet = generate_string_field(generator, &request, OUTPUT_FIELD).await?;
    let bullet = strip_bullet_marker(&bullet);
    if bullet.is_empty() {
        return Err(DrugBriefError::Api {
            api: CONDENSE_SIDE_EFFECT.into(),
            message: "generation produced only a bullet marker".into(),
        });
    }
    Ok(bullet.to_string())
}

/// Restates side-effect text as one patient-facing bullet point.
///
/// Concise input is returned as-is without calling the generator. When
/// generation fails or yields nothing usable the original text is returned, so
/// non-empty input always produces non-empty output.
pub async fn condense_side_effect(generator: &dyn TextGenerator, effect: &str) -> String {
    if is_already_concise(effect) {
        return effect.to_string();
    }

    match generate_bullet(generator, effect).await {
        Ok(bullet) => bullet,
        Err(err) => {
            warn!("Side-effect condensation fell back to original text: {err}");
            effect.to_string()
        }
    }
}

/// Condenses the raw side-effect list for a report.
///
/// Concise fragments pass through individually; everything else is joined into
/// one blob and condensed with a single generative call. The result keeps
/// first-seen order and drops case-insensitive duplicates.
pub async fn condense_side_effects(generator: &dyn TextGenerator, raw: &[String]) -> Vec<String> {
    let fragments = raw
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();

    let (concise, verbose): (Vec<&str>, Vec<&str>) =
        fragments.into_iter().partition(|v| is_already_concise(v));

    let mut out: Vec<String> = concise.into_iter().map(str::to_string).collect();
    if !verbose.is_empty() {
        debug!(fragments = verbose.len(), "Condensing verbose side-effect text");
        let blob = verbose.join(" ");
        out.push(condense_side_effect(generator, &blob).await);
    }

    let mut seen: HashSet<String> = HashSet::new();
    out.retain(|v| seen.insert(v.to_lowercase()));
    out
}

use minijinja::context;
use tracing::warn;

use super::prompts::{self, SUMMARIZE_REPORT};
use super::{GenerationRequest, TextGenerator, generate_string_field, string_field_schema};
use crate::error::DrugBriefError;

pub const SAFETY_DISCLAIMER: &str = "IMPORTANT: This summary is for information only and is not medical advice. Always consult a doctor or pharmacist before starting, stopping, or changing any medication. Side effects vary from person to person.";

pub(crate) const MIN_SUMMARY_CHARS: usize = 50;
pub(crate) const UNKNOWN_COMPONENT: &str = "Unknown component";
const NOT_AVAILABLE: &str = "N/A";
const OUTPUT_FIELD: &str = "summary";

#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub drug_name: &'a str,
    pub ingredients: &'a [String],
    pub side_effects: &'a [String],
    pub user_conditions: Option<&'a str>,
}

impl SummaryInput<'_> {
    fn conditions(&self) -> Option<&str> {
        self.user_conditions.map(str::trim).filter(|v| !v.is_empty())
    }

    fn components_display(&self) -> String {
        if self.ingredients.is_empty() {
            UNKNOWN_COMPONENT.to_string()
        } else {
            self.ingredients.join(", ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(String),
    Fallback { summary: String, reason: String },
}

impl SummaryOutcome {
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(summary) | Self::Fallback { summary, .. } => summary,
        }
    }
}

fn join_or_na(values: &[String]) -> String {
    if values.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        values.join(", ")
    }
}

/// Deterministic summary used when generation is unavailable. Pure formatting.
pub fn fallback_summary(input: &SummaryInput<'_>) -> String {
    format!(
        "Drug: {}\nActive ingredients: {}\nKnown side effects: {}\n\n{}",
        input.drug_name,
        join_or_na(input.ingredients),
        join_or_na(input.side_effects),
        SAFETY_DISCLAIMER
    )
}

pub(crate) fn ensure_disclaimer(summary: String) -> String {
    if summary.contains(SAFETY_DISCLAIMER) {
        summary
    } else {
        format!("{summary}\n\n{SAFETY_DISCLAIMER}")
    }
}

/// Runs the summary template and validates its output.
///
/// Output shorter than [`MIN_SUMMARY_CHARS`] is rejected as degenerate.
pub async fn synthesize_summary(
    generator: &dyn TextGenerator,
    input: &SummaryInput<'_>,
) -> Result<String, DrugBriefError> {
    let prompt = prompts::render(
        SUMMARIZE_REPORT,
        context! {
            drug_name => input.drug_name,
            components => input.components_display(),
            side_effects => input.side_effects,
            user_conditions => input.conditions(),
        },
    )?;
    let request = GenerationRequest {
        template: SUMMARIZE_REPORT,
        prompt,
        output_schema: string_field_schema(
            OUTPUT_FIELD,
            "Plain-language summary of the drug with a safety disclaimer.",
        ),
        image: None,
    };

    let summary = generate_string_field(generator, &request, OUTPUT_FIELD).await?;
    let chars = summary.chars().count();
    if chars < MIN_SUMMARY_CHARS {
        return Err(DrugBriefError::Api {
            api: SUMMARIZE_REPORT.into(),
            message: format!("summary too short ({chars} characters)"),
        });
    }
    Ok(ensure_disclaimer(summary))
}

/// Produces the report narrative, degrading to [`fallback_summary`] on any failure.
pub async fn summarize_report(
    generator: &dyn TextGenerator,
    input: &SummaryInput<'_>,
) -> SummaryOutcome {
    match synthesize_summary(generator, input).await {
        Ok(summary) => SummaryOutcome::Generated(summary),
        Err(err) => {
            warn!(drug = %input.drug_name, "Summary generation failed, using fallback: {err}");
            SummaryOutcome::Fallback {
                summary: fallback_summary(input),
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::testing::StubGenerator;
    use serde_json::json;

    const GOOD_SUMMARY: &str = "Paracetamol is an analgesic and antipyretic used for mild pain and fever. Nausea is uncommon; liver damage is rare but serious at high doses. Please consult a pharmacist before use.";

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn fallback_embeds_inputs_verbatim() {
        let ingredients = strings(&["Paracetamol", "Caffeine"]);
        let effects = strings(&["Nausea", "Liver damage"]);
        let input = SummaryInput {
            drug_name: "Panadol Extra",
            ingredients: &ingredients,
            side_effects: &effects,
            user_conditions: None,
        };
        let summary = fallback_summary(&input);
        assert!(summary.contains("Panadol Extra"));
        assert!(summary.contains("Paracetamol, Caffeine"));
        assert!(summary.contains("Nausea, Liver damage"));
        assert!(summary.contains(SAFETY_DISCLAIMER));
    }

    #[test]
    fn fallback_uses_na_for_missing_lists() {
        let input = SummaryInput {
            drug_name: "Mystery",
            ingredients: &[],
            side_effects: &[],
            user_conditions: None,
        };
        let summary = fallback_summary(&input);
        assert!(summary.contains("Active ingredients: N/A"));
        assert!(summary.contains("Known side effects: N/A"));
    }

    #[test]
    fn disclaimer_is_appended_only_when_missing() {
        let already = format!("Paracetamol relieves pain.\n\n{SAFETY_DISCLAIMER}");
        assert_eq!(ensure_disclaimer(already.clone()), already);

        let added = ensure_disclaimer("Paracetamol relieves pain.".into());
        assert!(added.ends_with(SAFETY_DISCLAIMER));

        // Advice to consult the leaflet is not the disclaimer.
        let leaflet = ensure_disclaimer("Consult the leaflet for dosing.".into());
        assert!(leaflet.starts_with("Consult the leaflet for dosing."));
        assert!(leaflet.ends_with(SAFETY_DISCLAIMER));
    }

    #[tokio::test]
    async fn generated_summary_is_returned() {
        let generator = StubGenerator::new(|_| Ok(Some(json!({"summary": GOOD_SUMMARY}))));
        let ingredients = strings(&["Paracetamol"]);
        let effects = strings(&["Nausea"]);
        let input = SummaryInput {
            drug_name: "Panadol",
            ingredients: &ingredients,
            side_effects: &effects,
            user_conditions: Some("  hypertension "),
        };
        let outcome = summarize_report(&generator, &input).await;
        assert_eq!(
            outcome,
            SummaryOutcome::Generated(format!("{GOOD_SUMMARY}\n\n{SAFETY_DISCLAIMER}"))
        );

        let prompt = &generator.prompts_for(SUMMARIZE_REPORT)[0];
        assert!(prompt.contains("Medical conditions reported by the user: hypertension"));
        assert!(prompt.contains("- Nausea"));
    }

    #[tokio::test]
    async fn short_output_falls_back_with_inputs_verbatim() {
        let generator = StubGenerator::new(|_| Ok(Some(json!({"summary": "Too short."}))));
        let ingredients = strings(&["Paracetamol"]);
        let effects = strings(&["Nausea", "Liver damage"]);
        let input = SummaryInput {
            drug_name: "Panadol",
            ingredients: &ingredients,
            side_effects: &effects,
            user_conditions: None,
        };
        let outcome = summarize_report(&generator, &input).await;
        let SummaryOutcome::Fallback { summary, reason } = outcome else {
            panic!("expected fallback");
        };
        assert!(summary.contains("Panadol"));
        assert!(summary.contains("Paracetamol"));
        assert!(summary.contains("Nausea, Liver damage"));
        assert!(reason.contains("too short"));
    }

    #[tokio::test]
    async fn service_failure_is_an_error_from_synthesis() {
        let generator = StubGenerator::failing();
        let ingredients = strings(&["Paracetamol"]);
        let input = SummaryInput {
            drug_name: "Panadol",
            ingredients: &ingredients,
            side_effects: &[],
            user_conditions: None,
        };
        assert!(synthesize_summary(&generator, &input).await.is_err());
    }

    #[tokio::test]
    async fn empty_ingredients_use_placeholder_component_in_prompt() {
        let generator = StubGenerator::new(|_| Ok(Some(json!({"summary": GOOD_SUMMARY}))));
        let input = SummaryInput {
            drug_name: "Mystery",
            ingredients: &[],
            side_effects: &[],
            user_conditions: Some("   "),
        };
        synthesize_summary(&generator, &input).await.unwrap();
        let prompt = &generator.prompts_for(SUMMARIZE_REPORT)[0];
        assert!(prompt.contains("Active ingredients: Unknown component"));
        assert!(!prompt.contains("Medical conditions reported"));
    }

    #[tokio::test]
    async fn generated_summary_without_disclaimer_gets_one() {
        let text = "Paracetamol is an analgesic used for mild to moderate pain and fever.";
        let generator = StubGenerator::new(move |_| Ok(Some(json!({"summary": text}))));
        let ingredients = strings(&["Paracetamol"]);
        let input = SummaryInput {
            drug_name: "Panadol",
            ingredients: &ingredients,
            side_effects: &[],
            user_conditions: None,
        };
        let summary = synthesize_summary(&generator, &input).await.unwrap();
        assert!(summary.starts_with(text));
        assert!(summary.ends_with(SAFETY_DISCLAIMER));
    }
}

use std::sync::OnceLock;

use minijinja::Environment;
use serde::Serialize;

use crate::error::DrugBriefError;

pub(crate) const CONDENSE_SIDE_EFFECT: &str = "condense_side_effect";
pub(crate) const SUMMARIZE_REPORT: &str = "summarize_report";
pub(crate) const EXTRACT_DRUG_NAME: &str = "extract_drug_name";

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

fn template_file(name: &str) -> String {
    format!("{name}.txt.j2")
}

fn env() -> Result<&'static Environment<'static>, DrugBriefError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.add_template(
        "condense_side_effect.txt.j2",
        include_str!("../../templates/prompts/condense_side_effect.txt.j2"),
    )?;
    env.add_template(
        "summarize_report.txt.j2",
        include_str!("../../templates/prompts/summarize_report.txt.j2"),
    )?;
    env.add_template(
        "extract_drug_name.txt.j2",
        include_str!("../../templates/prompts/extract_drug_name.txt.j2"),
    )?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| DrugBriefError::Api {
        api: "prompts".into(),
        message: "Prompt environment initialization failed".into(),
    })
}

/// Renders a named prompt template with the given context.
pub(crate) fn render<S: Serialize>(name: &str, ctx: S) -> Result<String, DrugBriefError> {
    let tmpl = env()?.get_template(&template_file(name))?;
    Ok(tmpl.render(ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn condense_prompt_quotes_original_text() {
        let prompt = render(
            CONDENSE_SIDE_EFFECT,
            context! { original_effect => "Hepatotoxicity has been reported." },
        )
        .unwrap();
        assert!(prompt.contains("\"Hepatotoxicity has been reported.\""));
        assert!(prompt.contains("bulletPoint"));
    }

    #[test]
    fn summary_prompt_adds_condition_section_only_when_given() {
        let without = render(
            SUMMARIZE_REPORT,
            context! {
                drug_name => "Panadol",
                components => "Paracetamol",
                side_effects => vec!["Nausea"],
                user_conditions => Option::<String>::None,
            },
        )
        .unwrap();
        assert!(without.contains("Active ingredients: Paracetamol"));
        assert!(without.contains("- Nausea"));
        assert!(!without.contains("Medical conditions reported"));
        assert!(without.contains("3. A prominent safety disclaimer"));

        let with = render(
            SUMMARIZE_REPORT,
            context! {
                drug_name => "Panadol",
                components => "Paracetamol",
                side_effects => Vec::<String>::new(),
                user_conditions => Some("liver disease"),
            },
        )
        .unwrap();
        assert!(with.contains("Medical conditions reported by the user: liver disease"));
        assert!(with.contains("never state that the drug is, or should be, used"));
        assert!(with.contains("4. A prominent safety disclaimer"));
        assert!(with.contains("none were found"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert!(render("nope", context! {}).is_err());
    }
}

//! The drug report pipeline: registry lookup, ingredient normalization,
//! side-effect lookup and condensation, then narrative synthesis.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::entities::{adverse_event, registry};
use crate::error::DrugBriefError;
use crate::generate::TextGenerator;
use crate::generate::condense::condense_side_effects;
use crate::generate::summary::{SummaryInput, summarize_report, synthesize_summary};
use crate::sources::gemini::GeminiClient;
use crate::sources::nafdac::NafdacClient;
use crate::sources::openfda::OpenFdaClient;
use crate::transform::ingredients::normalize_ingredients;

const MAX_QUERY_CHARS: usize = 256;
const NOT_FOUND_SUGGESTION: &str =
    "Please check the spelling or try the NAFDAC registration number.";
const SUMMARY_FAILED_REASON: &str = "the text generation service did not return a usable summary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugComponent {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub drug_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    pub components: Vec<DrugComponent>,
    pub side_effects: Vec<String>,
    pub ai_summary: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugAnalysisInput {
    pub drug_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_conditions: Option<String>,
}

impl DrugAnalysisInput {
    pub fn new(drug_name: impl Into<String>) -> Self {
        Self {
            drug_name: drug_name.into(),
            medical_conditions: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Option<String>) -> Self {
        self.medical_conditions = conditions;
        self
    }

    /// Medical conditions, with blank text treated as absent.
    pub fn conditions(&self) -> Option<&str> {
        self.medical_conditions
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Either a finished report or a user-facing error sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportOutcome {
    Report(Box<Report>),
    Error { error: String },
}

/// What to do when the narrative summary cannot be generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SynthesisPolicy {
    /// Return the report with the deterministic fallback summary.
    #[default]
    Fallback,
    /// Fail the whole request with a "summary generation failed" error.
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub synthesis_policy: SynthesisPolicy,
}

pub struct Pipeline {
    registry: NafdacClient,
    adverse: OpenFdaClient,
    generator: Arc<dyn TextGenerator>,
    options: ReportOptions,
}

impl Pipeline {
    pub(crate) fn new(
        registry: NafdacClient,
        adverse: OpenFdaClient,
        generator: Arc<dyn TextGenerator>,
        options: ReportOptions,
    ) -> Self {
        Self {
            registry,
            adverse,
            generator,
            options,
        }
    }

    /// Production wiring from environment configuration.
    pub fn from_env() -> Result<Self, DrugBriefError> {
        Ok(Self::new(
            NafdacClient::new()?,
            OpenFdaClient::new()?,
            Arc::new(GeminiClient::new()?),
            ReportOptions::default(),
        ))
    }

    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn registry(&self) -> &NafdacClient {
        &self.registry
    }

    pub(crate) fn adverse(&self) -> &OpenFdaClient {
        &self.adverse
    }

    pub(crate) fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }
}

fn is_kept_trailing(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || c == '.' || c == '-'
}

/// Strips trailing punctuation (keeping periods and hyphens) and surrounding whitespace.
pub(crate) fn sanitize_query(raw: &str) -> Result<String, DrugBriefError> {
    let mut query = raw.trim();
    loop {
        let next = query.trim_end_matches(|c: char| !is_kept_trailing(c)).trim_end();
        if next.len() == query.len() {
            break;
        }
        query = next;
    }

    if query.is_empty() {
        return Err(DrugBriefError::InvalidArgument(
            "Please enter a drug name or NAFDAC registration number.".into(),
        ));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(DrugBriefError::InvalidArgument(format!(
            "Query is too long. Please use at most {MAX_QUERY_CHARS} characters."
        )));
    }
    Ok(query.to_string())
}

fn now_rfc3339() -> Result<String, DrugBriefError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| DrugBriefError::Api {
            api: "clock".into(),
            message: err.to_string(),
        })
}

/// Builds a report for one query, returning the first terminal error if any.
pub async fn get_drug_report(
    pipeline: &Pipeline,
    input: &DrugAnalysisInput,
) -> Result<Report, DrugBriefError> {
    let query = sanitize_query(&input.drug_name)?;
    let conditions = input.conditions();
    info!(query = %query, with_conditions = conditions.is_some(), "Building drug report");

    let not_found = || DrugBriefError::NotFound {
        entity: "Drug".into(),
        id: query.clone(),
        suggestion: NOT_FOUND_SUGGESTION.into(),
    };
    // First record in the registry's returned order wins.
    let best = registry::lookup(pipeline.registry(), &query)
        .await
        .and_then(|records| records.into_iter().next())
        .ok_or_else(not_found)?;
    debug!(
        product = %best.product_name,
        registration = ?best.registration_number,
        "Selected registry record"
    );

    let ingredients = normalize_ingredients(Some(&best.raw_ingredient_text));
    if ingredients.is_empty() {
        return Err(DrugBriefError::NoIngredients {
            product: best.product_name,
        });
    }

    let raw_effects = adverse_event::lookup_side_effects(pipeline.adverse(), &ingredients).await;
    let side_effects = condense_side_effects(pipeline.generator(), &raw_effects).await;

    let summary_input = SummaryInput {
        drug_name: &query,
        ingredients: &ingredients,
        side_effects: &side_effects,
        user_conditions: conditions,
    };
    let ai_summary = match pipeline.options.synthesis_policy {
        SynthesisPolicy::Fallback => summarize_report(pipeline.generator(), &summary_input)
            .await
            .into_text(),
        SynthesisPolicy::Strict => synthesize_summary(pipeline.generator(), &summary_input)
            .await
            .map_err(|err| {
                warn!(query = %query, "Summary generation failed: {err}");
                DrugBriefError::SummaryFailed {
                    reason: SUMMARY_FAILED_REASON.into(),
                }
            })?,
    };

    Ok(Report {
        components: ingredients
            .into_iter()
            .map(|name| DrugComponent { name })
            .collect(),
        side_effects,
        ai_summary,
        timestamp: now_rfc3339()?,
        product_name: Some(best.product_name),
        registration_number: best.registration_number,
        drug_name: input.drug_name.trim().to_string(),
    })
}

/// Consumer entry point: never fails, errors become `{ "error": ... }`.
pub async fn get_drug_report_action(pipeline: &Pipeline, input: &DrugAnalysisInput) -> ReportOutcome {
    match get_drug_report(pipeline, input).await {
        Ok(report) => ReportOutcome::Report(Box::new(report)),
        Err(err) => ReportOutcome::Error {
            error: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::prompts::{CONDENSE_SIDE_EFFECT, SUMMARIZE_REPORT};
    use crate::generate::summary::SAFETY_DISCLAIMER;
    use crate::generate::testing::StubGenerator;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REGISTRY_PATH: &str = "/api/datatable/drugs";
    const GOOD_SUMMARY: &str = "Paracetamol is an analgesic used for pain and fever. Nausea is uncommon and liver damage is rare. Consult a pharmacist before use.";

    struct Upstreams {
        registry: MockServer,
        openfda: MockServer,
    }

    impl Upstreams {
        async fn start(rows: serde_json::Value, labels: serde_json::Value) -> Self {
            let registry = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(REGISTRY_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "draw": 1,
                    "recordsTotal": 3,
                    "recordsFiltered": 1,
                    "data": rows
                })))
                .mount(&registry)
                .await;

            let openfda = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/drug/label.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": labels })))
                .mount(&openfda)
                .await;

            Self { registry, openfda }
        }

        fn pipeline(&self, generator: Arc<StubGenerator>, policy: SynthesisPolicy) -> Pipeline {
            Pipeline::new(
                NafdacClient::new_for_test(format!("{}{REGISTRY_PATH}", self.registry.uri()))
                    .unwrap(),
                OpenFdaClient::new_for_test(self.openfda.uri(), None).unwrap(),
                generator,
                ReportOptions {
                    synthesis_policy: policy,
                },
            )
        }
    }

    fn paracetamol_row() -> serde_json::Value {
        json!([{
            "sn": 1,
            "product_name": "Emzor Paracetamol",
            "registration_number": "04-0567",
            "holder": "Emzor Pharmaceutical Industries Ltd",
            "active_ingredients": "Paracetamol 500mg BP"
        }])
    }

    fn summarizing_generator() -> Arc<StubGenerator> {
        Arc::new(StubGenerator::new(|req| match req.template {
            SUMMARIZE_REPORT => Ok(Some(json!({ "summary": GOOD_SUMMARY }))),
            _ => Ok(Some(json!({ "bulletPoint": "Condensed effect" }))),
        }))
    }

    #[test]
    fn sanitize_strips_trailing_punctuation() {
        assert_eq!(sanitize_query("  Paracetamol?!  ").unwrap(), "Paracetamol");
        assert_eq!(sanitize_query("Panadol? !").unwrap(), "Panadol");
        assert_eq!(sanitize_query("Vitamin B12 Inj.").unwrap(), "Vitamin B12 Inj.");
        assert_eq!(sanitize_query("04-0567-").unwrap(), "04-0567-");
        assert_eq!(sanitize_query("Co-Trimoxazole").unwrap(), "Co-Trimoxazole");
        assert!(matches!(
            sanitize_query(" ?!* "),
            Err(DrugBriefError::InvalidArgument(_))
        ));
        assert!(sanitize_query(&"a".repeat(MAX_QUERY_CHARS + 1)).is_err());
    }

    #[test]
    fn blank_conditions_count_as_absent() {
        let input = DrugAnalysisInput::new("Panadol").with_conditions(Some("   ".into()));
        assert_eq!(input.conditions(), None);
        let input: DrugAnalysisInput =
            serde_json::from_value(json!({"drugName": "Panadol", "medicalConditions": " asthma "}))
                .unwrap();
        assert_eq!(input.conditions(), Some("asthma"));
    }

    #[test]
    fn outcome_serializes_as_report_or_error_object() {
        let error = ReportOutcome::Error {
            error: "Drug \"x\" not found.".into(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"error": "Drug \"x\" not found."})
        );

        let report = ReportOutcome::Report(Box::new(Report {
            drug_name: "Panadol".into(),
            product_name: None,
            registration_number: None,
            components: vec![DrugComponent {
                name: "Paracetamol".into(),
            }],
            side_effects: vec![],
            ai_summary: "Summary".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
        }));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["drugName"], "Panadol");
        assert_eq!(value["components"][0]["name"], "Paracetamol");
        assert_eq!(value["aiSummary"], "Summary");
        assert!(value.get("productName").is_none());
        let back: ReportOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }

    #[tokio::test]
    async fn paracetamol_report_end_to_end() {
        let upstreams = Upstreams::start(
            paracetamol_row(),
            json!([{ "adverse_reactions": ["Nausea", "Liver damage"] }]),
        )
        .await;
        let generator = summarizing_generator();
        let pipeline = upstreams.pipeline(generator.clone(), SynthesisPolicy::Fallback);

        let outcome =
            get_drug_report_action(&pipeline, &DrugAnalysisInput::new("Paracetamol")).await;
        let ReportOutcome::Report(report) = outcome else {
            panic!("expected report, got {outcome:?}");
        };
        assert_eq!(report.drug_name, "Paracetamol");
        assert_eq!(report.product_name.as_deref(), Some("Emzor Paracetamol"));
        assert_eq!(report.registration_number.as_deref(), Some("04-0567"));
        assert_eq!(
            report.components,
            vec![DrugComponent {
                name: "Paracetamol".into()
            }]
        );
        assert_eq!(report.side_effects, vec!["Nausea", "Liver damage"]);
        assert!(report.ai_summary.starts_with(GOOD_SUMMARY));
        assert!(report.ai_summary.ends_with(SAFETY_DISCLAIMER));
        assert!(OffsetDateTime::parse(&report.timestamp, &Rfc3339).is_ok());

        // Short fragments skip condensation; only the summary call is made.
        assert!(generator.prompts_for(CONDENSE_SIDE_EFFECT).is_empty());
        assert_eq!(generator.prompts_for(SUMMARIZE_REPORT).len(), 1);
    }

    #[tokio::test]
    async fn report_keeps_the_query_as_typed() {
        let upstreams = Upstreams::start(paracetamol_row(), json!([])).await;
        let generator = summarizing_generator();
        let pipeline = upstreams.pipeline(generator.clone(), SynthesisPolicy::Fallback);

        let report = get_drug_report(&pipeline, &DrugAnalysisInput::new("  Paracetamol?! "))
            .await
            .unwrap();
        assert_eq!(report.drug_name, "Paracetamol?!");

        let requests = upstreams.registry.received_requests().await.unwrap();
        let searched = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "search[value]")
            .map(|(_, v)| v.into_owned());
        assert_eq!(searched.as_deref(), Some("Paracetamol"));
        let prompt = &generator.prompts_for(SUMMARIZE_REPORT)[0];
        assert!(!prompt.contains("Paracetamol?!"));
    }

    #[tokio::test]
    async fn unmatched_query_is_not_found() {
        let upstreams = Upstreams::start(json!([]), json!([])).await;
        let generator = summarizing_generator();
        let pipeline = upstreams.pipeline(generator.clone(), SynthesisPolicy::Fallback);

        let outcome = get_drug_report_action(&pipeline, &DrugAnalysisInput::new("Zyxomab")).await;
        let ReportOutcome::Error { error } = outcome else {
            panic!("expected error");
        };
        assert!(error.contains("not found"));
        assert!(error.contains("check the spelling"));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn registry_outage_reads_as_not_found() {
        let registry = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&registry)
            .await;
        let pipeline = Pipeline::new(
            NafdacClient::new_for_test(registry.uri()).unwrap(),
            OpenFdaClient::new_for_test("http://127.0.0.1:9".into(), None).unwrap(),
            summarizing_generator(),
            ReportOptions::default(),
        );
        let err = get_drug_report(&pipeline, &DrugAnalysisInput::new("Panadol"))
            .await
            .unwrap_err();
        assert!(matches!(err, DrugBriefError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unparseable_ingredients_are_a_terminal_error() {
        let upstreams = Upstreams::start(
            json!([{
                "product_name": "Mystery Syrup",
                "registration_number": "A4-9999",
                "active_ingredients": " ; <br> 5mg , "
            }]),
            json!([]),
        )
        .await;
        let generator = summarizing_generator();
        let pipeline = upstreams.pipeline(generator.clone(), SynthesisPolicy::Fallback);

        let outcome = get_drug_report_action(&pipeline, &DrugAnalysisInput::new("Mystery")).await;
        let ReportOutcome::Error { error } = outcome else {
            panic!("expected error");
        };
        assert!(error.contains("ingredients"));
        assert!(error.contains("Mystery Syrup"));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn generation_outage_falls_back_to_formatted_summary() {
        let upstreams = Upstreams::start(
            paracetamol_row(),
            json!([
                { "adverse_reactions": ["Nausea"] },
                { "warnings": "Do not exceed the stated dose. Liver damage may occur." }
            ]),
        )
        .await;
        let generator = Arc::new(StubGenerator::failing());
        let pipeline = upstreams.pipeline(generator.clone(), SynthesisPolicy::Fallback);

        let report = get_drug_report(&pipeline, &DrugAnalysisInput::new("paracetamol"))
            .await
            .unwrap();
        let warning = "Potential warnings: Do not exceed the stated dose. Liver damage may occur.";
        assert_eq!(report.side_effects, vec!["Nausea", warning]);
        assert!(report.ai_summary.contains("paracetamol"));
        assert!(report.ai_summary.contains("Paracetamol"));
        assert!(report.ai_summary.contains(&format!("Nausea, {warning}")));
        assert!(report.ai_summary.contains(SAFETY_DISCLAIMER));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn generation_outage_is_terminal_under_strict_policy() {
        let upstreams = Upstreams::start(paracetamol_row(), json!([])).await;
        let pipeline =
            upstreams.pipeline(Arc::new(StubGenerator::failing()), SynthesisPolicy::Strict);

        let outcome =
            get_drug_report_action(&pipeline, &DrugAnalysisInput::new("Paracetamol")).await;
        let ReportOutcome::Error { error } = outcome else {
            panic!("expected error");
        };
        assert!(error.contains("Summary generation failed"));
        assert!(error.contains("try again"));
    }

    #[tokio::test]
    async fn invalid_query_makes_no_network_call() {
        let registry = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(0)
            .mount(&registry)
            .await;
        let pipeline = Pipeline::new(
            NafdacClient::new_for_test(registry.uri()).unwrap(),
            OpenFdaClient::new_for_test(registry.uri(), None).unwrap(),
            summarizing_generator(),
            ReportOptions::default(),
        );

        let outcome = get_drug_report_action(&pipeline, &DrugAnalysisInput::new("  ?? ")).await;
        assert_eq!(
            outcome,
            ReportOutcome::Error {
                error: "Please enter a drug name or NAFDAC registration number.".into()
            }
        );
    }
}

//! Command-line surface: argument parsing and per-command output rendering.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::entities::adverse_event;
use crate::entities::registry::{self, RegistryMatch};
use crate::entities::report::{
    DrugAnalysisInput, Pipeline, ReportOptions, ReportOutcome, SynthesisPolicy,
    get_drug_report_action,
};
use crate::error::DrugBriefError;
use crate::generate::image::{extract_drug_name, mime_type_for_path};
use crate::render;
use crate::sources::gemini::GeminiClient;
use crate::sources::nafdac::NafdacClient;
use crate::sources::openfda::OpenFdaClient;
use crate::transform::ingredients::normalize_ingredients;
use crate::utils::store::LastSummaryStore;

pub mod health;

const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(
    name = "drugbrief",
    version,
    about = "Look up NAFDAC-registered drugs and get a plain-language report"
)]
pub struct Cli {
    /// Output JSON instead of Markdown
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a full report: ingredients, side effects and a summary
    Report {
        /// Product name or NAFDAC registration number
        query: String,
        /// Your medical conditions, used to personalise the summary
        #[arg(long)]
        conditions: Option<String>,
        /// Fail instead of using the fallback summary when generation fails
        #[arg(long)]
        strict_summary: bool,
        /// Do not store the summary as the last summary
        #[arg(long)]
        no_save: bool,
    },
    /// List registry matches with their normalized ingredients
    Lookup {
        /// Product name or NAFDAC registration number
        query: String,
    },
    /// Normalize raw ingredient text (no network access)
    Ingredients {
        /// Raw ingredient text, e.g. "Amlodipine (as Besylate) 5mg, Paracetamol BP"
        text: String,
    },
    /// Look up known side effects for ingredient names in openFDA labels
    SideEffects {
        /// One or more ingredient names
        #[arg(required = true)]
        ingredients: Vec<String>,
    },
    /// Read a drug name from a photo of the packaging
    Scan {
        /// Image path (PNG, JPEG, WebP or HEIC)
        image: PathBuf,
        /// Build a report for the extracted name
        #[arg(long)]
        report: bool,
        /// Medical conditions for the report (with --report)
        #[arg(long, requires = "report")]
        conditions: Option<String>,
    },
    /// Show or clear the last saved summary
    Last {
        /// Delete the saved summary
        #[arg(long)]
        clear: bool,
    },
    /// Check connectivity to upstream APIs and the cache directory
    Health {
        /// Skip the cache directory check
        #[arg(long)]
        apis_only: bool,
    },
    /// Run the MCP server over stdio
    Mcp,
    /// Run the MCP server over HTTP (SSE transport)
    ServeHttp {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// A failure whose user-facing output is already rendered (the JSON error object).
#[derive(Debug, thiserror::Error)]
#[error("{rendered}")]
pub struct RenderedFailure {
    pub rendered: String,
}

fn report_failure(error: &str, json: bool) -> anyhow::Error {
    if json {
        match render::json::error_pretty(error) {
            Ok(rendered) => return RenderedFailure { rendered }.into(),
            Err(err) => return err.into(),
        }
    }
    anyhow::anyhow!("{error}")
}

async fn run_report(
    input: DrugAnalysisInput,
    options: ReportOptions,
    save: bool,
    json: bool,
) -> anyhow::Result<String> {
    let pipeline = Pipeline::from_env()?.with_options(options);
    let store = save.then(LastSummaryStore::open);
    render_report(&pipeline, &input, store.as_ref(), json).await
}

/// Runs the pipeline, stores the summary on success when a store is given, and renders.
async fn render_report(
    pipeline: &Pipeline,
    input: &DrugAnalysisInput,
    store: Option<&LastSummaryStore>,
    json: bool,
) -> anyhow::Result<String> {
    let report = match get_drug_report_action(pipeline, input).await {
        ReportOutcome::Report(report) => report,
        ReportOutcome::Error { error } => return Err(report_failure(&error, json)),
    };

    if let Some(store) = store {
        if let Err(err) = store.save(&report.ai_summary).await {
            warn!(path = %store.path().display(), "Could not save last summary: {err}");
        }
    }

    if json {
        Ok(render::json::to_pretty(&ReportOutcome::Report(report))?)
    } else {
        Ok(render::markdown::report_markdown(&report)?)
    }
}

async fn run_lookup(query: &str, json: bool) -> anyhow::Result<String> {
    let client = NafdacClient::new()?;
    let query = query.trim();
    let Some(records) = registry::lookup(&client, query).await else {
        return Err(DrugBriefError::NotFound {
            entity: "Drug".into(),
            id: query.to_string(),
            suggestion: "Please check the spelling or try the NAFDAC registration number.".into(),
        }
        .into());
    };
    let matches = records.into_iter().map(RegistryMatch::from).collect::<Vec<_>>();
    if json {
        Ok(render::json::to_pretty(&matches)?)
    } else {
        Ok(render::markdown::registry_lookup_markdown(query, &matches)?)
    }
}

fn render_ingredients(text: &str, json: bool) -> Result<String, DrugBriefError> {
    let names = normalize_ingredients(Some(text));
    if json {
        return render::json::to_pretty(&names);
    }
    if names.is_empty() {
        return Ok("No ingredients recognized.".to_string());
    }
    Ok(names
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

async fn run_side_effects(ingredients: Vec<String>, json: bool) -> anyhow::Result<String> {
    let ingredients = ingredients
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();
    if ingredients.is_empty() {
        return Err(DrugBriefError::InvalidArgument(
            "At least one ingredient name is required.".into(),
        )
        .into());
    }

    let client = OpenFdaClient::new()?;
    let side_effects = adverse_event::lookup_side_effects(&client, &ingredients).await;
    if json {
        Ok(render::json::to_pretty(&serde_json::json!({
            "ingredients": ingredients,
            "sideEffects": side_effects,
        }))?)
    } else {
        Ok(render::markdown::side_effects_markdown(&ingredients, &side_effects)?)
    }
}

async fn read_image(path: &Path) -> Result<(Vec<u8>, &'static str), DrugBriefError> {
    let mime_type = mime_type_for_path(path)?;
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > MAX_IMAGE_BYTES {
        return Err(DrugBriefError::InvalidArgument(format!(
            "Image is too large (max {} MB).",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok((tokio::fs::read(path).await?, mime_type))
}

async fn run_scan(
    image: &Path,
    report: bool,
    conditions: Option<String>,
    json: bool,
) -> anyhow::Result<String> {
    let (bytes, mime_type) = read_image(image).await?;
    let gemini = GeminiClient::new()?;
    gemini.ensure_api_key()?;

    let name = extract_drug_name(&gemini, &bytes, mime_type).await;
    if name.is_empty() {
        return Err(DrugBriefError::InvalidArgument(
            "No drug name could be read from the image. Try a clearer photo or type the name."
                .into(),
        )
        .into());
    }

    if report {
        let input = DrugAnalysisInput::new(name).with_conditions(conditions);
        return run_report(input, ReportOptions::default(), true, json).await;
    }
    if json {
        Ok(render::json::to_pretty(&serde_json::json!({ "drugName": name }))?)
    } else {
        Ok(name)
    }
}

async fn run_last(store: &LastSummaryStore, clear: bool) -> Result<String, DrugBriefError> {
    if clear {
        return Ok(if store.clear().await? {
            "Cleared the saved summary.".to_string()
        } else {
            "No saved summary to clear.".to_string()
        });
    }
    Ok(store.load().await?.unwrap_or_else(|| {
        "No saved summary yet. Run `drugbrief report <QUERY>` first.".to_string()
    }))
}

/// Executes a parsed command and returns its rendered output.
///
/// # Errors
///
/// Returns an error for invalid input, unavailable configuration, or a
/// terminal report failure.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let json = cli.json;
    match cli.command {
        Commands::Report {
            query,
            conditions,
            strict_summary,
            no_save,
        } => {
            let options = ReportOptions {
                synthesis_policy: if strict_summary {
                    SynthesisPolicy::Strict
                } else {
                    SynthesisPolicy::Fallback
                },
            };
            let input = DrugAnalysisInput::new(query).with_conditions(conditions);
            run_report(input, options, !no_save, json).await
        }
        Commands::Lookup { query } => run_lookup(&query, json).await,
        Commands::Ingredients { text } => Ok(render_ingredients(&text, json)?),
        Commands::SideEffects { ingredients } => run_side_effects(ingredients, json).await,
        Commands::Scan {
            image,
            report,
            conditions,
        } => run_scan(&image, report, conditions, json).await,
        Commands::Last { clear } => Ok(run_last(&LastSummaryStore::open(), clear).await?),
        Commands::Health { apis_only } => {
            let report = health::check(apis_only).await?;
            if json {
                Ok(render::json::to_pretty(&report)?)
            } else {
                Ok(report.to_markdown())
            }
        }
        Commands::Mcp => {
            crate::mcp::run_stdio().await?;
            Ok(String::new())
        }
        Commands::ServeHttp { host, port } => {
            crate::mcp::run_http(&host, port).await?;
            Ok(String::new())
        }
    }
}

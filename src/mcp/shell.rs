use std::sync::Arc;

use rmcp::model::{Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, ServiceExt, tool};
use tokio_util::sync::CancellationToken;

use crate::entities::report::{DrugAnalysisInput, Pipeline, ReportOutcome, get_drug_report_action};

const DRUG_REPORT_DESCRIPTION: &str = "Builds a plain-language drug report from the NAFDAC \
Greenbook registry and openFDA labels. `drug_name` is a product name or NAFDAC registration \
number (e.g. \"Emzor Paracetamol\" or \"04-0567\"). `medical_conditions` is optional free text \
describing the user's conditions. Returns Markdown with active ingredients, side effects and a \
summary, or a short error sentence.";

#[derive(Clone)]
pub struct DrugBriefServer {
    pipeline: Arc<Pipeline>,
}

impl DrugBriefServer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

async fn drug_report_markdown(pipeline: &Pipeline, input: &DrugAnalysisInput) -> Result<String, String> {
    match get_drug_report_action(pipeline, input).await {
        ReportOutcome::Report(report) => crate::render::markdown::report_markdown(&report)
            .map_err(|e| format!("Error: {e}")),
        ReportOutcome::Error { error } => Err(format!("Error: {error}")),
    }
}

#[tool(tool_box)]
impl DrugBriefServer {
    #[tool(description = DRUG_REPORT_DESCRIPTION)]
    async fn drug_report(
        &self,
        #[tool(param)] drug_name: String,
        #[tool(param)] medical_conditions: Option<String>,
    ) -> Result<String, String> {
        let input = DrugAnalysisInput::new(drug_name).with_conditions(medical_conditions);
        drug_report_markdown(&self.pipeline, &input).await
    }
}

#[tool(tool_box)]
impl ServerHandler for DrugBriefServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "drugbrief".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "DrugBrief looks up drugs registered with NAFDAC (Nigeria), finds their active \
                 ingredients and known side effects, and writes a patient-facing summary. \
                 Use the `drug_report` tool with a product name or registration number."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio() -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let cancel = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let server = DrugBriefServer::new(Pipeline::from_env()?);
    let running = server
        .serve_with_ct(rmcp::transport::stdio(), shutdown)
        .await?;
    let _reason = running.waiting().await?;
    Ok(())
}

pub async fn run_http(host: &str, port: u16) -> anyhow::Result<()> {
    use rmcp::transport::sse_server::SseServer;

    let ip: std::net::IpAddr = host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid host address: {e}"))?;
    let bind = std::net::SocketAddr::new(ip, port);
    let server = DrugBriefServer::new(Pipeline::from_env()?);

    tracing::info!("DrugBrief HTTP server listening on http://{bind}");
    tracing::info!("  SSE endpoint:  GET  http://{bind}/sse");
    tracing::info!("  Post endpoint: POST http://{bind}/message");

    let ct = SseServer::serve(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP server: {e}"))?
        .with_service(move || server.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down…");
    ct.cancel();
    Ok(())
}

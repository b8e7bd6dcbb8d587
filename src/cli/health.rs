use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::DrugBriefError;
use crate::sources::{gemini, nafdac, openfda};

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub api: String,
    pub status: String,
    pub latency: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# DrugBrief Health Check\n\n");
        out.push_str("| API | Status | Latency |\n");
        out.push_str("|-----|--------|---------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.api, row.status, row.latency
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} checks healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

/// Where each check points. Built from the same environment as the pipeline.
#[derive(Debug, Clone)]
struct HealthTargets {
    registry_url: String,
    openfda_url: String,
    gemini: Option<(String, String)>,
    cache_dir: Option<PathBuf>,
}

impl HealthTargets {
    fn from_env(apis_only: bool) -> Self {
        let registry = crate::sources::env_base(nafdac::NAFDAC_BASE, nafdac::NAFDAC_BASE_ENV);
        let openfda = crate::sources::env_base(openfda::OPENFDA_BASE, openfda::OPENFDA_BASE_ENV);
        let gemini_base = crate::sources::env_base(gemini::GEMINI_BASE, gemini::GEMINI_BASE_ENV);
        let model = crate::sources::env_base(gemini::GEMINI_DEFAULT_MODEL, gemini::GEMINI_MODEL_ENV);
        Self {
            registry_url: format!("{registry}?draw=1&start=0&length=1&search[value]=paracetamol"),
            openfda_url: format!("{}/drug/label.json?limit=1", openfda.trim_end_matches('/')),
            gemini: crate::sources::env_secret(gemini::GEMINI_API_KEY_ENV).map(|key| {
                (
                    format!("{}/models/{model}", gemini_base.trim_end_matches('/')),
                    key,
                )
            }),
            cache_dir: (!apis_only).then(crate::utils::store::drugbrief_cache_dir),
        }
    }
}

async fn check_one(api: &str, req: reqwest::RequestBuilder) -> HealthRow {
    let start = Instant::now();
    let resp = req
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await;

    match resp {
        Ok(resp) => {
            let status = resp.status();
            let elapsed = start.elapsed().as_millis();
            if status.is_success() {
                HealthRow {
                    api: api.to_string(),
                    status: "ok".into(),
                    latency: format!("{elapsed}ms"),
                }
            } else {
                HealthRow {
                    api: api.to_string(),
                    status: "error".into(),
                    latency: format!("{elapsed}ms (HTTP {})", status.as_u16()),
                }
            }
        }
        Err(err) => {
            let reason = if err.is_timeout() {
                "timeout"
            } else if err.is_connect() {
                "connect"
            } else {
                "error"
            };
            HealthRow {
                api: api.to_string(),
                status: "error".into(),
                latency: reason.into(),
            }
        }
    }
}

fn health_http_client() -> Result<reqwest::Client, DrugBriefError> {
    static HEALTH_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HEALTH_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("drugbrief-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DrugBriefError::HttpClientInit)?;

    match HEALTH_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HEALTH_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| DrugBriefError::Api {
                api: "health".into(),
                message: "Health HTTP client initialization race".into(),
            }),
    }
}

async fn check_cache_dir(dir: PathBuf) -> HealthRow {
    let start = Instant::now();
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let probe = dir.join(format!(".drugbrief-healthcheck-{suffix}.tmp"));

    let result = async {
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&probe, b"ok").await?;
        match tokio::fs::remove_file(&probe).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
    .await;

    match result {
        Ok(()) => HealthRow {
            api: format!("Cache dir ({})", dir.display()),
            status: "ok".into(),
            latency: format!("{}ms", start.elapsed().as_millis()),
        },
        Err(err) => HealthRow {
            api: format!("Cache dir ({})", dir.display()),
            status: "error".into(),
            latency: format!("{:?}", err.kind()),
        },
    }
}

async fn check_targets(targets: HealthTargets) -> Result<HealthReport, DrugBriefError> {
    let client = health_http_client()?;

    let gemini_check = async {
        match &targets.gemini {
            Some((url, key)) => {
                check_one(
                    "Gemini",
                    client.get(url).header("x-goog-api-key", key.as_str()),
                )
                .await
            }
            None => HealthRow {
                api: "Gemini".into(),
                status: "error".into(),
                latency: format!("{} not set", gemini::GEMINI_API_KEY_ENV),
            },
        }
    };
    let (registry_row, openfda_row, gemini_row) = tokio::join!(
        check_one(
            "NAFDAC Greenbook",
            client
                .get(&targets.registry_url)
                .header("X-Requested-With", "XMLHttpRequest"),
        ),
        check_one("openFDA", client.get(&targets.openfda_url)),
        gemini_check,
    );

    let mut rows = vec![registry_row, openfda_row, gemini_row];
    if let Some(dir) = targets.cache_dir {
        rows.push(check_cache_dir(dir).await);
    }
    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}

/// Runs connectivity checks for the registry, openFDA, the generative service
/// and the local cache directory.
///
/// # Errors
///
/// Returns an error when the health HTTP client cannot be created.
pub async fn check(apis_only: bool) -> Result<HealthReport, DrugBriefError> {
    check_targets(HealthTargets::from_env(apis_only)).await
}

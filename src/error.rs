#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DrugBriefError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("API error from {api}: {message}")]
    Api { api: String, message: String },

    #[error("API JSON error from {api}: {source}")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} \"{id}\" not found. {suggestion}")]
    NotFound {
        entity: String,
        id: String,
        suggestion: String,
    },

    #[error(
        "No active ingredients could be identified for \"{product}\". The registry entry may be incomplete; try the product's NAFDAC registration number or a different spelling."
    )]
    NoIngredients { product: String },

    #[error("Summary generation failed: {reason}. Please try again in a moment.")]
    SummaryFailed { reason: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error(
        "API key required: {api} requires {env_var} environment variable.\n\nTo set:\n  export {env_var}=your-key\n\nMore info: {docs_url}"
    )]
    ApiKeyRequired {
        api: String,
        env_var: String,
        docs_url: String,
    },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

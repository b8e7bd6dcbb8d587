use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use super::prompts::{self, EXTRACT_DRUG_NAME};
use super::{
    GenerationRequest, InlineImage, TextGenerator, generate_string_field, string_field_schema,
};
use crate::error::DrugBriefError;

const OUTPUT_FIELD: &str = "drugName";

pub fn mime_type_for_path(path: &Path) -> Result<&'static str, DrugBriefError> {
    let ext = path
        .extension()
        .and_then(|v| v.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "webp" => Ok("image/webp"),
        "heic" => Ok("image/heic"),
        _ => Err(DrugBriefError::InvalidArgument(format!(
            "Unsupported image type for {}. Use a PNG, JPEG, WebP or HEIC photo.",
            path.display()
        ))),
    }
}

async fn request_drug_name(
    generator: &dyn TextGenerator,
    image: &[u8],
    mime_type: &str,
) -> Result<String, DrugBriefError> {
    let request = GenerationRequest {
        template: EXTRACT_DRUG_NAME,
        prompt: prompts::render(EXTRACT_DRUG_NAME, minijinja::context! {})?,
        output_schema: string_field_schema(
            OUTPUT_FIELD,
            "The primary drug or product name visible on the packaging.",
        ),
        image: Some(InlineImage {
            mime_type: mime_type.to_string(),
            data_base64: STANDARD.encode(image),
        }),
    };
    generate_string_field(generator, &request, OUTPUT_FIELD).await
}

/// Best-guess drug name from a packaging photo, or an empty string.
pub async fn extract_drug_name(
    generator: &dyn TextGenerator,
    image: &[u8],
    mime_type: &str,
) -> String {
    if image.is_empty() {
        debug!("Empty image passed to drug name extraction");
        return String::new();
    }
    match request_drug_name(generator, image, mime_type).await {
        Ok(name) => name,
        Err(err) => {
            warn!(mime_type, "Drug name extraction failed: {err}");
            String::new()
        }
    }
}

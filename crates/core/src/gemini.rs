//! Gemini AI gateway.
//!
//! Three independent operations against the Gemini API drive the whole
//! product: facial diagnosis, virtual-makeup synthesis and trending-product
//! search. Each operation owns its prompt construction and response
//! parsing; only the search path is allowed to degrade on a malformed
//! response, because a missing product list must never sink the flow.
//!
//! The [`BeautyGateway`] trait is the seam the orchestrator depends on,
//! so the pipeline can be exercised against mock gateways in tests.

use crate::capture::CapturedImage;
use crate::config::Config;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use gemini_rust::{Blob, Content, Gemini, Message, Part, Role};
use serde::{Deserialize, Serialize};

/// Fixed look applied when the user leaves the style request empty.
pub const DEFAULT_LOOK_REQUEST: &str =
    "a sophisticated, trendy K-beauty makeup look with flawless glass skin";

/// Description used when the search response cannot be parsed.
const GENERIC_SEARCH_DESCRIPTION: &str =
    "A curated selection of trending beauty products for your look.";

/// Rationale used when a recommendation arrives without one.
const GENERIC_PRODUCT_REASON: &str = "A trending pick that matches this look.";

/// Shopping deep-link endpoint; the URL-encoded item name is appended.
const PRODUCT_SEARCH_ENDPOINT: &str = "https://www.google.com/search?tbm=shop&q=";

/// How many products the search operation asks for.
const PRODUCT_COUNT: usize = 5;

const DIAGNOSIS_PROMPT: &str = "You are a professional beauty consultant. Analyze the face in \
this portrait photo: skin condition, facial balance, and makeup potential. Respond with strict \
JSON only, no prose, in the shape {\"summary\": string, \"metrics\": [{\"label\": string, \
\"score\": number}]}. Scores are 0-100. Include an \"Overall\" metric. If you can, also return \
an annotated copy of the portrait highlighting the analyzed regions.";

/// A single named score from the facial diagnosis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacialMetric {
    pub label: String,
    /// 0-100.
    pub score: f32,
}

/// An image returned inline by the model, still Base64-encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: String,
}

impl InlineImage {
    /// Decodes the Base64 payload back into raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
        BASE64
            .decode(&self.data)
            .map_err(|e| AppError::decode(format!("Invalid base64 payload: {}", e)))
    }
}

/// Full output of the diagnosis operation.
#[derive(Clone, Debug)]
pub struct DiagnosticResult {
    pub summary: String,
    pub metrics: Vec<FacialMetric>,
    /// Annotated overlay, when the model chose to return one. Absence is
    /// a valid state: the overlay is skipped and the flow continues.
    pub report_image: Option<InlineImage>,
}

impl DiagnosticResult {
    /// Renders the diagnosis as a single line woven into the synthesis
    /// and search prompts.
    pub fn context_line(&self) -> String {
        if self.metrics.is_empty() {
            return self.summary.clone();
        }
        let metrics = self
            .metrics
            .iter()
            .map(|m| format!("{} {}%", m.label, m.score))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}. Metrics: {}", self.summary, metrics)
    }

    /// The metric displayed prominently, looked up by label substring.
    pub fn overall_metric(&self) -> Option<&FacialMetric> {
        self.metrics
            .iter()
            .find(|m| m.label.to_lowercase().contains("overall"))
    }
}

/// A product recommendation from the search operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Ordinal position in the response; the remote source provides no id.
    pub id: usize,
    pub name: String,
    pub description: String,
    /// Not populated by the current search path.
    pub price: f64,
    pub url: String,
    /// Not populated by the current search path.
    pub thumbnail_url: String,
}

/// Output of the product search operation.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    pub description: String,
    pub products: Vec<Product>,
}

impl SearchOutcome {
    /// The degraded outcome used when the response did not parse.
    pub fn fallback() -> Self {
        Self {
            description: GENERIC_SEARCH_DESCRIPTION.to_string(),
            products: Vec::new(),
        }
    }
}

/// The gateway seam between the orchestrator and the Gemini API.
///
/// Diagnosis must complete before the other two operations, since its
/// output seeds their prompts; the orchestrator enforces that ordering.
#[async_trait]
pub trait BeautyGateway: Send + Sync {
    /// Analyzes the portrait into a summary, metrics and optional overlay.
    async fn diagnose(&self, image: &CapturedImage) -> Result<DiagnosticResult>;

    /// Renders the virtual makeover. A response without an inline image
    /// part is a hard failure ([`AppError::NoImageGenerated`]).
    async fn synthesize_look(
        &self,
        image: &CapturedImage,
        user_request: &str,
        research_notes: &str,
        diagnosis_context: &str,
    ) -> Result<InlineImage>;

    /// Finds trending products for the requested style. Malformed
    /// responses degrade to [`SearchOutcome::fallback`] and never raise.
    async fn search_products(
        &self,
        image: &CapturedImage,
        user_request: &str,
        research_notes: &str,
        diagnosis_context: &str,
    ) -> Result<SearchOutcome>;
}

/// Production [`BeautyGateway`] backed by the Gemini API.
pub struct GeminiClient {
    /// Handle on the text model (product search).
    text_client: Gemini,
    /// Handle on the image-capable model (diagnosis overlay, synthesis).
    image_client: Gemini,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        if config.gemini_api_key.trim().is_empty() {
            return Err(AppError::config(
                "GEMINI_API_KEY is empty; set it in the environment or .env file",
            ));
        }

        Ok(Self {
            text_client: Self::build_client(&config.gemini_api_key, &config.text_model)?,
            image_client: Self::build_client(&config.gemini_api_key, &config.image_model)?,
        })
    }

    /// Builds a client handle for one model, explicitly setting the base
    /// URL to avoid BadScheme errors.
    fn build_client(api_key: &str, model_name: &str) -> Result<Gemini> {
        let base_url = url::Url::parse("https://generativelanguage.googleapis.com/v1beta/")
            .map_err(|e| AppError::config(format!("Invalid base URL: {}", e)))?;

        let model_name = if model_name.starts_with("models/") {
            model_name.to_string()
        } else {
            format!("models/{}", model_name)
        };
        let model_url = format!("https://generativelanguage.googleapis.com/v1beta/{}", model_name);

        Gemini::with_model_and_base_url(api_key, model_url, base_url)
            .map_err(|e| AppError::config(format!("Failed to create Gemini client: {}", e)))
    }

    /// Assembles the one-message payload of prompt text plus portrait.
    fn portrait_message(image: &CapturedImage, prompt: String) -> Message {
        let blob = Blob {
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
        };

        let image_part = Part::InlineData { inline_data: blob };

        let text_part = Part::Text {
            text: prompt,
            thought: None,
            thought_signature: None,
        };

        let content = Content {
            role: Some(Role::User),
            parts: Some(vec![text_part, image_part]),
        };

        Message {
            role: Role::User,
            content,
        }
    }
}

#[async_trait]
impl BeautyGateway for GeminiClient {
    async fn diagnose(&self, image: &CapturedImage) -> Result<DiagnosticResult> {
        let message = Self::portrait_message(image, DIAGNOSIS_PROMPT.to_string());

        let response = self
            .image_client
            .generate_content()
            .with_messages(vec![message])
            .execute()
            .await
            .map_err(|e| AppError::transport(format!("Diagnosis request failed: {:?}", e)))?;

        let mut text = String::new();
        let mut report_image = None;

        if let Some(candidate) = response.candidates.first() {
            if let Some(parts) = &candidate.content.parts {
                for part in parts {
                    match part {
                        Part::Text { text: chunk, thought, .. } => {
                            if !thought.unwrap_or(false) {
                                text.push_str(chunk);
                            }
                        }
                        Part::InlineData { inline_data } => {
                            if report_image.is_none() {
                                report_image = Some(InlineImage {
                                    data: inline_data.data.clone(),
                                    mime_type: inline_data.mime_type.clone(),
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if text.trim().is_empty() {
            return Err(AppError::malformed("Diagnosis response contained no text"));
        }

        let (summary, metrics) = parse_diagnosis(&text)?;
        Ok(DiagnosticResult {
            summary,
            metrics,
            report_image,
        })
    }

    async fn synthesize_look(
        &self,
        image: &CapturedImage,
        user_request: &str,
        research_notes: &str,
        diagnosis_context: &str,
    ) -> Result<InlineImage> {
        let prompt = synthesis_instruction(user_request, research_notes, diagnosis_context);
        let message = Self::portrait_message(image, prompt);

        let response = self
            .image_client
            .generate_content()
            .with_messages(vec![message])
            .execute()
            .await
            .map_err(|e| AppError::transport(format!("Synthesis request failed: {:?}", e)))?;

        // The makeover is the first inline image part; anything else in
        // the response is commentary we don't need.
        if let Some(candidate) = response.candidates.first() {
            if let Some(parts) = &candidate.content.parts {
                for part in parts {
                    if let Part::InlineData { inline_data } = part {
                        return Ok(InlineImage {
                            data: inline_data.data.clone(),
                            mime_type: inline_data.mime_type.clone(),
                        });
                    }
                }
            }
        }

        Err(AppError::NoImageGenerated)
    }

    async fn search_products(
        &self,
        image: &CapturedImage,
        user_request: &str,
        research_notes: &str,
        diagnosis_context: &str,
    ) -> Result<SearchOutcome> {
        let prompt = search_instruction(user_request, research_notes, diagnosis_context);
        let message = Self::portrait_message(image, prompt);

        let response = self
            .text_client
            .generate_content()
            .with_messages(vec![message])
            .execute()
            .await
            .map_err(|e| AppError::transport(format!("Product search failed: {:?}", e)))?;

        let mut text = String::new();
        if let Some(candidate) = response.candidates.first() {
            if let Some(parts) = &candidate.content.parts {
                for part in parts {
                    if let Part::Text { text: chunk, thought, .. } = part {
                        if !thought.unwrap_or(false) {
                            text.push_str(chunk);
                        }
                    }
                }
            }
        }

        Ok(parse_search(&text))
    }
}

/// Builds the identity-preserving makeover instruction.
///
/// The user's request is woven in verbatim when non-empty; otherwise the
/// fixed default look applies.
fn synthesis_instruction(
    user_request: &str,
    research_notes: &str,
    diagnosis_context: &str,
) -> String {
    let look = if user_request.trim().is_empty() {
        DEFAULT_LOOK_REQUEST
    } else {
        user_request.trim()
    };

    let mut prompt = format!(
        "Apply virtual makeup to the person in this photo. Strictly preserve their facial \
identity, bone structure, pose and expression; change only cosmetics (skin finish, eyes, \
brows, lips, blush). The desired look: {}.",
        look
    );

    if !research_notes.trim().is_empty() {
        prompt.push_str(&format!(" Style notes to respect: {}.", research_notes.trim()));
    }
    if !diagnosis_context.trim().is_empty() {
        prompt.push_str(&format!(" Facial analysis for reference: {}", diagnosis_context.trim()));
    }

    prompt.push_str(" Return the edited photo.");
    prompt
}

/// Builds the grounded product-search instruction.
fn search_instruction(
    user_request: &str,
    research_notes: &str,
    diagnosis_context: &str,
) -> String {
    let style = if user_request.trim().is_empty() {
        DEFAULT_LOOK_REQUEST
    } else {
        user_request.trim()
    };

    let mut prompt = format!(
        "Find exactly {} currently trending beauty products matching this style: {}.",
        PRODUCT_COUNT, style
    );

    if !research_notes.trim().is_empty() {
        prompt.push_str(&format!(" Additional notes: {}.", research_notes.trim()));
    }
    if !diagnosis_context.trim().is_empty() {
        prompt.push_str(&format!(" Facial analysis: {}", diagnosis_context.trim()));
    }

    prompt.push_str(
        " Respond with strict JSON only, no prose and no markdown, in the shape \
{\"description\": string, \"recommendations\": [{\"brand\": string, \"itemName\": string, \
\"reason\": string}]}.",
    );
    prompt
}

#[derive(Deserialize)]
struct RawDiagnosis {
    summary: String,
    #[serde(default)]
    metrics: Vec<FacialMetric>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecommendation {
    #[serde(default)]
    brand: Option<String>,
    item_name: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawSearch {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    recommendations: Vec<RawRecommendation>,
}

/// Strips a surrounding markdown code fence, if any.
///
/// Models regularly wrap "strict JSON" in ```json fencing despite
/// instructions; the decoder tolerates both fenced and bare payloads.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.strip_prefix("json").unwrap_or(rest).trim_start();
        if let Some(rest) = s.strip_suffix("```") {
            s = rest.trim_end();
        }
    }
    s
}

/// Parses the diagnosis JSON into summary + metrics.
///
/// Diagnosis is load-bearing (its text seeds both downstream prompts),
/// so a malformed response surfaces instead of degrading.
pub(crate) fn parse_diagnosis(text: &str) -> Result<(String, Vec<FacialMetric>)> {
    let raw: RawDiagnosis = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AppError::malformed(format!("Diagnosis JSON did not parse: {}", e)))?;
    Ok((raw.summary, raw.metrics))
}

/// Parses the search JSON, degrading to the generic fallback on failure.
pub(crate) fn parse_search(text: &str) -> SearchOutcome {
    let raw: RawSearch = match serde_json::from_str(strip_code_fence(text)) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("product search response did not parse, degrading: {}", e);
            return SearchOutcome::fallback();
        }
    };

    let products = raw
        .recommendations
        .into_iter()
        .enumerate()
        .map(|(id, rec)| {
            let name = match rec.brand.as_deref().map(str::trim) {
                Some(brand) if !brand.is_empty() => format!("{} - {}", brand, rec.item_name),
                _ => rec.item_name.clone(),
            };
            // The deep link is keyed by the item name only; leaving the
            // brand out of the query broadens the match likelihood.
            let url = format!(
                "{}{}",
                PRODUCT_SEARCH_ENDPOINT,
                urlencoding::encode(&rec.item_name)
            );
            Product {
                id,
                name,
                description: rec
                    .reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_PRODUCT_REASON.to_string()),
                price: 0.0,
                url,
                thumbnail_url: String::new(),
            }
        })
        .collect();

    SearchOutcome {
        description: raw
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| GENERIC_SEARCH_DESCRIPTION.to_string()),
        products,
    }
}

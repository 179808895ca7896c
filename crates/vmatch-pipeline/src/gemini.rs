//! Gemini scene-model client.
//!
//! Issues one multimodal text-generation call per run and parses the
//! response defensively: the model is asked for JSON, but the output is
//! modeled as a tagged value (structured or raw) with a pure
//! parse-or-degrade step instead of inline error handling.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Scene-model configuration.
#[derive(Debug, Clone)]
pub struct SceneModelConfig {
    /// API key (provider keys start with `AIza`)
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl SceneModelConfig {
    /// Build config from environment variables.
    ///
    /// Returns `None` when the key is absent or does not look like a real
    /// provider key; the pipeline then uses local synthesis.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())?;

        if !api_key.starts_with("AIza") {
            warn!("GEMINI_API_KEY does not look like a provider key, scene model disabled");
            return None;
        }

        Some(Self {
            api_key,
            base_url: std::env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            timeout: Duration::from_secs(
                std::env::var("GEMINI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Structured scene analysis from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnalysis {
    pub scene_description: String,
    pub scene_mood: String,
    #[serde(default)]
    pub visual_elements: Vec<String>,
}

/// Model output: parsed structure, or the raw text when parsing failed.
#[derive(Debug, Clone)]
pub enum SceneModelOutput {
    Structured(SceneAnalysis),
    Raw(String),
}

impl SceneModelOutput {
    /// Resolve to a structured analysis, degrading raw text if needed.
    pub fn into_analysis(self) -> SceneAnalysis {
        match self {
            SceneModelOutput::Structured(analysis) => analysis,
            SceneModelOutput::Raw(text) => degrade(&text),
        }
    }
}

/// Scene-model API client.
#[derive(Clone)]
pub struct SceneModelClient {
    http: Client,
    config: SceneModelConfig,
}

impl SceneModelClient {
    /// Create a new client.
    pub fn new(config: SceneModelConfig) -> PipelineResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vmatch-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::scene_model(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables; `None` without a usable key.
    pub fn from_env() -> PipelineResult<Option<Self>> {
        match SceneModelConfig::from_env() {
            Some(config) => Ok(Some(Self::new(config)?)),
            None => Ok(None),
        }
    }

    /// Run one generation call and parse the response.
    pub async fn analyze(&self, prompt: &str) -> PipelineResult<SceneModelOutput> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.9,
                max_output_tokens: 800,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::scene_model(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::scene_model(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::scene_model(format!("bad response body: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| PipelineError::scene_model("no content in response"))?;

        let preview: String = text.chars().take(200).collect();
        debug!("Scene model raw response: {}...", preview);

        Ok(parse_output(text))
    }
}

/// Build the analysis prompt from the accumulated stage outputs.
pub fn build_prompt(
    frame_count: usize,
    transcription: &str,
    ambient_tags: &str,
    id_fragment: &str,
) -> String {
    format!(
        r#"Analyze video content based on the following data and provide a detailed analysis in JSON format:

Video Analysis Context:
- Extracted frames: {frame_count} frames analyzed
- Audio transcription: "{transcription}"
- Ambient audio tags: {ambient_tags}
- Video identifier: {id_fragment}

Create a unique analysis for this specific video content. Provide varied and creative descriptions that would help recommend appropriate music.

Respond with valid JSON in this exact format:
{{
  "scene_description": "Detailed description of the video's visual content and narrative flow",
  "scene_mood": "Primary emotional mood or atmosphere of the video",
  "visual_elements": ["visual_element_1", "visual_element_2", "visual_element_3", "visual_element_4"]
}}

Make the response unique and specific to this video data.
"#
    )
}

/// Parse model text into a structured analysis, keeping the raw text when
/// no parseable JSON object is present.
pub fn parse_output(text: &str) -> SceneModelOutput {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    // Extract the first top-level JSON object substring.
    let candidate = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => return SceneModelOutput::Raw(text.to_string()),
    };

    match serde_json::from_str::<SceneAnalysis>(candidate) {
        Ok(analysis) => SceneModelOutput::Structured(analysis),
        Err(_) => SceneModelOutput::Raw(text.to_string()),
    }
}

/// Build a structured response out of unparseable model text.
pub fn degrade(raw: &str) -> SceneAnalysis {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '"' | '[' | ']'))
        .take(150)
        .collect();

    SceneAnalysis {
        scene_description: format!("AI-analyzed video content: {}...", cleaned.trim()),
        scene_mood: "Dynamic and Engaging".to_string(),
        visual_elements: vec![
            "AI-Generated Content".to_string(),
            "Visual Analysis".to_string(),
            "Content Recognition".to_string(),
            "Contextual Elements".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_plain_json() {
        let text = r#"{"scene_description": "d", "scene_mood": "m", "visual_elements": ["a", "b"]}"#;
        match parse_output(text) {
            SceneModelOutput::Structured(analysis) => {
                assert_eq!(analysis.scene_mood, "m");
                assert_eq!(analysis.visual_elements.len(), 2);
            }
            SceneModelOutput::Raw(_) => panic!("expected structured output"),
        }
    }

    #[test]
    fn test_parse_output_fenced_json() {
        let text = "```json\n{\"scene_description\": \"d\", \"scene_mood\": \"m\", \"visual_elements\": []}\n```";
        assert!(matches!(
            parse_output(text),
            SceneModelOutput::Structured(_)
        ));
    }

    #[test]
    fn test_parse_output_embedded_json() {
        let text = "Here is the analysis: {\"scene_description\": \"d\", \"scene_mood\": \"m\", \"visual_elements\": []} hope it helps";
        assert!(matches!(
            parse_output(text),
            SceneModelOutput::Structured(_)
        ));
    }

    #[test]
    fn test_parse_output_garbage_is_raw() {
        match parse_output("the video looks nice") {
            SceneModelOutput::Raw(text) => assert_eq!(text, "the video looks nice"),
            SceneModelOutput::Structured(_) => panic!("expected raw output"),
        }
    }

    #[test]
    fn test_degrade_strips_json_noise() {
        let analysis = degrade("{\"partial\": \"resp[on]se\"");
        assert!(analysis.scene_description.starts_with("AI-analyzed video content:"));
        assert!(!analysis.scene_description.contains('{'));
        assert_eq!(analysis.scene_mood, "Dynamic and Engaging");
        assert_eq!(analysis.visual_elements.len(), 4);
    }

    #[tokio::test]
    async fn test_analyze_happy_path() {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [{
                            "text": "{\"scene_description\": \"Forest walk\", \"scene_mood\": \"Calm and Contemplative\", \"visual_elements\": [\"Trees\"]}"
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = SceneModelClient::new(SceneModelConfig {
            api_key: "AIzaTest".to_string(),
            base_url: server.uri(),
            model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let analysis = client
            .analyze("prompt")
            .await
            .unwrap()
            .into_analysis();
        assert_eq!(analysis.scene_mood, "Calm and Contemplative");
    }
}

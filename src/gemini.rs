//! Client for the Gemini generative-language service.
//!
//! This module owns the full analysis boundary: prompt assembly from a
//! template and a repository URL, the single network round trip, and
//! validation/normalization of the structured response. The call is the
//! application's only suspension point; no timeout beyond the transport's
//! own defaults is enforced, no retry is attempted, and an in-flight call
//! cannot be cancelled.

use log::{debug, error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Analysis, AuditError, GroundingMetadata, Result};

/// Placeholder token that prompt templates must contain. Every occurrence
/// is replaced by the subject URL before submission.
pub const REPO_URL_PLACEHOLDER: &str = "{{REPO_URL}}";

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default audit prompt applied when the user supplies no template of their
/// own.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are an assistant that evaluates Symfony and React.js projects on GitHub for beginners.
For the following GitHub repository: {{REPO_URL}}

1. Determine whether this repository looks like a Symfony and/or React.js project. Look for key indicators:
   - For Symfony: a composer.json mentioning "symfony/framework-bundle", and a typical layout (config/, src/, templates/, public/index.php, bin/console).
   - For React.js: a package.json mentioning "react", and a layout like src/, public/, index.js or App.js.
2. If it is NOT a Symfony or React.js project, state that clearly in the analysis and give a rating of -1.
3. If it IS such a project:
   a. Give a short description of the project (its purpose if identifiable, and the framework version if visible).
   b. Evaluate clean code and best practices: readability, separation of concerns, thin controllers with business logic in services or entities, sensible use of the Doctrine ORM, form handling and validation, and the presence and quality of tests.
   c. Evaluate the architecture: folder structure and modularity, frontend/backend communication (REST/GraphQL, API documentation), dependency management, and environment configuration (.env files, CI/CD if present).
   d. Call out good practices you observed as well as notable points to improve.
4. Give a combined rating for clean code, best practices, and architecture on a scale of 0 to 10, where 0 means major problems, 5 acceptable with room for improvement, and 10 excellent.
5. If the repository is empty, lacks relevant code, or cannot be meaningfully evaluated, give a rating of -1 and explain why in the analysis."#;

/// Machine-readable response-format instruction appended to every prompt.
pub const JSON_RESPONSE_INSTRUCTION: &str = r#"
Respond ONLY with a valid JSON object containing the keys "analysis" (string) and "rating" (number). Example:
{
  "analysis": "This project uses Symfony 6.x for a simple application with an API. Forms carry CSRF tokens but the .env file is missing. Services live in src/Service/ and the code is readable but contains redundant functions.",
  "rating": 7
}"#;

/// How much of an unparseable response is echoed back in error messages.
const SNIPPET_LEN: usize = 100;

/// Assembles the final prompt for one analysis call.
///
/// With no template the default audit prompt is used. A custom template
/// must be non-empty and contain [`REPO_URL_PLACEHOLDER`]; every occurrence
/// is replaced by the subject URL, then the JSON response-format
/// instruction is appended.
pub fn build_prompt(repo_url: &str, template: Option<&str>) -> Result<String> {
    if repo_url.trim().is_empty() {
        return Err(AuditError::EmptyRepoUrl);
    }

    let template = match template {
        Some(t) if t.trim().is_empty() => {
            return Err(AuditError::InvalidPromptTemplate {
                message: "The custom prompt template cannot be empty.".to_string(),
            })
        }
        Some(t) if !t.contains(REPO_URL_PLACEHOLDER) => {
            return Err(AuditError::InvalidPromptTemplate {
                message: format!(
                    "The custom prompt template must contain the {} placeholder.",
                    REPO_URL_PLACEHOLDER
                ),
            })
        }
        Some(t) => t,
        None => DEFAULT_PROMPT_TEMPLATE,
    };

    let mut prompt = template.replace(REPO_URL_PLACEHOLDER, repo_url);
    prompt.push('\n');
    prompt.push_str(JSON_RESPONSE_INSTRUCTION);
    Ok(prompt)
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for one Gemini model endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Creates a client against the given endpoint and model.
    ///
    /// The key may be absent at construction time; its absence surfaces as
    /// a configuration error on the first analysis call.
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
            api_key,
        }
    }

    /// Submits an assembled prompt and awaits the full, non-streaming reply.
    pub async fn analyze(&self, prompt: &str) -> Result<Analysis> {
        let api_key = self.api_key.as_deref().ok_or(AuditError::MissingApiKey)?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!("Requesting analysis from {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Analysis service returned {}: {}", status, body);
            return Err(AuditError::ServiceError { status, body });
        }

        let body = response.text().await?;
        let envelope: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Unparseable service envelope: {}", e);
            AuditError::MalformedResponse {
                snippet: snippet(&body),
            }
        })?;

        let (text, grounding_metadata) = match envelope.candidates.into_iter().next() {
            Some(candidate) => {
                let text = candidate
                    .content
                    .map(|c| {
                        c.parts
                            .into_iter()
                            .map(|p| p.text)
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();
                (text, candidate.grounding_metadata)
            }
            None => {
                error!("Service response carried no candidates");
                return Err(AuditError::MalformedResponse {
                    snippet: snippet(&body),
                });
            }
        };

        let (analysis, rating) = parse_analysis_payload(&text)?;
        Ok(Analysis {
            analysis,
            rating,
            grounding_metadata,
        })
    }
}

/// Parses the model's text payload into the expected
/// `{analysis: string, rating: number}` shape.
///
/// The text is trimmed and unwrapped from a fenced code block when present.
/// A rating outside [-1, 10] is not an error: it is clamped to the -1
/// sentinel with a warning, since "could not rate" is a valid outcome.
pub fn parse_analysis_payload(raw: &str) -> Result<(String, i32)> {
    let text = extract_fenced(raw.trim());

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| AuditError::MalformedResponse {
            snippet: snippet(text),
        })?;

    let analysis = match value.get("analysis").and_then(|v| v.as_str()) {
        Some(s) => s.to_string(),
        None => {
            error!("Response JSON is missing a string \"analysis\" field");
            return Err(AuditError::MalformedResponse {
                snippet: snippet(text),
            });
        }
    };

    let rating = match value.get("rating").and_then(|v| v.as_f64()) {
        Some(r) => r,
        None => {
            error!("Response JSON is missing a numeric \"rating\" field");
            return Err(AuditError::MalformedResponse {
                snippet: snippet(text),
            });
        }
    };

    let rating = if !(-1.0..=10.0).contains(&rating) {
        warn!(
            "Rating {} is outside the expected range [-1, 10], adjusting to -1",
            rating
        );
        -1
    } else {
        rating as i32
    };

    Ok((analysis, rating))
}

/// Returns the inner content of a fenced code block, or the input unchanged
/// when it is not fenced.
fn extract_fenced(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence line, if any
    match rest.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => rest.trim(),
    }
}

fn snippet(text: &str) -> String {
    let mut s: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn default_prompt_embeds_url_and_instruction() {
        let prompt = build_prompt("https://github.com/a/b", None).unwrap();
        assert!(prompt.contains("https://github.com/a/b"));
        assert!(!prompt.contains(REPO_URL_PLACEHOLDER));
        assert!(prompt.ends_with(JSON_RESPONSE_INSTRUCTION));
    }

    #[test]
    fn custom_template_replaces_every_occurrence() {
        let template = "Audit {{REPO_URL}} and compare {{REPO_URL}} with {{REPO_URL}}.";
        let prompt = build_prompt("https://github.com/a/b", Some(template)).unwrap();
        assert_eq!(prompt.matches("https://github.com/a/b").count(), 3);
        assert!(!prompt.contains(REPO_URL_PLACEHOLDER));
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(
            build_prompt("   ", None),
            Err(AuditError::EmptyRepoUrl)
        ));
    }

    #[test]
    fn empty_custom_template_is_rejected() {
        assert!(matches!(
            build_prompt("https://github.com/a/b", Some("  \n ")),
            Err(AuditError::InvalidPromptTemplate { .. })
        ));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = build_prompt("https://github.com/a/b", Some("no placeholder here"));
        match err {
            Err(AuditError::InvalidPromptTemplate { message }) => {
                assert!(message.contains(REPO_URL_PLACEHOLDER));
            }
            other => panic!("expected InvalidPromptTemplate, got {:?}", other),
        }
    }

    #[test]
    fn payload_parses_plain_json() {
        let (analysis, rating) =
            parse_analysis_payload(r#"{"analysis": "fine", "rating": 8}"#).unwrap();
        assert_eq!(analysis, "fine");
        assert_eq!(rating, 8);
    }

    #[test]
    fn payload_unwraps_fenced_block() {
        let raw = "```json\n{\"analysis\": \"fenced\", \"rating\": 3}\n```";
        let (analysis, rating) = parse_analysis_payload(raw).unwrap();
        assert_eq!(analysis, "fenced");
        assert_eq!(rating, 3);
    }

    #[test]
    fn non_json_payload_errors_with_snippet() {
        let err = parse_analysis_payload("not json").unwrap_err();
        match err {
            AuditError::MalformedResponse { snippet } => assert!(snippet.contains("not json")),
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn wrong_field_types_error() {
        assert!(matches!(
            parse_analysis_payload(r#"{"analysis": 1, "rating": 5}"#),
            Err(AuditError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_analysis_payload(r#"{"analysis": "ok", "rating": "five"}"#),
            Err(AuditError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn out_of_range_rating_clamps_to_sentinel() {
        let (_, rating) = parse_analysis_payload(r#"{"analysis": "ok", "rating": 23}"#).unwrap();
        assert_eq!(rating, -1);
        let (_, rating) = parse_analysis_payload(r#"{"analysis": "ok", "rating": -5}"#).unwrap();
        assert_eq!(rating, -1);
        let (_, rating) = parse_analysis_payload(r#"{"analysis": "ok", "rating": -1}"#).unwrap();
        assert_eq!(rating, -1);
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }]
        })
    }

    #[tokio::test]
    async fn analyze_returns_validated_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1beta/models/{}:generateContent",
                DEFAULT_MODEL
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(
                r#"{"analysis": "looks healthy", "rating": 9}"#,
            )))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            server.uri(),
            DEFAULT_MODEL.to_string(),
            Some("test-key".to_string()),
        );
        let result = client.analyze("prompt").await.unwrap();
        assert_eq!(result.analysis, "looks healthy");
        assert_eq!(result.rating, 9);
        assert!(result.grounding_metadata.is_none());
    }

    #[tokio::test]
    async fn analyze_passes_grounding_metadata_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"analysis\": \"ok\", \"rating\": 5}" }] },
                    "groundingMetadata": {
                        "searchQuery": "symfony repo quality",
                        "groundingChunks": [
                            { "web": { "uri": "https://example.com", "title": "Example" } }
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            server.uri(),
            DEFAULT_MODEL.to_string(),
            Some("test-key".to_string()),
        );
        let result = client.analyze("prompt").await.unwrap();
        let meta = result.grounding_metadata.unwrap();
        assert_eq!(meta.search_query.as_deref(), Some("symfony repo quality"));
        let chunks = meta.grounding_chunks.unwrap();
        assert_eq!(chunks[0].web.as_ref().unwrap().uri, "https://example.com");
    }

    #[tokio::test]
    async fn analyze_surfaces_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            server.uri(),
            DEFAULT_MODEL.to_string(),
            Some("test-key".to_string()),
        );
        let err = client.analyze("prompt").await.unwrap_err();
        match err {
            AuditError::ServiceError { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("expected ServiceError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn analyze_without_key_is_a_config_error() {
        let client = GeminiClient::new(
            "http://127.0.0.1:1".to_string(),
            DEFAULT_MODEL.to_string(),
            None,
        );
        assert!(matches!(
            client.analyze("prompt").await,
            Err(AuditError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn analyze_reports_malformed_payload_with_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("not json")))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            server.uri(),
            DEFAULT_MODEL.to_string(),
            Some("test-key".to_string()),
        );
        let err = client.analyze("prompt").await.unwrap_err();
        match err {
            AuditError::MalformedResponse { snippet } => assert!(snippet.contains("not json")),
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }
}

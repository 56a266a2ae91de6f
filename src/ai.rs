//! Pattern suggestions from a generative model.
//!
//! The model is asked for a JSON object whose values are XPath candidates;
//! [`parse_candidates`] pulls them back out of whatever text it answers with.

use crate::config::ExtractorConfig;
use crate::error::AiError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON object pattern should be valid"));

/// Which action produced a stored prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAction {
    ElementAnalysis,
    ExtractElements,
}

/// The most recent prompt, kept so it can be copied out and pasted elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrompt {
    pub action: PromptAction,
    pub text: String,
}

pub fn element_analysis_prompt(html: &str, text: &str, href: &str) -> String {
    format!(
        r#"Analyze the following HTML element outerHTML and return the potential xpath that can be used to extract this element:

HTML Element:
{html}

Element Text: {text}
Element Href: {href}

Provide multiple XPath expressions that can be used to select elements that have similar patterns.
Return ONLY a valid JSON object with the following format (no additional text or explanation):
{{
  "option1": xpath_pattern1 (most specific) only identifies the element being clicked,
  "option2": xpath_pattern2 (less specific) identifies the element within the same container or class,
  "option3": xpath_pattern3 (least specific) does not depend on id, href or element text
}}

Provide 3 different XPath options ordered from most specific to least specific."#,
        html = html,
        text = text.trim(),
        href = href,
    )
}

pub fn extract_elements_prompt(patterns: &[String], recursive: bool, url: &str) -> String {
    let listed: Vec<String> = patterns
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p))
        .collect();
    let follow = if recursive {
        "Follow links to extract elements from linked pages (with depth limit)"
    } else {
        "Only extract from the current page"
    };

    format!(
        "Extract elements from web pages using XPath expressions.

XPath Expressions to use:
{listed}

Extraction Parameters:
- Recursive extraction: {recursive}
- Current page URL: {url}
- Extraction method: XPath-based element selection

The extraction process will:
1. Find all elements matching the provided XPath expressions
2. Extract their text content, URLs, HTML structure, and metadata
3. {follow}
4. Organize the results in a hierarchical tree structure
5. Identify PDF files and provide download functionality",
        listed = listed.join("\n"),
        recursive = if recursive { "Yes" } else { "No" },
        url = url,
        follow = follow,
    )
}

/// String values of the first brace-delimited JSON object in `response`, in order.
///
/// Non-string values and blank strings are ignored.
pub fn parse_candidates(response: &str) -> Result<Vec<String>, AiError> {
    let object = JSON_OBJECT
        .find(response)
        .ok_or_else(|| AiError::ResponseParse("response contains no JSON object".to_string()))?;

    let values: Map<String, Value> = serde_json::from_str(object.as_str())
        .map_err(|e| AiError::ResponseParse(e.to_string()))?;

    Ok(values
        .into_iter()
        .filter_map(|(_, value)| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect())
}

/// A model that answers a prompt with free-form text
#[async_trait]
pub trait PatternSuggester: Send + Sync {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, AiError>;
}

/// Asks the user for an API key when none is stored
pub trait CredentialPrompt {
    /// `None` when the user declines
    fn request_api_key(&self) -> Option<String>;
}

/// Never supplies a key
pub struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn request_api_key(&self) -> Option<String> {
        None
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
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

/// Gemini `generateContent` over HTTP. Each call is a single attempt.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &ExtractorConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AiError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.gemini_endpoint.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
        })
    }
}

#[async_trait]
impl PatternSuggester for GeminiClient {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, AiError> {
        if api_key.trim().is_empty() {
            return Err(AiError::MissingCredential);
        }
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 2048,
            },
        };

        ::log::info!("Requesting pattern suggestions from {}", self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Request(format!("API request failed: {}", status)));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::ResponseParse(e.without_url().to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AiError::ResponseParse("invalid response format".to_string()))
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::constants; // For GEMINI_API_BASE, GEMINI_MODEL and GEMINI_API_KEY

/// Build the assistant prompt for a single user question.
pub fn build_prompt(message: &str) -> String {
    format!(
        "You are WebMD's AI Assistant. Please provide concise, accurate responses to health-related questions.

Current question: {}

Guidelines:
1. Keep responses under 3-4 sentences
2. Focus on key information only
3. Use bullet points for lists
4. Only include WebMD links if you are certain they exist and are accessible
5. If you're not sure about a link's availability, don't include it
6. Always add: \"Note: Consult a healthcare professional for medical advice\"
7. Use simple, clear language
8. Avoid medical jargon unless necessary
9. If discussing medications, mention both brand and generic names",
        message
    )
}

/// A text-in, text-out generative model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// Structures matching Gemini's generateContent endpoint
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Google Gemini over its REST API. One request per call, no retries.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            constants::GEMINI_API_BASE.clone(),
            constants::GEMINI_MODEL.clone(),
            constants::GEMINI_API_KEY.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = self.endpoint();
        let request_payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_payload)
            .send()
            .await
            .context(format!("Failed to send request to Gemini API at {}", endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "Gemini API request failed");
            return Err(anyhow::anyhow!(
                "Gemini API request failed with status {}: {}",
                status, error_body
            ));
        }

        let gemini_response = response
            .json::<GenerateContentResponse>()
            .await
            .context("Failed to parse JSON response from Gemini API")?;

        let text = gemini_response
            .text()
            .context("Gemini response contained no text")?;
        debug!(response = ?text, "Received Gemini response");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_question_and_guidelines() {
        let prompt = build_prompt("What are symptoms of diabetes?");
        assert!(prompt.contains("Current question: What are symptoms of diabetes?"));
        assert!(prompt.contains("9. If discussing medications, mention both brand and generic names"));
        assert!(prompt.contains("\"Note: Consult a healthcare professional for medical advice\""));
        assert_eq!(prompt.lines().filter(|l| l.starts_with(char::is_numeric)).count(), 9);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}],"role":"model"}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello there"));
    }

    #[test]
    fn test_response_without_text() {
        let blocked = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(blocked).unwrap();
        assert!(response.text().is_none());

        let no_content = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(no_content).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new("http://localhost:9000/", "gemini-2.0-flash", "k");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}

use serde_json::json;
use webmd_chat::llm_interaction::{GeminiClient, LanguageModel};
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

#[tokio::test]
async fn test_generate_returns_candidate_text() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "What is a migraine?" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "A migraine is a headache " }, { "text": "with throbbing pain." }],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GeminiClient::new(mock_server.uri(), "gemini-2.0-flash", "test-key");
    let text = client.generate("What is a migraine?").await.unwrap();

    assert_eq!(text, "A migraine is a headache with throbbing pain.");
}

#[tokio::test]
async fn test_error_status_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::new(mock_server.uri(), "gemini-2.0-flash", "test-key");
    let err = client.generate("Hi").await.unwrap_err();

    assert!(err.to_string().contains("429"));
    assert!(err.to_string().contains("quota exhausted"));
}

#[tokio::test]
async fn test_reply_without_text_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::new(mock_server.uri(), "gemini-2.0-flash", "test-key");
    assert!(client.generate("Hi").await.is_err());
}

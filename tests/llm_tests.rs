//! Assistant client tests against mocked HTTP endpoints
//!
//! These tests use wiremock to stand in for the Gemini and OpenAI-compatible
//! APIs and check the request shape, response decoding and error mapping.

use dossier::llm::structured::{ask_for, schema_for};
use dossier::llm::{Assistant, ModelTiers, Provider};
use dossier::research::{Knowledge, ResearchPlan};
use dossier::types::{AppError, ResourceMode};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

// ============= Helper Functions =============

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

fn openai_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn tiers() -> ModelTiers {
    ModelTiers {
        minimal: "tiny".to_string(),
        basic: "mid".to_string(),
        pro: "big".to_string(),
    }
}

fn gemini(server: &MockServer, mode: ResourceMode) -> std::sync::Arc<dyn Assistant> {
    Provider::Gemini {
        api_key: "gemini-key".to_string(),
        api_base: server.uri(),
        models: tiers(),
    }
    .create_client(mode, TIMEOUT)
    .unwrap()
}

fn openai(server: &MockServer) -> std::sync::Arc<dyn Assistant> {
    Provider::OpenAI {
        api_key: "openai-key".to_string(),
        api_base: server.uri(),
        models: tiers(),
    }
    .create_client(ResourceMode::Basic, TIMEOUT)
    .unwrap()
}

// ============= Gemini =============

#[tokio::test]
async fn test_gemini_ask_uses_tier_model_and_grounding() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/big:generateContent"))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "You are a researcher"}]},
            "contents": [{"role": "user", "parts": [{"text": "Tell me about Forth"}]}],
            "tools": [{"google_search": {}}, {"url_context": {}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Forth is a stack language.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = gemini(&server, ResourceMode::Pro);
    assert_eq!(client.model_name(), "big");

    let answer = client.ask("You are a researcher", "Tell me about Forth").await.unwrap();
    assert_eq!(answer, "Forth is a stack language.");
}

#[tokio::test]
async fn test_gemini_structured_ask_sends_schema() {
    let server = MockServer::start().await;

    let plan = json!({
        "goal": "Explain Forth",
        "items": [{"subtopic": "History", "questions": ["Who created Forth?"]}]
    });

    Mock::given(method("POST"))
        .and(path("/models/mid:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(&plan.to_string())))
        .mount(&server)
        .await;

    let client = gemini(&server, ResourceMode::Basic);
    let decoded: ResearchPlan = ask_for(client.as_ref(), "planner", "plan Forth").await.unwrap();

    assert_eq!(decoded.goal, "Explain Forth");
    assert_eq!(decoded.items[0].subtopic, "History");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("tools").is_none(), "structured requests carry no tools");
    assert_eq!(
        body["generationConfig"]["responseJsonSchema"],
        schema_for::<ResearchPlan>().unwrap()
    );
}

#[tokio::test]
async fn test_gemini_fenced_json_is_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "```json\n[{\"topic\": \"Origins\", \"information\": \"1970\"}]\n```",
        )))
        .mount(&server)
        .await;

    let client = gemini(&server, ResourceMode::Minimal);
    let knowledge: Vec<Knowledge> = ask_for(client.as_ref(), "organizer", "structure").await.unwrap();
    assert_eq!(knowledge, vec![Knowledge::new("Origins", "1970")]);
}

#[tokio::test]
async fn test_gemini_invalid_json_is_schema_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("not json at all")))
        .mount(&server)
        .await;

    let client = gemini(&server, ResourceMode::Basic);
    let result: dossier::Result<Vec<String>> = ask_for(client.as_ref(), "analyst", "analyze").await;
    assert!(matches!(result, Err(AppError::SchemaParse(_))));
}

#[tokio::test]
async fn test_gemini_http_error_is_assistant_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let client = gemini(&server, ResourceMode::Basic);
    let err = client.ask("persona", "request").await.unwrap_err();

    match err {
        AppError::Assistant(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("expected assistant error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client = gemini(&server, ResourceMode::Basic);
    assert!(client.ask("persona", "request").await.is_err());
}

// ============= OpenAI-compatible =============

#[tokio::test]
async fn test_openai_ask_sends_persona_as_system_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer openai-key"))
        .and(body_partial_json(json!({
            "model": "mid",
            "messages": [
                {"role": "system", "content": "You are an editor"},
                {"role": "user", "content": "Edit this"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("Edited.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = openai(&server);
    assert_eq!(client.ask("You are an editor", "Edit this").await.unwrap(), "Edited.");
}

#[tokio::test]
async fn test_openai_wraps_non_object_schema() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"name": "response"}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_reply(r#"{"value": ["What about ANS Forth?"]}"#)),
        )
        .mount(&server)
        .await;

    let client = openai(&server);
    let questions: Vec<String> = ask_for(client.as_ref(), "analyst", "analyze").await.unwrap();
    assert_eq!(questions, vec!["What about ANS Forth?".to_string()]);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let schema = &body["response_format"]["json_schema"]["schema"];
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["value"]["type"], "array");
}

#[tokio::test]
async fn test_openai_object_schema_is_not_wrapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
            r#"{"goal": "Explain Forth", "items": []}"#,
        )))
        .mount(&server)
        .await;

    let client = openai(&server);
    let plan: ResearchPlan = ask_for(client.as_ref(), "planner", "plan").await.unwrap();
    assert_eq!(plan.goal, "Explain Forth");
    assert!(plan.items.is_empty());
}

#[tokio::test]
async fn test_openai_missing_content_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = openai(&server);
    let err = client.ask("persona", "request").await.unwrap_err();
    assert!(matches!(err, AppError::Assistant(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_assistant_error() {
    let client = Provider::OpenAI {
        api_key: "key".to_string(),
        api_base: "http://127.0.0.1:1".to_string(),
        models: tiers(),
    }
    .create_client(ResourceMode::Basic, TIMEOUT)
    .unwrap();

    let err = client.ask("persona", "request").await.unwrap_err();
    assert!(matches!(err, AppError::Assistant(_)));
}

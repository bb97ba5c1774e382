mod common;

use analyze_service::services::providers::gemini::{GeminiConfig, GeminiTextProvider, API_KEY_HEADER};
use analyze_service::services::providers::{GenerationParams, ProviderError, TextProvider};
use common::{test_config, TestApp};
use secrecy::Secret;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn provider_for(server: &MockServer, api_key: Option<&str>) -> GeminiTextProvider {
    GeminiTextProvider::new(GeminiConfig {
        api_key: api_key.map(|key| Secret::new(key.to_string())),
        model: "models/gemini-1.5-flash".to_string(),
        api_base: format!("{}/v1beta", server.uri()),
        timeout: Duration::from_secs(5),
    })
    .expect("Failed to build provider")
}

fn completion(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 4,
            "candidatesTokenCount": 3,
            "totalTokenCount": 7
        }
    })
}

#[tokio::test]
async fn sends_prompt_with_api_key_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header(API_KEY_HEADER, "test-key"))
        .and(body_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Say API working" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("API working")))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider_for(&server, Some("test-key"))
        .generate("Say API working", &GenerationParams::default())
        .await
        .expect("generate should succeed");

    assert_eq!(response.text, "API working");
    assert_eq!(response.input_tokens, 4);
    assert_eq!(response.output_tokens, 3);
}

#[tokio::test]
async fn generation_params_are_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .mount(&server)
        .await;

    let params = GenerationParams {
        temperature: Some(0.5),
        max_output_tokens: Some(8192),
    };
    provider_for(&server, Some("test-key"))
        .generate("Say API working", &params)
        .await
        .expect("generate should succeed");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["generationConfig"],
        json!({ "temperature": 0.5, "maxOutputTokens": 8192 })
    );
}

#[tokio::test]
async fn rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server, Some("test-key"))
        .generate("Say API working", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::RateLimited(None)));
}

#[tokio::test]
async fn api_error_carries_upstream_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server, Some("bad-key"))
        .generate("Say API working", &GenerationParams::default())
        .await
        .unwrap_err();

    match err {
        ProviderError::ApiError(msg) => assert!(msg.contains("API key not valid")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn malformed_body_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = provider_for(&server, Some("test-key"))
        .generate("Say API working", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ApiError(_)));
}

#[tokio::test]
async fn missing_api_key_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let err = provider_for(&server, None)
        .generate("Say API working", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NotConfigured(_)));
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    let provider = GeminiTextProvider::new(GeminiConfig {
        api_key: Some(Secret::new("test-key".to_string())),
        model: "gemini-1.5-flash".to_string(),
        api_base: "http://127.0.0.1:1/v1beta".to_string(),
        timeout: Duration::from_secs(2),
    })
    .expect("Failed to build provider");

    let err = provider
        .generate("Say API working", &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NetworkError(_)));
}

#[tokio::test]
async fn analyze_endpoint_calls_gemini_once_per_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header(API_KEY_HEADER, "test-key"))
        .and(body_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Say API working" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("API working")))
        .expect(2)
        .mount(&server)
        .await;

    let api_base = format!("{}/v1beta", server.uri());
    let app = TestApp::spawn(test_config(&[
        ("GEMINI_API_KEY", "test-key"),
        ("GEMINI_API_BASE", api_base.as_str()),
    ]))
    .await;

    for _ in 0..2 {
        let response = app.get("/analyze").await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body, json!({ "result": "API working" }));
    }
}

#[tokio::test]
async fn analyze_endpoint_surfaces_upstream_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let api_base = format!("{}/v1beta", server.uri());
    let app = TestApp::spawn(test_config(&[
        ("GEMINI_API_KEY", "test-key"),
        ("GEMINI_API_BASE", api_base.as_str()),
    ]))
    .await;

    let response = app.get("/analyze").await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert!(body.get("result").is_none());
    assert!(body["error"].as_str().unwrap().contains("internal"));
}

#[tokio::test]
async fn analyze_endpoint_forwards_retry_delay() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted.",
                "status": "RESOURCE_EXHAUSTED",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.RetryInfo",
                    "retryDelay": "20s"
                }]
            }
        })))
        .mount(&server)
        .await;

    let api_base = format!("{}/v1beta", server.uri());
    let app = TestApp::spawn(test_config(&[
        ("GEMINI_API_KEY", "test-key"),
        ("GEMINI_API_BASE", api_base.as_str()),
    ]))
    .await;

    let response = app.get("/analyze").await;
    assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("retry-after").unwrap(), "20");
}

#[tokio::test]
async fn oversized_upstream_error_page_is_not_echoed() {
    let server = MockServer::start().await;

    let page = format!("<html>INTERNAL-PROXY-MARKER {}</html>", "x".repeat(200_000));
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string(page))
        .mount(&server)
        .await;

    let api_base = format!("{}/v1beta", server.uri());
    let app = TestApp::spawn(test_config(&[
        ("GEMINI_API_KEY", "test-key"),
        ("GEMINI_API_BASE", api_base.as_str()),
    ]))
    .await;

    let response = app.get("/analyze").await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    let error = body["error"].as_str().unwrap();
    assert!(error.len() < 512);
    assert!(!error.contains("</html>"));
    assert!(body.get("result").is_none());
}

use std::time::Duration;

use health_tools::{InternetSearchTool, SearchParams, Tool, ToolError, Topic};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "tvly-test";

fn hits(n: usize) -> serde_json::Value {
    let results: Vec<_> = (1..=n)
        .map(|i| {
            json!({
                "title": format!("Result {i}"),
                "url": format!("https://example.org/{i}"),
                "content": format!("snippet {i}"),
                "score": 1.0 - i as f64 / 100.0
            })
        })
        .collect();
    json!({ "query": "q", "results": results })
}

async fn tool_for(server: &MockServer) -> InternetSearchTool {
    InternetSearchTool::new(API_KEY, &server.uri(), Duration::from_secs(5)).unwrap()
}

// ============================================================================
// Request shape
// ============================================================================

#[tokio::test]
async fn sends_full_request_with_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_json(json!({
            "api_key": API_KEY,
            "query": "magnesium and sleep",
            "max_results": 5,
            "topic": "general",
            "include_raw_content": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(2)))
        .expect(1)
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    let output = tool.execute(json!({"query": "magnesium and sleep"})).await.unwrap();

    assert_eq!(output.sources.len(), 2);
    assert_eq!(output.sources[0].url, "https://example.org/1");
    assert!(output.content.contains("snippet 2"));
}

#[tokio::test]
async fn identical_calls_send_identical_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"query": "hrv", "topic": "news", "max_results": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(3)))
        .expect(2)
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    let args = json!({"query": "hrv", "topic": "news", "max_results": 3});
    let first = tool.execute(args.clone()).await.unwrap();
    let second = tool.execute(args).await.unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Results
// ============================================================================

#[tokio::test]
async fn truncates_to_max_results_in_upstream_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(6)))
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    let mut params = SearchParams::new("knee pain running");
    params.max_results = 2;
    params.topic = Topic::General;

    let results = tool.search(&params).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Result 1");
    assert_eq!(results[1].title, "Result 2");
}

#[tokio::test]
async fn raw_content_passes_through_when_requested() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"include_raw_content": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "title": "Sleep hygiene",
                "url": "https://example.org/sleep",
                "content": "short",
                "raw_content": "the full article",
                "score": 0.9
            }]
        })))
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    let output = tool
        .execute(json!({"query": "sleep hygiene", "include_raw_content": true}))
        .await
        .unwrap();
    assert!(output.content.contains("the full article"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn error_status_surfaces_as_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    let err = tool.execute(json!({"query": "q"})).await.unwrap_err();
    assert!(matches!(err, ToolError::Upstream { status: 401, ref body } if body.contains("invalid")));
}

#[tokio::test]
async fn undecodable_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    let err = tool.execute(json!({"query": "q"})).await.unwrap_err();
    assert!(matches!(err, ToolError::ExecutionFailed(_)));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(hits(1))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let tool = InternetSearchTool::new(API_KEY, &server.uri(), Duration::from_millis(200)).unwrap();
    let err = tool.execute(json!({"query": "q"})).await.unwrap_err();
    assert!(matches!(err, ToolError::Timeout(_)));
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits(1)))
        .expect(0)
        .mount(&server)
        .await;

    let tool = tool_for(&server).await;
    for args in [json!({}), json!({"query": ""}), json!({"query": "q", "max_results": 0})] {
        let err = tool.execute(args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}

//! Stream decoder against a mock provider over HTTP

mod common;

use common::mock_server::{MockServerFixture, TEST_API_KEY};
use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use uiautodev::client::{HttpModelBackend, ModelBackend, SamplingParams};
use uiautodev::transport::HttpTransport;
use uiautodev::types::{ChatTurn, ErrorKind, StreamEvent, ToolChoice, ToolDefinition};

fn params(include_usage: bool) -> SamplingParams {
    SamplingParams {
        model: "deepseek-chat".to_string(),
        temperature: 0.7,
        max_tokens: 2048,
        include_usage,
    }
}

fn backend(url: &str, include_usage: bool) -> HttpModelBackend {
    let transport =
        HttpTransport::streaming(Duration::from_secs(5), Some(TEST_API_KEY.to_string())).unwrap();
    HttpModelBackend::new(transport, url, params(include_usage), Duration::from_secs(5))
}

fn messages() -> Vec<ChatTurn> {
    vec![ChatTurn::system("sys"), ChatTurn::user("hi")]
}

async fn collect(backend: &HttpModelBackend, tools: &[ToolDefinition], choice: Option<ToolChoice>) -> Vec<StreamEvent> {
    backend.stream_chat(&messages(), tools, choice).await.collect().await
}

fn assert_terminated_once(events: &[StreamEvent]) {
    assert_eq!(events.iter().filter(|e| e.is_end()).count(), 1, "{:?}", events);
    assert!(events.last().map(|e| e.is_end()).unwrap_or(false), "{:?}", events);
}

#[tokio::test]
async fn test_content_deltas_then_done() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_sse_stream(&[
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ])
        .await;

    let events = collect(&backend(&fixture.chat_url(), false), &[], None).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta("Hel".to_string()),
            StreamEvent::ContentDelta("lo".to_string()),
            StreamEvent::EndOfStream,
        ]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fragmented_tool_call_is_assembled() {
    let fixture = MockServerFixture::new().await;
    fixture
        .mock_sse_stream(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"search_uiautomator2_code_snippets","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\":"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"click button\"}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ])
        .await;

    let tools = vec![ToolDefinition::function(
        "search_uiautomator2_code_snippets",
        "search",
        json!({"type": "object"}),
    )];
    let events = collect(&backend(&fixture.chat_url(), false), &tools, Some(ToolChoice::Auto)).await;

    assert_terminated_once(&events);
    match &events[0] {
        StreamEvent::ToolRequest(calls) => {
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].id, "call_1");
            assert_eq!(calls[0].function.name, "search_uiautomator2_code_snippets");
            assert_eq!(calls[0].function.arguments, r#"{"query":"click button"}"#);
        }
        other => panic!("expected tool request, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_carries_tools_and_choice() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_sse_stream_matching(
            Matcher::PartialJson(json!({
                "model": "deepseek-chat",
                "stream": true,
                "tool_choice": "none",
            })),
            &[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "[DONE]"],
        )
        .await;

    let tools = vec![ToolDefinition::function("t", "tool", json!({"type": "object"}))];
    let events = collect(&backend(&fixture.chat_url(), false), &tools, Some(ToolChoice::None)).await;

    assert_eq!(events[0], StreamEvent::ContentDelta("ok".to_string()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_reports_nested_message() {
    let fixture = MockServerFixture::new().await;
    fixture
        .mock_error_response(401, r#"{"error":{"message":"Invalid API key","type":"authentication_error"}}"#)
        .await;

    let events = collect(&backend(&fixture.chat_url(), false), &[], None).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::upstream_error(401, "Invalid API key"),
            StreamEvent::EndOfStream,
        ]
    );
}

#[tokio::test]
async fn test_server_error_with_plain_body() {
    let fixture = MockServerFixture::new().await;
    fixture.mock_error_response(500, "internal failure").await;

    let events = collect(&backend(&fixture.chat_url(), false), &[], None).await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::Error {
            kind,
            message,
            status,
        } => {
            assert_eq!(*kind, ErrorKind::UpstreamHttp);
            assert_eq!(*status, Some(500));
            assert_eq!(message, "LLM API Error (500): internal failure");
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(events[1].is_end());
}

#[tokio::test]
async fn test_missing_done_still_terminates() {
    let fixture = MockServerFixture::new().await;
    fixture
        .mock_sse_stream(&[r#"{"choices":[{"delta":{"content":"partial"}}]}"#])
        .await;

    let events = collect(&backend(&fixture.chat_url(), false), &[], None).await;

    assert_eq!(events[0], StreamEvent::ContentDelta("partial".to_string()));
    assert_terminated_once(&events);
}

#[tokio::test]
async fn test_malformed_chunk_is_skipped() {
    let fixture = MockServerFixture::new().await;
    fixture
        .mock_sse_stream(&[
            r#"{"choices":[{"delta":{"content":"a"}}]}"#,
            r#"{"choices":[{"delta":"#,
            ": keep-alive comment",
            r#"{"choices":[{"delta":{"content":"b"}}]}"#,
            "[DONE]",
        ])
        .await;

    let events = collect(&backend(&fixture.chat_url(), false), &[], None).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta("a".to_string()),
            StreamEvent::ContentDelta("b".to_string()),
            StreamEvent::EndOfStream,
        ]
    );
}

#[tokio::test]
async fn test_usage_chunk_when_requested() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_sse_stream_matching(
            Matcher::PartialJson(json!({"stream_options": {"include_usage": true}})),
            &[
                r#"{"choices":[{"delta":{"content":"x"},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#,
                "[DONE]",
            ],
        )
        .await;

    let events = collect(&backend(&fixture.chat_url(), true), &[], None).await;

    mock.assert_async().await;
    assert_terminated_once(&events);
    let usage = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::Usage(u) => Some(u.clone()),
            _ => None,
        })
        .expect("usage event");
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.completion_tokens, 3);
    assert_eq!(usage.total_tokens, 15);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let events = collect(&backend("http://127.0.0.1:1/chat/completions", false), &[], None).await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::Error { kind, message, status } => {
            assert_eq!(*kind, ErrorKind::Network);
            assert_eq!(*status, None);
            assert!(message.starts_with("Network issue contacting LLM provider"), "{}", message);
        }
        other => panic!("expected network error, got {:?}", other),
    }
    assert!(events[1].is_end());
}

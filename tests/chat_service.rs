//! End-to-end chat exchanges through `ChatService` against mock upstreams

mod common;

use common::mock_server::{MockServerFixture, CHAT_PATH, SEARCH_PATH};
use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;
use uiautodev::{ChatRequest, ChatService, ErrorKind, ProviderKind, ServiceConfig, StreamEvent};

async fn collect(service: &ChatService, request: ChatRequest) -> Vec<StreamEvent> {
    service.generate(request).collect().await
}

fn content(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_direct_answer_streams_content_then_end() {
    let fixture = MockServerFixture::new().await;
    let chat = fixture
        .mock_sse_stream_matching(
            Matcher::Regex("click ok".to_string()),
            &[
                r#"{"choices":[{"delta":{"content":"Sure"},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ],
        )
        .await;
    let search = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await
    };

    let service = fixture.service(ProviderKind::DeepSeek);
    let events = collect(&service, ChatRequest::new("click ok")).await;

    assert_eq!(
        events,
        vec![StreamEvent::ContentDelta("Sure".to_string()), StreamEvent::EndOfStream]
    );
    chat.assert_async().await;
    search.assert_async().await;
}

#[tokio::test]
async fn test_missing_api_key_fails_without_network() {
    let fixture = MockServerFixture::new().await;
    let chat = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", CHAT_PATH)
            .match_body(Matcher::Any)
            .expect(0)
            .create_async()
            .await
    };

    let config = ServiceConfig::new(ProviderKind::DeepSeek)
        .with_api_url(fixture.chat_url())
        .with_rag_search_url(Some(fixture.search_url()));
    let service = ChatService::builder().config(config).build().unwrap();
    let events = collect(&service, ChatRequest::new("hello")).await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::Error { kind, message, .. } => {
            assert_eq!(*kind, ErrorKind::Configuration);
            assert!(message.contains("DEEPSEEK_API_KEY"), "{}", message);
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
    assert!(events[1].is_end());
    chat.assert_async().await;
}

#[tokio::test]
async fn test_tool_round_trip_over_the_wire() {
    let fixture = MockServerFixture::new().await;
    let first = fixture
        .mock_sse_stream_matching(
            Matcher::PartialJson(json!({"tool_choice": "auto"})),
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"search_uiautomator2_code_snippets","arguments":"{\"query\":"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"click button\"}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        )
        .await;
    let second = fixture
        .mock_sse_stream_matching(
            Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"tool_choice": "none"})),
                Matcher::Regex("call_1".to_string()),
                Matcher::Regex("from widgets.py".to_string()),
            ]),
            &[
                r#"{"choices":[{"delta":{"content":"d(text='OK')"}}]}"#,
                r#"{"choices":[{"delta":{"content":".click()"},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ],
        )
        .await;
    let search = fixture
        .mock_search(
            Matcher::UrlEncoded("query".into(), "click button".into()),
            &json!({"results": [{"filename": "widgets.py", "score": 0.88, "text": "d(text='OK').click()"}]}),
        )
        .await;

    let service = fixture.service(ProviderKind::DeepSeek);
    let events = collect(&service, ChatRequest::new("how do I click OK?")).await;

    first.assert_async().await;
    search.assert_async().await;
    second.assert_async().await;

    assert!(matches!(events[0], StreamEvent::ToolRequest(_)));
    assert_eq!(content(&events), "d(text='OK').click()");
    assert_eq!(events.iter().filter(|e| e.is_end()).count(), 1);
    assert!(events.last().unwrap().is_end());
    assert!(!events.iter().any(|e| e.is_error()));
}

#[tokio::test]
async fn test_openai_prefetches_snippets_into_prompt() {
    let fixture = MockServerFixture::new().await;
    let search = fixture
        .mock_search(
            Matcher::UrlEncoded("query".into(), "swipe up".into()),
            &json!({"results": [{"filename": "swipe.py", "score": 0.75, "text": "d.swipe_ext('up')"}]}),
        )
        .await;
    let chat = fixture
        .mock_sse_stream_matching(
            Matcher::AllOf(vec![
                Matcher::Regex("Retrieved uiautomator2 Code Snippets".to_string()),
                Matcher::Regex("swipe_ext".to_string()),
            ]),
            &[r#"{"choices":[{"delta":{"content":"Use swipe_ext"}}]}"#, "[DONE]"],
        )
        .await;

    let service = fixture.service(ProviderKind::OpenAi);
    let events = collect(&service, ChatRequest::new("swipe up")).await;

    search.assert_async().await;
    chat.assert_async().await;
    assert_eq!(content(&events), "Use swipe_ext");
    assert!(events.last().unwrap().is_end());
}

#[tokio::test]
async fn test_request_model_overrides_default() {
    let fixture = MockServerFixture::new().await;
    let chat = fixture
        .mock_sse_stream_matching(
            Matcher::PartialJson(json!({"model": "deepseek-reasoner", "max_tokens": 512})),
            &[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "[DONE]"],
        )
        .await;

    let service = fixture.service(ProviderKind::DeepSeek);
    let mut request = ChatRequest::new("hi").model("deepseek-reasoner");
    request.max_tokens = Some(512);
    let events = collect(&service, request).await;

    chat.assert_async().await;
    assert_eq!(content(&events), "ok");
}

#[tokio::test]
async fn test_upstream_rejection_is_reported_in_band() {
    let fixture = MockServerFixture::new().await;
    fixture
        .mock_error_response(401, r#"{"error":{"message":"Authentication Fails"}}"#)
        .await;

    let service = fixture.service(ProviderKind::DeepSeek);
    let events = collect(&service, ChatRequest::new("hi")).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::upstream_error(401, "Authentication Fails"),
            StreamEvent::EndOfStream,
        ]
    );
}

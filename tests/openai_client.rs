use serde_json::json;
use std::{sync::Arc, time::Duration};

use notelink::{
    ExtractedContent, Platform,
    ai::{
        AiClient, AiError, AiExtractor, AiOptions, OpenAiCompatClient,
        openai::OpenAiConfig,
    },
    extractor::{ContentDraft, ContentType},
    retry::RetryPolicy,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, body_string_contains, header, method, path},
};

fn client(server: &MockServer) -> OpenAiCompatClient {
    let config = OpenAiConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..OpenAiConfig::new("sk-test")
    };
    OpenAiCompatClient::new(config).unwrap()
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn test_summarize_posts_chat_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .and(body_string_contains("生成一个简洁的摘要"))
        .respond_with(completion("  一段摘要  "))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client(&server).summarize("很长的正文").await.unwrap();
    assert_eq!(summary, "一段摘要");
}

#[tokio::test]
async fn test_categorize_accepts_fenced_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(
            "好的，结果如下：\n```json\n{\"contentType\":\"recipe\",\"categories\":[\"美食\"],\"tags\":[\"甜品\",\"烘焙\"]}\n```",
        ))
        .mount(&server)
        .await;

    let categorization = client(&server).categorize("怎么做提拉米苏").await.unwrap();
    assert_eq!(categorization.content_type, "recipe");
    assert_eq!(categorization.tags, vec!["甜品", "烘焙"]);
}

#[tokio::test]
async fn test_extract_structured_requires_images() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("{\"title\": \"标题\", \"content\": \"正文\"}"))
        .mount(&server)
        .await;

    let err = client(&server)
        .extract_structured("<html></html>", "https://example.com/")
        .await
        .unwrap_err();
    assert!(matches!(err, AiError::Schema(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.summarize("x").await.unwrap_err(), AiError::RateLimited);
    assert!(matches!(client.summarize("x").await.unwrap_err(), AiError::Unavailable(_)));
}

#[tokio::test]
async fn test_empty_completion_is_declined() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client(&server).summarize("x").await.unwrap_err();
    assert!(matches!(err, AiError::Declined(_)));
}

#[tokio::test]
async fn test_enhance_runs_all_three_prompts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("生成一个简洁的摘要"))
        .respond_with(completion("秋天在家做拿铁的步骤"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("优化标题"))
        .respond_with(completion("“在家做拿铁”"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("提供分类和标签"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let ai = AiExtractor::new(Arc::new(client(&server))).with_retry(RetryPolicy::none());
    let content = ExtractedContent::new(
        Platform::Xiaohongshu,
        "https://www.xiaohongshu.com/explore/1",
        ContentDraft {
            title: Some("秋天的第一杯咖啡".into()),
            body: Some("先用手冲壶把水加热，再用摩卡壶萃取浓缩".into()),
            ..Default::default()
        },
    );

    let enhanced = ai.enhance(content, &AiOptions::all()).await;

    assert!(enhanced.enhanced);
    assert_eq!(enhanced.summary.as_deref(), Some("秋天在家做拿铁的步骤"));
    assert_eq!(enhanced.optimized_title.as_deref(), Some("在家做拿铁"));
    assert_eq!(enhanced.content_type, None::<ContentType>);
    assert_eq!(enhanced.base().title(), "秋天的第一杯咖啡");
}

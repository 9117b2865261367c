//! Gemini embedding provider tests against a mocked Generative Language API.

use std::sync::Arc;
use std::time::Duration;

use construct_rag::error::{EmbeddingErrorKind, RagError};
use construct_rag::{
    ChunkingScope, EmbeddingProvider, GeminiEmbeddingProvider, IndexBuilder, RagConfig, Retriever,
    SourceDocument, TaskType,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const EMBED_PATH: &str = "/models/embedding-001:embedContent";
const BATCH_PATH: &str = "/models/embedding-001:batchEmbedContents";

fn provider(server: &MockServer) -> GeminiEmbeddingProvider {
    GeminiEmbeddingProvider::new("test-key").unwrap().with_base_url(server.uri())
}

/// Answer a batch request with one embedding per request entry, `[i, 1.0, 0.0]`.
fn batch_responder(request: &Request) -> ResponseTemplate {
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    let count = body["requests"].as_array().map_or(0, Vec::len);
    let embeddings: Vec<_> =
        (0..count).map(|i| json!({ "values": [i as f32, 1.0, 0.0] })).collect();
    ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
}

fn kind_of(err: RagError) -> EmbeddingErrorKind {
    match err {
        RagError::Embedding { kind, .. } => kind,
        other => panic!("expected an embedding error, got {other:?}"),
    }
}

#[tokio::test]
async fn embed_sends_key_and_task_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "models/embedding-001",
            "content": { "parts": [{ "text": "How long does concrete take to cure?" }] },
            "taskType": "RETRIEVAL_QUERY"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server).with_task_type(TaskType::RetrievalQuery);
    let vector = provider.embed("How long does concrete take to cure?").await.unwrap();
    assert_eq!(vector, [0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(batch_responder)
        .expect(1)
        .mount(&server)
        .await;

    let vectors = provider(&server).embed_batch(&["slab", "beam", "column"]).await.unwrap();
    let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
    assert_eq!(firsts, [0.0, 1.0, 2.0]);
}

#[tokio::test]
async fn large_batches_are_split_into_api_sized_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(batch_responder)
        .expect(2)
        .mount(&server)
        .await;

    let texts: Vec<String> = (0..150).map(|i| format!("clause {i}")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = provider(&server).embed_batch(&refs).await.unwrap();
    assert_eq!(vectors.len(), 150);
    assert_eq!(vectors[99][0], 99.0);
    assert_eq!(vectors[100][0], 0.0);
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(batch_responder).expect(0).mount(&server).await;

    assert!(provider(&server).embed_batch(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    let err = provider(&server).embed("rebar").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("Resource has been exhausted"));
    assert_eq!(kind_of(err), EmbeddingErrorKind::RateLimited);
}

#[tokio::test]
async fn rejected_key_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = provider(&server).embed("rebar").await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(kind_of(err), EmbeddingErrorKind::Authentication);
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server).embed("rebar").await.unwrap_err();
    assert_eq!(kind_of(err), EmbeddingErrorKind::Unavailable);
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy login</html>"))
        .mount(&server)
        .await;

    let err = provider(&server).embed("rebar").await.unwrap_err();
    assert_eq!(kind_of(err), EmbeddingErrorKind::MalformedResponse);
}

#[tokio::test]
async fn empty_vector_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [] } })))
        .mount(&server)
        .await;

    let err = provider(&server).embed("rebar").await.unwrap_err();
    assert_eq!(kind_of(err), EmbeddingErrorKind::MalformedResponse);
}

#[tokio::test]
async fn missing_batch_entries_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [{ "values": [1.0] }] })),
        )
        .mount(&server)
        .await;

    let err = provider(&server).embed_batch(&["slab", "beam"]).await.unwrap_err();
    assert_eq!(kind_of(err), EmbeddingErrorKind::MalformedResponse);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": { "values": [1.0] } }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let provider = provider(&server).with_timeout(Duration::from_millis(200)).unwrap();
    let err = provider.embed("rebar").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(kind_of(err), EmbeddingErrorKind::Timeout);
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    // Take a free port and release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let provider = GeminiEmbeddingProvider::new("test-key")
        .unwrap()
        .with_base_url(format!("http://127.0.0.1:{port}"));
    let err = provider.embed("rebar").await.unwrap_err();
    assert_eq!(kind_of(err), EmbeddingErrorKind::Network);
}

#[tokio::test]
async fn config_selects_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [1.0] } })))
        .expect(1)
        .mount(&server)
        .await;

    let config = RagConfig::builder().embedding_model("text-embedding-004").build().unwrap();
    let provider = GeminiEmbeddingProvider::from_config("test-key", &config)
        .unwrap()
        .with_base_url(server.uri());
    assert_eq!(provider.model_id(), "models/text-embedding-004");
    provider.embed("rebar").await.unwrap();
}

#[tokio::test]
async fn builds_and_queries_through_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(body_partial_json(json!({ "requests": [{ "taskType": "RETRIEVAL_DOCUMENT" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [
                { "values": [1.0, 0.0, 0.0] },
                { "values": [0.0, 1.0, 0.0] },
                { "values": [0.0, 0.0, 1.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_partial_json(json!({ "taskType": "RETRIEVAL_QUERY" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [0.1, 0.9, 0.0] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("faiss_index");
    let config = RagConfig::builder().chunking_scope(ChunkingScope::Page).build().unwrap();
    let document = SourceDocument::from_pages(
        "handbook",
        [
            "Concrete cures over 28 days.",
            "Steel rebar reinforces tensile strength.",
            "Foundations distribute structural load.",
        ],
    );

    let documents = Arc::new(provider(&server));
    let report =
        IndexBuilder::new(config.clone(), documents).unwrap().build(&document, &index_path).await.unwrap();
    assert_eq!(report.dimensions, 3);
    assert_eq!(report.model_id, "models/embedding-001");

    let queries = Arc::new(provider(&server).with_task_type(TaskType::RetrievalQuery));
    let passages = Retriever::new(config, queries)
        .unwrap()
        .query_rag("What grade of rebar?", &index_path, 1)
        .await
        .unwrap();
    assert_eq!(passages, ["Steel rebar reinforces tensile strength."]);
}

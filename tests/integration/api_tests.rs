use axum::http::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;

use crate::helpers::mock_models::RecordingModel;
use crate::helpers::test_harness::{TestHarness, EMBEDDING_DIMENSION};
use crate::helpers::test_utils::{get, post_json, request};
use ragtim::llm::LanguageModel;

#[tokio::test]
async fn test_health_reports_services() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    let (status, body) = get(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["retrieval"], true);
    assert_eq!(body["services"]["embedding"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_search_bm25_finds_phd_candidate() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    let (status, body) = post_json(
        &router,
        "/api/search",
        json!({ "query": "PhD candidate", "searchType": "bm25" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["document"]["metadata"]["type"], "about");
    assert!(results[0]["score"].as_f64().unwrap() > 0.0);
    assert_eq!(results[0]["searchType"], "bm25");
    assert_eq!(body["topK"], 5);
    assert_eq!(body["searchType"], "bm25");
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn test_search_rejects_bad_input_before_engine() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    let (status, body) = post_json(&router, "/api/search", json!({ "query": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = post_json(&router, "/api/search", json!({ "query": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&router, "/api/search", json!({ "query": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&router, "/api/search", json!({ "query": "phd", "topK": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&router, "/api/search", json!({ "query": "phd", "searchType": "fuzzy" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&router, Method::POST, "/api/search", Some("{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(harness.engine.search_cache_stats().keys, 0);
    assert_eq!(harness.engine.search_cache_stats().misses, 0);
}

#[tokio::test]
async fn test_repeated_search_is_served_from_cache() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);
    let body = json!({ "query": "breast cancer deep learning", "topK": 4, "searchType": "hybrid" });

    let (_, first) = post_json(&router, "/api/search", body.clone()).await;
    let (_, second) = post_json(&router, "/api/search", body).await;

    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(second["processingTimeMs"], 0);
    assert_eq!(
        serde_json::to_string(&first["results"]).unwrap(),
        serde_json::to_string(&second["results"]).unwrap()
    );
}

#[tokio::test]
async fn test_embeddings_endpoint() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    let (status, body) = post_json(&router, "/api/embeddings", json!({ "text": "survival analysis" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["embedding"].as_array().unwrap().len(), EMBEDDING_DIMENSION);
    assert_eq!(body["cached"], false);

    let (_, again) = post_json(&router, "/api/embeddings", json!({ "text": "survival analysis" })).await;
    assert_eq!(again["cached"], true);

    let (_, uncached) = post_json(
        &router,
        "/api/embeddings",
        json!({ "text": "survival analysis", "useCache": false }),
    )
    .await;
    assert_eq!(uncached["cached"], false);

    for bad in [json!({ "text": "" }), json!({ "text": 7 }), json!({}), json!({ "text": "x".repeat(10_001) })] {
        let (status, body) = post_json(&router, "/api/embeddings", bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");
    }
}

#[tokio::test]
async fn test_batch_embeddings_report_per_item_errors() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    let (status, body) = post_json(
        &router,
        "/api/embeddings/batch",
        json!({ "texts": ["deep learning", "", 3, "gene expression"] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalTexts"], 4);
    let results = body["results"].as_array().unwrap();
    assert!(results[0]["embedding"].is_array());
    assert!(results[1]["error"].is_string());
    assert!(results[2]["error"].is_string());
    assert!(results[3]["embedding"].is_array());
    assert!(body["totalProcessingTimeMs"].is_u64());

    let (status, _) = post_json(&router, "/api/embeddings/batch", json!({ "texts": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<String> = (0..51).map(|i| format!("text {}", i)).collect();
    let (status, _) = post_json(&router, "/api/embeddings/batch", json!({ "texts": too_many })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_knowledge_stats() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    let (status, body) = get(&router, "/api/knowledge-stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalDocuments"], 6);
    assert_eq!(body["documentsByType"]["about"], 2);
    assert_eq!(body["documentsByType"]["skills"], 2);
    assert_eq!(body["hasEmbeddings"], true);
    assert_eq!(body["isVectorSearchEnabled"], true);
    assert!(body["uniqueTerms"].as_u64().unwrap() > 20);
    assert_eq!(body["bm25Parameters"]["k1"], 1.5);
    assert_eq!(body["bm25Parameters"]["b"], 0.75);
    assert_eq!(
        body["searchCapabilities"],
        json!(["Vector Search", "BM25 Search", "Hybrid Search"])
    );
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    post_json(&router, "/api/search", json!({ "query": "python", "searchType": "bm25" })).await;
    post_json(&router, "/api/search", json!({ "query": "python", "searchType": "bm25" })).await;

    let (status, stats) = get(&router, "/api/cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["searchCache"]["keys"], 1);
    assert_eq!(stats["searchCache"]["hits"], 1);
    assert_eq!(stats["searchCache"]["hitRate"], 0.5);
    assert!(stats["embeddingCache"]["keys"].as_u64().unwrap() >= 6);
    assert!(stats["total"]["keys"].as_u64().unwrap() >= 7);

    let (status, cleared) = request(&router, Method::DELETE, "/api/cache/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["message"].is_string());

    let (_, stats) = get(&router, "/api/cache/stats").await;
    assert_eq!(stats["searchCache"]["keys"], 0);
    assert_eq!(stats["embeddingCache"]["keys"], 0);
}

#[tokio::test]
async fn test_chat_answers_through_local_backend() {
    let harness = TestHarness::new().await.unwrap();
    let model = Arc::new(RecordingModel::replying("## Thesis\nRaktim studies **breast cancer** prognosis."));
    let router = harness.router(Some(model.clone() as Arc<dyn LanguageModel>));

    let (status, body) = post_json(
        &router,
        "/api/chat",
        json!({
            "message": "What is the PhD thesis about?",
            "history": [
                { "role": "user", "content": "hello" },
                { "role": "assistant", "content": "**Hi!** Ask me anything." }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "answered");
    assert_eq!(body["answer"], "Thesis\nRaktim studies breast cancer prognosis.");
    assert_eq!(body["backend"], "local");
    assert!(!body["sources"].as_array().unwrap().is_empty());
    assert!(body["requestId"].is_string());
    assert_eq!(model.calls(), 1);

    let messages = model.last_messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].content, "Hi! Ask me anything.");
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let harness = TestHarness::new().await.unwrap();
    let model = Arc::new(RecordingModel::replying("unused"));
    let router = harness.router(Some(model.clone() as Arc<dyn LanguageModel>));

    let (status, body) = post_json(&router, "/api/chat", json!({ "message": "  " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    ragtim::metrics::register_metrics();
    let harness = TestHarness::new().await.unwrap();
    let router = harness.router(None);

    post_json(&router, "/api/search", json!({ "query": "rust", "searchType": "bm25" })).await;
    let (status, body) = get(&router, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("ragtim_search_requests_total"));
}

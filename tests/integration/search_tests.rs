use std::sync::Arc;

use crate::helpers::mock_models::TableEmbedder;
use crate::helpers::test_harness::TestHarness;
use crate::helpers::test_utils::doc;
use ragtim::config::SearchMode;
use ragtim::embeddings::HashingEmbedder;
use ragtim::knowledge::DocumentType;
use ragtim::rag::{estimate_tokens, ContextAssembler};

fn profile_corpus() -> Vec<ragtim::knowledge::Document> {
    vec![
        doc(
            "bio",
            "Raktim Mondol is a PhD candidate researching explainable AI for breast cancer",
            DocumentType::About,
            10,
        ),
        doc("skills", "Python PyTorch statistical modelling", DocumentType::Skills, 6),
        doc("teaching", "Tutor for undergraduate statistics courses", DocumentType::Experience, 5),
        doc("awards", "Scholarship recipient for graduate research", DocumentType::Awards, 4),
        doc("pubs", "Journal papers on survival prediction from histopathology", DocumentType::Publications, 8),
    ]
}

#[tokio::test]
async fn test_bm25_returns_phd_candidate_document() {
    let harness = TestHarness::with_documents(profile_corpus(), Arc::new(HashingEmbedder::new(64)))
        .await
        .unwrap();

    let response = harness.engine.search("PhD candidate", 5, SearchMode::Bm25).await.unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].document.id, "bio");
    assert!(response.results[0].score > 0.0);
    assert_eq!(response.results[0].search_type, SearchMode::Bm25);
}

#[tokio::test]
async fn test_unmatched_query_degrades_to_vector_only() {
    let harness = TestHarness::with_documents(profile_corpus(), Arc::new(HashingEmbedder::new(64)))
        .await
        .unwrap();

    let bm25 = harness.engine.search("zebra xylophone", 5, SearchMode::Bm25).await.unwrap();
    assert!(bm25.results.is_empty());

    let hybrid = harness.engine.search("zebra xylophone", 5, SearchMode::Hybrid).await.unwrap();
    assert!(!hybrid.results.is_empty());
    assert!(hybrid
        .results
        .iter()
        .all(|r| r.search_type == SearchMode::Vector && r.bm25_score.is_none()));
}

#[tokio::test]
async fn test_vector_near_tie_prefers_priority() {
    let low = "Machine learning engineer internship";
    let high = "Machine learning research assistant";
    let other = "Completely unrelated gardening notes";
    let embedder = TableEmbedder::new(
        &[
            ("machine learning", vec![1.0, 0.0]),
            (low, vec![1.0, 0.0]),
            (high, vec![0.97, 0.243]),
            (other, vec![0.0, 1.0]),
        ],
        vec![0.5, 0.5],
    );

    let harness = TestHarness::with_documents(
        vec![
            doc("low", low, DocumentType::Experience, 2),
            doc("high", high, DocumentType::Research, 9),
            doc("other", other, DocumentType::Other("misc".to_string()), 10),
        ],
        Arc::new(embedder),
    )
    .await
    .unwrap();

    let response = harness.engine.search("machine learning", 3, SearchMode::Vector).await.unwrap();
    let ids: Vec<&str> = response.results.iter().map(|r| r.document.id.as_str()).collect();

    assert_eq!(ids, vec!["high", "low", "other"]);
    assert!(response.results[0].score < response.results[1].score);
    assert!(response.results[1].score - response.results[0].score < 0.05);
}

#[tokio::test]
async fn test_hybrid_overlap_is_mean_of_signals() {
    let harness = TestHarness::new().await.unwrap();

    let response = harness
        .engine
        .search("deep learning breast cancer", 6, SearchMode::Hybrid)
        .await
        .unwrap();

    let hybrid: Vec<_> = response
        .results
        .iter()
        .filter(|r| r.search_type == SearchMode::Hybrid)
        .collect();
    assert!(!hybrid.is_empty());
    for result in hybrid {
        let (v, b) = (result.vector_score.unwrap(), result.bm25_score.unwrap());
        assert!((result.score - (v + b) / 2.0).abs() < 1e-5);
    }

    let scores: Vec<f32> = response.results.iter().map(|r| r.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_loaded_corpus_is_typed_and_sectioned() {
    let harness = TestHarness::new().await.unwrap();
    let snapshot = harness.engine.snapshot();

    assert_eq!(snapshot.documents().len(), 6);
    let about = snapshot.documents().iter().find(|d| d.id == "about.md#0").unwrap();
    assert_eq!(about.metadata.doc_type, DocumentType::About);
    assert_eq!(about.metadata.section.as_deref(), Some("About"));
    assert_eq!(about.priority(), 5);
}

#[tokio::test]
async fn test_rebuild_leaves_in_flight_snapshot_intact() {
    let harness = TestHarness::new().await.unwrap();
    let before = harness.engine.snapshot();

    harness.engine.rebuild(profile_corpus()).await;

    assert_eq!(before.documents().len(), 6);
    assert_eq!(harness.engine.snapshot().documents().len(), 5);
    assert!(harness.engine.snapshot().version() > before.version());

    let response = harness.engine.search("PhD candidate", 5, SearchMode::Bm25).await.unwrap();
    assert_eq!(response.results[0].document.id, "bio");
}

#[tokio::test]
async fn test_context_from_real_results_respects_budget() {
    let harness = TestHarness::new().await.unwrap();
    let response = harness.engine.search("research", 8, SearchMode::Hybrid).await.unwrap();

    for budget in [30, 60, 120, 2000] {
        let context = ContextAssembler::new(budget, 8, 40).assemble(&response.results);
        assert!(estimate_tokens(&context.text) <= budget);
        assert!(!context.text.is_empty());
    }
}

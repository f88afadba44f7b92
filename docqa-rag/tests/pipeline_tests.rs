//! End-to-end pipeline tests with the hashing embedder and a scripted backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docqa_rag::config::{RagConfig, RetryConfig};
use docqa_rag::error::{GenerationError, RagError};
use docqa_rag::hashing::HashEmbeddingProvider;
use docqa_rag::index::VectorIndex;
use docqa_rag::mock::{RecordingSleeper, ScriptedBackend, ScriptedReply};
use docqa_rag::pipeline::Pipeline;
use docqa_rag::prompt::{CANCELLED_ANSWER, FAILED_ANSWER, NO_RELEVANT_ANSWER, NOT_FOUND_ANSWER};
use docqa_rag::resilient::ResilientGenerationClient;
use tokio_util::sync::CancellationToken;

const DOCUMENT: &str = "Alpha causes Beta. Gamma is unrelated.";

struct Fixture {
    pipeline: Pipeline,
    backend: Arc<ScriptedBackend>,
    sleeper: Arc<RecordingSleeper>,
}

fn small_config() -> RagConfig {
    RagConfig::builder().chunk_size(20).chunk_overlap(5).build().unwrap()
}

fn fixture_with(config: RagConfig, backend: ScriptedBackend) -> Fixture {
    let backend = Arc::new(backend);
    let sleeper = Arc::new(RecordingSleeper::new());
    let index = Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default())));
    let generator = Arc::new(
        ResilientGenerationClient::new(backend.clone()).with_sleeper(sleeper.clone()),
    );
    let pipeline = Pipeline::builder()
        .config(config)
        .index(index)
        .generator(generator)
        .sleeper(sleeper.clone())
        .build()
        .unwrap();
    Fixture { pipeline, backend, sleeper }
}

fn fixture(backend: ScriptedBackend) -> Fixture {
    fixture_with(small_config(), backend)
}

/// A pipeline whose batch delay and backoff both wait on the tokio clock.
fn pipeline_on_tokio_clock(config: RagConfig, backend: &Arc<ScriptedBackend>) -> Pipeline {
    let index = Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default())));
    Pipeline::builder()
        .config(config)
        .index(index)
        .generator(Arc::new(ResilientGenerationClient::new(backend.clone())))
        .build()
        .unwrap()
}

fn cancel_after(delay: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    cancel
}

fn three_questions() -> Vec<String> {
    vec![
        "What does Alpha cause?".to_string(),
        "Is Gamma related?".to_string(),
        "What is Beta?".to_string(),
    ]
}

#[tokio::test]
async fn ingest_then_answer_uses_the_matching_chunk() {
    let f = fixture(ScriptedBackend::answering("Alpha causes Beta."));

    let ids = f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();
    assert_eq!(ids.len(), 2);

    let results = f.pipeline.index().query("What does Alpha cause?", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "Alpha causes Beta.");
    assert_eq!(results[1].text, "Gamma is unrelated.");
    assert_eq!(results[0].metadata.get("chunk_index").map(String::as_str), Some("0"));

    let answer = f.pipeline.answer("What does Alpha cause?").await.unwrap();
    assert_eq!(answer, "Alpha causes Beta.");

    let prompt = &f.backend.requests()[0].prompt;
    assert!(prompt.contains("Alpha causes Beta."));
    assert!(prompt.contains("What does Alpha cause?"));
}

#[tokio::test]
async fn inserted_text_is_its_own_nearest_neighbour() {
    let f = fixture(ScriptedBackend::answering("unused"));
    let index = f.pipeline.index();

    let ids = index
        .insert_texts(vec![
            ("The quick brown fox jumps.".to_string(), HashMap::new()),
            ("Completely different words here.".to_string(), HashMap::new()),
        ])
        .await
        .unwrap();

    let results = index.query("The quick brown fox jumps.", 1).await.unwrap();
    assert_eq!(results[0].id, ids[0]);
    assert!(results[0].distance < 1e-5);
}

#[tokio::test]
async fn empty_index_answers_not_found_without_generation() {
    let f = fixture(ScriptedBackend::answering("unused"));

    assert!(f.pipeline.index().query("anything", 4).await.unwrap().is_empty());
    assert_eq!(f.pipeline.answer("What does Alpha cause?").await.unwrap(), NOT_FOUND_ANSWER);
    assert_eq!(f.backend.calls(), 0);
}

#[tokio::test]
async fn generation_failure_becomes_the_failure_sentinel() {
    let f = fixture(ScriptedBackend::always(ScriptedReply::Error(GenerationError::Http {
        status: 401,
        body: String::new(),
    })));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    assert_eq!(f.pipeline.answer("What does Alpha cause?").await.unwrap(), FAILED_ANSWER);
}

#[tokio::test]
async fn persistent_rate_limiting_ends_in_the_failure_sentinel() {
    let f = fixture(ScriptedBackend::always(ScriptedReply::rate_limited()));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    assert_eq!(f.pipeline.answer("What does Alpha cause?").await.unwrap(), FAILED_ANSWER);
    assert_eq!(f.backend.calls(), 3);
    assert_eq!(f.sleeper.delays(), vec![Duration::from_secs(2), Duration::from_secs(4)]);
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let f = fixture(ScriptedBackend::answering("unused"));

    let err = f.pipeline.ingest("  \n ", HashMap::new()).await.unwrap_err();
    assert!(matches!(err, RagError::ValidationError(_)));
    assert_eq!(f.pipeline.index().count().await.unwrap(), 0);
}

#[tokio::test]
async fn answer_many_returns_one_answer_per_question() {
    let f = fixture(ScriptedBackend::new([
        ScriptedReply::text("first"),
        ScriptedReply::Error(GenerationError::Http { status: 400, body: String::new() }),
        ScriptedReply::text("third"),
    ]));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    let questions = vec![
        "What does Alpha cause?".to_string(),
        "Is Gamma related?".to_string(),
        "What is Beta?".to_string(),
    ];
    let answers = f.pipeline.answer_many(&questions, &CancellationToken::new()).await;

    assert_eq!(answers, vec!["first".to_string(), FAILED_ANSWER.to_string(), "third".to_string()]);
    assert_eq!(f.sleeper.delays(), vec![Duration::from_secs(4), Duration::from_secs(4)]);
}

#[tokio::test]
async fn answer_many_after_cancellation_fills_with_sentinels() {
    let f = fixture(ScriptedBackend::answering("unused"));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let questions = vec!["one?".to_string(), "two?".to_string()];
    let answers = f.pipeline.answer_many(&questions, &cancel).await;

    assert_eq!(answers, vec![CANCELLED_ANSWER.to_string(); 2]);
    assert_eq!(f.backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_the_batch_delay_skips_the_remaining_questions() {
    let backend = Arc::new(ScriptedBackend::answering("Beta"));
    let pipeline = pipeline_on_tokio_clock(small_config(), &backend);
    pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    let cancel = cancel_after(Duration::from_secs(1));
    let started = tokio::time::Instant::now();
    let answers = pipeline.answer_many(&three_questions(), &cancel).await;

    assert_eq!(
        answers,
        vec!["Beta".to_string(), CANCELLED_ANSWER.to_string(), CANCELLED_ANSWER.to_string()]
    );
    assert_eq!(backend.calls(), 1);
    assert!(started.elapsed() < pipeline.config().batch_delay);
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_a_retry_backoff_stops_the_batch() {
    let backend = Arc::new(
        ScriptedBackend::new([ScriptedReply::text("first")]).with_fallback(ScriptedReply::rate_limited()),
    );
    let config = RagConfig::builder()
        .chunk_size(20)
        .chunk_overlap(5)
        .batch_delay(Duration::ZERO)
        .build()
        .unwrap();
    let pipeline = pipeline_on_tokio_clock(config, &backend);
    pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    let cancel = cancel_after(Duration::from_secs(1));
    let started = tokio::time::Instant::now();
    let answers = pipeline.answer_many(&three_questions(), &cancel).await;

    assert_eq!(
        answers,
        vec!["first".to_string(), CANCELLED_ANSWER.to_string(), CANCELLED_ANSWER.to_string()]
    );
    assert_eq!(backend.calls(), 2);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn rejected_question_does_not_trigger_the_batch_delay() {
    let f = fixture(ScriptedBackend::answering("Beta"));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    let questions = vec!["  ".to_string(), "What does Alpha cause?".to_string()];
    let answers = f.pipeline.answer_many(&questions, &CancellationToken::new()).await;

    assert_eq!(answers, vec![FAILED_ANSWER.to_string(), "Beta".to_string()]);
    assert_eq!(f.backend.calls(), 1);
    assert!(f.sleeper.delays().is_empty());
}

#[tokio::test]
async fn hybrid_search_keeps_only_relevant_results() {
    let f = fixture(ScriptedBackend::answering("Beta"));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    let hybrid = f.pipeline.hybrid_search("What does Alpha cause?", 4).await.unwrap();

    assert_eq!(hybrid.answer, "Beta");
    assert_eq!(hybrid.results.len(), 1);
    assert_eq!(hybrid.results[0].text, "Alpha causes Beta.");
}

#[tokio::test]
async fn hybrid_search_without_relevant_content_skips_generation() {
    let config =
        RagConfig::builder().chunk_size(20).chunk_overlap(5).relevance_threshold(Some(0.0)).build();
    let f = fixture_with(config.unwrap(), ScriptedBackend::answering("unused"));
    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    let hybrid = f.pipeline.hybrid_search("zebra crossing", 4).await.unwrap();

    assert_eq!(hybrid.answer, NO_RELEVANT_ANSWER);
    assert!(hybrid.results.is_empty());
    assert_eq!(f.backend.calls(), 0);
}

#[tokio::test]
async fn simulate_sends_the_scenario() {
    let f = fixture(ScriptedBackend::answering("The claim doubles."));

    let answer = f
        .pipeline
        .simulate("Claim for $5000 damage.", "What if the damage was $10000?")
        .await
        .unwrap();

    assert_eq!(answer, "The claim doubles.");
    assert!(f.backend.requests()[0].prompt.contains("What if the damage was $10000?"));
}

#[tokio::test]
async fn pipelines_with_separate_indexes_do_not_share_entries() {
    let f = fixture(ScriptedBackend::answering("unused"));
    let other = f.pipeline.with_index(Arc::new(VectorIndex::in_memory(Arc::new(
        HashEmbeddingProvider::default(),
    ))));

    f.pipeline.ingest(DOCUMENT, HashMap::new()).await.unwrap();

    assert_eq!(f.pipeline.index().count().await.unwrap(), 2);
    assert_eq!(other.index().count().await.unwrap(), 0);
    assert_eq!(other.answer("What does Alpha cause?").await.unwrap(), NOT_FOUND_ANSWER);
}

#[test]
fn builder_requires_a_generator() {
    let index = Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default())));
    let err = Pipeline::builder().index(index).build().err().unwrap();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[test]
fn builder_rejects_a_prompt_budget_the_generator_would_truncate() {
    let index = Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default())));
    let generator =
        Arc::new(ResilientGenerationClient::new(Arc::new(ScriptedBackend::answering("unused"))));
    let config = RagConfig::builder().max_prompt_chars(8000).build().unwrap();

    let err = Pipeline::builder().config(config).index(index).generator(generator).build().err();

    assert!(matches!(err, Some(RagError::ConfigError(_))));
}

#[tokio::test]
async fn large_prompt_budget_keeps_the_question() {
    let backend = Arc::new(ScriptedBackend::answering("It says value 7."));
    let retry = RetryConfig { max_prompt_chars: 8000, ..RetryConfig::default() };
    let config = RagConfig::builder()
        .chunk_size(2000)
        .max_context_chars(6000)
        .max_prompt_chars(8000)
        .build()
        .unwrap();
    let pipeline = Pipeline::builder()
        .config(config)
        .index(Arc::new(VectorIndex::in_memory(Arc::new(HashEmbeddingProvider::default()))))
        .generator(Arc::new(ResilientGenerationClient::new(backend.clone()).with_config(retry.clone())))
        .sleeper(Arc::new(RecordingSleeper::new()))
        .build()
        .unwrap();
    let text: String =
        (0..300).map(|i| format!("Alpha fact number {i} says value {i}. ")).collect();
    pipeline.ingest(&text, HashMap::new()).await.unwrap();

    let question = "What does Alpha fact number 7 say?";
    assert_eq!(pipeline.answer(question).await.unwrap(), "It says value 7.");

    let prompt = &backend.requests()[0].prompt;
    assert!(prompt.chars().count() > 4000);
    assert!(prompt.chars().count() <= 8000);
    assert!(prompt.contains(&format!("Question: {question}")));
    assert!(prompt.ends_with("Answer:"));
    assert!(!prompt.contains(&retry.truncation_marker));
}

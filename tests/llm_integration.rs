//! Integration tests against a live chat-completions endpoint.
//!
//! These tests make real API calls and read the same variables as the CLI
//! (`LLM_API_BASE` or `AZURE_ENDPOINT`, `LLM_API_KEY`, `LLM_MODEL`, ...).
//! Run with: cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use datawash::dataset::{Column, DataSet};
use datawash::llm::{ChatClient, GenerationRequest, LlmProvider, Message};
use datawash::quality::IssueReport;
use datawash::sandbox::SandboxExecutor;
use datawash::synthesis::{CleaningRules, ProcedureSynthesizer, SynthesisConfig};

fn create_test_client() -> ChatClient {
    let _ = dotenvy::dotenv();
    ChatClient::from_env().expect("LLM_API_BASE or AZURE_ENDPOINT must be set for integration tests")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();
    let model = client.config().model.clone();

    let request = GenerationRequest::new(
        model,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains('4'),
        "Response should contain '4', got: {}",
        content
    );
}

#[tokio::test]
#[ignore]
async fn test_synthesized_procedure_runs_in_sandbox() {
    let client = create_test_client();
    let model = client.config().model.clone();
    let synthesizer = ProcedureSynthesizer::new(
        Arc::new(client),
        SynthesisConfig::new()
            .with_model(model)
            .with_rules(CleaningRules::default()),
    );

    let dataset = DataSet::new(vec![
        Column::int64("PassengerId", vec![Some(1), Some(2), Some(2)]),
        Column::float64("Age", vec![None, Some(38.0), Some(38.0)]),
        Column::utf8("Cabin", vec![Some("B5"), Some("C85"), Some("C85")]),
    ])
    .expect("valid dataset");
    let report = IssueReport::from_dataset(&dataset);

    let procedure = synthesizer
        .synthesize(&report)
        .await
        .expect("synthesis should succeed");
    assert!(!procedure.source().contains("```"));

    let cleaned = SandboxExecutor::default()
        .execute(procedure.source(), dataset)
        .expect("procedure should run");
    assert_eq!(cleaned.column("Age").map(|c| c.missing_count()), Some(0));
    assert!(!cleaned.has_column("Cabin"));
}

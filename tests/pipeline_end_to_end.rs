//! End-to-end pipeline runs against a CSV file, a SQLite file and a mock model.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use datawash::dataset::load_csv;
use datawash::error::{DatasetError, LlmError};
use datawash::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use datawash::pipeline::{
    CleaningOutcome, Pipeline, PipelineConfig, PipelineError, PipelineEvent, StageMarker,
    SynthesisStage,
};
use datawash::storage::SnapshotStore;
use datawash::synthesis::{CleaningRules, ProcedureOrigin, ProcedureSynthesizer, SynthesisError};

const PASSENGERS: &str = "\
PassengerId,Name,Age,Cabin
1,Braund,,B5
2,Cumings,38,C85
2,Cumings,38,C85
";

const CLEANING_REPLY: &str = "```python
df = df.fill_missing(\"Age\", df.median(\"Age\"))
df = df.drop_column_if_exists(\"Cabin\")
df = df.drop_duplicates()
```";

struct MockLlmProvider {
    response: Mutex<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockLlmProvider {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let content = self.response.lock().unwrap().clone();
        Ok(GenerationResponse {
            id: "resp-1".to_string(),
            model: "mock-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

/// Provider whose endpoint always answers with a server error.
struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        Err(LlmError::ApiError {
            code: 500,
            message: "internal server error".to_string(),
        })
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    csv: PathBuf,
    config: PipelineConfig,
}

fn fixture(csv_text: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("passengers.csv");
    std::fs::write(&csv, csv_text).unwrap();
    let config = PipelineConfig::new()
        .with_input_path(&csv)
        .with_database_path(dir.path().join("pipeline.db"));
    Fixture {
        _dir: dir,
        csv,
        config,
    }
}

fn model_pipeline(
    config: &PipelineConfig,
    store: SnapshotStore,
    llm: Arc<dyn LlmProvider>,
) -> Pipeline {
    let synthesizer =
        ProcedureSynthesizer::new(llm, config.synthesis_config(CleaningRules::default()));
    Pipeline::standard(config, store, SynthesisStage::from_model(synthesizer)).unwrap()
}

async fn open_store(path: &Path) -> SnapshotStore {
    SnapshotStore::open(path).await.unwrap()
}

#[tokio::test]
async fn test_model_procedure_cleans_passengers() {
    let fx = fixture(PASSENGERS);
    let store = open_store(&fx.config.database_path).await;
    let llm = MockLlmProvider::new(CLEANING_REPLY);
    let pipeline = model_pipeline(&fx.config, store.clone(), llm.clone());

    let run = pipeline.run().await.unwrap();
    assert_eq!(run.final_stage(), StageMarker::Cleaned);
    assert_eq!(llm.request_count(), 1);

    let report = run.state.issue_report().unwrap();
    assert_eq!(report.missing_for("Age"), Some(1));
    assert_eq!(report.duplicates(), 1);
    assert_eq!(report.shape(), (3, 4));

    let procedure = run.state.cleaning_procedure().unwrap();
    assert!(!procedure.source().contains("```"));
    assert!(matches!(procedure.origin(), ProcedureOrigin::Model { model, .. } if model == "mock-model"));

    let cleaned = run.state.dataset().unwrap();
    assert_eq!(cleaned.row_count(), 2);
    assert_eq!(cleaned.column("Age").unwrap().missing_count(), 0);
    assert!(!cleaned.has_column("Cabin"));
    assert_eq!(cleaned.duplicate_row_count(), 0);
    assert_eq!(
        run.outcome(),
        Some(&CleaningOutcome::Applied {
            before: (3, 4),
            after: (2, 3)
        })
    );

    assert_eq!(store.list_tables().await.unwrap(), vec!["dataset_clean", "dataset_raw"]);
    assert_eq!(store.row_count("dataset_raw").await.unwrap(), 3);
    assert_eq!(store.row_count("dataset_clean").await.unwrap(), 2);
    store.close().await;
}

#[tokio::test]
async fn test_invalid_procedure_falls_back_to_input() {
    let fx = fixture(PASSENGERS);
    let store = open_store(&fx.config.database_path).await;
    let llm = MockLlmProvider::new("import pandas as pd\ndf = df.dropna()");
    let pipeline = model_pipeline(&fx.config, store.clone(), llm);

    let (tx, mut rx) = mpsc::channel(32);
    let run = pipeline.run_with_events(Some(tx)).await.unwrap();
    assert_eq!(run.final_stage(), StageMarker::Cleaned);

    let original = load_csv(&fx.csv).await.unwrap();
    assert_eq!(run.state.dataset(), Some(&original));
    assert!(matches!(run.outcome(), Some(CleaningOutcome::FellBack { .. })));
    assert_eq!(store.row_count("dataset_clean").await.unwrap(), 3);

    let mut fell_back = false;
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::CleaningFellBack { reason } = event {
            assert!(!reason.is_empty());
            fell_back = true;
        }
    }
    assert!(fell_back);
    store.close().await;
}

#[tokio::test]
async fn test_failing_procedure_falls_back_to_input() {
    let fx = fixture(PASSENGERS);
    let store = open_store(&fx.config.database_path).await;
    let llm = MockLlmProvider::new("df = df.drop_column(\"Ticket\")");
    let pipeline = model_pipeline(&fx.config, store.clone(), llm);

    let run = pipeline.run().await.unwrap();
    let original = load_csv(&fx.csv).await.unwrap();
    assert_eq!(run.state.dataset(), Some(&original));
    match run.outcome() {
        Some(CleaningOutcome::FellBack { reason }) => assert!(reason.contains("Ticket")),
        other => panic!("expected fallback, got {:?}", other),
    }
    store.close().await;
}

#[tokio::test]
async fn test_clean_dataset_skips_model() {
    let fx = fixture("id,name\n1,a\n2,b\n");
    let store = open_store(&fx.config.database_path).await;
    let llm = MockLlmProvider::new(CLEANING_REPLY);
    let pipeline = model_pipeline(&fx.config, store.clone(), llm.clone());

    let run = pipeline.run().await.unwrap();
    assert_eq!(llm.request_count(), 0);
    assert_eq!(
        run.state.cleaning_procedure().unwrap().origin(),
        &ProcedureOrigin::Skipped
    );
    assert_eq!(
        run.outcome(),
        Some(&CleaningOutcome::Applied {
            before: (2, 2),
            after: (2, 2)
        })
    );
    store.close().await;
}

#[tokio::test]
async fn test_offline_rules_match_model_procedure() {
    let fx = fixture(PASSENGERS);
    let store = open_store(&fx.config.database_path).await;
    let pipeline = Pipeline::standard(
        &fx.config,
        store.clone(),
        SynthesisStage::from_rules(CleaningRules::default()),
    )
    .unwrap();

    let run = pipeline.run().await.unwrap();
    assert_eq!(run.state.cleaning_procedure().unwrap().origin(), &ProcedureOrigin::Rules);
    let stored = store.read_table("dataset_clean").await.unwrap();
    assert_eq!(stored.row_count(), 2);
    assert_eq!(stored.column_names(), vec!["PassengerId", "Name", "Age"]);
    store.close().await;
}

#[tokio::test]
async fn test_missing_input_aborts_before_cleaned() {
    let fx = fixture(PASSENGERS);
    let config = fx.config.clone().with_input_path(fx.csv.with_file_name("absent.csv"));
    let store = open_store(&config.database_path).await;
    let llm = MockLlmProvider::new(CLEANING_REPLY);
    let pipeline = model_pipeline(&config, store.clone(), llm.clone());

    let (tx, mut rx) = mpsc::channel(32);
    let err = pipeline.run_with_events(Some(tx)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Dataset(DatasetError::SourceNotFound(_))
    ));
    assert_eq!(llm.request_count(), 0);
    assert!(store.list_tables().await.unwrap().is_empty());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![PipelineEvent::StageStarted {
            stage: "ingest".to_string()
        }]
    );
    store.close().await;
}

#[tokio::test]
async fn test_model_failure_aborts_before_cleaned() {
    let fx = fixture(PASSENGERS);
    let store = open_store(&fx.config.database_path).await;
    let pipeline = model_pipeline(&fx.config, store.clone(), Arc::new(FailingLlmProvider));

    let (tx, mut rx) = mpsc::channel(32);
    let err = pipeline.run_with_events(Some(tx)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Synthesis(SynthesisError::Llm(LlmError::ApiError { code: 500, .. }))
    ));

    assert_eq!(store.list_tables().await.unwrap(), vec!["dataset_raw"]);
    assert_eq!(store.row_count("dataset_raw").await.unwrap(), 3);

    let mut started = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            PipelineEvent::StageStarted { stage } => started.push(stage),
            PipelineEvent::PipelineCompleted { .. } => panic!("run should not complete"),
            PipelineEvent::CleaningFellBack { .. } => panic!("model errors must not fall back"),
            _ => {}
        }
    }
    assert_eq!(started, vec!["ingest", "quality_check", "synthesis"]);
    store.close().await;
}

#[tokio::test]
async fn test_report_is_stable_across_runs() {
    let fx = fixture(PASSENGERS);
    let mut rendered = Vec::new();
    for _ in 0..2 {
        let store = SnapshotStore::in_memory().await.unwrap();
        let pipeline = Pipeline::standard(
            &fx.config,
            store,
            SynthesisStage::from_rules(CleaningRules::default()),
        )
        .unwrap();
        let run = pipeline.run().await.unwrap();
        rendered.push(run.state.issue_report().unwrap().render());
    }
    assert_eq!(rendered[0], rendered[1]);
    assert_eq!(
        rendered[0],
        r#"{"missing_values":{"PassengerId":0,"Name":0,"Age":1,"Cabin":0},"duplicates":1,"shape":[3,4]}"#
    );
}

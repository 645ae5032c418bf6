//! The four stages of a cleaning run.
//!
//! Each stage reads the current [`PipelineState`] and returns a
//! [`StateUpdate`] holding only the fields it owns. The orchestrator applies
//! the update and advances the marker.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dataset::load_csv;
use crate::quality::IssueReport;
use crate::sandbox::SandboxExecutor;
use crate::storage::SnapshotStore;
use crate::synthesis::{CleaningProcedure, CleaningRules, ProcedureSynthesizer};

use super::orchestrator::{PipelineError, PipelineEvent};
use super::state::{CleaningOutcome, PipelineState, StageMarker, StateUpdate};

/// Per-run context handed to every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_id: Uuid,
    events: Option<Sender<PipelineEvent>>,
}

impl StageContext {
    pub fn new(run_id: Uuid, events: Option<Sender<PipelineEvent>>) -> Self {
        Self { run_id, events }
    }

    /// A context with a fresh run id and no event listener.
    pub fn detached() -> Self {
        Self::new(Uuid::new_v4(), None)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Sends `event` to the listener, if any, without waiting.
    ///
    /// A full channel drops the event so a slow or idle listener never
    /// stalls the run. A closed channel is ignored.
    pub fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            if let Err(TrySendError::Full(event)) = sender.try_send(event) {
                debug!(event = ?event, "Event channel full, dropping event");
            }
        }
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs, events and errors.
    fn name(&self) -> &str;

    /// Marker the state carries once this stage has run.
    fn marker(&self) -> StageMarker;

    async fn run(
        &self,
        state: &PipelineState,
        ctx: &StageContext,
    ) -> Result<StateUpdate, PipelineError>;
}

/// Loads the CSV source and stores a raw snapshot.
pub struct IngestStage {
    input_path: PathBuf,
    store: SnapshotStore,
    raw_table: String,
}

impl IngestStage {
    pub fn new(input_path: impl Into<PathBuf>, store: SnapshotStore, raw_table: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            store,
            raw_table: raw_table.into(),
        }
    }
}

#[async_trait]
impl Stage for IngestStage {
    fn name(&self) -> &str {
        "ingest"
    }

    fn marker(&self) -> StageMarker {
        StageMarker::Loaded
    }

    async fn run(
        &self,
        _state: &PipelineState,
        _ctx: &StageContext,
    ) -> Result<StateUpdate, PipelineError> {
        let dataset = load_csv(&self.input_path).await?;
        self.store.write_table(&self.raw_table, &dataset).await?;

        info!(
            path = %self.input_path.display(),
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            table = %self.raw_table,
            "Dataset loaded"
        );
        Ok(StateUpdate::new().with_dataset(dataset))
    }
}

/// Profiles the dataset into an [`IssueReport`].
pub struct QualityCheckStage;

#[async_trait]
impl Stage for QualityCheckStage {
    fn name(&self) -> &str {
        "quality_check"
    }

    fn marker(&self) -> StageMarker {
        StageMarker::Checked
    }

    async fn run(
        &self,
        state: &PipelineState,
        _ctx: &StageContext,
    ) -> Result<StateUpdate, PipelineError> {
        let dataset = state.require_dataset(self.name())?;
        let report = IssueReport::from_dataset(dataset);

        info!(
            missing = report.total_missing(),
            duplicates = report.duplicates(),
            report = %report,
            "Data quality checked"
        );
        Ok(StateUpdate::new().with_issue_report(report))
    }
}

enum ProcedureSource {
    Model(ProcedureSynthesizer),
    Rules(CleaningRules),
}

/// Produces the cleaning procedure, from a model or from fixed rules.
pub struct SynthesisStage {
    source: ProcedureSource,
}

impl SynthesisStage {
    /// Ask a model for the procedure.
    pub fn from_model(synthesizer: ProcedureSynthesizer) -> Self {
        Self {
            source: ProcedureSource::Model(synthesizer),
        }
    }

    /// Compile `rules` into the procedure without calling a model.
    pub fn from_rules(rules: CleaningRules) -> Self {
        Self {
            source: ProcedureSource::Rules(rules),
        }
    }
}

#[async_trait]
impl Stage for SynthesisStage {
    fn name(&self) -> &str {
        "synthesis"
    }

    fn marker(&self) -> StageMarker {
        StageMarker::Processed
    }

    async fn run(
        &self,
        state: &PipelineState,
        _ctx: &StageContext,
    ) -> Result<StateUpdate, PipelineError> {
        let report = state.require_issue_report(self.name())?;
        let procedure = match &self.source {
            ProcedureSource::Model(synthesizer) => synthesizer.synthesize(report).await?,
            ProcedureSource::Rules(rules) => CleaningProcedure::from_rules(rules),
        };

        info!(
            origin = ?procedure.origin(),
            bytes = procedure.source().len(),
            "Cleaning procedure ready"
        );
        Ok(StateUpdate::new().with_cleaning_procedure(procedure))
    }
}

/// Runs the procedure in the sandbox and stores the resulting snapshot.
///
/// Any procedure failure falls back to the dataset as it was loaded.
pub struct ApplyStage {
    executor: SandboxExecutor,
    store: SnapshotStore,
    clean_table: String,
}

impl ApplyStage {
    pub fn new(executor: SandboxExecutor, store: SnapshotStore, clean_table: impl Into<String>) -> Self {
        Self {
            executor,
            store,
            clean_table: clean_table.into(),
        }
    }
}

#[async_trait]
impl Stage for ApplyStage {
    fn name(&self) -> &str {
        "apply"
    }

    fn marker(&self) -> StageMarker {
        StageMarker::Cleaned
    }

    async fn run(
        &self,
        state: &PipelineState,
        ctx: &StageContext,
    ) -> Result<StateUpdate, PipelineError> {
        let dataset = state.require_dataset(self.name())?;
        let procedure = state.require_cleaning_procedure(self.name())?;
        let before = dataset.shape();

        let result = self
            .executor
            .execute_bounded(procedure.source().to_string(), dataset.clone())
            .await;

        match result {
            Ok(cleaned) if cleaned.column_count() > 0 => {
                let after = cleaned.shape();
                self.store.write_table(&self.clean_table, &cleaned).await?;
                info!(
                    before = ?before,
                    after = ?after,
                    table = %self.clean_table,
                    "Cleaning procedure applied"
                );
                Ok(StateUpdate::new()
                    .with_dataset(cleaned)
                    .with_cleaning_outcome(CleaningOutcome::Applied { before, after }))
            }
            other => {
                let reason = match other {
                    Err(err) => err.to_string(),
                    Ok(_) => "procedure removed every column".to_string(),
                };
                warn!(reason = %reason, "Cleaning procedure failed, keeping the original dataset");
                ctx.emit(PipelineEvent::CleaningFellBack {
                    reason: reason.clone(),
                });

                self.store.write_table(&self.clean_table, dataset).await?;
                Ok(StateUpdate::new().with_cleaning_outcome(CleaningOutcome::FellBack { reason }))
            }
        }
    }
}

//! Pipeline orchestrator.
//!
//! This module provides the [`Pipeline`] that runs stages in order, from an
//! empty state to [`StageMarker::Cleaned`]:
//! - Wiring validation at construction
//! - Per-stage timing and structured logging under a run span
//! - Progress events over an optional channel

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::DatasetError;
use crate::sandbox::SandboxExecutor;
use crate::storage::{SnapshotStore, StorageError};
use crate::synthesis::SynthesisError;

use super::config::{ConfigError, PipelineConfig};
use super::stages::{ApplyStage, IngestStage, QualityCheckStage, Stage, StageContext, SynthesisStage};
use super::state::{CleaningOutcome, PipelineState, StageMarker};

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage ran without a field it depends on.
    #[error("Stage '{stage}' requires '{field}', which is not set")]
    MissingField { stage: String, field: &'static str },

    /// A stage tried to move the marker anywhere but one step forward.
    #[error("Invalid stage transition from '{from}' to '{to}'")]
    InvalidTransition { from: StageMarker, to: StageMarker },

    /// A set-once field was written twice.
    #[error("Field '{0}' has already been set")]
    FieldAlreadySet(&'static str),

    /// The stage list does not lead from start to cleaned.
    #[error("Invalid pipeline wiring: {0}")]
    Wiring(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dataset could not be loaded.
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Snapshot store error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Procedure synthesis failed.
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
}

impl PipelineError {
    pub(crate) fn missing(stage: &str, field: &'static str) -> Self {
        PipelineError::MissingField {
            stage: stage.to_string(),
            field,
        }
    }
}

/// Progress notifications for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted {
        stage: String,
    },
    StageCompleted {
        stage: String,
        marker: StageMarker,
        elapsed: Duration,
    },
    CleaningFellBack {
        reason: String,
    },
    PipelineCompleted {
        run_id: Uuid,
        marker: StageMarker,
    },
}

/// Timing for one completed stage.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub name: String,
    pub marker: StageMarker,
    pub elapsed: Duration,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
    pub state: PipelineState,
}

impl PipelineRun {
    pub fn final_stage(&self) -> StageMarker {
        self.state.stage()
    }

    pub fn outcome(&self) -> Option<&CleaningOutcome> {
        self.state.cleaning_outcome()
    }
}

/// An ordered list of stages leading from [`StageMarker::Start`] to
/// [`StageMarker::Cleaned`].
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Builds a pipeline, checking that each stage advances the marker by
    /// exactly one step and that the last stage reaches the terminal marker.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::Wiring("pipeline has no stages".to_string()));
        }

        let mut marker = StageMarker::Start;
        for stage in &stages {
            let expected = marker.next().ok_or_else(|| {
                PipelineError::Wiring(format!(
                    "stage '{}' follows the terminal marker '{}'",
                    stage.name(),
                    marker
                ))
            })?;
            if stage.marker() != expected {
                return Err(PipelineError::Wiring(format!(
                    "stage '{}' produces '{}', expected '{}'",
                    stage.name(),
                    stage.marker(),
                    expected
                )));
            }
            marker = expected;
        }

        if !marker.is_terminal() {
            return Err(PipelineError::Wiring(format!(
                "pipeline ends at '{}' instead of '{}'",
                marker,
                StageMarker::Cleaned
            )));
        }

        Ok(Self { stages })
    }

    /// The standard ingest, quality check, synthesis and apply pipeline.
    pub fn standard(
        config: &PipelineConfig,
        store: SnapshotStore,
        synthesis: SynthesisStage,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Self::new(vec![
            Box::new(IngestStage::new(
                config.input_path.clone(),
                store.clone(),
                config.raw_table.clone(),
            )),
            Box::new(QualityCheckStage),
            Box::new(synthesis),
            Box::new(ApplyStage::new(
                SandboxExecutor::new(config.sandbox_config()),
                store,
                config.clean_table.clone(),
            )),
        ])
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage once, in order.
    pub async fn run(&self) -> Result<PipelineRun, PipelineError> {
        self.run_with_events(None).await
    }

    /// Like [`run`](Pipeline::run), also sending [`PipelineEvent`]s to `events`.
    ///
    /// Events are sent without waiting. When the channel is full the event is
    /// dropped, so drain the receiver concurrently to see every event.
    pub async fn run_with_events(
        &self,
        events: Option<Sender<PipelineEvent>>,
    ) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id);
        self.execute(StageContext::new(run_id, events))
            .instrument(span)
            .await
    }

    async fn execute(&self, ctx: StageContext) -> Result<PipelineRun, PipelineError> {
        let started_at = Utc::now();
        let mut state = PipelineState::empty();
        let mut records = Vec::with_capacity(self.stages.len());

        info!(stages = ?self.stage_names(), "Pipeline started");

        for stage in &self.stages {
            ctx.emit(PipelineEvent::StageStarted {
                stage: stage.name().to_string(),
            });

            let start = Instant::now();
            let update = match stage.run(&state, &ctx).await {
                Ok(update) => update,
                Err(e) => {
                    error!(stage = stage.name(), error = %e, "Stage failed");
                    return Err(e);
                }
            };
            state = state.evolve(stage.marker(), update)?;
            let elapsed = start.elapsed();

            info!(
                stage = stage.name(),
                marker = %state.stage(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Stage completed"
            );
            ctx.emit(PipelineEvent::StageCompleted {
                stage: stage.name().to_string(),
                marker: state.stage(),
                elapsed,
            });

            records.push(StageRecord {
                name: stage.name().to_string(),
                marker: state.stage(),
                elapsed,
            });
        }

        ctx.emit(PipelineEvent::PipelineCompleted {
            run_id: ctx.run_id(),
            marker: state.stage(),
        });
        info!(marker = %state.stage(), "Pipeline completed");

        Ok(PipelineRun {
            run_id: ctx.run_id(),
            started_at,
            finished_at: Utc::now(),
            stages: records,
            state,
        })
    }
}

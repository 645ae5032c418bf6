//! The value threaded through every stage.

use std::fmt;

use crate::dataset::DataSet;
use crate::quality::IssueReport;
use crate::synthesis::CleaningProcedure;

use super::orchestrator::PipelineError;

/// How far a run has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageMarker {
    Start,
    Loaded,
    Checked,
    Processed,
    Cleaned,
}

impl StageMarker {
    /// The marker a single stage advances to, or `None` from [`StageMarker::Cleaned`].
    pub fn next(self) -> Option<StageMarker> {
        match self {
            StageMarker::Start => Some(StageMarker::Loaded),
            StageMarker::Loaded => Some(StageMarker::Checked),
            StageMarker::Checked => Some(StageMarker::Processed),
            StageMarker::Processed => Some(StageMarker::Cleaned),
            StageMarker::Cleaned => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageMarker::Start => "start",
            StageMarker::Loaded => "loaded",
            StageMarker::Checked => "checked",
            StageMarker::Processed => "processed",
            StageMarker::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for StageMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the apply stage did with the procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleaningOutcome {
    /// The procedure ran and its result replaced the dataset.
    Applied {
        before: (usize, usize),
        after: (usize, usize),
    },
    /// The procedure failed; the dataset was kept as loaded.
    FellBack { reason: String },
}

impl CleaningOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CleaningOutcome::Applied { .. })
    }
}

impl fmt::Display for CleaningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleaningOutcome::Applied { before, after } => write!(
                f,
                "applied ({} rows x {} columns -> {} rows x {} columns)",
                before.0, before.1, after.0, after.1
            ),
            CleaningOutcome::FellBack { reason } => {
                write!(f, "fell back to the original dataset: {}", reason)
            }
        }
    }
}

/// Fields a stage wants to change. Unset fields carry forward.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub dataset: Option<DataSet>,
    pub issue_report: Option<IssueReport>,
    pub cleaning_procedure: Option<CleaningProcedure>,
    pub cleaning_outcome: Option<CleaningOutcome>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, dataset: DataSet) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn with_issue_report(mut self, report: IssueReport) -> Self {
        self.issue_report = Some(report);
        self
    }

    pub fn with_cleaning_procedure(mut self, procedure: CleaningProcedure) -> Self {
        self.cleaning_procedure = Some(procedure);
        self
    }

    pub fn with_cleaning_outcome(mut self, outcome: CleaningOutcome) -> Self {
        self.cleaning_outcome = Some(outcome);
        self
    }
}

/// Immutable pipeline state. Each stage produces a new one via [`evolve`].
///
/// [`evolve`]: PipelineState::evolve
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    dataset: Option<DataSet>,
    issue_report: Option<IssueReport>,
    cleaning_procedure: Option<CleaningProcedure>,
    cleaning_outcome: Option<CleaningOutcome>,
    stage: StageMarker,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::empty()
    }
}

impl PipelineState {
    /// The state before any stage has run.
    pub fn empty() -> Self {
        Self {
            dataset: None,
            issue_report: None,
            cleaning_procedure: None,
            cleaning_outcome: None,
            stage: StageMarker::Start,
        }
    }

    /// Applies `update` and advances to `marker`.
    ///
    /// `marker` must be exactly one step past the current marker, and the
    /// report, procedure and outcome may each be set only once.
    pub fn evolve(self, marker: StageMarker, update: StateUpdate) -> Result<Self, PipelineError> {
        if self.stage.next() != Some(marker) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: marker,
            });
        }
        if self.issue_report.is_some() && update.issue_report.is_some() {
            return Err(PipelineError::FieldAlreadySet("issue_report"));
        }
        if self.cleaning_procedure.is_some() && update.cleaning_procedure.is_some() {
            return Err(PipelineError::FieldAlreadySet("cleaning_procedure"));
        }
        if self.cleaning_outcome.is_some() && update.cleaning_outcome.is_some() {
            return Err(PipelineError::FieldAlreadySet("cleaning_outcome"));
        }

        Ok(Self {
            dataset: update.dataset.or(self.dataset),
            issue_report: update.issue_report.or(self.issue_report),
            cleaning_procedure: update.cleaning_procedure.or(self.cleaning_procedure),
            cleaning_outcome: update.cleaning_outcome.or(self.cleaning_outcome),
            stage: marker,
        })
    }

    pub fn stage(&self) -> StageMarker {
        self.stage
    }

    pub fn dataset(&self) -> Option<&DataSet> {
        self.dataset.as_ref()
    }

    pub fn issue_report(&self) -> Option<&IssueReport> {
        self.issue_report.as_ref()
    }

    pub fn cleaning_procedure(&self) -> Option<&CleaningProcedure> {
        self.cleaning_procedure.as_ref()
    }

    pub fn cleaning_outcome(&self) -> Option<&CleaningOutcome> {
        self.cleaning_outcome.as_ref()
    }

    pub fn into_dataset(self) -> Option<DataSet> {
        self.dataset
    }

    /// The dataset, or [`PipelineError::MissingField`] on behalf of `stage`.
    pub fn require_dataset(&self, stage: &str) -> Result<&DataSet, PipelineError> {
        self.dataset
            .as_ref()
            .ok_or_else(|| PipelineError::missing(stage, "dataset"))
    }

    pub fn require_issue_report(&self, stage: &str) -> Result<&IssueReport, PipelineError> {
        self.issue_report
            .as_ref()
            .ok_or_else(|| PipelineError::missing(stage, "issue_report"))
    }

    pub fn require_cleaning_procedure(
        &self,
        stage: &str,
    ) -> Result<&CleaningProcedure, PipelineError> {
        self.cleaning_procedure
            .as_ref()
            .ok_or_else(|| PipelineError::missing(stage, "cleaning_procedure"))
    }
}

//! The cleaning pipeline.
//!
//! A run threads one [`PipelineState`] through four stages:
//!
//! 1. **Ingest**: load the CSV source and store a raw snapshot
//! 2. **Quality check**: profile missing values, duplicates and shape
//! 3. **Synthesis**: obtain a cleaning procedure for the issues found
//! 4. **Apply**: run the procedure in the sandbox, falling back to the
//!    original data on failure, and store the clean snapshot
//!
//! # Example
//!
//! ```rust,ignore
//! use datawash::pipeline::{Pipeline, PipelineConfig, SynthesisStage};
//! use datawash::storage::SnapshotStore;
//! use datawash::synthesis::CleaningRules;
//!
//! let config = PipelineConfig::from_env()?;
//! let store = SnapshotStore::open(&config.database_path).await?;
//! let pipeline = Pipeline::standard(&config, store, SynthesisStage::from_rules(CleaningRules::default()))?;
//! let run = pipeline.run().await?;
//! println!("Final state is: {}", run.final_stage());
//! ```

pub mod config;
pub mod orchestrator;
pub mod stages;
pub mod state;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{Pipeline, PipelineError, PipelineEvent, PipelineRun, StageRecord};
pub use stages::{
    ApplyStage, IngestStage, QualityCheckStage, Stage, StageContext, SynthesisStage,
};
pub use state::{CleaningOutcome, PipelineState, StageMarker, StateUpdate};

//! Cleaning-procedure synthesis.
//!
//! Turns an [`IssueReport`](crate::quality::IssueReport) into a
//! [`CleaningProcedure`]: either by prompting a model through
//! [`ProcedureSynthesizer`], or by compiling [`CleaningRules`] directly.
//! Model output is untrusted and only ever run through the
//! [`sandbox`](crate::sandbox).

pub mod fence;
pub mod prompt;
pub mod rules;
pub mod synthesizer;

pub use fence::strip_code_fence;
pub use prompt::{CleaningPrompt, LANGUAGE_REFERENCE, SYSTEM_PROMPT};
pub use rules::{CleaningRule, CleaningRules};
pub use synthesizer::{
    CleaningProcedure, ProcedureOrigin, ProcedureSynthesizer, SynthesisConfig, SynthesisError,
};

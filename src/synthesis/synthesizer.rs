//! Cleaning-procedure synthesis through an [`LlmProvider`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message, DEFAULT_MODEL};
use crate::quality::IssueReport;

use super::fence::strip_code_fence;
use super::prompt::CleaningPrompt;
use super::rules::CleaningRules;

/// Errors from procedure synthesis.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model returned an empty cleaning procedure")]
    EmptyProcedure,
}

/// Where a cleaning procedure came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureOrigin {
    /// Generated by a model.
    Model { model: String, response_id: String },
    /// Compiled from [`CleaningRules`].
    Rules,
    /// No issues were found, so nothing was generated.
    Skipped,
}

/// Untrusted cleaning-language source plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningProcedure {
    source: String,
    origin: ProcedureOrigin,
}

impl CleaningProcedure {
    pub fn new(source: impl Into<String>, origin: ProcedureOrigin) -> Self {
        Self {
            source: source.into(),
            origin,
        }
    }

    /// Procedure compiled from `rules`.
    pub fn from_rules(rules: &CleaningRules) -> Self {
        Self::new(rules.to_script(), ProcedureOrigin::Rules)
    }

    /// Empty procedure recorded when there was nothing to clean.
    pub fn skipped() -> Self {
        Self::new(String::new(), ProcedureOrigin::Skipped)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &ProcedureOrigin {
        &self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// Configuration for [`ProcedureSynthesizer`].
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Model name; empty defers to the client's configured model.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub rules: CleaningRules,
    /// Record a [`ProcedureOrigin::Skipped`] procedure instead of calling the
    /// model when the report has no issues.
    pub skip_model_when_clean: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: Some(1024),
            rules: CleaningRules::default(),
            skip_model_when_clean: true,
        }
    }
}

impl SynthesisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_rules(mut self, rules: CleaningRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_skip_model_when_clean(mut self, skip: bool) -> Self {
        self.skip_model_when_clean = skip;
        self
    }
}

/// Asks a model for a cleaning procedure that addresses an [`IssueReport`].
pub struct ProcedureSynthesizer {
    llm: Arc<dyn LlmProvider>,
    config: SynthesisConfig,
}

impl ProcedureSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: SynthesisConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// The request sent for `report`.
    pub fn build_request(&self, report: &IssueReport) -> GenerationRequest {
        let prompt = CleaningPrompt::build(report, &self.config.rules);
        let mut request = GenerationRequest::new(
            self.config.model.clone(),
            vec![Message::system(prompt.system), Message::user(prompt.user)],
        )
        .with_temperature(self.config.temperature);
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    /// Generates a procedure for `report`, with code fences removed.
    pub async fn synthesize(&self, report: &IssueReport) -> Result<CleaningProcedure, SynthesisError> {
        if self.config.skip_model_when_clean && !report.has_issues() {
            info!("No data-quality issues found, skipping model call");
            return Ok(CleaningProcedure::skipped());
        }

        let request = self.build_request(report);
        let response = self.llm.generate(request).await?;
        let content = response.first_content().ok_or(LlmError::EmptyResponse)?;

        let source = strip_code_fence(content);
        if source.trim().is_empty() {
            return Err(SynthesisError::EmptyProcedure);
        }

        let model = if response.model.is_empty() {
            self.config.model.clone()
        } else {
            response.model.clone()
        };
        debug!(
            model = %model,
            response_id = %response.id,
            total_tokens = response.usage.total_tokens,
            bytes = source.len(),
            "Synthesized cleaning procedure"
        );

        Ok(CleaningProcedure::new(
            source,
            ProcedureOrigin::Model {
                model,
                response_id: response.id,
            },
        ))
    }
}

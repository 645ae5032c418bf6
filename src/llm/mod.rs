//! LLM integration for datawash.
//!
//! This module provides the [`LlmProvider`] seam the synthesis stage talks
//! through, and [`ChatClient`], an implementation for OpenAI-compatible and
//! Azure OpenAI chat-completions endpoints.
//!
//! ```ignore
//! use datawash::llm::{ChatClient, GenerationRequest, LlmConfig, LlmProvider, Message};
//!
//! let client = ChatClient::new(LlmConfig::openai("http://localhost:4000").with_model("gpt-4o"))?;
//! let request = GenerationRequest::new(
//!     "",
//!     vec![Message::system("You are terse."), Message::user("Say hi")],
//! )
//! .with_temperature(0.0);
//! let response = client.generate(request).await?;
//! ```

pub mod client;

pub use client::{
    ApiFlavor, ChatClient, Choice, GenerationRequest, GenerationResponse, LlmConfig, LlmProvider,
    Message, Usage, DEFAULT_MODEL,
};

//! Model Invocation Adapter
//!
//! This module provides the single interface every research stage uses to talk
//! to a language model. Provider-specific wire formats stay behind the
//! [`LLMClient`] trait; callers build a [`GenerateRequest`] and read back an
//! [`LLMResponse`].
//!
//! # Supported Providers
//!
//! - `gemini` - Google Gemini REST API with Google Search grounding and citations
//! - `openai` - any OpenAI-compatible chat completions endpoint (no citations)
//!
//! # Example
//!
//! ```ignore
//! use duet::llm::{Content, GenerateRequest, Part, Provider};
//!
//! let provider = Provider::Gemini { api_key, api_base };
//! let client = provider.create_client()?;
//!
//! let request = GenerateRequest::new(
//!     "gemini-2.5-flash",
//!     vec![Content::user(vec![Part::text("What is new in Rust 1.85?")])],
//! )
//! .with_web_search(true);
//!
//! let response = client.generate(&request).await?;
//! println!("{}", response.content);
//! for citation in response.citations {
//!     println!("- {} ({})", citation.title, citation.url);
//! }
//! ```

/// Backend capability flags.
pub mod capabilities;
/// Core LLM client trait and request/response types.
pub mod client;
/// Google Gemini backend.
pub mod gemini;
/// OpenAI-compatible backend.
pub mod openai;

pub use capabilities::ProviderCapabilities;
pub use client::{Content, ContentRole, GenerateRequest, LLMClient, LLMResponse, Part, Provider};

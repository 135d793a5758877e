//! AI Module
//!
//! LLM access for note generation, question generation, grading and the
//! teach-the-AI sessions.
//!
//! ```text
//! ai/
//! ├── mod.rs     - Module exports
//! ├── client.rs  - reqwest client for the generateContent API
//! ├── prompts.rs - Prompt templates and temperatures
//! └── parse.rs   - Code-fence stripping and question parsing
//! ```

pub mod client;
pub mod parse;
pub mod prompts;

pub use client::{AiError, LlmClient, LlmRequest};

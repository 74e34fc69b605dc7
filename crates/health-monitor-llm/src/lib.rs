//! LLM integration for the health monitor.
//!
//! This crate builds the prompts sent to the text-generation oracle, talks to
//! Google Gemini, and splits free-text replies into diagnosis and medicine
//! suggestions.

pub mod oracle;
pub mod parser;
pub mod prompts;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::GeminiOracle;
pub use oracle::*;
pub use parser::*;
pub use prompts::*;

//! `task-extractor`: turns free-text manager comments into task proposals
//! through an OpenAI-compatible chat-completions endpoint.
//!
//! ```text
//! comment tail ──build_prompt──▶ chat/completions ──parse_proposals──▶ Vec<TaskProposal>
//! ```
//!
//! Network and parse failures never leave [`OpenAiExtractor::extract`]; they
//! are logged and surface as an empty list, which the engine treats as "no
//! task found". [`OpenAiExtractor::try_extract`] exposes the error for
//! diagnostics.

pub mod client;
pub mod error;
pub mod parse;
pub mod prompt;

#[cfg(test)]
mod tests;

pub use client::{ExtractorSettings, OpenAiExtractor, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::ExtractorError;

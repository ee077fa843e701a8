//! GitHub code-audit note-taking library
//!
//! This library provides functionality for analyzing repositories with the
//! Gemini generative-language service, persisting the resulting audit notes,
//! and exporting the collection to a spreadsheet.

mod cli;
mod config;
mod errors;
mod export;
mod gemini;
mod note;
mod storage;
mod types;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use export::*;
pub use gemini::*;
pub use note::*;
pub use storage::*;
pub use types::*;

//! Error types for the code-notes-auditor application.
//!
//! This module defines custom error types that categorize different failures
//! that can occur during note management and repository analysis operations.

use std::io;

use thiserror::Error;

/// The main error type for the code-notes-auditor application.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors from the HTTP transport layer.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors from the spreadsheet writer.
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The repository URL was empty or whitespace.
    #[error("The repository URL cannot be empty.")]
    EmptyRepoUrl,

    /// A custom prompt template was supplied but is unusable.
    #[error("Invalid prompt template: {message}")]
    InvalidPromptTemplate { message: String },

    /// No API key is configured for the analysis service.
    #[error("GEMINI_API_KEY is not configured. Repository analysis is unavailable.")]
    MissingApiKey,

    /// The analysis service replied with a non-success status.
    #[error("Analysis service returned {status}: {body}")]
    ServiceError { status: u16, body: String },

    /// The analysis service reply could not be parsed into the expected shape.
    #[error("The analysis service returned a malformed response. Raw content: {snippet}")]
    MalformedResponse { snippet: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Export was requested against an empty collection.
    #[error("There are no notes to export.")]
    NothingToExport,

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

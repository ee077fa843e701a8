//! Shared types for the code-notes-auditor application.
//!
//! This module holds the crate-wide Result alias, the outcome/metadata types
//! exchanged between components, and the CLI subcommand definitions.

use std::path::PathBuf;

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::AuditError;

/// A specialized Result type for code-notes-auditor operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Which branch a `NoteStore::save` took, so the caller can surface a
/// distinct confirmation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new note was inserted.
    Created,
    /// An existing note with the same id was replaced.
    Updated,
}

/// A single web source reference returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunkWeb {
    pub uri: String,
    pub title: String,
}

/// One grounding reference, either a live web source or retrieved context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<GroundingChunkWeb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<GroundingChunkWeb>,
}

/// Provenance metadata optionally returned alongside an analysis. Passed
/// through unmodified from the service response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

/// The validated result of one analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Free-form analysis text.
    pub analysis: String,
    /// Rating in the closed range [-1, 10]; -1 means the service declined
    /// to rate the subject.
    pub rating: i32,
    /// Provenance metadata, when the service supplied any.
    pub grounding_metadata: Option<GroundingMetadata>,
}

/// Available subcommands for the code-notes-auditor application
#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a repository with Gemini and save the result as a note
    Analyze {
        /// URL of the repository to analyze
        url: String,

        /// Your own commentary to store alongside the analysis
        #[clap(short, long)]
        description: Option<String>,

        /// Path to a custom prompt template containing {{REPO_URL}}
        #[clap(short, long)]
        prompt_file: Option<PathBuf>,

        /// Print the analysis without saving a note
        #[clap(long)]
        no_save: bool,
    },

    /// Save a note without requesting an analysis
    Add {
        /// URL of the repository the note is about
        url: String,

        /// Your own commentary
        #[clap(short, long)]
        description: Option<String>,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New repository URL
        #[clap(short, long)]
        url: Option<String>,

        /// New commentary, replacing the previous text
        #[clap(short, long)]
        description: Option<String>,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// List notes, newest first
    List {
        /// Limit the number of notes returned
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Export all notes to an XLSX spreadsheet
    Export {
        /// Path for the spreadsheet file
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

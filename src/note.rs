//! Core data structures for the code-notes-auditor application.
//!
//! This module contains the Note record, the sole persistent entity of the
//! application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted audit note for one repository.
///
/// Field names are serialized in camelCase so collections written by older
/// versions of the application load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier for the note, assigned at creation and never
    /// reassigned.
    pub id: String,
    /// URL of the repository under audit.
    pub repo_url: String,
    /// Quality rating on a 0-10 scale. `None` means no rating was requested
    /// yet; `Some(-1)` means the analysis service declined to rate.
    #[serde(default)]
    pub rating: Option<i32>,
    /// Free-form user commentary. May be empty.
    #[serde(default)]
    pub description: String,
    /// Analysis text produced by the external service, absent until an
    /// analysis call succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_analysis: Option<String>,
    /// When the note was created. Records persisted by an older schema that
    /// lacked this field are assigned the current time on load.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note for the given repository URL.
    pub fn new(repo_url: String, description: String) -> Self {
        let now = Utc::now();
        // Generate a unique ID from the creation timestamp
        let id = now.timestamp_millis().to_string();

        Note {
            id,
            repo_url,
            rating: None,
            description,
            gemini_analysis: None,
            created_at: now,
        }
    }

    /// Attaches an analysis result to the note.
    pub fn with_analysis(mut self, analysis: String, rating: i32) -> Self {
        self.gemini_analysis = Some(analysis);
        self.rating = Some(rating);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_has_no_rating_or_analysis() {
        let note = Note::new("https://github.com/a/b".into(), String::new());
        assert!(note.rating.is_none());
        assert!(note.gemini_analysis.is_none());
        assert!(!note.id.is_empty());
    }

    #[test]
    fn camel_case_wire_format() {
        let note = Note::new("https://github.com/a/b".into(), "mine".into());
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"repoUrl\""));
        assert!(json.contains("\"createdAt\""));
        // Absent analysis is omitted entirely
        assert!(!json.contains("geminiAnalysis"));
    }

    #[test]
    fn missing_created_at_defaults_to_now() {
        let json = r#"{"id":"1","repoUrl":"https://github.com/a/b","rating":5,"description":""}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.rating, Some(5));
        assert!(note.created_at <= Utc::now());
    }
}

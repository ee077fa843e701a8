//! Spreadsheet export of the note collection.
//!
//! The row transform is pure; actual file encoding is delegated to
//! `rust_xlsxwriter` and its output is not validated here.

use std::path::Path;

use log::info;
use rust_xlsxwriter::{Format, Workbook};

use crate::{AuditError, Note, Result};

/// Default name of the exported artifact.
pub const DEFAULT_EXPORT_FILE: &str = "github_code_audit_report.xlsx";

/// Fixed sheet name.
const SHEET_NAME: &str = "Code Audit Notes";

/// Column headers, in their fixed order.
const HEADERS: [&str; 6] = [
    "ID",
    "Repository URL",
    "Gemini Rating",
    "Gemini Analysis",
    "User Notes",
    "Created",
];

/// Minimum display width per column.
const COLUMN_WIDTHS: [f64; 6] = [25.0, 60.0, 20.0, 80.0, 80.0, 25.0];

/// Placeholder for empty text fields, so exported cells are never blank.
const EMPTY_FIELD: &str = "None";

/// How the rating column renders:
/// absent → "N/A", the -1 sentinel → "unrateable", else the number.
fn rating_display(rating: Option<i32>) -> String {
    match rating {
        None => "N/A".to_string(),
        Some(-1) => "unrateable".to_string(),
        Some(r) => r.to_string(),
    }
}

fn text_or_placeholder(text: &str) -> String {
    if text.is_empty() {
        EMPTY_FIELD.to_string()
    } else {
        text.to_string()
    }
}

/// Transforms notes into flat rows of display strings, one per note, in the
/// collection's (newest-first) order.
pub fn note_rows(notes: &[Note]) -> Vec<[String; 6]> {
    notes
        .iter()
        .map(|note| {
            [
                note.id.clone(),
                note.repo_url.clone(),
                rating_display(note.rating),
                text_or_placeholder(note.gemini_analysis.as_deref().unwrap_or("")),
                text_or_placeholder(&note.description),
                note.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect()
}

/// Writes the note collection to an XLSX file at `path`.
///
/// An empty collection is rejected before the writer is touched.
pub fn export_xlsx(notes: &[Note], path: &Path) -> Result<()> {
    if notes.is_empty() {
        return Err(AuditError::NothingToExport);
    }

    let rows = note_rows(notes);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet().set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, COLUMN_WIDTHS[col])?;
    }

    for (row, cells) in rows.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            worksheet.write(row as u32 + 1, col as u16, cell.as_str())?;
        }
    }

    workbook.save(path)?;
    info!("Exported {} notes to {}", notes.len(), path.display());
    Ok(())
}
